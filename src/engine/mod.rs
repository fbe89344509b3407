//! The analysis engine and its public entry points.
//!
//! One [`Engine`] owns the capability registry, the concurrency gate and
//! the running metrics. Cloning it is cheap and every clone shares that
//! state, while separate engines are fully independent.
//!
//! Each analysis runs inside the gate, under a memory sampler, through
//! the stages of [`Stage`]:
//!
//! ```text
//! Validating → Reading → Detecting → Extracting → Finalizing → Completed
//! ```
//!
//! Security violations and resource limits abort the analysis. Everything
//! after the read degrades to warnings instead.
//!
//! # Example
//!
//! ```no_run
//! use hwpscan::{AnalyzeOptions, Engine, EngineConfig};
//!
//! # async fn run() {
//! let engine = Engine::new(EngineConfig::default());
//! let result = engine.analyze("report.hwp", &AnalyzeOptions::default()).await;
//! if result.success {
//!     println!("{} ({})", result.content, result.analysis.method);
//! } else {
//!     eprintln!("{:?}: {:?}", result.error_code, result.error);
//! }
//! # }
//! ```

mod context;
mod gate;
mod metrics;
mod result;
mod sampler;

pub use context::{OperationContext, Stage};
pub use gate::{Gate, GatePermit};
pub use metrics::{Metrics, MetricsSnapshot, RECENT_PEAKS};
pub use result::{
    AnalysisResult, BatchProgress, Diagnostics, FileInfo, HeaderInfo, HealthReport, MemoryStatus,
    PreviewResult,
};
pub use sampler::{MemorySampler, resident_set_size};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::analysis::{self, DocumentAnalysis};
use crate::common::detection::FileSignatureInfo;
use crate::common::error::{Error, ResourceLimit, Result};
use crate::config::{AnalyzeOptions, EngineConfig};
use crate::container::{self, ContainerDocument};
use crate::decompress::Decompressor;
use crate::extract::{ExtractionResult, ExtractionStrategy, StrategyInput, StrategyRegistry, run_chain};
use crate::ingest::{self, IngestLimits};

/// Error rate above which health checks report the engine unhealthy.
const HIGH_ERROR_RATE: f64 = 0.5;

struct Inner {
    config: EngineConfig,
    decompressor: Arc<Decompressor>,
    registry: StrategyRegistry,
    gate: Gate,
    metrics: Metrics,
    sequence: AtomicU64,
}

/// Shared handle to one engine instance.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.inner.registry)
            .field("gate", &self.inner.gate)
            .finish_non_exhaustive()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// An analysis that stopped, with whatever was known when it did.
struct Failure {
    error: Error,
    file: FileInfo,
    diagnostics: Diagnostics,
}

/// Builds an [`Engine`], optionally with extra strategies.
pub struct EngineBuilder {
    config: EngineConfig,
    leading: Vec<Arc<dyn ExtractionStrategy>>,
    standard: bool,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            leading: Vec::new(),
            standard: true,
        }
    }

    /// Add a strategy ahead of the standard chain.
    ///
    /// Strategies added this way keep the order they were added in.
    pub fn strategy(mut self, strategy: Arc<dyn ExtractionStrategy>) -> Self {
        self.leading.push(strategy);
        self
    }

    /// Use only the strategies added with [`EngineBuilder::strategy`].
    pub fn without_standard_chain(mut self) -> Self {
        self.standard = false;
        self
    }

    pub fn build(self) -> Engine {
        let decompressor = Arc::new(Decompressor::new(self.config.decompression.max_output));

        let mut registry = StrategyRegistry::new();
        for strategy in self.leading {
            registry.register(strategy);
        }
        if self.standard {
            registry.extend_standard(&self.config.external_tools, decompressor.clone());
        }
        debug!(strategies = ?registry, "engine built");

        Engine {
            inner: Arc::new(Inner {
                gate: Gate::new(self.config.max_concurrency),
                config: self.config,
                decompressor,
                registry,
                metrics: Metrics::new(),
                sequence: AtomicU64::new(0),
            }),
        }
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        EngineBuilder::new(config).build()
    }

    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Default per-call options from the configuration.
    pub fn default_options(&self) -> &AnalyzeOptions {
        &self.inner.config.limits
    }

    pub fn gate(&self) -> &Gate {
        &self.inner.gate
    }

    /// Analyze one file. Never fails; see [`AnalysisResult::success`].
    pub async fn analyze(&self, path: impl AsRef<Path>, options: &AnalyzeOptions) -> AnalysisResult {
        match self.run(path.as_ref(), options).await {
            Ok(result) => result,
            Err(failure) => AnalysisResult::failed(failure.file, &failure.error, failure.diagnostics),
        }
    }

    /// Analyze one file, returning the aborting error instead of a failed
    /// result.
    pub async fn try_analyze(
        &self,
        path: impl AsRef<Path>,
        options: &AnalyzeOptions,
    ) -> Result<AnalysisResult> {
        self.run(path.as_ref(), options)
            .await
            .map_err(|failure| failure.error)
    }

    /// Validate a file and report its header without reading the body.
    pub async fn quick_preview(&self, path: impl AsRef<Path>) -> Result<PreviewResult> {
        let path = path.as_ref();
        let probe = ingest::probe(path, &IngestLimits::from(self.default_options())).await?;
        let signature = FileSignatureInfo::detect(&probe.header);
        Ok(PreviewResult {
            file: FileInfo::new(path, probe.size),
            header: HeaderInfo::from(&signature),
        })
    }

    /// Analyze many files, reporting progress after each one.
    ///
    /// Results keep the order of `paths`. At most
    /// `options.max_concurrency` files are started at once, and the engine
    /// gate still bounds how many are analyzed simultaneously.
    pub async fn analyze_batch<P, F>(
        &self,
        paths: &[P],
        options: &AnalyzeOptions,
        mut on_progress: F,
    ) -> Vec<AnalysisResult>
    where
        P: AsRef<Path>,
        F: FnMut(BatchProgress),
    {
        let total = paths.len();
        let fan_out = options
            .max_concurrency
            .unwrap_or_else(|| self.inner.gate.capacity())
            .max(1);
        let semaphore = Arc::new(Semaphore::new(fan_out));
        let mut tasks = JoinSet::new();

        for (index, path) in paths.iter().enumerate() {
            let engine = self.clone();
            let path = path.as_ref().to_path_buf();
            let options = options.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result = engine.analyze(&path, &options).await;
                (index, result)
            });
        }

        let mut results: Vec<Option<AnalysisResult>> = vec![None; total];
        let mut completed = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => {
                    completed += 1;
                    on_progress(BatchProgress {
                        completed,
                        total,
                        path: result.file.path.clone(),
                        success: result.success,
                    });
                    results[index] = Some(result);
                },
                Err(e) => warn!(error = %e, "batch analysis task failed"),
            }
        }

        results
            .into_iter()
            .zip(paths)
            .map(|(result, path)| {
                result.unwrap_or_else(|| {
                    let path = path.as_ref();
                    let error = Error::unclassified(path, "batch", "analysis task did not complete");
                    AnalysisResult::failed(FileInfo::new(path, 0), &error, Diagnostics::default())
                })
            })
            .collect()
    }

    /// Report strategy availability, error rate and memory pressure.
    pub async fn health_check(&self) -> HealthReport {
        let inner = &self.inner;
        let strategies = inner.registry.status();
        let metrics = inner.metrics.snapshot();
        let resident = resident_set_size().await;
        let ceiling = inner.config.memory.process_ceiling;
        let pressure = match resident {
            Some(used) if ceiling > 0 => {
                used as f64 >= ceiling as f64 * inner.config.memory.warning_ratio
            },
            _ => false,
        };

        let mut warnings = Vec::new();
        for status in strategies.iter().filter(|s| !s.available) {
            warnings.push(format!("strategy '{}' is unavailable", status.name));
        }
        let any_available = strategies.iter().any(|s| s.available);
        if !any_available {
            warnings.push("no extraction strategy is available".to_string());
        }
        if pressure {
            warnings.push(format!(
                "memory pressure: {} of {} bytes in use",
                resident.unwrap_or(0),
                ceiling
            ));
        }
        let high_errors = metrics.error_rate > HIGH_ERROR_RATE;
        if high_errors {
            warnings.push(format!("error rate is {:.0}%", metrics.error_rate * 100.0));
        }

        HealthReport {
            healthy: any_available && !pressure && !high_errors,
            strategies,
            in_flight: inner.gate.in_flight(),
            capacity: inner.gate.capacity(),
            memory: MemoryStatus {
                resident,
                ceiling,
                pressure,
            },
            metrics,
            warnings,
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Re-probe strategy availability and clear the running counters.
    pub fn reset(&self) {
        self.inner.registry.reprobe();
        self.inner.metrics.reset();
        self.inner.gate.reset_peak();
        info!("engine reset");
    }

    async fn run(&self, path: &Path, options: &AnalyzeOptions) -> std::result::Result<AnalysisResult, Failure> {
        let inner = &self.inner;
        let permit = inner.gate.acquire().await.map_err(|error| Failure {
            error,
            file: FileInfo::new(path, 0),
            diagnostics: Diagnostics::default(),
        })?;

        let mut ctx = OperationContext::new(inner.sequence.fetch_add(1, Ordering::Relaxed) + 1);
        let span = info_span!("analysis", op = %ctx.id(), path = %path.display());
        let mut sampler = MemorySampler::start(&inner.config.memory);
        let mut file = FileInfo::new(path, 0);
        let deadline = self.deadline(options);

        let outcome = async {
            let pipeline = self.pipeline(path, options, &mut ctx, &mut file);
            tokio::select! {
                result = tokio::time::timeout(deadline, pipeline) => result.unwrap_or_else(|_| {
                    Err(Error::from(ResourceLimit::OperationTimeout(deadline)))
                }),
                limit = sampler.exceeded() => Err(Error::from(limit)),
            }
        }
        .instrument(span.clone())
        .await;

        ctx.finish(outcome.is_ok());
        let memory_peak = sampler.peak().max(resident_set_size().await.unwrap_or(0));
        drop(sampler);
        drop(permit);

        let duration = ctx.elapsed();
        inner.metrics.record(duration, outcome.is_ok(), memory_peak);
        let diagnostics = Diagnostics {
            operation_id: ctx.id().to_string(),
            duration_ms: duration.as_millis() as u64,
            memory_peak,
            stage: Some(ctx.stage()),
            ..Diagnostics::default()
        };

        let _entered = span.enter();
        match outcome {
            Ok((header, extraction, document)) => {
                info!(
                    method = %extraction.method,
                    confidence = extraction.confidence,
                    elapsed = ?duration,
                    "analysis completed"
                );
                Ok(AnalysisResult::completed(file, header, extraction, document, diagnostics))
            },
            Err(error) => {
                warn!(code = %error.code(), error = %error, elapsed = ?duration, "analysis aborted");
                Err(Failure {
                    error,
                    file,
                    diagnostics,
                })
            },
        }
    }

    /// Wall-clock bound for one analysis: `timeout` once per registered
    /// strategy.
    fn deadline(&self, options: &AnalyzeOptions) -> Duration {
        let strategies = self.inner.registry.len().max(1) as u32;
        options.timeout().checked_mul(strategies).unwrap_or(Duration::MAX)
    }

    async fn pipeline(
        &self,
        path: &Path,
        options: &AnalyzeOptions,
        ctx: &mut OperationContext,
        file: &mut FileInfo,
    ) -> Result<(HeaderInfo, ExtractionResult, DocumentAnalysis)> {
        let limits = IngestLimits::from(options);

        ctx.advance(Stage::Validating);
        let validated = ingest::validate(path, &limits).await.inspect_err(|e| {
            if let Error::Resource(ResourceLimit::FileTooLarge { size, .. }) = e {
                *file = FileInfo::new(path, *size);
            }
        })?;
        *file = FileInfo::new(path, validated.probe().size);

        ctx.advance(Stage::Reading);
        let ingested = validated.read(&limits).await?;

        ctx.advance(Stage::Detecting);
        let mut signature = FileSignatureInfo::detect(&ingested.header);
        debug!(kind = ?signature.kind, flavor = ?signature.flavor, version = ?signature.version, "format detected");
        let (container, mut warnings) = self
            .parse_container(&ingested.data, &signature, options.timeout())
            .await;
        // An embedded file header is more specific than the outer signature
        if let Some(doc) = &container {
            signature.version = signature.version.or(doc.version);
            signature.flags |= doc.flags;
        }

        ctx.advance(Stage::Extracting);
        let input = StrategyInput {
            path: ingested.path,
            data: ingested.data,
            signature,
            container: container.clone(),
        };
        let mut extraction = run_chain(&self.inner.registry, &input, options.strategy_timeout()).await;
        warnings.append(&mut extraction.warnings);
        extraction.warnings = warnings;

        ctx.advance(Stage::Finalizing);
        let text = if extraction.is_stub() {
            String::new()
        } else {
            extraction.text.clone()
        };
        let document = finalize(text, container, options.timeout()).await;

        Ok((HeaderInfo::from(&input.signature), extraction, document))
    }

    /// Parse the container once for every consumer; failures become
    /// warnings.
    async fn parse_container(
        &self,
        data: &Bytes,
        signature: &FileSignatureInfo,
        timeout: Duration,
    ) -> (Option<Arc<ContainerDocument>>, Vec<String>) {
        let Some(flavor) = signature.flavor else {
            return (None, Vec::new());
        };
        let data = data.clone();
        let decompressor = self.inner.decompressor.clone();
        let task = tokio::task::spawn_blocking(move || container::parse(&data, flavor, &decompressor));

        let failure = match tokio::time::timeout(timeout, task).await {
            Ok(Ok(Ok(doc))) => {
                debug!(entries = doc.entries.len(), sections = doc.sections, "container parsed");
                let warnings = doc.warnings.clone();
                return (Some(Arc::new(doc)), warnings);
            },
            Ok(Ok(Err(e))) => e.to_string(),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("did not finish within {:?}", timeout),
        };
        warn!(reason = %failure, "container parsing failed");
        (None, vec![format!("container parsing failed: {}", failure)])
    }
}

/// Metadata and structure analysis under `timeout`. Never fails.
async fn finalize(
    text: String,
    container: Option<Arc<ContainerDocument>>,
    timeout: Duration,
) -> DocumentAnalysis {
    let task = tokio::task::spawn_blocking(move || analysis::analyze(&text, container.as_deref()));
    let failure = match tokio::time::timeout(timeout, task).await {
        Ok(Ok(document)) => return document,
        Ok(Err(e)) => e.to_string(),
        Err(_) => format!("did not finish within {:?}", timeout),
    };
    warn!(reason = %failure, "document analysis degraded");
    DocumentAnalysis {
        warnings: vec![format!("metadata and structure analysis failed: {}", failure)],
        ..DocumentAnalysis::default()
    }
}

/// Paths from a batch that produced a failed result.
pub fn failed_paths(results: &[AnalysisResult]) -> Vec<PathBuf> {
    results
        .iter()
        .filter(|r| !r.success)
        .map(|r| r.file.path.clone())
        .collect()
}
