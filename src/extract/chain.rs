use std::time::Duration;

use tracing::{debug, warn};

use super::registry::StrategyRegistry;
use super::types::{DEFAULT_CONFIDENCE, ExtractionResult, StrategyInput};
use crate::common::error::ResourceLimit;

/// Run the available strategies in order until one yields text.
///
/// Each strategy races `timeout`; a strategy that loses is dropped and
/// counts as a failure. Failures only become warnings. When nothing
/// succeeds the stub result is returned, so this never fails.
pub async fn run_chain(
    registry: &StrategyRegistry,
    input: &StrategyInput,
    timeout: Duration,
) -> ExtractionResult {
    let mut warnings = Vec::new();

    for strategy in registry.available() {
        let name = strategy.name().to_string();
        debug!(strategy = %name, "trying strategy");

        let failure = match tokio::time::timeout(timeout, strategy.extract(input)).await {
            Ok(Ok(output)) if !output.text.trim().is_empty() => {
                let confidence = output
                    .confidence
                    .filter(|c| c.is_finite())
                    .unwrap_or(DEFAULT_CONFIDENCE)
                    .clamp(0.0, 1.0);
                debug!(strategy = %name, confidence, chars = output.text.len(), "strategy succeeded");
                warnings.extend(output.warnings);
                return ExtractionResult {
                    text: output.text,
                    method: name,
                    confidence,
                    warnings,
                };
            },
            Ok(Ok(output)) => {
                warnings.extend(output.warnings);
                "produced no text".to_string()
            },
            Ok(Err(e)) => e.to_string(),
            Err(_) => ResourceLimit::StrategyTimeout {
                strategy: name.clone(),
                timeout,
            }
            .to_string(),
        };

        warn!(strategy = %name, reason = %failure, "extraction strategy failed");
        warnings.push(format!("{}: {}", name, failure));
    }

    ExtractionResult::stub(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::detection::FileSignatureInfo;
    use crate::common::error::{Error, Result};
    use crate::extract::types::{ExtractionStrategy, StrategyOutput};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    enum Behavior {
        Text(&'static str, Option<f64>),
        Blank,
        Fail,
        Hang,
    }

    struct Fake {
        name: &'static str,
        behavior: Behavior,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ExtractionStrategy for Fake {
        fn name(&self) -> &str {
            self.name
        }

        async fn extract(&self, _input: &StrategyInput) -> Result<StrategyOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Text(text, confidence) => Ok(StrategyOutput {
                    text: text.to_string(),
                    confidence,
                    warnings: vec![],
                }),
                Behavior::Blank => Ok(StrategyOutput::new("   \n")),
                Behavior::Fail => Err(Error::strategy(self.name, "boom")),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(StrategyOutput::new("too late"))
                },
            }
        }
    }

    fn build(behaviors: Vec<(&'static str, Behavior)>) -> (StrategyRegistry, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = StrategyRegistry::new();
        for (name, behavior) in behaviors {
            registry.register(Arc::new(Fake {
                name,
                behavior,
                calls: calls.clone(),
            }));
        }
        (registry, calls)
    }

    fn input() -> StrategyInput {
        StrategyInput {
            path: PathBuf::from("x.hwp"),
            data: Bytes::from_static(b"HWP Document File"),
            signature: FileSignatureInfo::detect(b"HWP Document File"),
            container: None,
        }
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let (registry, calls) = build(vec![
            ("fail", Behavior::Fail),
            ("blank", Behavior::Blank),
            ("good", Behavior::Text("content", Some(0.8))),
            ("later", Behavior::Text("unused", None)),
        ]);
        let result = run_chain(&registry, &input(), Duration::from_secs(1)).await;
        assert_eq!(result.method, "good");
        assert_eq!(result.text, "content");
        assert_eq!(result.confidence, 0.8);
        assert_eq!(result.warnings.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_confidence_defaults_and_clamps() {
        let (registry, _) = build(vec![("a", Behavior::Text("t", None))]);
        let result = run_chain(&registry, &input(), Duration::from_secs(1)).await;
        assert_eq!(result.confidence, DEFAULT_CONFIDENCE);

        let (registry, _) = build(vec![("a", Behavior::Text("t", Some(7.0)))]);
        let result = run_chain(&registry, &input(), Duration::from_secs(1)).await;
        assert_eq!(result.confidence, 1.0);

        let (registry, _) = build(vec![("a", Behavior::Text("t", Some(f64::NAN)))]);
        let result = run_chain(&registry, &input(), Duration::from_secs(1)).await;
        assert_eq!(result.confidence, DEFAULT_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_timeout_moves_on() {
        let (registry, _) = build(vec![
            ("slow", Behavior::Hang),
            ("fast", Behavior::Text("done", None)),
        ]);
        let started = Instant::now();
        let result = run_chain(&registry, &input(), Duration::from_millis(50)).await;
        assert_eq!(result.method, "fast");
        assert!(result.warnings[0].starts_with("slow:"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_all_fail_gives_stub() {
        let (registry, _) = build(vec![("a", Behavior::Fail), ("b", Behavior::Blank)]);
        let result = run_chain(&registry, &input(), Duration::from_secs(1)).await;
        assert!(result.is_stub());
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.warnings.len(), 3);
    }
}
