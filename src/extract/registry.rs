use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::debug;

use super::container::ContainerStrategy;
use super::external::ExternalToolStrategy;
use super::record::RecordStrategy;
use super::types::ExtractionStrategy;
use crate::config::ExternalToolConfig;
use crate::decompress::Decompressor;

struct Registered {
    strategy: Arc<dyn ExtractionStrategy>,
    available: AtomicBool,
}

/// Availability of one registered strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyStatus {
    pub name: String,
    pub available: bool,
}

/// Strategies in priority order, each probed once on registration.
#[derive(Default)]
pub struct StrategyRegistry {
    entries: Vec<Registered>,
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.status()).finish()
    }
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard chain: primary external tool, container streams,
    /// remaining external tools, then record scanning.
    pub fn standard(tools: &[ExternalToolConfig], decompressor: Arc<Decompressor>) -> Self {
        let mut registry = Self::new();
        registry.extend_standard(tools, decompressor);
        registry
    }

    /// Append the standard chain after any strategies already registered.
    pub fn extend_standard(&mut self, tools: &[ExternalToolConfig], decompressor: Arc<Decompressor>) {
        let max_output = decompressor.max_output();
        let mut tools = tools.iter();
        if let Some(primary) = tools.next() {
            self.register(Arc::new(ExternalToolStrategy::new(primary.clone(), max_output)));
        }
        self.register(Arc::new(ContainerStrategy::new(decompressor.clone())));
        for tool in tools {
            self.register(Arc::new(ExternalToolStrategy::new(tool.clone(), max_output)));
        }
        self.register(Arc::new(RecordStrategy::new(decompressor)));
    }

    /// Append a strategy at the lowest priority.
    pub fn register(&mut self, strategy: Arc<dyn ExtractionStrategy>) {
        let available = strategy.probe();
        debug!(strategy = strategy.name(), available, "strategy registered");
        self.entries.push(Registered {
            strategy,
            available: AtomicBool::new(available),
        });
    }

    /// Probe every strategy again.
    pub fn reprobe(&self) {
        for entry in &self.entries {
            let available = entry.strategy.probe();
            entry.available.store(available, Ordering::Release);
        }
    }

    /// Available strategies in priority order.
    pub fn available(&self) -> Vec<Arc<dyn ExtractionStrategy>> {
        self.entries
            .iter()
            .filter(|e| e.available.load(Ordering::Acquire))
            .map(|e| e.strategy.clone())
            .collect()
    }

    pub fn status(&self) -> Vec<StrategyStatus> {
        self.entries
            .iter()
            .map(|e| StrategyStatus {
                name: e.strategy.name().to_string(),
                available: e.available.load(Ordering::Acquire),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::Result;
    use crate::extract::types::{StrategyInput, StrategyOutput};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct Probed {
        probes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ExtractionStrategy for Probed {
        fn name(&self) -> &str {
            "probed"
        }

        fn probe(&self) -> bool {
            self.probes.fetch_add(1, Ordering::SeqCst) > 0
        }

        async fn extract(&self, _input: &StrategyInput) -> Result<StrategyOutput> {
            Ok(StrategyOutput::new("x"))
        }
    }

    #[test]
    fn test_probe_is_cached_until_reprobe() {
        let probes = Arc::new(AtomicUsize::new(0));
        let mut registry = StrategyRegistry::new();
        registry.register(Arc::new(Probed {
            probes: probes.clone(),
        }));

        for _ in 0..3 {
            assert!(registry.available().is_empty());
        }
        assert_eq!(probes.load(Ordering::SeqCst), 1);

        registry.reprobe();
        assert_eq!(registry.available().len(), 1);
        assert_eq!(probes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_standard_order() {
        let tools = vec![
            ExternalToolConfig {
                name: "primary".into(),
                program: "definitely-not-installed-tool".into(),
                args: vec![],
                confidence: None,
            },
            ExternalToolConfig {
                name: "secondary".into(),
                program: "definitely-not-installed-tool-2".into(),
                args: vec![],
                confidence: None,
            },
        ];
        let registry = StrategyRegistry::standard(&tools, Arc::new(Decompressor::new(1024)));
        let names: Vec<_> = registry.status().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["primary", "container", "secondary", "record-scan"]);
        let available: Vec<_> = registry
            .available()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(available, vec!["container", "record-scan"]);
    }
}
