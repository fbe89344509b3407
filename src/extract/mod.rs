//! The extraction strategy chain.
//!
//! Strategies are registered in a fixed priority order and probed once
//! for availability. For each analysis, [`run_chain`] tries every available
//! strategy under its own timeout, keeps the first non-empty result and
//! falls back to a zero-confidence stub when all of them fail.

mod chain;
mod container;
mod external;
mod record;
mod registry;
mod types;

pub use chain::run_chain;
pub use container::ContainerStrategy;
pub use external::{ExternalToolStrategy, find_program};
pub use record::RecordStrategy;
pub use registry::{StrategyRegistry, StrategyStatus};
pub use types::{
    DEFAULT_CONFIDENCE, ExtractionResult, ExtractionStrategy, STUB_METHOD, StrategyInput,
    StrategyOutput,
};
