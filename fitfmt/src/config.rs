//! Engine configuration.
//!
//! The rule table itself lives in [`crate::style::StyleGuide`]; this only holds
//! how the batch orchestrator pages through the store.

/// Batch orchestration settings.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct EngineConfig {
    /// Page size used when an invocation does not give one (default: 20).
    pub default_batch_size: usize,
    /// Largest page a caller may request (default: 200).
    /// Bounds the worst-case latency of one page call.
    pub max_batch_size: usize,
    /// Catch panics inside one record's validate/repair and report them as a
    /// record error instead of aborting the page (default: true).
    pub catch_panics: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_batch_size: 20,
            max_batch_size: 200,
            catch_panics: true,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn with_batch_sizes(mut self, default_batch_size: usize, max_batch_size: usize) -> Self {
        self.default_batch_size = default_batch_size;
        self.max_batch_size = max_batch_size;
        self
    }

    #[must_use]
    pub fn with_catch_panics(mut self, catch_panics: bool) -> Self {
        self.catch_panics = catch_panics;
        self
    }
}
