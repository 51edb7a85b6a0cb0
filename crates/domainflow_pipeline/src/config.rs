//! Pipeline configuration.

/// How the pipeline reacts to continuable validation errors before the
/// Executing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Stop before Executing when any entry carries validation errors.
    ///
    /// The submission completes normally and the change set is returned
    /// with the accumulated errors; nothing executes or persists.
    #[default]
    AbortBatch,
    /// Skip invalid entries and execute their valid siblings.
    SkipEntry,
}

/// Tunables for a submission pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    error_policy: ErrorPolicy,
    max_entries: usize,
}

impl PipelineConfig {
    /// Creates a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the validation error policy.
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// Sets the maximum number of entries accepted per submission.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// The validation error policy.
    pub fn error_policy(&self) -> ErrorPolicy {
        self.error_policy
    }

    /// The maximum number of entries accepted per submission.
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            error_policy: ErrorPolicy::default(),
            max_entries: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.error_policy(), ErrorPolicy::AbortBatch);
        assert_eq!(config.max_entries(), 1000);
    }

    #[test]
    fn builders() {
        let config = PipelineConfig::new()
            .with_error_policy(ErrorPolicy::SkipEntry)
            .with_max_entries(25);
        assert_eq!(config.error_policy(), ErrorPolicy::SkipEntry);
        assert_eq!(config.max_entries(), 25);
    }
}
