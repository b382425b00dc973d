//! Engine settings.

/// Default number of attempts for a commit that keeps losing races.
pub const DEFAULT_MAX_COMMIT_ATTEMPTS: u32 = 16;

#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// How many times a conflicting commit is re-decided from a fresh read
    /// before the operation fails with `Contention`.
    pub max_commit_attempts: u32,
}

impl CheckoutConfig {
    pub fn with_max_commit_attempts(mut self, attempts: u32) -> Self {
        self.max_commit_attempts = attempts.max(1);
        self
    }
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
        }
    }
}
