//! Engine configuration loaded from environment variables.

/// Engine tuning knobs with sensible defaults.
///
/// Reads from environment variables:
/// - `STOCK_LOCK_ATTEMPTS` sets the row-lock acquisition attempts before
///   an operation gives up with `Busy` (default: `3`)
///
/// The per-attempt lock wait bound belongs to the store (see the ledger
/// stores' `with_lock_timeout`).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub lock_attempts: u32,
}

impl EngineConfig {
    /// Loads configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        Self {
            lock_attempts: std::env::var("STOCK_LOCK_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { lock_attempts: 3 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.lock_attempts, 3);
    }
}
