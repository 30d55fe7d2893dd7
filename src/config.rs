//! Engine-wide defaults (spec.md §4.2, §6 env vars, §9 "implicit default").
//!
//! No on-disk config file is introduced here — the teacher has no config
//! file at this layer either; its `Cli`/`RingConfig` structs (`src/cli.rs`,
//! `src/broker/state.rs`) are plain structs with hard-coded defaults
//! overridable per call, which is the shape `EngineConfig` follows.

const DEFAULT_TIMEOUT_SECS: f64 = 10.0;
const DEFAULT_TERM: &str = "dumb";
const LOGGING_ENV_VAR: &str = "WDYE_LOGGING";

/// Engine-wide defaults applied when a spawn or pattern doesn't override
/// them.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Effective timeout (seconds) used when a `Timeout`/`Default` pattern
    /// doesn't set one, and for the implicit deadline when an Expect call
    /// has no `Timeout`/`Default` pattern at all (spec.md §4.6 step 1).
    pub default_timeout_secs: f64,
    /// `TERM` applied to a spawned child when the host doesn't override it
    /// (spec.md §4.2).
    pub default_term: String,
    /// Whether asciicast logging is enabled for new spawns (spec.md §4.2,
    /// §6).
    pub logging_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            default_term: DEFAULT_TERM.to_string(),
            logging_enabled: false,
        }
    }
}

impl EngineConfig {
    /// Read defaults from the process environment: `WDYE_LOGGING`
    /// (non-empty enables asciicast logs), falling back to the built-in
    /// defaults otherwise (spec.md §6).
    pub fn from_env() -> Self {
        let logging_enabled = std::env::var(LOGGING_ENV_VAR)
            .map(|v| !v.is_empty())
            .unwrap_or(false);
        Self {
            logging_enabled,
            ..Self::default()
        }
    }

    pub fn with_default_timeout_secs(mut self, secs: f64) -> Self {
        self.default_timeout_secs = secs;
        self
    }

    pub fn with_default_term(mut self, term: impl Into<String>) -> Self {
        self.default_term = term.into();
        self
    }

    pub fn with_logging_enabled(mut self, enabled: bool) -> Self {
        self.logging_enabled = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_no_logging() {
        let cfg = EngineConfig::default();
        assert!(!cfg.logging_enabled);
        assert_eq!(cfg.default_term, "dumb");
    }

    #[test]
    fn builder_overrides_apply() {
        let cfg = EngineConfig::default()
            .with_default_timeout_secs(5.0)
            .with_logging_enabled(true);
        assert_eq!(cfg.default_timeout_secs, 5.0);
        assert!(cfg.logging_enabled);
    }
}
