//! Config for the difficulty loop behaviors
//!
//! This module provides flags controlling how the loop reports what it does. Numeric
//! parameters (timeouts, probabilities, thresholds) live in [`Tuning`](crate::tuning::Tuning).
//!
//! Configuration can be created programmatically using [`Configuration::new()`] or by reading
//! environment variables using [`Configuration::from_env()`].
//!
//! # Environment Variables
//!
//! The following environment variables can be used to override configuration values. All
//! values are optional, and case-insensitive. Set the value to `"true"` to enable a flag.
//!
//! - `DIFFICULTY_VERBOSE`: Print one line per finished session to stdout (default: `true`)
//! - `DIFFICULTY_LOG`: Enable logging to a file (default: `false`)
//! - `DIFFICULTY_DEBUG_SCORER_STDERR`: Forward the external scorer's stderr (default: `false`)

/// Configuration for the difficulty loop behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Configuration {
    pub(crate) verbose: bool,
    pub(crate) log: bool,
    pub(crate) debug_scorer_stderr: bool,
}

impl Configuration {
    /// Create a new configuration with default parameters.
    ///
    /// By default:
    /// - Session results are printed to stdout.
    /// - Logging to file is disabled.
    /// - Scorer stderr output is discarded.
    pub fn new() -> Self {
        Self {
            verbose: true,
            log: false,
            debug_scorer_stderr: false,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// The following environment variables are recognized:
    /// - `DIFFICULTY_VERBOSE`: if set to `"true"`, enables verbose output (default: `true`)
    /// - `DIFFICULTY_LOG`: if set to `"true"`, enables logging to file (default: `false`)
    /// - `DIFFICULTY_DEBUG_SCORER_STDERR`: if set to `"true"`, forwards scorer stderr (default: `false`)
    ///
    /// Any other value (including unset) will result in using the default value for each field.
    pub fn from_env() -> Self {
        fn get_env_flag(var: &str, default: bool) -> bool {
            match std::env::var(var) {
                Ok(val) => val.eq_ignore_ascii_case("true"),
                Err(_) => default,
            }
        }

        Self {
            verbose: get_env_flag("DIFFICULTY_VERBOSE", true),
            log: get_env_flag("DIFFICULTY_LOG", false),
            debug_scorer_stderr: get_env_flag("DIFFICULTY_DEBUG_SCORER_STDERR", false),
        }
    }

    /// Enable or disable printing of session results.
    pub fn with_verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// Enable or disable logging to file.
    pub fn with_log(mut self, value: bool) -> Self {
        self.log = value;
        self
    }

    /// Enable or disable scorer stderr output (debug purposes only).
    pub fn with_debug_scorer_stderr(mut self, value: bool) -> Self {
        self.debug_scorer_stderr = value;
        self
    }

    /// Whether session results are printed.
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Whether logs go to a file.
    pub fn log(&self) -> bool {
        self.log
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}
