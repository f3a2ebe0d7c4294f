// Log config

/// Logger configuration
#[derive(Clone)]
pub struct LogConfig {
    // Prefix for all the logs
    pub prefix: String,

    // Error messages enabled?
    pub error_enabled: bool,

    // Warning messages enabled?
    pub warning_enabled: bool,

    // Info messages enabled?
    pub info_enabled: bool,

    // Debug messages enabled?
    pub debug_enabled: bool,

    // Trace messages enabled?
    pub trace_enabled: bool,
}

impl LogConfig {
    /// Configuration with error, warning and info levels enabled
    pub fn standard(prefix: &str) -> LogConfig {
        LogConfig {
            prefix: prefix.to_string(),
            error_enabled: true,
            warning_enabled: true,
            info_enabled: true,
            debug_enabled: false,
            trace_enabled: false,
        }
    }

    /// Configuration with every level disabled
    pub fn disabled() -> LogConfig {
        LogConfig {
            prefix: "".to_string(),
            error_enabled: false,
            warning_enabled: false,
            info_enabled: false,
            debug_enabled: false,
            trace_enabled: false,
        }
    }

    /// Creates a child configuration for a child logger
    ///
    /// The prefix parameter is appended to the parent's prefix
    ///
    /// Returns a new configuration for the child logger
    pub fn child_config(&self, prefix: &str) -> LogConfig {
        LogConfig {
            prefix: format!("{}{}", self.prefix, prefix),
            error_enabled: self.error_enabled,
            warning_enabled: self.warning_enabled,
            info_enabled: self.info_enabled,
            debug_enabled: self.debug_enabled,
            trace_enabled: self.trace_enabled,
        }
    }
}

impl Default for LogConfig {
    fn default() -> LogConfig {
        LogConfig::disabled()
    }
}
