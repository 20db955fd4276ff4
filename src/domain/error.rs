//! Domain error types.

/// Top-level error type for rulebench.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("unknown strategy '{id}'")]
    UnknownStrategy { id: String },

    #[error("invalid position transition: cannot {action} while {from}")]
    InvalidTransition {
        from: &'static str,
        action: &'static str,
    },

    #[error("order rejected: {reason}")]
    OrderRejected { reason: String },

    #[error("indicator {key} has {actual} values, expected {expected}")]
    IndicatorLength {
        key: String,
        expected: usize,
        actual: usize,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        EngineError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors raised while resolving configuration, before any bar is read.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            EngineError::ConfigParse { .. }
                | EngineError::ConfigMissing { .. }
                | EngineError::ConfigInvalid { .. }
                | EngineError::UnknownStrategy { .. }
        )
    }
}

impl From<&EngineError> for std::process::ExitCode {
    fn from(err: &EngineError) -> Self {
        let code: u8 = match err {
            EngineError::Io(_) => 1,
            EngineError::ConfigParse { .. }
            | EngineError::ConfigMissing { .. }
            | EngineError::ConfigInvalid { .. }
            | EngineError::UnknownStrategy { .. } => 2,
            EngineError::Data { .. } | EngineError::IndicatorLength { .. } => 3,
            EngineError::InvalidTransition { .. } | EngineError::OrderRejected { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}
