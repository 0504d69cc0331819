//! Domain error types.

/// Top-level error type for rsitrader.
#[derive(Debug, thiserror::Error)]
pub enum RsitraderError {
    #[error("data error: {reason}")]
    Data { reason: String },

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

    #[error("simulation error: {reason}")]
    Simulation { reason: String },

    #[error("failed to write {target}: {reason}")]
    Resource { target: String, reason: String },

    #[error("no bars available in {source_name}")]
    NoData { source_name: String },

    #[error("no valid configuration evaluated ({skipped} skipped, {failed} failed)")]
    NoValidConfiguration { skipped: usize, failed: usize },
}

impl RsitraderError {
    pub fn simulation(reason: impl Into<String>) -> Self {
        RsitraderError::Simulation {
            reason: reason.into(),
        }
    }

    pub fn data(reason: impl Into<String>) -> Self {
        RsitraderError::Data {
            reason: reason.into(),
        }
    }

    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        RsitraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(
            self,
            RsitraderError::ConfigParse { .. }
                | RsitraderError::ConfigMissing { .. }
                | RsitraderError::ConfigInvalid { .. }
        )
    }
}

impl From<&RsitraderError> for std::process::ExitCode {
    fn from(err: &RsitraderError) -> Self {
        let code: u8 = match err {
            RsitraderError::Resource { .. } => 1,
            RsitraderError::ConfigParse { .. }
            | RsitraderError::ConfigMissing { .. }
            | RsitraderError::ConfigInvalid { .. } => 2,
            RsitraderError::Data { .. } => 3,
            RsitraderError::Simulation { .. } => 4,
            RsitraderError::NoData { .. } | RsitraderError::NoValidConfiguration { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
