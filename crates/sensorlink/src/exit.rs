use std::fmt;

use sensorlink_frame::FrameError;
use sensorlink_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Frame(err) => frame_error(context, err),
        TransportError::Json(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        TransportError::InvalidConfig(_) => CliError::usage(format!("{context}: {err}")),
        TransportError::RegistryFull { .. } | TransportError::EndpointBusy { .. } => {
            CliError::usage(format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_map_to_usage() {
        let err = transport_error(
            "load config",
            TransportError::InvalidConfig("capacity must be at least 1".into()),
        );
        assert_eq!(err.code, USAGE);
        assert!(err.message.starts_with("load config: "));
    }

    #[test]
    fn frame_errors_map_to_data_invalid() {
        let err = frame_error("decode", FrameError::Truncated { len: 2, needed: 6 });
        assert_eq!(err.code, DATA_INVALID);
    }
}
