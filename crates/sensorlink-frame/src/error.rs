/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The buffer is shorter than the frame header.
    #[error("truncated frame ({len} bytes, header needs {needed})")]
    Truncated { len: usize, needed: usize },

    /// The payload exceeds the maximum the radio can carry.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
