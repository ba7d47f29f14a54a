use crate::traits::NodeId;

/// Errors that can occur when handing a frame to the radio.
#[derive(Debug, thiserror::Error)]
pub enum RadioError {
    /// The frame exceeds the radio's maximum frame length.
    #[error("frame too large ({len} bytes, max {max})")]
    FrameTooLarge { len: usize, max: usize },

    /// The radio is switched off.
    #[error("radio {0} is disabled")]
    Disabled(NodeId),

    /// No link to the destination node exists.
    #[error("node {0} is unreachable")]
    Unreachable(NodeId),

    /// The medium has been shut down.
    #[error("radio medium shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, RadioError>;
