/// Errors returned by transport operations.
///
/// Protocol anomalies on the air (foreign frames, stale acks, bad sequence
/// numbers) are never errors; the engine drops and logs them.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Every registry slot holds a live endpoint.
    #[error("endpoint registry full ({capacity} slots)")]
    RegistryFull { capacity: usize },

    /// No endpoint is registered for the channel and role.
    #[error("no endpoint for channel {channel} (initiator={initiator})")]
    UnknownChannel { channel: String, initiator: bool },

    /// `open` on an endpoint that is open or already opening.
    #[error("channel {channel} is already open or opening")]
    AlreadyOpen { channel: String },

    /// `close` on an endpoint that is not open.
    #[error("channel {channel} is not open")]
    NotOpen { channel: String },

    /// Re-registration of an endpoint with work in progress.
    #[error("channel {channel} is busy")]
    EndpointBusy { channel: String },

    /// Registration without any callback.
    #[error("endpoint needs at least one callback")]
    NoCallbacks,

    /// Rejected configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] sensorlink_frame::FrameError),

    /// Radio-level error.
    #[error("radio error: {0}")]
    Radio(#[from] sensorlink_radio::RadioError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;

pub(crate) fn channel_name<C: std::fmt::Debug>(channel: &C) -> String {
    format!("{channel:?}")
}
