//! The error taxonomy from `spec.md` §7, implemented as `thiserror`-derived
//! enums in the style of the teacher's `ChannelError`/`DeviceError` types.
//!
//! Decoders never unwind on malformed input (property law 2): a [`FrameError`]
//! is only ever surfaced to a caller that explicitly asks why a `decode` call
//! produced no state change (e.g. the `wheellog` CLI), never by panicking.

use thiserror::Error;

/// An error produced while framing or checksum-validating a vendor frame.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
#[non_exhaustive]
pub enum FrameError {
    /// The computed checksum did not match the frame's trailing checksum byte(s).
    #[error("frame checksum mismatch")]
    ChecksumMismatch,

    /// The byte stream ended before a complete frame could be assembled.
    #[error("frame truncated, re-synchronization required")]
    Truncated,

    /// The stream lost alignment (e.g. an invalid header byte) and must
    /// resynchronize by discarding bytes until the next valid header.
    #[error("frame misaligned, re-synchronization required")]
    ReSyncRequired,

    /// The frame's type/sub-ID byte does not correspond to any known
    /// sub-frame for this vendor.
    #[error("unknown frame type")]
    UnknownFrameType,
}

/// An error produced while decoding a complete, checksum-valid frame into
/// [`crate::state::WheelState`] fields.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// Propagated framing-layer error.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// InMotion V2 received a real-time frame before the model-identifying
    /// `MainInfo` (`data[0] == 0x01`) sub-frame arrived. The decoder buffers
    /// the frame internally and returns `Ok(None)` rather than surfacing
    /// this variant to callers; it exists for diagnostics.
    #[error("wheel model not yet identified")]
    ModelNotIdentifiedYet,
}

/// An error produced by the [`crate::connection::WheelConnectionManager`]
/// state machine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConnectionError {
    /// The transport reported an unexpected disconnect.
    #[error("transport disconnected: {reason}")]
    TransportDisconnected { reason: String },

    /// No connection was established within the 30s connect timeout.
    #[error("connect attempt timed out")]
    ConnectTimeout,

    /// Service/characteristic discovery did not complete within 15s.
    #[error("service discovery timed out")]
    ServiceDiscoveryTimeout,

    /// The transport denied the operation outright; no reconnect is
    /// attempted.
    #[error("permission denied by transport")]
    PermissionDenied,

    /// A best-effort command write failed; the connection is not torn down.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// A transport-specific error surfaced through [`crate::connection::Transport`].
    #[error("transport error: {0}")]
    Transport(String),

    /// The connect/command future was cancelled by a user-requested
    /// disconnect before it resolved.
    #[error("operation cancelled")]
    Cancelled,
}

/// An error produced while validating an [`crate::alarm::AlarmConfig`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
#[non_exhaustive]
pub enum AlarmConfigError {
    /// A factor/threshold pair is internally inconsistent (e.g.
    /// `alarmFactor2 <= alarmFactor1`). Per spec §7, an invalid config is
    /// treated as disabled rather than rejected outright.
    #[error("alarm configuration is invalid and will be treated as disabled")]
    Invalid,
}
