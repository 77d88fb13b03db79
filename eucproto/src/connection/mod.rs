//! The connection state machine and orchestration layer (spec §4.6, §5).
//!
//! Unlike the framing/decoder layers, which are pure and runtime-agnostic,
//! the connection manager is where the core's scheduling requirements
//! (reconnect back-off, keepalive intervals, discovery timeouts) become
//! concrete durations that must actually be awaited — so this module leans
//! on `tokio` directly rather than staying executor-agnostic.

mod manager;
mod transport;

pub use manager::WheelConnectionManager;
pub use transport::Transport;

/// Published connection lifecycle (spec §3.4), always observed in order
/// (spec §8 property 10): a `Connected` observation is never seen without a
/// prior `Connecting`/`DiscoveringServices` for the same address.
#[derive(Clone, Debug, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Scanning,
    Connecting { address: String },
    DiscoveringServices { address: String },
    Connected { address: String, wheel_name: String },
    ConnectionLost { address: String, reason: String },
    Failed { error: String, address: Option<String> },
}
