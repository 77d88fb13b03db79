//! The transport interface the core consumes (spec §6.1). The BLE adapter
//! itself — scanning, GATT connect, platform callbacks — is out of scope
//! (spec §1); this trait is the narrow seam a platform adapter implements.

use async_trait::async_trait;

use crate::error::ConnectionError;
use crate::type_detector::DiscoveredServices;

/// A live connection handle returned by [`Transport::connect`].
pub trait Connection: Send {}

/// What a connected transport reports back to the manager out-of-band of
/// direct calls: services discovered, incoming notification bytes, and
/// disconnects. A real adapter drives these through channels; the manager
/// only needs to read from them.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establishes a connection to `address`. Resolves once the platform
    /// reports a connected link, before service discovery begins.
    async fn connect(&self, address: &str) -> Result<(), ConnectionError>;

    async fn disconnect(&self) -> Result<(), ConnectionError>;

    /// Writes `bytes` as a single characteristic write.
    async fn write(&self, bytes: &[u8]) -> Result<(), ConnectionError>;

    /// Writes `bytes` split into `chunk_size`-byte writes, `delay_ms`
    /// between each (InMotion V1's 20-byte/20 ms requirement, spec §5/§6.1).
    async fn write_chunked(&self, bytes: &[u8], chunk_size: usize, delay_ms: u64) -> Result<(), ConnectionError>;

    async fn start_scan(&self) -> Result<(), ConnectionError>;

    async fn stop_scan(&self) -> Result<(), ConnectionError>;

    /// Blocks until the platform reports services discovered for the
    /// current connection, or the manager's own discovery timeout elapses
    /// first.
    async fn discover_services(&self) -> Result<(DiscoveredServices, Option<String>), ConnectionError>;

    /// Blocks until the next chunk of notification bytes arrives.
    async fn recv(&self) -> Result<Vec<u8>, ConnectionError>;
}
