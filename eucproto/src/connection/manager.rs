//! [`WheelConnectionManager`]: orchestrates transport + decoder + command
//! dispatch + observable state (spec §4.6).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::transport::Transport;
use super::ConnectionState;
use crate::command::WheelCommand;
use crate::decoder::{self, Decoder};
use crate::error::ConnectionError;
use crate::state::{WheelState, WheelType};
use crate::type_detector::{self, DetectionResult};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(15);
const BACKOFF_START: Duration = Duration::from_secs(2);
const BACKOFF_CAP: Duration = Duration::from_secs(30);
const INMOTION_V1_CHUNK_SIZE: usize = 20;
const INMOTION_V1_CHUNK_DELAY_MS: u64 = 20;

/// Doubles `current` up to [`BACKOFF_CAP`] (spec §4.6/§5/§8 scenario S5).
pub fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(BACKOFF_CAP)
}

/// Waits for `rx` to carry `true`, returning immediately if it already does.
/// A plain `changed()` call would miss a flip that happened before this
/// particular receiver started waiting; checking `borrow()` first closes
/// that race.
async fn wait_cancelled(rx: &mut watch::Receiver<bool>) {
    if *rx.borrow() {
        return;
    }
    let _ = rx.changed().await;
}

/// Coordinates one wheel connection's lifecycle end to end: connect,
/// discover, decode, dispatch commands, reconnect, and publish observable
/// state. Generic over [`Transport`] so tests can supply an in-memory fake.
pub struct WheelConnectionManager<T: Transport + 'static> {
    transport: Arc<T>,
    wheel_state_tx: watch::Sender<WheelState>,
    connection_state_tx: watch::Sender<ConnectionState>,
    command_tx: mpsc::UnboundedSender<WheelCommand>,
    command_rx: Mutex<mpsc::UnboundedReceiver<WheelCommand>>,
    decoder: Mutex<Option<Box<dyn Decoder>>>,
    wheel_type_hint: Mutex<Option<WheelType>>,
    cancel_tx: watch::Sender<bool>,
    disconnect_requested: Arc<AtomicBool>,
}

impl<T: Transport + 'static> WheelConnectionManager<T> {
    pub fn new(transport: T) -> Self {
        let (wheel_state_tx, _) = watch::channel(WheelState::initial());
        let (connection_state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (cancel_tx, _) = watch::channel(false);
        Self {
            transport: Arc::new(transport),
            wheel_state_tx,
            connection_state_tx,
            command_tx,
            command_rx: Mutex::new(command_rx),
            decoder: Mutex::new(None),
            wheel_type_hint: Mutex::new(None),
            cancel_tx,
            disconnect_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn wheel_state(&self) -> watch::Receiver<WheelState> {
        self.wheel_state_tx.subscribe()
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection_state_tx.subscribe()
    }

    fn publish_connection_state(&self, state: ConnectionState) {
        debug!(?state, "connection state transition");
        let _ = self.connection_state_tx.send(state);
    }

    /// Enqueues a semantic command for dispatch; multiple concurrent calls
    /// are linearized in arrival order by the underlying mpsc queue (spec
    /// §5).
    pub fn execute_command(&self, command: WheelCommand) -> Result<(), ConnectionError> {
        self.command_tx
            .send(command)
            .map_err(|_| ConnectionError::Cancelled)
    }

    /// Connects, discovers services, classifies the wheel, and runs the
    /// connection loop until a user-requested disconnect. On transport
    /// disconnects short of that, reconnects with exponential back-off.
    pub async fn connect(&self, address: &str, wheel_type_hint: Option<WheelType>) -> Result<(), ConnectionError> {
        self.disconnect_requested.store(false, Ordering::SeqCst);
        let _ = self.cancel_tx.send(false);
        *self.wheel_type_hint.lock().await = wheel_type_hint;

        let mut backoff = BACKOFF_START;
        loop {
            match self.connect_once(address).await {
                Ok(()) => {
                    backoff = BACKOFF_START;
                    self.run_connected_loop(address).await;
                    if self.disconnect_requested.load(Ordering::SeqCst) {
                        self.publish_connection_state(ConnectionState::Disconnected);
                        return Ok(());
                    }
                    self.publish_connection_state(ConnectionState::ConnectionLost {
                        address: address.to_string(),
                        reason: "transport disconnected".to_string(),
                    });
                }
                Err(ConnectionError::PermissionDenied) => {
                    self.publish_connection_state(ConnectionState::Failed {
                        error: "permission denied".to_string(),
                        address: Some(address.to_string()),
                    });
                    return Err(ConnectionError::PermissionDenied);
                }
                Err(e) => {
                    warn!(error = %e, "connect attempt failed");
                }
            }

            if self.disconnect_requested.load(Ordering::SeqCst) {
                self.publish_connection_state(ConnectionState::Disconnected);
                return Ok(());
            }

            let mut cancel_rx = self.cancel_tx.subscribe();
            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = wait_cancelled(&mut cancel_rx) => {
                    self.publish_connection_state(ConnectionState::Disconnected);
                    return Ok(());
                }
            }
            backoff = next_backoff(backoff);
        }
    }

    async fn connect_once(&self, address: &str) -> Result<(), ConnectionError> {
        self.publish_connection_state(ConnectionState::Connecting {
            address: address.to_string(),
        });
        timeout(CONNECT_TIMEOUT, self.transport.connect(address))
            .await
            .map_err(|_| ConnectionError::ConnectTimeout)??;

        self.publish_connection_state(ConnectionState::DiscoveringServices {
            address: address.to_string(),
        });
        let (services, device_name) = timeout(DISCOVERY_TIMEOUT, self.transport.discover_services())
            .await
            .map_err(|_| ConnectionError::ServiceDiscoveryTimeout)??;

        let hint = *self.wheel_type_hint.lock().await;
        let wheel_type = hint.unwrap_or_else(|| match type_detector::detect(&services, device_name.as_deref()) {
            DetectionResult::Detected(d) => d.wheel_type,
            DetectionResult::Ambiguous => WheelType::GotwayVirtual,
            DetectionResult::Unknown => WheelType::Unknown,
        });

        let decoder = decoder::for_wheel_type(wheel_type).ok_or(ConnectionError::Transport(
            "could not classify wheel from discovered services".to_string(),
        ))?;
        *self.decoder.lock().await = Some(decoder);

        let init_commands = {
            let guard = self.decoder.lock().await;
            guard.as_ref().unwrap().init_commands()
        };
        for cmd in init_commands {
            self.dispatch_raw(cmd).await?;
        }

        let name = device_name.unwrap_or_default();
        self.publish_connection_state(ConnectionState::Connected {
            address: address.to_string(),
            wheel_name: name,
        });
        Ok(())
    }

    async fn dispatch_raw(&self, command: WheelCommand) -> Result<(), ConnectionError> {
        match command {
            WheelCommand::SendBytes(payload) => {
                if let Err(e) = self.transport.write(&payload).await {
                    warn!(error = %e, "best-effort command write failed");
                }
                Ok(())
            }
            WheelCommand::SendDelayed { payload, delay_ms } => {
                let mut cancel_rx = self.cancel_tx.subscribe();
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(delay_ms as u64)) => {}
                    _ = wait_cancelled(&mut cancel_rx) => return Err(ConnectionError::Cancelled),
                }
                if let Err(e) = self.transport.write(&payload).await {
                    warn!(error = %e, "best-effort command write failed");
                }
                Ok(())
            }
            other => {
                debug!(?other, "non-raw command reached dispatch_raw; dropping");
                Ok(())
            }
        }
    }

    async fn run_connected_loop(&self, address: &str) {
        let keepalive = {
            let guard = self.decoder.lock().await;
            guard
                .as_ref()
                .and_then(|d| d.keepalive_interval_ms().map(|ms| (d.keepalive_command(), ms)))
        };

        let mut keepalive_ticker = match keepalive {
            Some((_, ms)) => Some(tokio::time::interval(Duration::from_millis(ms))),
            None => None,
        };

        let mut command_rx = self.command_rx.lock().await;
        let mut cancel_rx = self.cancel_tx.subscribe();

        loop {
            tokio::select! {
                biased;

                _ = wait_cancelled(&mut cancel_rx) => {
                    let _ = self.transport.disconnect().await;
                    return;
                }

                maybe_tick = async {
                    match &mut keepalive_ticker {
                        Some(t) => { t.tick().await; Some(()) }
                        None => std::future::pending().await
                    }
                } => {
                    if maybe_tick.is_some() {
                        let guard = self.decoder.lock().await;
                        if let Some(cmd) = guard.as_ref().and_then(|d| d.keepalive_command()) {
                            drop(guard);
                            let raw = self.build_raw(cmd).await;
                            for c in raw {
                                let _ = self.dispatch_raw(c).await;
                            }
                        }
                    }
                }

                maybe_cmd = command_rx.recv() => {
                    match maybe_cmd {
                        Some(cmd) => {
                            let raw = self.build_raw(cmd).await;
                            for c in raw {
                                let _ = self.dispatch_raw(c).await;
                            }
                        }
                        None => {}
                    }
                }

                received = self.transport.recv() => {
                    match received {
                        Ok(bytes) => self.handle_bytes(&bytes).await,
                        Err(_) => {
                            info!(address, "transport reported disconnect");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn build_raw(&self, command: WheelCommand) -> Vec<WheelCommand> {
        if command.is_raw() {
            return vec![command];
        }
        let guard = self.decoder.lock().await;
        match guard.as_ref() {
            Some(d) => d.build_command(command),
            None => Vec::new(),
        }
    }

    async fn handle_bytes(&self, bytes: &[u8]) {
        let prior = self.wheel_state_tx.borrow().clone();
        let mut guard = self.decoder.lock().await;
        let Some(decoder) = guard.as_mut() else { return };
        match decoder.decode(bytes, &prior) {
            Ok(Some(decoded)) => {
                let _ = self.wheel_state_tx.send(decoded.new_state);
                drop(guard);
                for cmd in decoded.commands_to_send {
                    let _ = self.execute_command(cmd);
                }
            }
            Ok(None) => {}
            Err(e) => debug!(error = %e, "decode produced no state change"),
        }
    }

    /// Cancels reconnect back-off, the keepalive task, and any in-flight
    /// command delay, then transitions to `Disconnected` (spec §5).
    pub async fn disconnect(&self) {
        self.disconnect_requested.store(true, Ordering::SeqCst);
        let _ = self.cancel_tx.send(true);
    }
}

/// Writes `bytes` through InMotion V1's required chunking (spec §5/§6.1).
pub async fn write_inmotion_v1<T: Transport>(transport: &T, bytes: &[u8]) -> Result<(), ConnectionError> {
    transport
        .write_chunked(bytes, INMOTION_V1_CHUNK_SIZE, INMOTION_V1_CHUNK_DELAY_MS)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let mut b = BACKOFF_START;
        assert_eq!(b, Duration::from_secs(2));
        b = next_backoff(b);
        assert_eq!(b, Duration::from_secs(4));
        b = next_backoff(b);
        assert_eq!(b, Duration::from_secs(8));
        b = next_backoff(b);
        assert_eq!(b, Duration::from_secs(16));
        b = next_backoff(b);
        assert_eq!(b, Duration::from_secs(30));
        b = next_backoff(b);
        assert_eq!(b, Duration::from_secs(30));
    }
}
