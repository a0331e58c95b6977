//! Radio-stack collaborator surface.
//!
//! The bridge core never talks to a concrete BLE backend; it drives a
//! [`RadioStack`] implementation and receives inbound traffic as
//! [`RadioEvent`]s over a channel. Backends may emit events from any execution
//! context; the supervisor drains the channel at the start of each tick so all
//! core state is mutated from one logical thread.

use crate::domain::settings::RadioSettings;
use thiserror::Error;
use tokio::sync::mpsc;

pub mod adapter;
pub mod gearvr;
pub mod mock;
pub mod supervisor;

/// 48-bit peer address, as delivered in advertisements.
pub type PeerAddress = u64;

/// Opaque handle to a connected peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerHandle(pub u16);

/// Opaque handle to a discovered service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceHandle(pub u16);

/// Attribute handle of a resolved characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttHandle(pub u16);

#[derive(Debug, Clone)]
pub struct Advertisement {
    pub address: PeerAddress,
    pub local_name: String,
    pub rssi_dbm: i8,
}

/// A resolved characteristic with its capability flags.
#[derive(Debug, Clone, Copy)]
pub struct Characteristic {
    pub handle: AttHandle,
    pub writable: bool,
    pub notifiable: bool,
}

/// Inbound traffic funneled from the backend to the supervisor.
#[derive(Debug, Clone)]
pub enum RadioEvent {
    Advertisement(Advertisement),
    Notification {
        handle: AttHandle,
        data: Vec<u8>,
        /// True for notifications, false for indications.
        is_notification: bool,
    },
    Disconnected {
        peer: PeerHandle,
    },
}

/// Identity, power and scan parameters applied at initialization.
#[derive(Debug, Clone)]
pub struct RadioConfig {
    pub local_name: String,
    pub tx_power_dbm: i8,
    pub scan_interval: u16,
    pub scan_window: u16,
    pub active_scan: bool,
}

impl From<&RadioSettings> for RadioConfig {
    fn from(s: &RadioSettings) -> Self {
        Self {
            local_name: String::new(),
            tx_power_dbm: s.tx_power_dbm,
            scan_interval: s.scan_interval,
            scan_window: s.scan_window,
            active_scan: s.active_scan,
        }
    }
}

#[derive(Debug, Error)]
pub enum RadioError {
    #[error("radio initialization failed: {0}")]
    Init(String),
    #[error("scan could not be started: {0}")]
    Scan(String),
    #[error("connection attempt failed: {0}")]
    Connect(String),
    #[error("write rejected by the stack")]
    WriteRejected,
    #[error("notification subscription failed")]
    Subscribe,
}

/// The backend surface the supervisor and adapters drive.
///
/// All methods are non-blocking; anything that completes asynchronously in a
/// real stack surfaces later as a [`RadioEvent`].
pub trait RadioStack {
    /// Apply identity/power/scan configuration and install the event sender
    /// the backend will use for all inbound traffic.
    fn init(
        &mut self,
        config: &RadioConfig,
        events: mpsc::UnboundedSender<RadioEvent>,
    ) -> Result<(), RadioError>;

    /// Begin continuous background scanning.
    fn start_scan(&mut self) -> Result<(), RadioError>;
    fn stop_scan(&mut self);

    fn connect(&mut self, address: PeerAddress) -> Result<PeerHandle, RadioError>;
    fn disconnect(&mut self, peer: PeerHandle);

    fn discover_service(&mut self, peer: PeerHandle, service_uuid: &str) -> Option<ServiceHandle>;
    fn resolve_characteristic(
        &mut self,
        service: ServiceHandle,
        char_uuid: &str,
    ) -> Option<Characteristic>;

    /// Route the characteristic's notifications into the event channel.
    fn subscribe(&mut self, notify: AttHandle) -> Result<(), RadioError>;

    fn write_descriptor(
        &mut self,
        characteristic: AttHandle,
        descriptor_uuid: &str,
        value: &[u8],
        with_response: bool,
    ) -> Result<(), RadioError>;

    fn write_characteristic(
        &mut self,
        characteristic: AttHandle,
        value: &[u8],
        with_response: bool,
    ) -> Result<(), RadioError>;

    /// Request a larger maximum payload; returns the size actually in effect.
    fn negotiate_mtu(&mut self, peer: PeerHandle, mtu: u16) -> u16;
}
