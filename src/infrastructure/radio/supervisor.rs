//! Connection supervisor.
//!
//! Owns the scan → connect → discover → subscribe → operate → disconnect
//! lifecycle for a bounded registry of device adapters. Driven cooperatively
//! by `tick` at a fixed cadence; all inbound radio traffic arrives through the
//! event channel and is drained at the start of each tick, so nothing here
//! blocks and nothing mutates core state from another context.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::infrastructure::radio::adapter::{DeviceAdapter, Session};
use crate::infrastructure::radio::{
    Advertisement, AttHandle, RadioConfig, RadioError, RadioEvent, RadioStack,
};

/// Hard ceiling on registered adapters.
pub const MAX_ADAPTERS: usize = 4;

/// Lifecycle state. Also published through [`SharedLinkState`] for the status
/// indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LinkState {
    Idle = 0,
    Scanning = 1,
    Connecting = 2,
    Connected = 3,
}

impl LinkState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Scanning,
            2 => Self::Connecting,
            3 => Self::Connected,
            _ => Self::Idle,
        }
    }
}

/// Coarse link state readable from any thread.
///
/// A single aligned word written only by the supervisor; indicator timing
/// precision is not a correctness requirement, so relaxed ordering suffices.
#[derive(Debug, Clone, Default)]
pub struct SharedLinkState(Arc<AtomicU8>);

impl SharedLinkState {
    pub fn get(&self) -> LinkState {
        LinkState::from_u8(self.0.load(Ordering::Relaxed))
    }

    fn set(&self, state: LinkState) {
        self.0.store(state as u8, Ordering::Relaxed);
    }
}

/// Why a connect attempt was aborted.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("service {0} not found on peer")]
    ServiceNotFound(&'static str),
    #[error("characteristic {0} not found")]
    CharacteristicNotFound(&'static str),
    #[error("characteristic {0} lacks the required capability")]
    MissingCapability(&'static str),
    #[error(transparent)]
    Radio(#[from] RadioError),
}

pub struct Supervisor<R: RadioStack> {
    radio: R,
    sender: mpsc::UnboundedSender<RadioEvent>,
    events: mpsc::UnboundedReceiver<RadioEvent>,
    adapters: Vec<Box<dyn DeviceAdapter>>,
    /// Index of the matched adapter; valid while connecting or connected.
    active: Option<usize>,
    session: Option<Session>,
    pending_connect: Option<Advertisement>,
    state: LinkState,
    shared: SharedLinkState,
    rescan: bool,
}

impl<R: RadioStack> Supervisor<R> {
    pub fn new(radio: R) -> Self {
        let (sender, events) = mpsc::unbounded_channel();
        Self {
            radio,
            sender,
            events,
            adapters: Vec::new(),
            active: None,
            session: None,
            pending_connect: None,
            state: LinkState::Idle,
            shared: SharedLinkState::default(),
            rescan: false,
        }
    }

    /// Add an adapter to the registry. Registration order is match priority;
    /// registrations past the capacity ceiling are dropped.
    pub fn register_adapter(&mut self, adapter: Box<dyn DeviceAdapter>) {
        if self.adapters.len() >= MAX_ADAPTERS {
            warn!(
                capacity = MAX_ADAPTERS,
                "adapter registry full, dropping registration"
            );
            return;
        }
        self.adapters.push(adapter);
    }

    /// Configure the radio and start continuous background scanning.
    pub fn initialize(&mut self, config: &RadioConfig) -> Result<(), RadioError> {
        self.radio.init(config, self.sender.clone())?;
        self.radio.start_scan()?;
        self.set_state(LinkState::Scanning);
        info!("radio initialized, scanning");
        Ok(())
    }

    pub fn link_state(&self) -> LinkState {
        self.state
    }

    /// Handle for the status indicator; safe to read from another thread.
    pub fn shared_state(&self) -> SharedLinkState {
        self.shared.clone()
    }

    /// One cooperative step. Drains inbound events, executes at most one
    /// connect attempt, drives the active adapter's timer and drains its
    /// command slot with a single write.
    pub fn tick(&mut self, elapsed_ms: u32) {
        self.drain_events();

        if let (Some(adv), Some(index)) = (self.pending_connect.take(), self.active) {
            // One attempt only; failure falls back to rescanning.
            match self.connect_sequence(index, &adv) {
                Ok(session) => {
                    info!(address = adv.address, "peer connected");
                    self.session = Some(session);
                    self.set_state(LinkState::Connected);
                }
                Err(err) => {
                    warn!(%err, "connect attempt aborted");
                    self.active = None;
                    self.set_state(LinkState::Idle);
                    self.rescan = true;
                }
            }
        }

        if self.state == LinkState::Connected {
            if let (Some(index), Some(session)) = (self.active, self.session) {
                let adapter = &mut self.adapters[index];
                adapter.tick(elapsed_ms);
                if adapter.has_pending() {
                    adapter.try_send(&mut self.radio, session.write);
                }
            }
        } else if self.rescan {
            self.rescan = false;
            match self.radio.start_scan() {
                Ok(()) => {
                    self.set_state(LinkState::Scanning);
                    debug!("rescanning");
                }
                Err(err) => {
                    warn!(%err, "rescan failed, retrying next tick");
                    self.rescan = true;
                }
            }
        }
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                RadioEvent::Advertisement(adv) => self.on_advertisement(adv),
                RadioEvent::Notification {
                    handle,
                    data,
                    is_notification,
                } => self.on_notification(handle, &data, is_notification),
                RadioEvent::Disconnected { .. } => self.on_disconnected(),
            }
        }
    }

    /// First registered adapter that claims the advertisement wins.
    fn on_advertisement(&mut self, adv: Advertisement) {
        if self.state != LinkState::Scanning || self.pending_connect.is_some() {
            return;
        }

        for (index, adapter) in self.adapters.iter().enumerate() {
            if adapter.matches_advertisement(&adv) {
                info!(
                    name = %adv.local_name,
                    adapter = index,
                    "advertisement matched, stopping scan"
                );
                self.radio.stop_scan();
                self.active = Some(index);
                self.pending_connect = Some(adv);
                self.set_state(LinkState::Connecting);
                return;
            }
        }
    }

    fn on_notification(&mut self, handle: AttHandle, data: &[u8], is_notification: bool) {
        if self.state != LinkState::Connected {
            return;
        }
        if let Some(index) = self.active {
            self.adapters[index].on_notify(&mut self.radio, handle, data, is_notification);
        }
    }

    /// Disconnection is the sole recovery path: reset the adapter, clear the
    /// session and fall back to scanning.
    fn on_disconnected(&mut self) {
        info!("peer disconnected");
        if let Some(index) = self.active.take() {
            self.adapters[index].on_disconnected();
        }
        self.session = None;
        self.pending_connect = None;
        self.set_state(LinkState::Idle);
        self.rescan = true;
    }

    /// connect → discover → validate → subscribe → adapter hook.
    ///
    /// Any failure past `connect` explicitly tears the half-open session down
    /// before reporting.
    fn connect_sequence(&mut self, index: usize, adv: &Advertisement) -> Result<Session, LinkError> {
        let service_uuid = self.adapters[index].service_uuid();
        let write_uuid = self.adapters[index].write_char_uuid();
        let notify_uuid = self.adapters[index].notify_char_uuid();

        let peer = self.radio.connect(adv.address)?;

        let Some(service) = self.radio.discover_service(peer, service_uuid) else {
            self.radio.disconnect(peer);
            return Err(LinkError::ServiceNotFound(service_uuid));
        };

        let Some(write) = self.radio.resolve_characteristic(service, write_uuid) else {
            self.radio.disconnect(peer);
            return Err(LinkError::CharacteristicNotFound(write_uuid));
        };
        if !write.writable {
            self.radio.disconnect(peer);
            return Err(LinkError::MissingCapability("write"));
        }

        let Some(notify) = self.radio.resolve_characteristic(service, notify_uuid) else {
            self.radio.disconnect(peer);
            return Err(LinkError::CharacteristicNotFound(notify_uuid));
        };
        if !notify.notifiable {
            self.radio.disconnect(peer);
            return Err(LinkError::MissingCapability("notify"));
        }

        if let Err(err) = self.radio.subscribe(notify.handle) {
            self.radio.disconnect(peer);
            return Err(err.into());
        }

        let session = Session {
            peer,
            service,
            write: write.handle,
            notify: notify.handle,
        };

        if let Err(err) = self.adapters[index].on_connected(&mut self.radio, session) {
            self.radio.disconnect(peer);
            return Err(err.into());
        }

        Ok(session)
    }

    fn set_state(&mut self, state: LinkState) {
        self.state = state;
        self.shared.set(state);
    }
}
