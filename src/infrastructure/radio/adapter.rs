//! Capability contract between the connection supervisor and a
//! device-specific protocol adapter.

use crate::infrastructure::radio::{
    Advertisement, AttHandle, PeerHandle, RadioError, RadioStack, ServiceHandle,
};

/// Live endpoints of one connection.
///
/// The supervisor owns the authoritative copy and invalidates it atomically on
/// disconnect. Adapters receive a copy in `on_connected` and must drop theirs
/// in `on_disconnected`.
#[derive(Debug, Clone, Copy)]
pub struct Session {
    pub peer: PeerHandle,
    pub service: ServiceHandle,
    pub write: AttHandle,
    pub notify: AttHandle,
}

/// A peer-specific protocol adapter.
///
/// The supervisor matches advertisements against registered adapters in
/// registration order, performs discovery using the adapter's declared
/// identifiers, and then routes notifications, ticks and the outbound command
/// slot to the matched adapter until disconnect.
pub trait DeviceAdapter {
    /// Does this advertisement belong to the device this adapter drives?
    fn matches_advertisement(&self, adv: &Advertisement) -> bool;

    fn service_uuid(&self) -> &'static str;
    fn write_char_uuid(&self) -> &'static str;
    fn notify_char_uuid(&self) -> &'static str;
    /// Subscription control descriptor on the notify characteristic.
    fn notify_config_uuid(&self) -> &'static str;

    /// Post-discovery setup. May queue an initial command; errors abort the
    /// connect attempt.
    fn on_connected(&mut self, radio: &mut dyn RadioStack, session: Session)
        -> Result<(), RadioError>;

    /// Reset all adapter-local state to its initial values. No timer or
    /// queued command may survive into the next connection.
    fn on_disconnected(&mut self);

    /// Inbound notification or indication from the subscribed endpoint.
    fn on_notify(
        &mut self,
        radio: &mut dyn RadioStack,
        handle: AttHandle,
        data: &[u8],
        is_notification: bool,
    );

    /// Timer hook, called once per supervisor tick while connected.
    fn tick(&mut self, elapsed_ms: u32);

    /// True when an outbound command awaits transmission.
    fn has_pending(&self) -> bool;

    /// Perform at most one characteristic write for the pending command.
    fn try_send(&mut self, radio: &mut dyn RadioStack, write: AttHandle);
}
