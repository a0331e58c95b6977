//! Gear VR controller protocol adapter.
//!
//! Drives the two-stage handshake that coaxes the controller into streaming
//! telemetry, decodes its notifications and feeds the fusion filter and event
//! synthesizer. Outbound commands go through a single-slot latest-wins queue
//! drained by the supervisor once per tick.

use std::time::Instant;

use tracing::{debug, info, trace, warn};

use crate::domain::decoder::{self, FULL_FRAME_LEN};
use crate::domain::events::{EventSynthesizer, OutputSink};
use crate::domain::fusion;
use crate::domain::models::{JoyState, PointerConfig};
use crate::infrastructure::radio::adapter::{DeviceAdapter, Session};
use crate::infrastructure::radio::{Advertisement, AttHandle, RadioError, RadioStack};

pub const SERVICE_UUID: &str = "4f63756c-7573-2054-6872-65656d6f7465";
pub const WRITE_CHAR_UUID: &str = "c8c51726-81bc-483b-a052-f7a14ea3d282";
pub const NOTIFY_CHAR_UUID: &str = "c8c51726-81bc-483b-a052-f7a14ea3d281";
/// Client characteristic configuration descriptor.
pub const CCCD_UUID: &str = "00002902-0000-1000-8000-00805f9b34fb";

/// Advertised device names start with this prefix, followed by a serial tag.
pub const ADVERTISED_NAME_PREFIX: &str = "Gear VR Controller";

/// Payload size requested right after connecting; telemetry frames need it.
pub const REQUESTED_MTU: u16 = 63;

/// CCCD value enabling notifications.
pub const NOTIFY_ENABLE: [u8; 2] = [0x01, 0x00];

/// If no telemetry arrives this long after the first sensor-mode request,
/// escalate to a VR-mode request.
pub const HANDSHAKE_ESCALATION_MS: u32 = 300;

/// Controller command set. Wire form is `[opcode, 0x00]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Off,
    SensorMode,
    FirmwareUpgrade,
    Calibrate,
    KeepAlive,
    SettingMode,
    LpmEnable,
    LpmDisable,
    VrMode,
}

impl Command {
    pub fn opcode(self) -> u8 {
        match self {
            Self::Off => 0x00,
            Self::SensorMode => 0x01,
            Self::FirmwareUpgrade => 0x02,
            Self::Calibrate => 0x03,
            Self::KeepAlive => 0x04,
            Self::SettingMode => 0x05,
            Self::LpmEnable => 0x06,
            Self::LpmDisable => 0x07,
            Self::VrMode => 0x08,
        }
    }

    pub fn from_opcode(opcode: u8) -> Option<Self> {
        Some(match opcode {
            0x00 => Self::Off,
            0x01 => Self::SensorMode,
            0x02 => Self::FirmwareUpgrade,
            0x03 => Self::Calibrate,
            0x04 => Self::KeepAlive,
            0x05 => Self::SettingMode,
            0x06 => Self::LpmEnable,
            0x07 => Self::LpmDisable,
            0x08 => Self::VrMode,
            _ => return None,
        })
    }

    pub fn as_bytes(self) -> [u8; 2] {
        [self.opcode(), 0x00]
    }

    /// Only the sensor-mode request is written with response; the controller
    /// drops it otherwise on some firmware revisions.
    pub fn needs_response(self) -> bool {
        self == Self::SensorMode
    }
}

/// Single-slot outbound command queue. A newly queued command replaces any
/// unsent one; stale mode requests are worthless once superseded.
#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: Option<Command>,
}

impl CommandQueue {
    pub fn queue(&mut self, command: Command) {
        if let Some(stale) = self.pending.replace(command) {
            if stale != command {
                debug!(?stale, ?command, "unsent command superseded");
            }
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }

    /// Write the pending command, if any. Write failures drop the command;
    /// the handshake timer or the peer's next control frame re-queues what
    /// still matters.
    pub fn try_send(&mut self, radio: &mut dyn RadioStack, write: AttHandle) {
        if let Some(command) = self.pending.take() {
            let bytes = command.as_bytes();
            if let Err(err) = radio.write_characteristic(write, &bytes, command.needs_response()) {
                debug!(?command, %err, "command write failed, dropped");
            } else {
                trace!(?command, "command written");
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandshakeStage {
    /// Sensor mode requested, waiting for telemetry.
    AwaitStream,
    /// VR mode requested after the escalation deadline passed.
    Escalated,
}

pub struct GearVrAdapter {
    queue: CommandQueue,
    handshake: HandshakeStage,
    streaming: bool,
    session: Option<Session>,
    /// Milliseconds spent connected without telemetry.
    quiet_ms: u32,
    /// Monotonic origin for frame receive timestamps.
    epoch: Instant,
    joy: JoyState,
    last: JoyState,
    synth: EventSynthesizer,
    sink: Box<dyn OutputSink>,
}

impl GearVrAdapter {
    pub fn new(config: PointerConfig, sink: Box<dyn OutputSink>) -> Self {
        Self {
            queue: CommandQueue::default(),
            handshake: HandshakeStage::AwaitStream,
            streaming: false,
            session: None,
            quiet_ms: 0,
            epoch: Instant::now(),
            joy: JoyState::default(),
            last: JoyState::default(),
            synth: EventSynthesizer::new(config),
            sink,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn now_ms(&self) -> u32 {
        self.epoch.elapsed().as_millis() as u32
    }

    /// Short control frame: a `[opcode, 0x00]` acknowledgement or a keepalive
    /// tick counter.
    fn handle_short_frame(&mut self, radio: &mut dyn RadioStack, data: &[u8]) {
        // Longer control frames carry a tick counter after the opcode.
        if data.len() >= 4 {
            let counter = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
            trace!(counter, "peer tick counter");
        }

        match Command::from_opcode(data[0]) {
            Some(Command::LpmEnable) => {
                // Low-power mode kicked in; only a VR-mode request gets the
                // controller back out.
                debug!("peer entered low-power mode, requesting vr mode");
                self.queue.queue(Command::VrMode);
            }
            Some(Command::VrMode) => {
                // The mode switch resets the peer's subscription state, so the
                // notify configuration has to be rewritten before the next
                // sensor-mode request can produce telemetry.
                debug!("vr mode acknowledged, restoring subscription");
                if let Some(session) = self.session {
                    if let Err(err) =
                        radio.write_descriptor(session.notify, CCCD_UUID, &NOTIFY_ENABLE, true)
                    {
                        warn!(%err, "notify re-enable failed");
                    }
                    let mtu = radio.negotiate_mtu(session.peer, REQUESTED_MTU);
                    trace!(mtu, "payload size renegotiated");
                }
                self.queue.queue(Command::SensorMode);
            }
            other => {
                trace!(opcode = data[0], ?other, "control frame ignored");
            }
        }
    }

    fn handle_full_frame(&mut self, frame: &[u8; FULL_FRAME_LEN]) {
        if !self.streaming {
            self.streaming = true;
            info!("telemetry streaming");
        }

        self.last = self.joy;
        let now_ms = self.now_ms();
        decoder::decode_into(&mut self.joy, frame, now_ms);
        fusion::update(&mut self.joy, &self.last);
        self.synth
            .synthesize(&mut self.joy, &mut self.last, self.sink.as_mut());
    }
}

impl DeviceAdapter for GearVrAdapter {
    fn matches_advertisement(&self, adv: &Advertisement) -> bool {
        adv.local_name.starts_with(ADVERTISED_NAME_PREFIX)
    }

    fn service_uuid(&self) -> &'static str {
        SERVICE_UUID
    }

    fn write_char_uuid(&self) -> &'static str {
        WRITE_CHAR_UUID
    }

    fn notify_char_uuid(&self) -> &'static str {
        NOTIFY_CHAR_UUID
    }

    fn notify_config_uuid(&self) -> &'static str {
        CCCD_UUID
    }

    fn on_connected(
        &mut self,
        radio: &mut dyn RadioStack,
        session: Session,
    ) -> Result<(), RadioError> {
        self.session = Some(session);
        self.handshake = HandshakeStage::AwaitStream;
        self.streaming = false;
        self.quiet_ms = 0;

        let mtu = radio.negotiate_mtu(session.peer, REQUESTED_MTU);
        debug!(mtu, "payload size negotiated");

        radio.write_descriptor(session.notify, CCCD_UUID, &NOTIFY_ENABLE, false)?;
        self.queue.queue(Command::SensorMode);
        Ok(())
    }

    fn on_disconnected(&mut self) {
        self.session = None;
        self.queue.clear();
        self.handshake = HandshakeStage::AwaitStream;
        self.streaming = false;
        self.quiet_ms = 0;
        self.joy = JoyState::default();
        self.last = JoyState::default();
        self.synth.reset();
    }

    fn on_notify(
        &mut self,
        radio: &mut dyn RadioStack,
        handle: AttHandle,
        data: &[u8],
        is_notification: bool,
    ) {
        let Some(session) = self.session else {
            return;
        };
        if handle != session.notify || !is_notification {
            return;
        }

        match data.len() {
            FULL_FRAME_LEN => {
                let mut frame = [0u8; FULL_FRAME_LEN];
                frame.copy_from_slice(data);
                self.handle_full_frame(&frame);
            }
            1..=59 => self.handle_short_frame(radio, data),
            len => trace!(len, "unexpected notification length, ignored"),
        }
    }

    fn tick(&mut self, elapsed_ms: u32) {
        if self.streaming || self.handshake == HandshakeStage::Escalated {
            return;
        }

        self.quiet_ms = self.quiet_ms.saturating_add(elapsed_ms);
        if self.quiet_ms >= HANDSHAKE_ESCALATION_MS {
            // Sensor mode alone did not wake the controller; some firmware
            // revisions only start streaming once put into VR mode.
            info!(quiet_ms = self.quiet_ms, "no telemetry yet, escalating to vr mode");
            self.queue.queue(Command::VrMode);
            self.handshake = HandshakeStage::Escalated;
        }
    }

    fn has_pending(&self) -> bool {
        self.queue.has_pending()
    }

    fn try_send(&mut self, radio: &mut dyn RadioStack, write: AttHandle) {
        self.queue.try_send(radio, write);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::{Key, MediaKey, PointerButton};
    use crate::infrastructure::radio::mock::MockRadio;
    use crate::infrastructure::radio::{PeerHandle, ServiceHandle};

    struct NullSink;

    impl OutputSink for NullSink {
        fn move_rel(&mut self, _dx: i32, _dy: i32) {}
        fn button_press(&mut self, _button: PointerButton) {}
        fn button_release(&mut self, _button: PointerButton) {}
        fn media_press(&mut self, _key: MediaKey) {}
        fn media_release(&mut self, _key: MediaKey) {}
        fn key_press(&mut self, _key: Key) {}
        fn key_release(&mut self, _key: Key) {}
    }

    fn adapter() -> GearVrAdapter {
        GearVrAdapter::new(PointerConfig::default(), Box::new(NullSink))
    }

    fn session() -> Session {
        Session {
            peer: PeerHandle(1),
            service: ServiceHandle(0x0010),
            write: AttHandle(0x0011),
            notify: AttHandle(0x0012),
        }
    }

    #[test]
    fn command_wire_form_is_opcode_then_zero() {
        assert_eq!(Command::SensorMode.as_bytes(), [0x01, 0x00]);
        assert_eq!(Command::VrMode.as_bytes(), [0x08, 0x00]);
        assert_eq!(Command::KeepAlive.as_bytes(), [0x04, 0x00]);
    }

    #[test]
    fn only_sensor_mode_needs_a_response() {
        assert!(Command::SensorMode.needs_response());
        assert!(!Command::VrMode.needs_response());
        assert!(!Command::KeepAlive.needs_response());
        assert!(!Command::Off.needs_response());
    }

    #[test]
    fn queue_keeps_only_the_latest_command() {
        let (mut radio, peer) = MockRadio::new();
        let mut queue = CommandQueue::default();

        queue.queue(Command::KeepAlive);
        queue.queue(Command::VrMode);
        assert!(queue.has_pending());

        queue.try_send(&mut radio, AttHandle(0x0011));
        assert!(!queue.has_pending());
        assert_eq!(peer.characteristic_writes(), vec![vec![0x08, 0x00]]);
    }

    #[test]
    fn connect_requests_sensor_mode_after_enabling_notifications() {
        let (mut radio, peer) = MockRadio::new();
        let mut adapter = adapter();

        adapter.on_connected(&mut radio, session()).unwrap();

        assert_eq!(peer.descriptor_writes().len(), 1);
        assert!(adapter.has_pending());
        adapter.try_send(&mut radio, session().write);
        assert_eq!(peer.characteristic_writes(), vec![vec![0x01, 0x00]]);
    }

    #[test]
    fn handshake_escalates_once_after_deadline() {
        let (mut radio, peer) = MockRadio::new();
        let mut adapter = adapter();
        adapter.on_connected(&mut radio, session()).unwrap();
        adapter.try_send(&mut radio, session().write);

        // Short of the deadline: nothing queued.
        adapter.tick(HANDSHAKE_ESCALATION_MS - 1);
        assert!(!adapter.has_pending());

        adapter.tick(1);
        assert!(adapter.has_pending());
        adapter.try_send(&mut radio, session().write);

        // The escalation fires exactly once.
        adapter.tick(HANDSHAKE_ESCALATION_MS * 10);
        assert!(!adapter.has_pending());

        assert_eq!(
            peer.characteristic_writes(),
            vec![vec![0x01, 0x00], vec![0x08, 0x00]]
        );
    }

    #[test]
    fn vr_mode_ack_restores_subscription_and_requeues_sensor_mode() {
        let (mut radio, peer) = MockRadio::new();
        let mut adapter = adapter();
        adapter.on_connected(&mut radio, session()).unwrap();
        adapter.try_send(&mut radio, session().write);

        adapter.on_notify(&mut radio, session().notify, &[0x08, 0x00], true);

        // Second descriptor write is the with-response re-enable.
        let descriptor_writes = peer.descriptor_writes();
        assert_eq!(descriptor_writes.len(), 2);
        assert_eq!(descriptor_writes[1], (NOTIFY_ENABLE.to_vec(), true));

        assert!(adapter.has_pending());
        adapter.try_send(&mut radio, session().write);
        assert_eq!(
            peer.characteristic_writes(),
            vec![vec![0x01, 0x00], vec![0x01, 0x00]]
        );
    }

    #[test]
    fn lpm_notice_requeues_vr_mode() {
        let (mut radio, _peer) = MockRadio::new();
        let mut adapter = adapter();
        adapter.on_connected(&mut radio, session()).unwrap();
        adapter.try_send(&mut radio, session().write);

        adapter.on_notify(&mut radio, session().notify, &[0x06, 0x00], true);
        assert!(adapter.has_pending());
    }

    #[test]
    fn telemetry_stops_the_handshake_timer() {
        let (mut radio, _peer) = MockRadio::new();
        let mut adapter = adapter();
        adapter.on_connected(&mut radio, session()).unwrap();
        adapter.try_send(&mut radio, session().write);

        let frame = [0u8; FULL_FRAME_LEN];
        adapter.on_notify(&mut radio, session().notify, &frame, true);
        assert!(adapter.is_streaming());

        adapter.tick(HANDSHAKE_ESCALATION_MS * 2);
        assert!(!adapter.has_pending());
    }

    #[test]
    fn indications_and_foreign_handles_are_ignored() {
        let (mut radio, _peer) = MockRadio::new();
        let mut adapter = adapter();
        adapter.on_connected(&mut radio, session()).unwrap();

        let frame = [0u8; FULL_FRAME_LEN];
        adapter.on_notify(&mut radio, session().notify, &frame, false);
        assert!(!adapter.is_streaming());

        adapter.on_notify(&mut radio, AttHandle(0x0099), &frame, true);
        assert!(!adapter.is_streaming());
    }

    #[test]
    fn disconnect_resets_everything() {
        let (mut radio, _peer) = MockRadio::new();
        let mut adapter = adapter();
        adapter.on_connected(&mut radio, session()).unwrap();

        let frame = [0u8; FULL_FRAME_LEN];
        adapter.on_notify(&mut radio, session().notify, &frame, true);
        assert!(adapter.is_streaming());

        adapter.on_disconnected();
        assert!(!adapter.is_streaming());
        assert!(!adapter.has_pending());

        // Timer restarts from zero on the next connection.
        adapter.on_connected(&mut radio, session()).unwrap();
        adapter.try_send(&mut radio, session().write);
        adapter.tick(HANDSHAKE_ESCALATION_MS - 1);
        assert!(!adapter.has_pending());
    }

    #[test]
    fn advertisement_matching_is_prefix_based() {
        let adapter = adapter();
        let adv = |name: &str| Advertisement {
            address: 0x1122_3344_5566,
            local_name: name.to_string(),
            rssi_dbm: -60,
        };

        assert!(adapter.matches_advertisement(&adv("Gear VR Controller(17DB)")));
        assert!(adapter.matches_advertisement(&adv("Gear VR Controller")));
        assert!(!adapter.matches_advertisement(&adv("Galaxy Buds")));
        assert!(!adapter.matches_advertisement(&adv("gear vr controller")));
    }
}
