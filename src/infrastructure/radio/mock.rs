//! In-process radio backend for tests and the demo binary.
//!
//! [`MockRadio`] implements the backend surface; the paired [`MockPeer`]
//! handle scripts and inspects the simulated controller from the outside. The
//! peer models the firmware behaviors the adapter has to cope with: an
//! advertisement loop, a subscription that the VR mode switch silently drops,
//! and optionally a stubborn variant that ignores sensor-mode requests until
//! it has been put into VR mode.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::domain::decoder::FULL_FRAME_LEN;
use crate::infrastructure::radio::{
    gearvr, Advertisement, AttHandle, Characteristic, PeerAddress, PeerHandle, RadioConfig,
    RadioError, RadioEvent, RadioStack, ServiceHandle,
};

const PEER_ADDRESS: PeerAddress = 0x0017_db34_5566;
const PEER: PeerHandle = PeerHandle(1);
const SERVICE: ServiceHandle = ServiceHandle(0x0010);
const WRITE_CHAR: AttHandle = AttHandle(0x0011);
const NOTIFY_CHAR: AttHandle = AttHandle(0x0012);

/// Which operating mode the simulated controller is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerMode {
    Default,
    Vr,
}

#[derive(Debug)]
struct MockState {
    events: Option<mpsc::UnboundedSender<RadioEvent>>,
    scanning: bool,
    connected: bool,
    subscribed: bool,
    /// Notification config descriptor value; the VR mode switch clears it.
    cccd_enabled: bool,
    mode: PeerMode,
    streaming: bool,
    /// Ignore sensor-mode requests until put into VR mode.
    stubborn: bool,
    sensor_requests: u32,
    characteristic_writes: Vec<Vec<u8>>,
    descriptor_writes: Vec<(Vec<u8>, bool)>,
    mtu: u16,
    frame_counter: u32,
}

impl MockState {
    fn new(stubborn: bool) -> Self {
        Self {
            events: None,
            scanning: false,
            connected: false,
            subscribed: false,
            cccd_enabled: false,
            mode: PeerMode::Default,
            streaming: false,
            stubborn,
            sensor_requests: 0,
            characteristic_writes: Vec::new(),
            descriptor_writes: Vec::new(),
            mtu: 23,
            frame_counter: 0,
        }
    }

    fn emit(&self, event: RadioEvent) {
        if let Some(sender) = &self.events {
            let _ = sender.send(event);
        }
    }

    fn notify(&self, data: Vec<u8>) {
        if self.connected && self.subscribed {
            self.emit(RadioEvent::Notification {
                handle: NOTIFY_CHAR,
                data,
                is_notification: true,
            });
        }
    }

    fn reset_link(&mut self) {
        self.connected = false;
        self.subscribed = false;
        self.cccd_enabled = false;
        self.mode = PeerMode::Default;
        self.streaming = false;
        self.mtu = 23;
    }
}

/// Backend half; hand this to the supervisor.
pub struct MockRadio {
    state: Arc<Mutex<MockState>>,
}

/// Scripting and inspection half; keep this in the test or demo driver.
#[derive(Clone)]
pub struct MockPeer {
    state: Arc<Mutex<MockState>>,
}

impl MockRadio {
    pub fn new() -> (Self, MockPeer) {
        Self::build(false)
    }

    /// Peer variant that ignores sensor-mode requests until a VR-mode command
    /// arrives, forcing the handshake escalation path.
    pub fn with_stubborn_peer() -> (Self, MockPeer) {
        Self::build(true)
    }

    fn build(stubborn: bool) -> (Self, MockPeer) {
        let state = Arc::new(Mutex::new(MockState::new(stubborn)));
        (
            Self {
                state: state.clone(),
            },
            MockPeer { state },
        )
    }
}

impl RadioStack for MockRadio {
    fn init(
        &mut self,
        _config: &RadioConfig,
        events: mpsc::UnboundedSender<RadioEvent>,
    ) -> Result<(), RadioError> {
        self.state.lock().unwrap().events = Some(events);
        Ok(())
    }

    fn start_scan(&mut self) -> Result<(), RadioError> {
        let mut state = self.state.lock().unwrap();
        if state.events.is_none() {
            return Err(RadioError::Scan("radio not initialized".into()));
        }
        state.scanning = true;
        // The simulated controller advertises continuously; surface one
        // advertisement per scan start.
        state.emit(RadioEvent::Advertisement(Advertisement {
            address: PEER_ADDRESS,
            local_name: "Gear VR Controller(17DB)".to_string(),
            rssi_dbm: -58,
        }));
        Ok(())
    }

    fn stop_scan(&mut self) {
        self.state.lock().unwrap().scanning = false;
    }

    fn connect(&mut self, address: PeerAddress) -> Result<PeerHandle, RadioError> {
        if address != PEER_ADDRESS {
            return Err(RadioError::Connect(format!("unknown peer {address:#x}")));
        }
        self.state.lock().unwrap().connected = true;
        Ok(PEER)
    }

    fn disconnect(&mut self, _peer: PeerHandle) {
        // Host-initiated teardown; the peer does not report it back.
        self.state.lock().unwrap().reset_link();
    }

    fn discover_service(&mut self, _peer: PeerHandle, service_uuid: &str) -> Option<ServiceHandle> {
        (service_uuid == gearvr::SERVICE_UUID).then_some(SERVICE)
    }

    fn resolve_characteristic(
        &mut self,
        _service: ServiceHandle,
        char_uuid: &str,
    ) -> Option<Characteristic> {
        match char_uuid {
            gearvr::WRITE_CHAR_UUID => Some(Characteristic {
                handle: WRITE_CHAR,
                writable: true,
                notifiable: false,
            }),
            gearvr::NOTIFY_CHAR_UUID => Some(Characteristic {
                handle: NOTIFY_CHAR,
                writable: false,
                notifiable: true,
            }),
            _ => None,
        }
    }

    fn subscribe(&mut self, notify: AttHandle) -> Result<(), RadioError> {
        if notify != NOTIFY_CHAR {
            return Err(RadioError::Subscribe);
        }
        self.state.lock().unwrap().subscribed = true;
        Ok(())
    }

    fn write_descriptor(
        &mut self,
        characteristic: AttHandle,
        descriptor_uuid: &str,
        value: &[u8],
        with_response: bool,
    ) -> Result<(), RadioError> {
        if characteristic != NOTIFY_CHAR || descriptor_uuid != gearvr::CCCD_UUID {
            return Err(RadioError::WriteRejected);
        }
        let mut state = self.state.lock().unwrap();
        state.descriptor_writes.push((value.to_vec(), with_response));
        state.cccd_enabled = value.first().is_some_and(|b| b & 0x01 != 0);
        Ok(())
    }

    fn write_characteristic(
        &mut self,
        characteristic: AttHandle,
        value: &[u8],
        _with_response: bool,
    ) -> Result<(), RadioError> {
        if characteristic != WRITE_CHAR {
            return Err(RadioError::WriteRejected);
        }
        let mut state = self.state.lock().unwrap();
        state.characteristic_writes.push(value.to_vec());

        match value.first().copied() {
            Some(0x01) => {
                state.sensor_requests += 1;
                if state.stubborn && state.mode != PeerMode::Vr {
                    // Firmware quirk: the request is silently swallowed.
                } else {
                    state.streaming = true;
                }
            }
            Some(0x08) => {
                // Mode switch resets the peer-side subscription configuration
                // before the acknowledgement goes out.
                state.mode = PeerMode::Vr;
                state.cccd_enabled = false;
                state.notify(vec![0x08, 0x00]);
            }
            _ => {}
        }
        Ok(())
    }

    fn negotiate_mtu(&mut self, _peer: PeerHandle, mtu: u16) -> u16 {
        let mut state = self.state.lock().unwrap();
        state.mtu = mtu;
        mtu
    }
}

impl MockPeer {
    /// Advance the simulated controller. While streaming with an enabled
    /// subscription it emits one telemetry frame per step.
    pub fn step(&self, _elapsed_ms: u32) {
        let mut state = self.state.lock().unwrap();
        if state.connected && state.streaming && state.subscribed && state.cccd_enabled {
            state.frame_counter = state.frame_counter.wrapping_add(3);
            let frame = FrameBuilder::new()
                .counters(state.frame_counter)
                .accel_raw(2, [0, 0, 2048])
                .build();
            state.notify(frame.to_vec());
        }
    }

    /// Inject an arbitrary notification payload.
    pub fn send_notification(&self, data: &[u8]) {
        self.state.lock().unwrap().notify(data.to_vec());
    }

    /// Simulate a link loss initiated by the peer.
    pub fn drop_connection(&self) {
        let mut state = self.state.lock().unwrap();
        if state.connected {
            state.reset_link();
            state.emit(RadioEvent::Disconnected { peer: PEER });
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.state.lock().unwrap().streaming
    }

    pub fn mode(&self) -> PeerMode {
        self.state.lock().unwrap().mode
    }

    pub fn mtu(&self) -> u16 {
        self.state.lock().unwrap().mtu
    }

    pub fn sensor_requests_seen(&self) -> u32 {
        self.state.lock().unwrap().sensor_requests
    }

    pub fn characteristic_writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().characteristic_writes.clone()
    }

    pub fn descriptor_writes(&self) -> Vec<(Vec<u8>, bool)> {
        self.state.lock().unwrap().descriptor_writes.clone()
    }
}

/// Builds syntactically valid telemetry frames for tests.
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    frame: [u8; FULL_FRAME_LEN],
}

impl Default for FrameBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuilder {
    pub fn new() -> Self {
        Self {
            frame: [0u8; FULL_FRAME_LEN],
        }
    }

    /// Set all three IMU sample counters, newest one step ahead of the others.
    pub fn counters(mut self, newest: u32) -> Self {
        for t in 0..3 {
            let value = newest.wrapping_sub((2 - t) as u32);
            self.frame[t * 16..t * 16 + 4].copy_from_slice(&value.to_le_bytes());
        }
        self
    }

    pub fn accel_raw(mut self, subframe: usize, xyz: [i16; 3]) -> Self {
        let base = subframe * 16 + 4;
        for (i, v) in xyz.iter().enumerate() {
            self.frame[base + i * 2..base + i * 2 + 2].copy_from_slice(&v.to_le_bytes());
        }
        self
    }

    pub fn gyro_raw(mut self, subframe: usize, xyz: [i16; 3]) -> Self {
        let base = subframe * 16 + 10;
        for (i, v) in xyz.iter().enumerate() {
            self.frame[base + i * 2..base + i * 2 + 2].copy_from_slice(&v.to_le_bytes());
        }
        self
    }

    pub fn magno_raw(mut self, xyz: [i16; 3]) -> Self {
        for (i, v) in xyz.iter().enumerate() {
            self.frame[48 + i * 2..48 + i * 2 + 2].copy_from_slice(&v.to_be_bytes());
        }
        self
    }

    /// Pack 10-bit touchpad axes into bytes 54..57.
    pub fn touch(mut self, x: u16, y: u16) -> Self {
        self.frame[54] = ((x >> 6) & 0x0F) as u8;
        self.frame[55] = (((x & 0x3F) << 2) | ((y >> 8) & 0x03)) as u8;
        self.frame[56] = (y & 0xFF) as u8;
        self
    }

    pub fn buttons(mut self, mask: u8) -> Self {
        self.frame[58] = mask;
        self
    }

    pub fn temperature(mut self, value: u8) -> Self {
        self.frame[57] = value;
        self
    }

    pub fn battery(mut self, value: u8) -> Self {
        self.frame[59] = value;
        self
    }

    pub fn build(self) -> [u8; FULL_FRAME_LEN] {
        self.frame
    }
}
