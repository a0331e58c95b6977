//! Event synthesizer.
//!
//! Turns a pair of controller snapshots (current + previous) into
//! edge-triggered host actions. Pointer movement comes from the touchpad or
//! from the fused orientation, selected at runtime by a center tap on the
//! touchpad.

use crate::domain::models::{JoyState, PointerConfig};
use tracing::{debug, info};

/// Geometric center of the touchpad (10-bit axes, usable range 0..=315).
const PAD_CENTER: i32 = 160;
/// Half-width of the square around the center that counts as a center tap.
const CENTER_TAP_BOX: i32 = 60;
/// Minimum touchpad delta (in raw counts) that produces a pointer move.
const PAD_MOVE_THRESHOLD: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKey {
    PlayPause,
    NextTrack,
    PrevTrack,
    VolumeUp,
    VolumeDown,
    Home,
    Back,
}

/// Keyboard usages the synthesizer emits (the alt-tab chord).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    LeftAlt,
    Tab,
}

/// Host-facing output transport. Implementations forward to a HID mouse,
/// keyboard and consumer-control device.
pub trait OutputSink {
    fn move_rel(&mut self, dx: i32, dy: i32);
    fn button_press(&mut self, button: PointerButton);
    fn button_release(&mut self, button: PointerButton);
    fn media_press(&mut self, key: MediaKey);
    fn media_release(&mut self, key: MediaKey);
    fn key_press(&mut self, key: Key);
    fn key_release(&mut self, key: Key);
}

/// Synthesizes output actions from consecutive snapshots.
///
/// Holds only the state needed to release what it pressed; everything else is
/// derived from the snapshot pair each frame.
pub struct EventSynthesizer {
    config: PointerConfig,
    held_media: Option<MediaKey>,
    alt_tab_held: bool,
}

impl EventSynthesizer {
    pub fn new(config: PointerConfig) -> Self {
        Self {
            config,
            held_media: None,
            alt_tab_held: false,
        }
    }

    /// Forget any held directional actions. Called on disconnect; the matching
    /// releases can never arrive once the stream is gone.
    pub fn reset(&mut self) {
        self.held_media = None;
        self.alt_tab_held = false;
    }

    /// Emit actions for the transition `previous` → `current`.
    ///
    /// Mutates `current` when the pointer mode is toggled and `previous` when
    /// the touchpad baseline is re-synced.
    pub fn synthesize(
        &mut self,
        current: &mut JoyState,
        previous: &mut JoyState,
        sink: &mut dyn OutputSink,
    ) {
        self.pointer_from_touchpad(current, previous, sink);
        if !current.use_pad {
            self.pointer_from_orientation(current, sink);
        }

        // Trigger is the pointer button.
        if current.trigger_button && !previous.trigger_button {
            sink.button_press(PointerButton::Left);
        }
        if !current.trigger_button && previous.trigger_button {
            sink.button_release(PointerButton::Left);
        }

        self.touchpad_button(current, previous, sink);

        Self::media_edge(
            current.volume_up_button,
            previous.volume_up_button,
            MediaKey::VolumeUp,
            sink,
        );
        Self::media_edge(
            current.volume_down_button,
            previous.volume_down_button,
            MediaKey::VolumeDown,
            sink,
        );
        Self::media_edge(current.home_button, previous.home_button, MediaKey::Home, sink);
        Self::media_edge(current.back_button, previous.back_button, MediaKey::Back, sink);
    }

    fn pointer_from_touchpad(
        &mut self,
        current: &JoyState,
        previous: &mut JoyState,
        sink: &mut dyn OutputSink,
    ) {
        // A (0,0) previous position is treated as "no prior contact" and
        // re-synced to the current one so the first sample after contact
        // baselines silently. Note this conflates "no touch" with an axis
        // value of exactly zero; kept from the original mapping.
        if previous.touchpad.x == 0 && previous.touchpad.y == 0 {
            previous.touchpad.x = current.touchpad.x;
            previous.touchpad.y = current.touchpad.y;
        }

        if current.touchpad.x > 0 && current.touchpad.y > 0 {
            let dx = current.touchpad.x - previous.touchpad.x;
            let dy = current.touchpad.y - previous.touchpad.y;
            if (dx.abs() > PAD_MOVE_THRESHOLD || dy.abs() > PAD_MOVE_THRESHOLD) && current.use_pad {
                sink.move_rel(dx, dy);
            }
        }
    }

    /// Project the yaw/pitch delta from the reference orientation onto a
    /// virtual screen plane and scale the clamped result to pixels.
    fn pointer_from_orientation(&self, current: &JoyState, sink: &mut dyn OutputSink) {
        let d_yaw = current.orient.yaw - current.reference.yaw;
        let d_pitch = current.orient.pitch - current.reference.pitch;

        let screen_x = d_yaw.tan() * self.config.screen_distance;
        let screen_y = d_pitch.tan() * self.config.screen_distance;

        let norm_x = (screen_x / (self.config.screen_width / 2.0)).clamp(-1.0, 1.0);
        let norm_y = (screen_y / (self.config.screen_height / 2.0)).clamp(-1.0, 1.0);

        let mouse_x = (norm_x * self.config.pixel_range) as i32;
        let mouse_y = (-norm_y * self.config.pixel_range) as i32;
        sink.move_rel(mouse_x, mouse_y);
    }

    fn touchpad_button(
        &mut self,
        current: &mut JoyState,
        previous: &JoyState,
        sink: &mut dyn OutputSink,
    ) {
        // Touchpad button alone (trigger not held), rising edge only.
        if current.touchpad.button && !current.trigger_button && !previous.touchpad.button {
            let dx = current.touchpad.x - PAD_CENTER;
            let dy = current.touchpad.y - PAD_CENTER;

            if dx.abs() < CENTER_TAP_BOX && dy.abs() < CENTER_TAP_BOX {
                // Center tap: toggle pointer source and re-center orientation.
                current.reference = current.orient;
                current.use_pad = !current.use_pad;
                info!(
                    "pointer source: {}",
                    if current.use_pad { "touchpad" } else { "orientation" }
                );
            } else if dx.abs() > dy.abs() {
                let key = if dx > 0 {
                    MediaKey::NextTrack
                } else {
                    MediaKey::PrevTrack
                };
                debug!(?key, "touchpad direction tap");
                sink.media_press(key);
                self.held_media = Some(key);
            } else if dy > 0 {
                debug!("touchpad direction tap: play/pause");
                sink.media_press(MediaKey::PlayPause);
                self.held_media = Some(MediaKey::PlayPause);
            } else {
                debug!("touchpad direction tap: alt-tab");
                sink.key_press(Key::LeftAlt);
                sink.key_press(Key::Tab);
                self.alt_tab_held = true;
            }
        }

        // Falling edge releases whatever the tap pressed.
        if !current.touchpad.button && previous.touchpad.button {
            if let Some(key) = self.held_media.take() {
                sink.media_release(key);
            }
            if self.alt_tab_held {
                sink.key_release(Key::Tab);
                sink.key_release(Key::LeftAlt);
                self.alt_tab_held = false;
            }
        }
    }

    fn media_edge(now: bool, before: bool, key: MediaKey, sink: &mut dyn OutputSink) {
        if now && !before {
            sink.media_press(key);
        }
        if !now && before {
            sink.media_release(key);
        }
    }
}
