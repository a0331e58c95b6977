//! Output sinks.
//!
//! [`TraceSink`] is the default transport: it records every synthesized action
//! through the logging pipeline. A platform HID backend slots in behind the
//! same trait without touching the synthesizer.

use crate::domain::events::{Key, MediaKey, OutputSink, PointerButton};
use tracing::{debug, trace};

/// Logs synthesized actions instead of injecting them into the host.
#[derive(Debug, Default)]
pub struct TraceSink;

impl OutputSink for TraceSink {
    fn move_rel(&mut self, dx: i32, dy: i32) {
        trace!(dx, dy, "pointer move");
    }

    fn button_press(&mut self, button: PointerButton) {
        debug!(?button, "pointer button press");
    }

    fn button_release(&mut self, button: PointerButton) {
        debug!(?button, "pointer button release");
    }

    fn media_press(&mut self, key: MediaKey) {
        debug!(?key, "media key press");
    }

    fn media_release(&mut self, key: MediaKey) {
        debug!(?key, "media key release");
    }

    fn key_press(&mut self, key: Key) {
        debug!(?key, "key press");
    }

    fn key_release(&mut self, key: Key) {
        debug!(?key, "key release");
    }
}
