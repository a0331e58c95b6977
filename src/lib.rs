//! Bridge between a Gear VR controller and host input.
//!
//! The crate is split into a `domain` layer (frame decoding, motion fusion,
//! event synthesis, settings) and an `infrastructure` layer (radio stack
//! abstraction, connection supervisor, device adapter, logging, output
//! sinks). The supervisor drives everything from a fixed-cadence tick; radio
//! backends feed it through an event channel.

pub mod domain;
pub mod infrastructure;
