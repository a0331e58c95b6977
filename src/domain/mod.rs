pub mod decoder;
pub mod events;
pub mod fusion;
pub mod models;
pub mod settings;
