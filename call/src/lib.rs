#[macro_use]
extern crate tracing;

pub mod audio;
pub mod controller;
pub mod controls;
pub mod participant;
pub mod presence;
pub mod session;
pub mod sync_guard;

pub use controller::{
    CallCommand,
    CallController,
    CallError,
    CallState,
    ConnectionState,
};
pub use controls::DeviceIntent;
pub use participant::Participant;
