//! Device-side fall confirmation: the pure state machine and the async
//! agent that runs it.

mod agent;
mod machine;

pub use agent::{DeviceAgent, DeviceHandle};
pub use machine::{Command, ConfirmationMachine};
