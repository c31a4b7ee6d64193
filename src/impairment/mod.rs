//! Safety-bounded impairment injection on a live interface

mod controller;
pub mod lease;
pub mod rule;

pub use controller::{Connectivity, ControllerState, ImpairmentController, ImpairmentOutcome};
pub use lease::{InterfaceLease, InterfaceLeases};
pub use rule::netem_rule;
