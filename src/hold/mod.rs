pub mod controller;
pub mod state;

pub use controller::{CompletionCallback, MeterSnapshot, PoseMeter};
pub use state::{advance, HoldDisplay, HoldEvent, HoldMeter, HoldMeterConfig, HoldPhase};
