//! Six-step commutation core for a three-phase BLDC bridge driven by
//! complementary PWM.
//!
//! Hardware-independent: the bridge is reached through [`BridgeOutputs`].

#![cfg_attr(not(test), no_std)]

pub mod channel;
pub mod drive;
pub mod duty;
pub mod engine;
pub mod sector;
pub mod sequencer;
pub mod table;
pub mod throttle;

pub use channel::{COMMIT_EVENT, CR1_UDIS, ChannelConfig, DeadTime, RegisterImage};
pub use drive::{DriveConfig, DriveStatus, SixStepDrive};
pub use duty::{DutyCycle, PWM_PERIOD};
pub use engine::{BridgeOutputs, Commutation, CommutationEngine};
pub use sector::{Direction, Sector};
pub use sequencer::SectorSequencer;
pub use table::{DriveIntent, Phase, intents_for};
pub use throttle::{RunState, ThrottleCommand, ThrottleConfig, ThrottleDecoder, ThrottleError};
