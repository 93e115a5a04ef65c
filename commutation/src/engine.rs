//! Commutation engine: applies a sector to the bridge with a single commit

use crate::channel::RegisterImage;
use crate::duty::DutyCycle;
use crate::sector::Sector;
use crate::table::{FLOATING, intents_for};

/// Write-buffered access to the three complementary channel pairs.
///
/// Nothing written through `set_duty` or `stage` may reach the outputs before
/// the following `commit`, including across PWM period boundaries. The new
/// duty and the new channel image become live in the same event.
pub trait BridgeOutputs {
    /// Write the same compare value to all three channels, held back until
    /// `commit`
    fn set_duty(&mut self, duty: DutyCycle);

    /// Load a channel image into the preload registers
    fn stage(&mut self, image: RegisterImage);

    /// Latch the pending duty and the staged image at the same instant
    fn commit(&mut self);
}

/// What the bridge was last committed to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Commutation {
    /// All three phases open
    Floating,
    /// Energized according to the table row of the sector
    Driving(Sector),
}

pub struct CommutationEngine<B> {
    outputs: B,
    committed: Commutation,
    duty: DutyCycle,
}

impl<B: BridgeOutputs> CommutationEngine<B> {
    /// Take ownership of the bridge and float every phase
    pub fn new(outputs: B) -> Self {
        let mut engine = Self {
            outputs,
            committed: Commutation::Floating,
            duty: DutyCycle::ZERO,
        };
        engine.stop();
        engine
    }

    /// Energize the bridge for `sector` at `duty`
    pub fn apply(&mut self, sector: Sector, duty: DutyCycle) {
        self.outputs.set_duty(duty);
        self.outputs.stage(RegisterImage::from_intents(intents_for(sector)));
        self.outputs.commit();
        self.duty = duty;
        self.committed = Commutation::Driving(sector);
    }

    /// Float all phases. The compare value is left as it was.
    pub fn stop(&mut self) {
        self.outputs.stage(RegisterImage::from_intents(FLOATING));
        self.outputs.commit();
        self.committed = Commutation::Floating;
    }

    pub fn committed(&self) -> Commutation {
        self.committed
    }

    /// Compare value last written by `apply`
    pub fn duty(&self) -> DutyCycle {
        self.duty
    }

    pub fn outputs(&self) -> &B {
        &self.outputs
    }
}
