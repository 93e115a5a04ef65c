//! Six-step drive: throttle decoder, sector sequencer and commutation engine
//! behind the two stimulus paths (captured throttle pulse, manual step).

use crate::duty::DutyCycle;
use crate::engine::{BridgeOutputs, Commutation, CommutationEngine};
use crate::sector::{Direction, Sector};
use crate::sequencer::SectorSequencer;
use crate::throttle::{RunState, ThrottleCommand, ThrottleConfig, ThrottleDecoder, ThrottleError};

/// Build-time drive configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DriveConfig {
    throttle: ThrottleConfig,
    direction: Direction,
    manual_duty: DutyCycle,
}

impl DriveConfig {
    pub const DEFAULT: Self =
        Self::new(ThrottleConfig::DEFAULT, Direction::Forward, DutyCycle::new(50_000));

    /// Panics (at compile time in const context) if `manual_duty` does not
    /// fit in the throttle's timer period
    pub const fn new(
        throttle: ThrottleConfig,
        direction: Direction,
        manual_duty: DutyCycle,
    ) -> Self {
        assert!(
            manual_duty.ticks() <= throttle.period(),
            "manual duty exceeds the timer period"
        );
        Self {
            throttle,
            direction,
            manual_duty,
        }
    }

    pub const fn throttle(&self) -> &ThrottleConfig {
        &self.throttle
    }

    /// Duty used by the manually stepped variant
    pub const fn manual_duty(&self) -> DutyCycle {
        self.manual_duty
    }

    /// Timer period every duty of this drive is bounded by
    pub const fn period(&self) -> u16 {
        self.throttle.period()
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Read-only snapshot for status indicators
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DriveStatus {
    pub state: RunState,
    pub sector: Sector,
    pub duty: DutyCycle,
}

pub struct SixStepDrive<B> {
    engine: CommutationEngine<B>,
    sequencer: SectorSequencer,
    decoder: ThrottleDecoder,
    direction: Direction,
    manual_duty: DutyCycle,
}

impl<B: BridgeOutputs> SixStepDrive<B> {
    /// Starts stopped, all phases floating, at sector 0
    pub fn new(outputs: B, config: DriveConfig) -> Self {
        Self {
            engine: CommutationEngine::new(outputs),
            sequencer: SectorSequencer::new(Sector::S0),
            decoder: ThrottleDecoder::new(config.throttle),
            direction: config.direction,
            manual_duty: config.manual_duty,
        }
    }

    /// Handle one captured throttle pulse.
    ///
    /// Implausible widths change nothing. A stop command floats the bridge.
    /// A run command steps one sector and applies it at the decoded duty.
    pub fn on_throttle(&mut self, width: u32) -> Result<ThrottleCommand, ThrottleError> {
        let command = self.decoder.decode(width)?;
        match command.state {
            RunState::Stopped => self.engine.stop(),
            RunState::Running => {
                let sector = self.sequencer.step(self.direction);
                self.engine.apply(sector, command.duty);
            }
        }
        Ok(command)
    }

    /// Manual stepping: advance one sector and apply it at the manual duty
    pub fn on_step(&mut self) -> Sector {
        let sector = self.sequencer.step(self.direction);
        self.engine.apply(sector, self.manual_duty);
        sector
    }

    /// Float all phases without touching the sector
    pub fn stop(&mut self) {
        self.engine.stop();
    }

    pub fn status(&self) -> DriveStatus {
        match self.engine.committed() {
            Commutation::Driving(sector) => DriveStatus {
                state: RunState::Running,
                sector,
                duty: self.engine.duty(),
            },
            Commutation::Floating => DriveStatus {
                state: RunState::Stopped,
                sector: self.sequencer.current(),
                duty: DutyCycle::ZERO,
            },
        }
    }

    pub fn engine(&self) -> &CommutationEngine<B> {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::RegisterImage;
    use crate::engine::tests::RecordingBridge;
    use crate::table::{FLOATING, intents_for};

    fn drive() -> SixStepDrive<RecordingBridge> {
        SixStepDrive::new(RecordingBridge::default(), DriveConfig::DEFAULT)
    }

    fn live(drive: &SixStepDrive<RecordingBridge>) -> RegisterImage {
        drive.engine().outputs().live
    }

    #[test]
    fn test_starts_stopped_and_floating() {
        let drive = drive();
        assert_eq!(live(&drive), RegisterImage::from_intents(FLOATING));
        assert_eq!(
            drive.status(),
            DriveStatus {
                state: RunState::Stopped,
                sector: Sector::S0,
                duty: DutyCycle::ZERO,
            }
        );
    }

    #[test]
    fn test_running_throttle_steps_and_applies() {
        let mut drive = drive();
        let command = drive.on_throttle(1500).unwrap();
        assert_eq!(command.state, RunState::Running);

        let status = drive.status();
        assert_eq!(status.state, RunState::Running);
        assert_eq!(status.sector, Sector::S1);
        assert_eq!(status.duty, DutyCycle::new(32_500));
        assert_eq!(live(&drive), RegisterImage::from_intents(intents_for(Sector::S1)));
        assert_eq!(drive.engine().outputs().live_duty, 32_500);
    }

    #[test]
    fn test_dead_zone_floats_immediately() {
        let mut drive = drive();
        drive.on_throttle(1800).unwrap();
        drive.on_throttle(1800).unwrap();
        assert_eq!(drive.on_throttle(1000), Ok(ThrottleCommand::STOP));
        assert_eq!(live(&drive), RegisterImage::from_intents(FLOATING));
        assert_eq!(drive.status().state, RunState::Stopped);
        assert_eq!(drive.status().sector, Sector::S2);
    }

    #[test]
    fn test_glitch_changes_nothing() {
        let mut drive = drive();
        drive.on_throttle(1600).unwrap();
        let commits = drive.engine().outputs().commits();
        let status = drive.status();

        assert_eq!(drive.on_throttle(400), Err(ThrottleError::Implausible { width: 400 }));
        assert_eq!(drive.on_throttle(9000), Err(ThrottleError::Implausible { width: 9000 }));
        assert_eq!(drive.engine().outputs().commits(), commits);
        assert_eq!(drive.status(), status);
    }

    #[test]
    fn test_one_commit_per_accepted_sample() {
        let mut drive = drive();
        let start = drive.engine().outputs().commits();
        for width in [1200, 1049, 1900, 1300] {
            drive.on_throttle(width).unwrap();
        }
        assert_eq!(drive.engine().outputs().commits(), start + 4);
    }

    #[test]
    fn test_manual_step_cycle() {
        let mut drive = drive();
        let visited: Vec<u8> = (0..6).map(|_| drive.on_step().as_u8()).collect();
        assert_eq!(visited, [1, 2, 3, 4, 5, 0]);
        assert_eq!(drive.status().duty, DriveConfig::DEFAULT.manual_duty());
        assert_eq!(live(&drive), RegisterImage::from_intents(intents_for(Sector::S0)));
    }

    #[test]
    fn test_reverse_direction() {
        let config = DriveConfig::new(
            ThrottleConfig::DEFAULT,
            Direction::Reverse,
            DriveConfig::DEFAULT.manual_duty(),
        );
        let mut drive = SixStepDrive::new(RecordingBridge::default(), config);
        assert_eq!(drive.on_step(), Sector::S5);
        drive.on_throttle(1500).unwrap();
        assert_eq!(drive.status().sector, Sector::S4);
    }

    #[test]
    fn test_manual_duty_within_short_period() {
        let throttle = ThrottleConfig::new(900, 2100, 1000, 2000, 1100, 8, 8000);
        let config = DriveConfig::new(throttle, Direction::Forward, DutyCycle::new(6000));
        assert_eq!(config.period(), 8000);

        let mut drive = SixStepDrive::new(RecordingBridge::default(), config);
        drive.on_step();
        assert!(drive.engine().outputs().live_duty <= config.period());
        drive.on_throttle(2100).unwrap();
        assert_eq!(drive.engine().outputs().live_duty, 8000);
    }

    #[test]
    #[should_panic(expected = "manual duty exceeds the timer period")]
    fn test_rejects_manual_duty_beyond_period() {
        let throttle = ThrottleConfig::new(900, 2100, 1000, 2000, 1100, 8, 8000);
        let _ = DriveConfig::new(throttle, Direction::Forward, DriveConfig::DEFAULT.manual_duty());
    }
}
