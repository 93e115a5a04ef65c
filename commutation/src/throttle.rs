//! Throttle decoder: servo-style pulse width to run state and duty cycle
//!
//! Three nested windows, all in microseconds:
//!
//! ```text
//! plausible_min   operating_min  stop_threshold          operating_max   plausible_max
//!      |---------------|--------------|-----------------------|-----------------|
//!        stopped         stopped (dead zone)   running, linear    running, clamped
//! ```
//!
//! Anything outside the plausibility window is a glitch and is discarded.

use crate::duty::{DutyCycle, PWM_PERIOD};

/// Whether the bridge is energized
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunState {
    Stopped,
    Running,
}

/// Result of one accepted throttle sample
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThrottleCommand {
    pub state: RunState,
    pub duty: DutyCycle,
}

impl ThrottleCommand {
    pub const STOP: Self = Self {
        state: RunState::Stopped,
        duty: DutyCycle::ZERO,
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ThrottleError {
    /// Width outside the plausibility window; the sample was discarded
    Implausible { width: u32 },
}

/// Throttle windows, all widths in microseconds.
///
/// Only [`ThrottleConfig::new`] builds one, so the windows are always nested.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThrottleConfig {
    plausible_min: u32,
    plausible_max: u32,
    operating_min: u32,
    operating_max: u32,
    stop_threshold: u32,
    scale: u32,
    period: u16,
}

impl ThrottleConfig {
    /// Standard RC throttle: 1000-2000 us travel, 50 us dead zone, full 16-bit period
    pub const DEFAULT: Self = Self::new(800, 3000, 1000, 2000, 1050, 65, PWM_PERIOD);

    /// Panics (at compile time in const context) if the windows are not nested
    pub const fn new(
        plausible_min: u32,
        plausible_max: u32,
        operating_min: u32,
        operating_max: u32,
        stop_threshold: u32,
        scale: u32,
        period: u16,
    ) -> Self {
        assert!(
            plausible_min <= operating_min,
            "operating window starts below plausibility window"
        );
        assert!(operating_min < stop_threshold, "stop threshold must be above operating minimum");
        assert!(stop_threshold <= operating_max, "stop threshold above operating maximum");
        assert!(operating_max <= plausible_max, "operating window ends above plausibility window");
        assert!(
            (operating_max - operating_min) as u64 * scale as u64 <= period as u64,
            "full throttle exceeds the timer period"
        );
        Self {
            plausible_min,
            plausible_max,
            operating_min,
            operating_max,
            stop_threshold,
            scale,
            period,
        }
    }

    /// Accepted pulse widths, inclusive
    pub const fn plausible(&self) -> (u32, u32) {
        (self.plausible_min, self.plausible_max)
    }

    /// Throttle travel from zero to full duty, inclusive
    pub const fn operating(&self) -> (u32, u32) {
        (self.operating_min, self.operating_max)
    }

    /// Widths below this stop the motor
    pub const fn stop_threshold(&self) -> u32 {
        self.stop_threshold
    }

    /// Duty ticks per microsecond above the operating minimum
    pub const fn scale(&self) -> u32 {
        self.scale
    }

    /// Timer period in ticks, the largest duty ever produced
    pub const fn period(&self) -> u16 {
        self.period
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

pub struct ThrottleDecoder {
    config: ThrottleConfig,
    last: ThrottleCommand,
}

impl ThrottleDecoder {
    /// Starts out stopped
    pub const fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            last: ThrottleCommand::STOP,
        }
    }

    /// Decode one captured pulse width.
    ///
    /// An implausible width leaves [`Self::last`] untouched.
    pub fn decode(&mut self, width: u32) -> Result<ThrottleCommand, ThrottleError> {
        let cfg = &self.config;
        if width < cfg.plausible_min || width > cfg.plausible_max {
            return Err(ThrottleError::Implausible { width });
        }

        let command = if width < cfg.stop_threshold {
            ThrottleCommand::STOP
        } else {
            let travel = width.clamp(cfg.operating_min, cfg.operating_max) - cfg.operating_min;
            ThrottleCommand {
                state: RunState::Running,
                duty: DutyCycle::capped(travel.saturating_mul(cfg.scale), cfg.period),
            }
        };

        self.last = command;
        Ok(command)
    }

    /// Most recent accepted command
    pub fn last(&self) -> ThrottleCommand {
        self.last
    }
}

impl Default for ThrottleDecoder {
    fn default() -> Self {
        Self::new(ThrottleConfig::DEFAULT)
    }
}
