//! Compare value shared by all three channels

/// PWM period in timer ticks (auto-reload value). The bridge, the throttle
/// mapping and the manual duty are all sized against it.
pub const PWM_PERIOD: u16 = u16::MAX;

/// Duty cycle in timer ticks, bounded by the PWM period
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DutyCycle(u16);

impl DutyCycle {
    pub const ZERO: Self = Self(0);

    pub const fn new(ticks: u16) -> Self {
        Self(ticks)
    }

    /// Duty from a wide intermediate value, saturated at `period`
    pub const fn capped(ticks: u32, period: u16) -> Self {
        if ticks > period as u32 {
            Self(period)
        } else {
            Self(ticks as u16)
        }
    }

    pub const fn ticks(self) -> u16 {
        self.0
    }
}
