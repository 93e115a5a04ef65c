//! Complementary PWM channel configuration
//!
//! Translates a phase's [`DriveIntent`] into the output-compare settings of one
//! high-side/low-side channel pair, and composes the three pairs into the
//! CCMR1/CCMR2/CCER contents of an STM32 advanced-control timer (TIM1/TIM8).
//!
//! | intent | OCxM           | CCxNP | high side | low side  |
//! |--------|----------------|-------|-----------|-----------|
//! | High   | PWM mode 1     | 0     | PWM       | !PWM      |
//! | Low    | forced low     | 0     | off       | on        |
//! | Float  | forced low     | 1     | off       | off       |

use crate::table::{DriveIntent, PhaseIntents};

/// Output-compare mode of the primary (high-side) output
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputCompareMode {
    /// Active while CNT < CCR
    PwmMode1,
    /// Reference forced low
    ForceInactive,
}

impl OutputCompareMode {
    const fn bits(self) -> u32 {
        match self {
            OutputCompareMode::PwmMode1 => 0b110,
            OutputCompareMode::ForceInactive => 0b100,
        }
    }
}

/// State of one gate as seen by the power stage
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Gate {
    Off,
    On,
    /// Follows the PWM reference
    Modulated,
    /// Follows the inverted PWM reference, with dead-time inserted by the timer
    ModulatedInverse,
}

/// Configuration of one complementary channel pair
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelConfig {
    pub mode: OutputCompareMode,
    /// CCxNP: drive the low-side output with inverted polarity
    pub complementary_inverted: bool,
}

impl ChannelConfig {
    pub const fn for_intent(intent: DriveIntent) -> Self {
        match intent {
            DriveIntent::High => Self {
                mode: OutputCompareMode::PwmMode1,
                complementary_inverted: false,
            },
            DriveIntent::Low => Self {
                mode: OutputCompareMode::ForceInactive,
                complementary_inverted: false,
            },
            DriveIntent::Float => Self {
                mode: OutputCompareMode::ForceInactive,
                complementary_inverted: true,
            },
        }
    }

    /// Resulting (high side, low side) gate states
    pub const fn gates(self) -> (Gate, Gate) {
        match (self.mode, self.complementary_inverted) {
            (OutputCompareMode::PwmMode1, false) => (Gate::Modulated, Gate::ModulatedInverse),
            (OutputCompareMode::PwmMode1, true) => (Gate::Modulated, Gate::Modulated),
            (OutputCompareMode::ForceInactive, false) => (Gate::Off, Gate::On),
            (OutputCompareMode::ForceInactive, true) => (Gate::Off, Gate::Off),
        }
    }

    /// Whether both switches of the phase can conduct at the same time
    pub const fn shoots_through(self) -> bool {
        let (high, low) = self.gates();
        matches!(
            (high, low),
            (Gate::On, Gate::On)
                | (Gate::Modulated, Gate::Modulated)
                | (Gate::On, Gate::Modulated | Gate::ModulatedInverse)
                | (Gate::Modulated | Gate::ModulatedInverse, Gate::On)
        )
    }
}

// Per-channel fields, channel 1 position
const OCPE: u32 = 1 << 3;
const OCM_SHIFT: u32 = 4;
const CCE: u32 = 1 << 0;
const CCNE: u32 = 1 << 2;
const CCNP: u32 = 1 << 3;

/// CCMR1/CCMR2/CCER contents for channels 1 to 3
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterImage {
    pub ccmr1: u32,
    pub ccmr2: u32,
    pub ccer: u32,
}

impl RegisterImage {
    /// Compose the three channel pairs, U on CH1, V on CH2, W on CH3.
    ///
    /// Every channel keeps both outputs enabled and output-compare preload on,
    /// so that the preloaded bits only move on a commutation event.
    pub fn compose(configs: [ChannelConfig; 3]) -> Self {
        let mut image = Self::default();
        for (index, config) in configs.iter().enumerate() {
            let ccmr = (OCPE | config.mode.bits() << OCM_SHIFT) << ((index % 2) * 8);
            if index < 2 {
                image.ccmr1 |= ccmr;
            } else {
                image.ccmr2 |= ccmr;
            }

            let mut ccer = CCE | CCNE;
            if config.complementary_inverted {
                ccer |= CCNP;
            }
            image.ccer |= ccer << (index * 4);
        }
        image
    }

    pub fn from_intents(intents: PhaseIntents) -> Self {
        Self::compose(intents.map(ChannelConfig::for_intent))
    }
}

/// CR1.UDIS: while set, overflows leave the preloaded compare values alone
pub const CR1_UDIS: u32 = 1 << 1;
/// EGR.UG: software update event, moves preloaded CCRx into the shadows
pub const EGR_UG: u32 = 1 << 0;
/// EGR.COMG: commutation event, moves preloaded CCxE/CCxNE/CCxNP/OCxM
pub const EGR_COMG: u32 = 1 << 5;

/// EGR value that latches compare values and channel image in one write
pub const COMMIT_EVENT: u32 = EGR_UG | EGR_COMG;

/// Dead-time inserted by the timer between a switch turning off and its
/// complement turning on. Encoded as the BDTR.DTG field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeadTime {
    dtg: u8,
}

impl DeadTime {
    /// Shortest gap accepted, in nanoseconds. Must cover the turn-off
    /// propagation delay of the gate driver plus MOSFET fall time.
    pub const MIN_NANOS: u32 = 200;

    /// Encode `nanos` for a timer whose dead-time clock runs at `clock_hz`.
    ///
    /// Rounds up so the achieved gap is never shorter than requested.
    /// Requests below [`Self::MIN_NANOS`] are raised to it; requests beyond the
    /// DTG range saturate at the longest encodable gap.
    pub const fn from_nanos(nanos: u32, clock_hz: u32) -> Self {
        let nanos = if nanos < Self::MIN_NANOS { Self::MIN_NANOS } else { nanos };
        let ticks = (nanos as u64 * clock_hz as u64).div_ceil(1_000_000_000);
        let ticks = if ticks > u32::MAX as u64 { u32::MAX } else { ticks as u32 };
        Self { dtg: encode_dtg(ticks) }
    }

    /// Raw BDTR.DTG value
    pub const fn register_value(self) -> u8 {
        self.dtg
    }

    /// Gap length in dead-time clock ticks
    pub const fn ticks(self) -> u32 {
        let dtg = self.dtg as u32;
        match dtg >> 5 {
            0b000..=0b011 => dtg,
            0b100 | 0b101 => (64 + (dtg & 0x3F)) * 2,
            0b110 => (32 + (dtg & 0x1F)) * 8,
            _ => (32 + (dtg & 0x1F)) * 16,
        }
    }

    pub const fn nanos(self, clock_hz: u32) -> u32 {
        (self.ticks() as u64 * 1_000_000_000 / clock_hz as u64) as u32
    }
}

const fn encode_dtg(ticks: u32) -> u8 {
    if ticks <= 127 {
        ticks as u8
    } else if ticks <= 254 {
        0b1000_0000 | (ticks.div_ceil(2) - 64) as u8
    } else if ticks <= 504 {
        0b1100_0000 | (ticks.div_ceil(8) - 32) as u8
    } else if ticks <= 1008 {
        0b1110_0000 | (ticks.div_ceil(16) - 32) as u8
    } else {
        0xFF
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sector::Sector;
    use crate::table::{FLOATING, intents_for};

    const CLOCK_HZ: u32 = 170_000_000;

    #[test]
    fn test_gates_per_intent() {
        use DriveIntent::*;
        assert_eq!(
            ChannelConfig::for_intent(High).gates(),
            (Gate::Modulated, Gate::ModulatedInverse)
        );
        assert_eq!(ChannelConfig::for_intent(Low).gates(), (Gate::Off, Gate::On));
        assert_eq!(ChannelConfig::for_intent(Float).gates(), (Gate::Off, Gate::Off));
    }

    #[test]
    fn test_no_intent_shoots_through() {
        for sector in Sector::ALL {
            for intent in intents_for(sector) {
                assert!(!ChannelConfig::for_intent(intent).shoots_through());
            }
        }
        let inverted_pwm = ChannelConfig {
            mode: OutputCompareMode::PwmMode1,
            complementary_inverted: true,
        };
        assert!(inverted_pwm.shoots_through());
    }

    #[test]
    fn test_image_matches_register_layout() {
        // U high, V low, W floating
        let image = RegisterImage::from_intents(intents_for(Sector::S0));
        // OC1PE | OC1M=110, OC2PE | OC2M=100
        assert_eq!(image.ccmr1, 0x0068 | 0x4800);
        // OC3PE | OC3M=100
        assert_eq!(image.ccmr2, 0x0048);
        // CC1E|CC1NE, CC2E|CC2NE, CC3E|CC3NE|CC3NP
        assert_eq!(image.ccer, 0x005 | 0x050 | 0xD00);
    }

    #[test]
    fn test_commit_event_latches_duty_and_pattern() {
        assert_eq!(COMMIT_EVENT, 0x21);
        assert_ne!(COMMIT_EVENT & EGR_UG, 0);
        assert_ne!(COMMIT_EVENT & EGR_COMG, 0);
        assert_eq!(CR1_UDIS, 0x2);
    }

    #[test]
    fn test_floating_image() {
        let image = RegisterImage::from_intents(FLOATING);
        assert_eq!(image.ccmr1, 0x4848);
        assert_eq!(image.ccmr2, 0x0048);
        assert_eq!(image.ccer, 0xDDD);
    }

    #[test]
    fn test_every_sector_enables_all_outputs() {
        for sector in Sector::ALL {
            let image = RegisterImage::from_intents(intents_for(sector));
            for ch in 0..3 {
                assert_eq!((image.ccer >> (ch * 4)) & (CCE | CCNE), CCE | CCNE);
            }
            // Exactly one channel in PWM mode
            let pwm = [image.ccmr1 & 0x70, (image.ccmr1 >> 8) & 0x70, image.ccmr2 & 0x70]
                .iter()
                .filter(|&&m| m == 0x60)
                .count();
            assert_eq!(pwm, 1);
        }
    }

    #[test]
    fn test_dead_time_encoding() {
        // 2 us at 170 MHz is 340 ticks, next step of 8 is 344
        let dt = DeadTime::from_nanos(2_000, CLOCK_HZ);
        assert_eq!(dt.register_value(), 0xCB);
        assert_eq!(dt.ticks(), 344);

        assert_eq!(encode_dtg(127), 127);
        assert_eq!(encode_dtg(128), 0x80);
        assert_eq!(encode_dtg(254), 0xBF);
        assert_eq!(encode_dtg(255), 0xC0);
        assert_eq!(encode_dtg(504), 0xDF);
        assert_eq!(encode_dtg(505), 0xE0);
        assert_eq!(encode_dtg(1008), 0xFF);
        assert_eq!(encode_dtg(5000), 0xFF);
    }

    #[test]
    fn test_dead_time_never_shorter_than_requested() {
        let mut previous = 0;
        for ticks in 0..=1008 {
            let achieved = DeadTime { dtg: encode_dtg(ticks) }.ticks();
            assert!(achieved >= ticks, "{ticks} -> {achieved}");
            assert!(achieved >= previous);
            previous = achieved;
        }
    }

    #[test]
    fn test_dead_time_minimum() {
        let floor = DeadTime::from_nanos(DeadTime::MIN_NANOS, CLOCK_HZ);
        assert_eq!(DeadTime::from_nanos(0, CLOCK_HZ), floor);
        assert_eq!(DeadTime::from_nanos(50, CLOCK_HZ), floor);
        assert!(floor.nanos(CLOCK_HZ) >= DeadTime::MIN_NANOS);
    }
}
