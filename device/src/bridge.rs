//! TIM1 complementary PWM bridge for the three motor phases
//!
//! CR2.CCPC is set, so CCxE/CCxNE/OCxM writes sit in preload registers until
//! a COM event is generated. Compare values are preloaded (OCxPE) and update
//! events are held off (CR1.UDIS) from `set_duty` until `commit`, which
//! raises UG and COMG in one EGR write. Duty and pattern therefore change on
//! the same timer clock, and the PWM period restarts there.

use embassy_stm32::Peri;
use embassy_stm32::gpio::OutputType;
use embassy_stm32::peripherals::{PA8, PA9, PA10, PA12, PB15, PC13, TIM1};
use embassy_stm32::timer::complementary_pwm::ComplementaryPwmPin;
use embassy_stm32::timer::low_level::{CountingMode, Timer};
use embassy_stm32::timer::simple_pwm::PwmPin;
use sixstep_commutation::{
    BridgeOutputs, COMMIT_EVENT, CR1_UDIS, DeadTime, DriveConfig, DutyCycle, RegisterImage,
};

/// TIM1 kernel clock, SYSCLK from the PLL set up in `main`
pub const TIMER_CLOCK_HZ: u32 = 170_000_000;

const CR2_CCPC: u32 = 1 << 0;
const BDTR_OSSR: u32 = 1 << 11;

/// PWM configuration for the bridge
pub struct BridgeConfig {
    pub period: u16,       // timer ticks
    pub dead_time_ns: u32, // nanoseconds
}

impl BridgeConfig {
    /// Bridge sized to the period the drive computes its duties against
    pub const fn for_drive(drive: &DriveConfig) -> Self {
        Self {
            period: drive.period(), // 65535: ~2.6 kHz edge-aligned at 170 MHz
            dead_time_ns: 2000,
        }
    }
}

/// Three complementary channel pairs of TIM1
pub struct Tim1Bridge<'d> {
    timer: Timer<'d, TIM1>,
}

impl<'d> Tim1Bridge<'d> {
    /// Initialize TIM1 complementary PWM for the B-G431B-ESC1 board.
    ///
    /// The bridge leaves this function with every output disabled; the
    /// commutation engine floats all phases before anything else happens.
    pub fn new(
        tim1: Peri<'d, TIM1>,
        pa8: Peri<'d, PA8>,
        pc13: Peri<'d, PC13>,
        pa9: Peri<'d, PA9>,
        pa12: Peri<'d, PA12>,
        pa10: Peri<'d, PA10>,
        pb15: Peri<'d, PB15>,
        config: BridgeConfig,
    ) -> Self {
        // High-side pins
        let _ch1 = PwmPin::new(pa8, OutputType::PushPull); // Phase U high
        let _ch2 = PwmPin::new(pa9, OutputType::PushPull); // Phase V high
        let _ch3 = PwmPin::new(pa10, OutputType::PushPull); // Phase W high

        // Low-side pins (complementary)
        let _ch1n = ComplementaryPwmPin::new(pc13, OutputType::PushPull); // Phase U low
        let _ch2n = ComplementaryPwmPin::new(pa12, OutputType::PushPull); // Phase V low
        let _ch3n = ComplementaryPwmPin::new(pb15, OutputType::PushPull); // Phase W low

        let timer = Timer::new(tim1);
        timer.set_counting_mode(CountingMode::EdgeAlignedUp);

        let dead_time = DeadTime::from_nanos(config.dead_time_ns, TIMER_CLOCK_HZ);
        let regs = timer.regs_advanced();
        regs.arr().write(|w| w.0 = u32::from(config.period));
        timer.set_dead_time_value(dead_time.register_value());
        regs.bdtr().modify(|w| w.0 |= BDTR_OSSR);
        timer.set_moe(true);
        regs.cr2().modify(|w| w.0 |= CR2_CCPC);
        timer.start();

        defmt::info!(
            "Bridge init: period={} ticks, dead_time={}ns (DTG={=u8:#x})",
            config.period,
            dead_time.nanos(TIMER_CLOCK_HZ),
            dead_time.register_value()
        );

        Self { timer }
    }
}

impl BridgeOutputs for Tim1Bridge<'_> {
    fn set_duty(&mut self, duty: DutyCycle) {
        let regs = self.timer.regs_advanced();
        regs.cr1().modify(|w| w.0 |= CR1_UDIS);
        for ch in 0..3 {
            regs.ccr(ch).write(|w| w.0 = u32::from(duty.ticks()));
        }
    }

    fn stage(&mut self, image: RegisterImage) {
        let regs = self.timer.regs_advanced();
        regs.ccmr_output(0).write(|w| w.0 = image.ccmr1);
        regs.ccmr_output(1).write(|w| w.0 = image.ccmr2);
        regs.ccer().write(|w| w.0 = image.ccer);
    }

    fn commit(&mut self) {
        let regs = self.timer.regs_advanced();
        regs.cr1().modify(|w| w.0 &= !CR1_UDIS);
        regs.egr().write(|w| w.0 = COMMIT_EVENT);
    }
}
