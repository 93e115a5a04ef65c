//! Throttle pulse capture on TIM2 CH1 (PA15, the "PWM" pad of the B-G431B-ESC1)

use embassy_stm32::Peri;
use embassy_stm32::gpio::Pull;
use embassy_stm32::peripherals::{PA15, TIM2};
use embassy_stm32::time::Hertz;
use embassy_stm32::timer::Channel;
use embassy_stm32::timer::input_capture::{CapturePin, InputCapture};
use embassy_stm32::timer::low_level::CountingMode;
use embassy_stm32::{bind_interrupts, timer};

bind_interrupts!(struct Irqs {
    TIM2 => timer::CaptureCompareInterruptHandler<TIM2>;
});

/// One counter tick per microsecond
const TICK_HZ: u32 = 1_000_000;

pub struct ThrottleCapture<'d> {
    capture: InputCapture<'d, TIM2>,
}

impl<'d> ThrottleCapture<'d> {
    pub fn new(tim2: Peri<'d, TIM2>, pa15: Peri<'d, PA15>) -> Self {
        // Pulled down so an unplugged receiver produces no edges
        let pin = CapturePin::new(pa15, Pull::Down);
        let capture = InputCapture::new(
            tim2,
            Some(pin),
            None,
            None,
            None,
            Irqs,
            Hertz(TICK_HZ),
            CountingMode::EdgeAlignedUp,
        );
        defmt::info!("Throttle capture on PA15 (TIM2 CH1, 1 MHz tick)");
        Self { capture }
    }

    /// Wait for one complete high pulse and return its width in microseconds
    pub async fn next_pulse(&mut self) -> u32 {
        let rise = self.capture.wait_for_rising_edge(Channel::Ch1).await;
        let fall = self.capture.wait_for_falling_edge(Channel::Ch1).await;
        // TIM2 is 32-bit, a single wrap between edges is handled by wrapping_sub
        fall.wrapping_sub(rise)
    }
}
