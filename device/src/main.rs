#![no_std]
#![no_main]

use embassy_executor::Spawner;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::watch::Watch;
use embassy_time::{Duration, Timer, with_timeout};
use rtt_target::{ChannelMode::*, rtt_init};
use sixstep_commutation::{DriveConfig, DriveStatus, RunState, SixStepDrive};
use sixstep_protocol::{DeviceInfo, DriveVariant, StatusReport, Telemetry};
use static_cell::StaticCell;

mod bridge;
use bridge::{BridgeConfig, Tim1Bridge};

#[cfg(not(feature = "manual-step"))]
mod capture;

mod telemetry;
use telemetry::TelemetryWriter;

// Use panic-probe for panics
use panic_probe as _;

type Drive = SixStepDrive<Tim1Bridge<'static>>;

const DRIVE_CONFIG: DriveConfig = DriveConfig::DEFAULT;

#[cfg(not(feature = "manual-step"))]
const VARIANT: DriveVariant = DriveVariant::Throttle;
#[cfg(feature = "manual-step")]
const VARIANT: DriveVariant = DriveVariant::ManualStep;

/// Latest drive status, published by whichever task owns the drive
static STATUS: Watch<CriticalSectionRawMutex, DriveStatus, 2> = Watch::new();

/// RTT channel storage
static RTT_STATUS_CHANNEL: StaticCell<rtt_target::UpChannel> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // defmt logs on channel 0, status frames on channel 1
    let channels = rtt_init! {
        up: {
            0: { size: 1024, mode: NoBlockSkip, name: "defmt" }
            1: { size: 512, mode: NoBlockSkip, name: "status" }
        }
    };

    // Configure rtt-target as the defmt global logger on up channel 0
    rtt_target::set_defmt_channel(channels.up.0);

    let status_channel = RTT_STATUS_CHANNEL.init_with(|| channels.up.1);

    // Initialize STM32 with HSE=8MHz feeding PLL to 170MHz SYSCLK
    let p = {
        let mut config = embassy_stm32::Config::default();
        {
            use embassy_stm32::rcc::*;
            use embassy_stm32::time::Hertz;
            config.rcc.hse = Some(Hse {
                freq: Hertz(8_000_000),
                mode: HseMode::Oscillator,
            });
            // VCO in: 8MHz / 2 = 4MHz; VCO: 4MHz * 85 = 340MHz; SYSCLK: 340MHz / 2 = 170MHz
            config.rcc.pll = Some(Pll {
                source: PllSource::HSE,
                prediv: PllPreDiv::DIV2,
                mul: PllMul::MUL85,
                divp: None,
                divq: None,
                divr: Some(PllRDiv::DIV2),
            });
            config.rcc.sys = Sysclk::PLL1_R;
            // Above 150MHz, enable Range1 boost mode per RM0440 guidance
            config.rcc.boost = true;
        }
        embassy_stm32::init(config)
    };

    defmt::info!("Sixstep starting ({})", VARIANT);

    // LED on PC6
    let mut led = Output::new(p.PC6, Level::Low, Speed::Low);

    let bridge = Tim1Bridge::new(
        p.TIM1,
        p.PA8,  // Phase U high
        p.PC13, // Phase U low
        p.PA9,  // Phase V high
        p.PA12, // Phase V low
        p.PA10, // Phase W high
        p.PB15, // Phase W low
        BridgeConfig::for_drive(&DRIVE_CONFIG),
    );
    let drive = SixStepDrive::new(bridge, DRIVE_CONFIG);
    STATUS.sender().send(drive.status());

    spawner
        .spawn(telemetry_task(TelemetryWriter::new(status_channel)))
        .unwrap();

    #[cfg(not(feature = "manual-step"))]
    {
        let throttle = capture::ThrottleCapture::new(p.TIM2, p.PA15);
        spawner.spawn(throttle_task(drive, throttle)).unwrap();
    }

    #[cfg(feature = "manual-step")]
    {
        use embassy_stm32::exti::ExtiInput;
        use embassy_stm32::gpio::Pull;

        // Button: PC10, external pull-up, active-low to GND
        let button = ExtiInput::new(p.PC10, p.EXTI10, Pull::None);
        spawner.spawn(manual_step_task(drive, button)).unwrap();
    }

    defmt::info!("All tasks spawned, entering LED status loop");

    let Some(mut status) = STATUS.receiver() else {
        defmt::warn!("No status receiver left for the LED");
        return;
    };

    // LED status loop - solid while running, slow blink while stopped
    loop {
        match status.try_get().map(|s| s.state) {
            Some(RunState::Running) => {
                led.set_high();
                Timer::after(Duration::from_millis(100)).await;
            }
            _ => {
                led.set_high();
                Timer::after(Duration::from_millis(100)).await;
                led.set_low();
                Timer::after(Duration::from_millis(900)).await;
            }
        }
    }
}

/// Capture-driven commutation: every accepted pulse decodes, steps and commits
#[cfg(not(feature = "manual-step"))]
#[embassy_executor::task]
async fn throttle_task(mut drive: Drive, mut throttle: capture::ThrottleCapture<'static>) {
    use sixstep_commutation::ThrottleError;

    // Standard RC frames repeat every 20ms; several missing frames means the signal is gone
    const SIGNAL_LOSS: Duration = Duration::from_millis(100);

    let throttle_cfg = *DRIVE_CONFIG.throttle();
    let (plausible_min, plausible_max) = throttle_cfg.plausible();
    let (operating_min, operating_max) = throttle_cfg.operating();
    defmt::info!(
        "Throttle task started: accept {}..={}us, travel {}..={}us, stop below {}us, {} ticks/us",
        plausible_min,
        plausible_max,
        operating_min,
        operating_max,
        throttle_cfg.stop_threshold(),
        throttle_cfg.scale()
    );
    let sender = STATUS.sender();

    loop {
        let before = drive.status().state;

        match with_timeout(SIGNAL_LOSS, throttle.next_pulse()).await {
            Ok(width) => match drive.on_throttle(width) {
                Ok(command) => {
                    defmt::trace!("Throttle {}us -> {}", width, command);
                }
                Err(ThrottleError::Implausible { width }) => {
                    defmt::debug!("Throttle pulse {}us discarded", width);
                    continue;
                }
            },
            Err(_) if before == RunState::Running => {
                defmt::warn!("Throttle signal lost, floating bridge");
                drive.stop();
            }
            Err(_) => continue,
        }

        let status = drive.status();
        if status.state != before {
            defmt::info!("Motor {}: duty={}", status.state, status.duty.ticks());
        }
        sender.send(status);
    }
}

/// Button-driven commutation: one sector per press at the fixed manual duty
#[cfg(feature = "manual-step")]
#[embassy_executor::task]
async fn manual_step_task(mut drive: Drive, mut button: embassy_stm32::exti::ExtiInput<'static>) {
    const SETTLE: Duration = Duration::from_millis(20);

    defmt::info!(
        "Manual step task started (active-low button, duty={})",
        DRIVE_CONFIG.manual_duty().ticks()
    );
    let sender = STATUS.sender();

    loop {
        // Step on release so a held button does not repeat
        button.wait_for_falling_edge().await;
        Timer::after(SETTLE).await;
        button.wait_for_rising_edge().await;
        Timer::after(SETTLE).await;

        let sector = drive.on_step();
        defmt::info!("Manual step: sector={}", sector.as_u8());
        sender.send(drive.status());
    }
}

/// Forwards status changes to the host; repeats device info and the current
/// status periodically so a late-attaching host catches up
#[embassy_executor::task]
async fn telemetry_task(mut writer: TelemetryWriter) {
    defmt::info!("Telemetry task started");

    let info = device_info();
    writer.send(&Telemetry::Info(info.clone()));

    let Some(mut status) = STATUS.receiver() else {
        defmt::warn!("No status receiver left for telemetry");
        return;
    };

    loop {
        match with_timeout(Duration::from_secs(1), status.changed()).await {
            Ok(current) => writer.send(&Telemetry::Status(StatusReport::from(current))),
            Err(_) => {
                writer.send(&Telemetry::Info(info.clone()));
                if let Some(current) = status.try_get() {
                    writer.send(&Telemetry::Status(StatusReport::from(current)));
                }
            }
        }
    }
}

fn device_info() -> DeviceInfo {
    let mut hw: heapless::String<32> = heapless::String::new();
    let mut sw: heapless::String<32> = heapless::String::new();
    let _ = hw.push_str("B-G431B-ESC1");
    let _ = sw.push_str(concat!("sixstep-", env!("CARGO_PKG_VERSION")));
    DeviceInfo {
        hw,
        sw,
        variant: VARIANT,
    }
}
