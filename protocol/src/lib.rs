#![cfg_attr(not(test), no_std)]

//! Telemetry frames sent from the drive to the host over RTT.
//!
//! Each frame is one postcard-serialized [`Telemetry`] value, COBS encoded
//! and terminated by a zero byte.

use heapless::String;
use serde::{Deserialize, Serialize};
use sixstep_commutation::{DriveStatus, RunState, Sector};

/// Largest encoded frame, including the COBS overhead and terminator
pub const MAX_FRAME_SIZE: usize = 96;

/// Which stimulus drives the sequencer
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriveVariant {
    /// Throttle pulse capture, one sector per accepted pulse
    Throttle,
    /// Button edges step the sector at a fixed duty
    ManualStep,
}

/// Basic device info, sent once at boot
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub hw: String<32>,
    pub sw: String<32>,
    pub variant: DriveVariant,
}

/// Motor operational state
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotorState {
    Stopped,
    Running,
}

impl From<RunState> for MotorState {
    fn from(state: RunState) -> Self {
        match state {
            RunState::Stopped => MotorState::Stopped,
            RunState::Running => MotorState::Running,
        }
    }
}

/// Motor status
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusReport {
    pub state: MotorState,
    pub sector: u8, // Current commutation sector (0-5)
    pub duty: u16,  // Compare value applied to all three channels
}

impl From<DriveStatus> for StatusReport {
    fn from(status: DriveStatus) -> Self {
        Self {
            state: status.state.into(),
            sector: status.sector.as_u8(),
            duty: status.duty.ticks(),
        }
    }
}

impl StatusReport {
    /// Wire sector, `None` if the frame carries a value outside 0..=5
    pub fn sector(&self) -> Option<Sector> {
        Sector::from_index(self.sector)
    }

    /// Sector as three indicator bits, least significant first
    pub fn sector_pattern(&self) -> [bool; 3] {
        [
            self.sector & 0b001 != 0,
            self.sector & 0b010 != 0,
            self.sector & 0b100 != 0,
        ]
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Telemetry {
    Info(DeviceInfo),
    Status(StatusReport),
}

/// Serialize and COBS-frame `message` into `buf`, returning the used part
pub fn encode_frame<'a>(
    message: &Telemetry,
    buf: &'a mut [u8],
) -> Result<&'a mut [u8], postcard::Error> {
    postcard::to_slice_cobs(message, buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sixstep_commutation::DutyCycle;

    fn info() -> DeviceInfo {
        let mut hw = String::new();
        let mut sw = String::new();
        hw.push_str("B-G431B-ESC1").unwrap();
        sw.push_str("sixstep-0.1.0").unwrap();
        DeviceInfo {
            hw,
            sw,
            variant: DriveVariant::Throttle,
        }
    }

    #[test]
    fn test_frame_is_zero_terminated_and_decodes() {
        let message = Telemetry::Info(info());
        let mut buf = [0u8; MAX_FRAME_SIZE];
        let frame = encode_frame(&message, &mut buf).unwrap();
        assert_eq!(frame.last(), Some(&0));
        assert!(!frame[..frame.len() - 1].contains(&0));

        let decoded: Telemetry = postcard::from_bytes_cobs(frame).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_report_from_drive_status() {
        let report = StatusReport::from(DriveStatus {
            state: RunState::Running,
            sector: Sector::S5,
            duty: DutyCycle::new(32_500),
        });
        assert_eq!(
            report,
            StatusReport {
                state: MotorState::Running,
                sector: 5,
                duty: 32_500,
            }
        );
        assert_eq!(report.sector_pattern(), [true, false, true]);
        assert_eq!(report.sector(), Some(Sector::S5));
    }

    #[test]
    fn test_out_of_range_wire_sector() {
        let report = StatusReport {
            state: MotorState::Running,
            sector: 6,
            duty: 0,
        };
        assert_eq!(report.sector(), None);
    }

    #[test]
    fn test_buffer_too_small() {
        let mut buf = [0u8; 4];
        assert!(encode_frame(&Telemetry::Info(info()), &mut buf).is_err());
    }
}
