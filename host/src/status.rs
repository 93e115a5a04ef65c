//! Reassembles telemetry frames from the RTT "status" channel

use postcard::accumulator::{CobsAccumulator, FeedResult};
use sixstep_protocol::{MAX_FRAME_SIZE, MotorState, StatusReport, Telemetry};
use tracing::warn;

pub struct StatusStream {
    acc: CobsAccumulator<MAX_FRAME_SIZE>,
}

impl StatusStream {
    pub fn new() -> Self {
        Self { acc: CobsAccumulator::new() }
    }

    /// Feed raw channel bytes, returning every frame they complete.
    /// Frames may span several reads; broken frames are skipped.
    pub fn feed(&mut self, mut window: &[u8]) -> Vec<Telemetry> {
        let mut frames = Vec::new();
        while !window.is_empty() {
            window = match self.acc.feed::<Telemetry>(window) {
                FeedResult::Consumed => break,
                FeedResult::OverFull(new_w) => {
                    warn!("Status frame longer than {} bytes dropped", MAX_FRAME_SIZE);
                    new_w
                }
                FeedResult::DeserError(new_w) => {
                    warn!("Malformed status frame dropped");
                    new_w
                }
                FeedResult::Success { data, remaining } => {
                    frames.push(data);
                    remaining
                }
            };
        }
        frames
    }
}

/// One-line rendering, with the sector shown as the 3-bit indicator pattern
pub fn describe(report: &StatusReport) -> String {
    let state = match report.state {
        MotorState::Stopped => "stopped",
        MotorState::Running => "running",
    };
    let Some(sector) = report.sector() else {
        warn!("Status frame with invalid sector {}", report.sector);
        return format!("{state} sector=invalid({}) duty={}", report.sector, report.duty);
    };
    let bits: String = report
        .sector_pattern()
        .iter()
        .rev()
        .map(|&on| if on { '1' } else { '0' })
        .collect();
    format!("{state} sector={} [{bits}] duty={}", sector.as_u8(), report.duty)
}
