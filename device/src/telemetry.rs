//! Status frames on the RTT "status" up channel

use rtt_target::UpChannel;
use sixstep_protocol::{MAX_FRAME_SIZE, Telemetry, encode_frame};

pub struct TelemetryWriter {
    channel: &'static mut UpChannel,
}

impl TelemetryWriter {
    pub fn new(channel: &'static mut UpChannel) -> Self {
        Self { channel }
    }

    /// Write one frame. The channel runs in NoBlockSkip mode, so a frame that
    /// does not fit is dropped whole and the host never sees a partial one.
    pub fn send(&mut self, message: &Telemetry) {
        let mut buf = [0u8; MAX_FRAME_SIZE];
        match encode_frame(message, &mut buf) {
            Ok(frame) => {
                if self.channel.write(frame) == 0 {
                    defmt::trace!("Telemetry frame skipped, host not draining");
                }
            }
            Err(_) => defmt::warn!("Telemetry frame exceeds {} bytes", MAX_FRAME_SIZE),
        }
    }
}
