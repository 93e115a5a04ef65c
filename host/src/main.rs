use anyhow::{Context, Result};
use defmt_decoder::{DecodeError, StreamDecoder, Table};
use probe_rs::Permissions;
use probe_rs::probe::Probe;
use probe_rs::probe::list::Lister;
use probe_rs::rtt::{Rtt, ScanRegion};
use sixstep_protocol::Telemetry;
use std::fs;
use std::time::Duration;
use tracing::{error, info};

mod config;
use config::HostConfig;

mod status;
use status::StatusStream;

fn init_tracing() {
    // Default INFO; allow override via RUST_LOG
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .compact()
        .try_init();
}

/// Open the configured probe, otherwise the first one found
fn open_probe(cfg: &HostConfig) -> Result<Probe> {
    let lister = Lister::new();
    let probes = lister.list_all();

    if probes.is_empty() {
        error!("No debug probes found! Make sure ST-Link is connected.");
        return Err(anyhow::anyhow!("No probes found"));
    }

    info!("Found {} probe(s)", probes.len());

    match cfg.probe_filter() {
        Some(filter) => {
            let chosen = probes
                .iter()
                .find(|p| filter.matches(p.vendor_id, p.product_id, p.serial_number.as_deref()))
                .ok_or_else(|| anyhow::anyhow!("Configured probe not found: {:?}", cfg.probe))?;
            chosen.open().context("Failed to open selected probe")
        }
        None => probes[0].open().context("Failed to open probe"),
    }
}

fn log_telemetry(message: &Telemetry) {
    match message {
        Telemetry::Info(info) => {
            info!(
                "Device: hw='{}' sw='{}' variant={:?}",
                info.hw.as_str(),
                info.sw.as_str(),
                info.variant
            );
        }
        Telemetry::Status(report) => info!("Status: {}", status::describe(report)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cfg = HostConfig::load()?;

    info!("Sixstep Host - RTT (chip={:?}, probe={:?})", cfg.chip, cfg.probe);

    let probe = open_probe(&cfg)?;

    // Attach to the target (auto-detect by default, or explicit chip)
    let ts = match cfg.chip.clone() {
        Some(name) => probe_rs::config::TargetSelector::from(name),
        None => probe_rs::config::TargetSelector::Auto,
    };
    let mut session = probe
        .attach(ts, Permissions::default())
        .context("Failed to attach to target")?;

    let mut core = session.core(0)?;

    // Set up RTT - scan entire RAM
    let mut rtt = Rtt::attach_region(&mut core, &ScanRegion::Ram)
        .context("Failed to attach RTT")?;

    info!("RTT attached successfully");
    for (idx, channel) in rtt.up_channels().iter().enumerate() {
        info!("  up{}: {}", idx, channel.name().unwrap_or("unnamed"));
    }

    // Find well-known channels by name
    let mut find_by_name = |name: &str| -> Option<usize> {
        rtt.up_channels()
            .iter()
            .position(|ch| ch.name() == Some(name))
    };
    let status_up_idx = if cfg.stream_status() { find_by_name("status").or(Some(1)) } else { None };
    let defmt_up_idx = if cfg.stream_defmt() { find_by_name("defmt").or(Some(0)) } else { None };
    info!("Using channels: status={:?}, defmt={:?}", status_up_idx, defmt_up_idx);

    // Prepare defmt decoder (ELF path)
    let default_elf = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../device/target/thumbv7em-none-eabihf/release/sixstep");
    let defmt_table: Option<Table> = if defmt_up_idx.is_some() {
        let elf_path = cfg.elf.clone().unwrap_or(default_elf);
        let elf_bytes = fs::read(&elf_path)
            .with_context(|| format!("Failed to read ELF at {}", elf_path.display()))?;
        Some(
            Table::parse(&elf_bytes)
                .context("Parsing defmt table from ELF failed")?
                .ok_or_else(|| anyhow::anyhow!("No .defmt section in ELF; build device with defmt"))?,
        )
    } else { None };
    let mut defmt_stream: Option<Box<dyn StreamDecoder + Send + Sync + '_>> = defmt_table
        .as_ref()
        .map(|t| t.new_stream_decoder());

    let mut status_stream = StatusStream::new();
    let mut buf = vec![0u8; 1024];
    let mut defbuf = vec![0u8; 2048];

    loop {
        // Read STATUS channel (COBS-framed telemetry)
        if let Some(up_idx) = status_up_idx
            && let Some(channel) = rtt.up_channels().get_mut(up_idx)
        {
            let count = channel.read(&mut core, &mut buf)?;
            for message in status_stream.feed(&buf[..count]) {
                log_telemetry(&message);
            }
        }
        // Read DEFMT channel and decode
        if let (Some(up_idx), Some(stream)) = (defmt_up_idx, defmt_stream.as_mut())
            && let Some(channel) = rtt.up_channels().get_mut(up_idx)
        {
            let count = channel.read(&mut core, &mut defbuf)?;
            if count > 0 {
                stream.received(&defbuf[..count]);
                loop {
                    match stream.decode() {
                        Ok(frame) => {
                            println!("{}", frame.display(true));
                        }
                        Err(DecodeError::UnexpectedEof) => break,
                        Err(DecodeError::Malformed) => { error!("Malformed defmt frame"); break; }
                    }
                }
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
