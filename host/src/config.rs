use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::{env, fs};
use tracing::debug;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "SIXSTEP_HOST_CONFIG";
/// Looked up in the working directory when `CONFIG_ENV` is unset
pub const CONFIG_FILE: &str = "sixstep-host.toml";

/// Monitor settings; every field is optional
#[derive(Debug, Default, Deserialize, Clone)]
pub struct HostConfig {
    /// `VID:PID[:SERIAL]`, e.g. "0483:374b"
    pub probe: Option<String>,
    /// probe-rs target name, e.g. "STM32G431CBUx"; auto-detected if unset
    pub chip: Option<String>,
    /// Firmware ELF holding the .defmt table
    pub elf: Option<PathBuf>,
    pub stream_defmt: Option<bool>,
    pub stream_status: Option<bool>,
}

impl HostConfig {
    /// The file named by [`CONFIG_ENV`], otherwise [`CONFIG_FILE`] if present,
    /// otherwise defaults. A file that exists but cannot be read or parsed is
    /// an error.
    pub fn load() -> Result<Self> {
        let path = match env::var_os(CONFIG_ENV) {
            Some(path) => PathBuf::from(path),
            None => {
                let local = PathBuf::from(CONFIG_FILE);
                if !local.exists() {
                    debug!("No {} in working directory, using defaults", CONFIG_FILE);
                    return Ok(Self::default());
                }
                local
            }
        };
        Self::from_path(&path)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Failed to parse config {}", path.display()))
    }

    pub fn stream_defmt(&self) -> bool { self.stream_defmt.unwrap_or(true) }
    pub fn stream_status(&self) -> bool { self.stream_status.unwrap_or(true) }

    pub fn probe_filter(&self) -> Option<ProbeFilter> {
        self.probe.as_deref().map(ProbeFilter::parse)
    }
}

/// `VID:PID[:SERIAL]` selector, VID and PID in hex. Missing or unparsable
/// parts match any probe.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProbeFilter {
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
    pub serial: Option<String>,
}

impl ProbeFilter {
    pub fn parse(sel: &str) -> Self {
        let mut parts = sel.split(':');
        let hex = |v: Option<&str>| v.and_then(|v| u16::from_str_radix(v, 16).ok());
        Self {
            vendor_id: hex(parts.next()),
            product_id: hex(parts.next()),
            serial: parts.next().map(str::to_owned),
        }
    }

    pub fn matches(&self, vendor_id: u16, product_id: u16, serial: Option<&str>) -> bool {
        let ok_vid = self.vendor_id.map(|v| v == vendor_id).unwrap_or(true);
        let ok_pid = self.product_id.map(|v| v == product_id).unwrap_or(true);
        let ok_ser = self.serial.as_deref().map(|s| serial == Some(s)).unwrap_or(true);
        ok_vid && ok_pid && ok_ser
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml() {
        let cfg: HostConfig = toml::from_str(
            r#"
            probe = "0483:374b"
            chip = "STM32G431CBUx"
            stream_defmt = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.chip.as_deref(), Some("STM32G431CBUx"));
        assert!(!cfg.stream_defmt());
        assert!(cfg.stream_status());
        assert!(cfg.elf.is_none());
    }

    #[test]
    fn test_empty_config_streams_everything() {
        let cfg: HostConfig = toml::from_str("").unwrap();
        assert!(cfg.stream_defmt());
        assert!(cfg.stream_status());
        assert!(cfg.probe_filter().is_none());
    }

    #[test]
    fn test_from_path() {
        let dir = env::temp_dir().join(format!("sixstep-host-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let good = dir.join("good.toml");
        fs::write(&good, "elf = \"fw.elf\"\nstream_status = false\n").unwrap();
        let cfg = HostConfig::from_path(&good).unwrap();
        assert_eq!(cfg.elf.as_deref(), Some(Path::new("fw.elf")));
        assert!(!cfg.stream_status());

        let bad = dir.join("bad.toml");
        fs::write(&bad, "stream_status = \"yes\"\n").unwrap();
        let err = HostConfig::from_path(&bad).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));

        assert!(HostConfig::from_path(&dir.join("missing.toml")).is_err());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_probe_filter() {
        let filter = ProbeFilter::parse("0483:374b:ABC123");
        assert_eq!(filter.vendor_id, Some(0x0483));
        assert_eq!(filter.product_id, Some(0x374b));
        assert!(filter.matches(0x0483, 0x374b, Some("ABC123")));
        assert!(!filter.matches(0x0483, 0x374b, Some("OTHER")));
        assert!(!filter.matches(0x0483, 0x374b, None));
        assert!(!filter.matches(0x1366, 0x374b, Some("ABC123")));

        let any_serial = ProbeFilter::parse("0483:374b");
        assert!(any_serial.matches(0x0483, 0x374b, None));
        assert!(ProbeFilter::parse("").matches(0x1366, 0x0101, None));
    }
}
