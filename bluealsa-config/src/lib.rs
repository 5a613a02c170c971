//! # bluealsa-config
//!
//! Daemon-wide configuration for `bluealsa-daemon`: which profiles are
//! advertised, per-codec tuning knobs, and the keep-alive/mixer timing
//! parameters the core (`bluealsa-core`) needs but spec §1 places outside
//! its scope ("configuration/CLI parsing" is an external collaborator).
//!
//! Configuration is loaded from a YAML file (falling back to
//! [`Config::default`] if none is found) with a handful of environment
//! variable overrides for the knobs operators most commonly need to flip
//! without editing a file.
//!
//! ```no_run
//! use bluealsa_config::Config;
//!
//! let config = Config::load_or_default(None)?;
//! println!("a2dp keep-alive: {:?}", config.keep_alive.a2dp);
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

const ENV_CONFIG_PATH: &str = "BLUEALSA_CONFIG";
const ENV_CONTROL_SOCKET: &str = "BLUEALSA_SOCKET";

/// Top-level daemon configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path of the control Unix socket clients connect to for PCM I/O.
    pub control_socket: PathBuf,
    /// Profiles the daemon advertises / accepts.
    pub profiles: ProfileConfig,
    /// Per-codec tuning.
    pub codecs: CodecConfig,
    /// Keep-alive grace periods per §4.7's transport FSM.
    pub keep_alive: KeepAliveConfig,
    /// Multi-client mixer (C9) settings; `None` disables the mixer and
    /// restricts each endpoint to a single local client.
    pub mixer: Option<MixerConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            control_socket: PathBuf::from("/run/bluealsa/control"),
            profiles: ProfileConfig::default(),
            codecs: CodecConfig::default(),
            keep_alive: KeepAliveConfig::default(),
            mixer: Some(MixerConfig::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub a2dp_source: bool,
    pub a2dp_sink: bool,
    pub hfp_ag: bool,
    pub hfp_hf: bool,
    pub hsp_ag: bool,
    pub hsp_hs: bool,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        ProfileConfig {
            a2dp_source: true,
            a2dp_sink: true,
            hfp_ag: true,
            hfp_hf: false,
            hsp_ag: true,
            hsp_hs: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// SBC bit-pool quality preset, 1 (low) .. 5 (highest).
    pub sbc_quality: u8,
    /// LDAC initial encoder quality mode index, 0 (high) .. 2 (low), per
    /// spec §4.8's EQMID field.
    pub ldac_eqmid: u8,
    /// Whether the LDAC adaptive-bitrate loop (spec §4.8, §8 S2) is active.
    pub ldac_abr: bool,
    /// AAC target bitrate in bits/second.
    pub aac_bitrate: u32,
}

impl Default for CodecConfig {
    fn default() -> Self {
        CodecConfig {
            sbc_quality: 4,
            ldac_eqmid: 0,
            ldac_abr: true,
            aac_bitrate: 256_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepAliveConfig {
    #[serde(with = "duration_secs")]
    pub a2dp: Duration,
    #[serde(with = "duration_secs")]
    pub sco: Duration,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        // Real BlueALSA keeps an A2DP transport acquired for a few seconds
        // after the last client disconnects, so a quick reopen (e.g. track
        // skip in the client app) doesn't pay the acquire-RPC cost again.
        // SCO has no such grace: releasing it drops the call's audio path.
        KeepAliveConfig {
            a2dp: Duration::from_secs(5),
            sco: Duration::from_secs(0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Number of periods held in the shared mix ring.
    pub periods: usize,
    /// Per-client pre-buffer threshold, in periods, before a playback client
    /// is promoted from buffering to `RUNNING` (spec §4.9).
    pub prebuffer_periods: usize,
    /// Drain completion timeout, spec §4.9 / §8 property 10.
    #[serde(with = "duration_millis")]
    pub drain_timeout: Duration,
}

impl Default for MixerConfig {
    fn default() -> Self {
        MixerConfig {
            periods: 16,
            prebuffer_periods: 2,
            drain_timeout: Duration::from_millis(400),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from `$BLUEALSA_CONFIG`, or fall
    /// back to built-in defaults if neither is present.
    pub fn load_or_default(path: Option<&Path>) -> Result<Config> {
        let resolved = path
            .map(PathBuf::from)
            .or_else(|| std::env::var_os(ENV_CONFIG_PATH).map(PathBuf::from));

        let mut config = match resolved {
            Some(path) if path.exists() => {
                info!(path = %path.display(), "loading configuration");
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_yaml::from_str(&text)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            Some(path) => {
                warn!(path = %path.display(), "configuration file not found, using defaults");
                Config::default()
            }
            None => Config::default(),
        };

        if let Some(sock) = std::env::var_os(ENV_CONTROL_SOCKET) {
            config.control_socket = PathBuf::from(sock);
        }

        Ok(config)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert!(config.profiles.a2dp_source);
        assert_eq!(config.keep_alive.sco, Duration::ZERO);
        assert_eq!(config.mixer.unwrap().drain_timeout, Duration::from_millis(400));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bluealsa.yaml");
        std::fs::write(
            &path,
            "control_socket: /tmp/custom.sock\ncodecs:\n  sbc_quality: 2\n",
        )
        .unwrap();

        let config = Config::load_or_default(Some(&path)).unwrap();
        assert_eq!(config.control_socket, PathBuf::from("/tmp/custom.sock"));
        assert_eq!(config.codecs.sbc_quality, 2);
        // Untouched sections keep their defaults.
        assert!(config.profiles.a2dp_sink);
    }

    #[test]
    fn missing_path_falls_back_to_defaults() {
        let config = Config::load_or_default(Some(Path::new("/nonexistent/bluealsa.yaml"))).unwrap();
        assert_eq!(config, Config::default());
    }
}
