use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use faderlink_types::GainMode;

use crate::surface::{SurfaceSettings, DEFAULT_LISTEN_PORT, DEFAULT_QUEUE_CAPACITY};

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    surface: SurfaceConfig,
    #[serde(default)]
    peers: Option<Vec<PeerEntry>>,
}

#[derive(Deserialize, Default)]
struct SurfaceConfig {
    listen_port: Option<u16>,
    listen_address: Option<String>,
    default_gain_mode: Option<String>,
    queue_capacity: Option<usize>,
}

#[derive(Deserialize, Clone)]
struct PeerEntry {
    address: String,
    #[serde(default)]
    gain_mode: Option<String>,
}

pub struct Config {
    surface: SurfaceConfig,
    peers: Vec<PeerEntry>,
}

impl Config {
    /// Embedded defaults merged with the user's config file, if any.
    pub fn load() -> Self {
        Self::load_with_user(user_config_path().as_deref())
    }

    pub fn load_with_user(path: Option<&Path>) -> Self {
        let mut base: ConfigFile = match toml::from_str(DEFAULT_CONFIG) {
            Ok(base) => base,
            Err(e) => {
                log::error!(target: "config", "embedded config.toml is invalid: {}", e);
                ConfigFile::default()
            }
        };

        if let Some(path) = path {
            if path.exists() {
                match std::fs::read_to_string(path) {
                    Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                        Ok(user) => {
                            merge_surface(&mut base.surface, user.surface);
                            if user.peers.is_some() {
                                base.peers = user.peers;
                            }
                        }
                        Err(e) => {
                            log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                        }
                    },
                    Err(e) => {
                        log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
                    }
                }
            }
        }

        Config {
            surface: base.surface,
            peers: base.peers.unwrap_or_default(),
        }
    }

    pub fn listen_port(&self) -> u16 {
        self.surface.listen_port.unwrap_or(DEFAULT_LISTEN_PORT)
    }

    pub fn listen_address(&self) -> IpAddr {
        self.surface
            .listen_address
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }

    /// Gain mode for peers without their own; unknown names fall back to absolute.
    pub fn default_gain_mode(&self) -> GainMode {
        match self.surface.default_gain_mode.as_deref() {
            None => GainMode::Absolute,
            Some(name) => GainMode::parse(name).unwrap_or_else(|| {
                log::warn!(target: "config", "unknown default_gain_mode {:?}, using absolute", name);
                GainMode::Absolute
            }),
        }
    }

    /// Outbound queue depth (clamped to 16..65536).
    pub fn queue_capacity(&self) -> usize {
        self.surface
            .queue_capacity
            .unwrap_or(DEFAULT_QUEUE_CAPACITY)
            .clamp(16, 65_536)
    }

    /// Preconfigured peers. Entries with an unparsable address are skipped;
    /// a missing or unknown gain mode falls back to the default.
    pub fn peers(&self) -> Vec<(SocketAddr, GainMode)> {
        self.peers
            .iter()
            .filter_map(|entry| match entry.address.parse::<SocketAddr>() {
                Ok(addr) => {
                    let mode = entry
                        .gain_mode
                        .as_deref()
                        .and_then(GainMode::parse)
                        .unwrap_or_else(|| self.default_gain_mode());
                    Some((addr, mode))
                }
                Err(e) => {
                    log::warn!(target: "config", "skipping peer {:?}: {}", entry.address, e);
                    None
                }
            })
            .collect()
    }

    pub fn surface_settings(&self) -> SurfaceSettings {
        SurfaceSettings {
            listen_addr: SocketAddr::new(self.listen_address(), self.listen_port()),
            queue_capacity: self.queue_capacity(),
            default_gain_mode: self.default_gain_mode(),
            peers: self.peers(),
        }
    }
}

pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("faderlink").join("config.toml"))
}

fn merge_surface(base: &mut SurfaceConfig, user: SurfaceConfig) {
    if user.listen_port.is_some() {
        base.listen_port = user.listen_port;
    }
    if user.listen_address.is_some() {
        base.listen_address = user.listen_address;
    }
    if user.default_gain_mode.is_some() {
        base.default_gain_mode = user.default_gain_mode;
    }
    if user.queue_capacity.is_some() {
        base.queue_capacity = user.queue_capacity;
    }
}
