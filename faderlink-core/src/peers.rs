//! Per-peer surface settings, looked up by endpoint.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, RwLock};

use faderlink_types::GainMode;

/// Settings a remote surface has chosen for itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerConfig {
    pub gain_mode: GainMode,
}

/// Shared endpoint → [`PeerConfig`] map.
///
/// Read on every outbound gain message, written only when a peer
/// reconfigures itself, so a plain `RwLock` is enough. Cloning shares the
/// same map.
#[derive(Clone, Default)]
pub struct PeerRegistry {
    peers: Arc<RwLock<HashMap<SocketAddr, PeerConfig>>>,
    default_mode: GainMode,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry whose unknown peers get `mode` instead of absolute.
    pub fn with_default(mode: GainMode) -> Self {
        Self {
            peers: Arc::default(),
            default_mode: mode,
        }
    }

    pub fn default_gain_mode(&self) -> GainMode {
        self.default_mode
    }

    /// Gain mode for `endpoint`, the registry default if unknown.
    pub fn gain_mode(&self, endpoint: SocketAddr) -> GainMode {
        self.get(endpoint).map(|c| c.gain_mode).unwrap_or(self.default_mode)
    }

    pub fn get(&self, endpoint: SocketAddr) -> Option<PeerConfig> {
        let key = canonical(endpoint);
        match self.peers.read() {
            Ok(peers) => peers.get(&key).copied(),
            Err(poisoned) => poisoned.into_inner().get(&key).copied(),
        }
    }

    pub fn set_gain_mode(&self, endpoint: SocketAddr, mode: GainMode) {
        self.update(endpoint, |config| config.gain_mode = mode);
        log::info!(target: "surface", "peer {} gain mode -> {:?}", endpoint, mode);
    }

    pub fn update(&self, endpoint: SocketAddr, f: impl FnOnce(&mut PeerConfig)) {
        let key = canonical(endpoint);
        let mut peers = match self.peers.write() {
            Ok(peers) => peers,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(peers.entry(key).or_default());
    }

    pub fn remove(&self, endpoint: SocketAddr) -> Option<PeerConfig> {
        let key = canonical(endpoint);
        match self.peers.write() {
            Ok(mut peers) => peers.remove(&key),
            Err(poisoned) => poisoned.into_inner().remove(&key),
        }
    }

    pub fn len(&self) -> usize {
        match self.peers.read() {
            Ok(peers) => peers.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// IPv4-mapped IPv6 addresses compare equal to their IPv4 form.
fn canonical(endpoint: SocketAddr) -> SocketAddr {
    match endpoint.ip() {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => SocketAddr::new(IpAddr::V4(v4), endpoint.port()),
            None => endpoint,
        },
        IpAddr::V4(_) => endpoint,
    }
}
