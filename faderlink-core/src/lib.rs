//! # faderlink-core
//!
//! Mirrors mixer-strip state to OSC control surfaces.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use faderlink_core::config::Config;
//! use faderlink_core::session::Session;
//! use faderlink_core::surface::OscSurface;
//! use faderlink_types::RouteKind;
//!
//! let session = Arc::new(Session::new());
//! session.add_route("Kick", RouteKind::AudioTrack);
//!
//! let surface = OscSurface::bind(Arc::clone(&session), Config::load().surface_settings())?;
//! loop {
//!     // peers send /strip/bind <id>, /set_surface/gainmode <n>, /strip/mute <id> <0|1>, ...
//!     surface.wait_and_poll(std::time::Duration::from_millis(100));
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`signal`] — `Signal`/`Connection` change notification
//! - [`controllable`], [`route`], [`session`] — the observable mixer model
//! - [`gain`] — dB and fader-position conversions
//! - [`encoder`] — strip value → OSC message
//! - [`peers`] — per-peer gain mode registry
//! - [`transport`] — outbound UDP transport
//! - [`dispatch`] — the OSC I/O thread that encodes and sends
//! - [`observer`] — `StripObserver`, one route mirrored to one peer
//! - [`surface`] — `OscSurface`, inbound commands and strip bindings
//! - [`config`] — TOML configuration (embedded defaults + user override)

pub mod config;
pub mod controllable;
pub mod dispatch;
pub mod encoder;
pub mod gain;
pub mod observer;
pub mod peers;
pub mod route;
pub mod session;
pub mod signal;
pub mod surface;
pub mod transport;

pub use dispatch::{DispatchHandle, Dispatcher, ObserverId, StripUpdate};
pub use encoder::StripValue;
pub use observer::StripObserver;
pub use peers::{PeerConfig, PeerRegistry};
pub use route::Route;
pub use session::Session;
pub use surface::{OscSurface, SurfaceSettings};
pub use transport::{Transport, UdpTransport};
