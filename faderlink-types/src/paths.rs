//! OSC address paths exchanged with control surfaces.

pub const STRIP_NAME: &str = "/strip/name";
pub const STRIP_MUTE: &str = "/strip/mute";
pub const STRIP_SOLO: &str = "/strip/solo";
pub const STRIP_RECENABLE: &str = "/strip/recenable";
pub const STRIP_GAIN_ABS: &str = "/strip/gainabs";
pub const STRIP_GAIN_DB: &str = "/strip/gaindB";
pub const STRIP_FADER: &str = "/strip/fader";
pub const STRIP_FADER_1024: &str = "/strip/fader1024";

// Inbound only
pub const STRIP_BIND: &str = "/strip/bind";
pub const STRIP_UNBIND: &str = "/strip/unbind";
pub const SET_SURFACE_GAINMODE: &str = "/set_surface/gainmode";
