//! # faderlink-types
//!
//! Shared type definitions for faderlink: route identifiers, route kinds,
//! property change sets, gain display modes and the OSC paths used on the
//! wire. Used by faderlink-core and faderlink-cli.

pub mod paths;

use serde::{Deserialize, Serialize};

/// Stable identifier of a route as seen by external control surfaces.
///
/// Independent of the route's object identity; reordering the session
/// renumbers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteControlId(u32);

impl RemoteControlId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Value sent as the leading int32 of every strip message.
    pub fn wire(self) -> i32 {
        self.0 as i32
    }
}

impl std::fmt::Display for RemoteControlId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of channel a route is. Only tracks carry a record-enable control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteKind {
    AudioTrack,
    MidiTrack,
    Bus,
    Master,
}

impl RouteKind {
    pub fn is_track(self) -> bool {
        matches!(self, RouteKind::AudioTrack | RouteKind::MidiTrack)
    }
}

/// Scalar controls a route exposes to surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlRole {
    Mute,
    Solo,
    Gain,
    RecEnable,
}

impl ControlRole {
    pub fn name(self) -> &'static str {
        match self {
            ControlRole::Mute => "mute",
            ControlRole::Solo => "solo",
            ControlRole::Gain => "gain",
            ControlRole::RecEnable => "recenable",
        }
    }

    /// Toggle controls only ever hold 0.0 or 1.0.
    pub fn is_toggle(self) -> bool {
        !matches!(self, ControlRole::Gain)
    }
}

/// Route attributes reported through the route's property-changed signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteProperty {
    Name,
    RemoteControlId,
    Comment,
    Active,
}

impl RouteProperty {
    fn bit(self) -> u8 {
        match self {
            RouteProperty::Name => 1 << 0,
            RouteProperty::RemoteControlId => 1 << 1,
            RouteProperty::Comment => 1 << 2,
            RouteProperty::Active => 1 << 3,
        }
    }
}

/// A batch of changed route attributes, delivered in one notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropertyChange {
    bits: u8,
}

impl PropertyChange {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, property: RouteProperty) {
        self.bits |= property.bit();
    }

    pub fn with(mut self, property: RouteProperty) -> Self {
        self.insert(property);
        self
    }

    pub fn contains(&self, property: RouteProperty) -> bool {
        self.bits & property.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }
}

impl From<RouteProperty> for PropertyChange {
    fn from(property: RouteProperty) -> Self {
        PropertyChange::none().with(property)
    }
}

/// How a peer wants gain values encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GainMode {
    /// Raw linear coefficient on `/strip/gainabs`.
    #[default]
    Absolute,
    /// Decibels on `/strip/gaindB`.
    #[serde(alias = "decibel")]
    Db,
    /// Normalized fader position on `/strip/fader`.
    Fader,
    /// Fader position scaled to 0..1023 on `/strip/fader1024`.
    Fader1024,
}

impl GainMode {
    /// Numeric selector used by `/set_surface/gainmode`. Unknown values
    /// fall back to [`GainMode::Absolute`].
    pub fn from_wire(value: i32) -> Self {
        match value {
            1 => GainMode::Db,
            2 => GainMode::Fader,
            3 => GainMode::Fader1024,
            _ => GainMode::Absolute,
        }
    }

    pub fn to_wire(self) -> i32 {
        match self {
            GainMode::Absolute => 0,
            GainMode::Db => 1,
            GainMode::Fader => 2,
            GainMode::Fader1024 => 3,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "absolute" | "abs" => Some(GainMode::Absolute),
            "db" | "decibel" => Some(GainMode::Db),
            "fader" => Some(GainMode::Fader),
            "fader1024" | "int1024" => Some(GainMode::Fader1024),
            _ => None,
        }
    }
}
