use std::sync::atomic::{AtomicU64, Ordering};

use faderlink_types::ControlRole;

use crate::gain::MAX_GAIN;
use crate::signal::Signal;

/// An observable scalar control owned by a route.
///
/// The value is stored as `f64` bits in an atomic so that any thread,
/// including the audio thread, can read it without locking. `changed`
/// carries no payload; subscribers re-read [`Controllable::value`].
pub struct Controllable {
    name: String,
    role: ControlRole,
    value: AtomicU64,
    pub changed: Signal<()>,
}

impl Controllable {
    pub fn new(name: impl Into<String>, role: ControlRole, initial: f64) -> Self {
        Self {
            name: name.into(),
            role,
            value: AtomicU64::new(normalize(role, initial).to_bits()),
            changed: Signal::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> ControlRole {
        self.role
    }

    pub fn value(&self) -> f64 {
        f64::from_bits(self.value.load(Ordering::Acquire))
    }

    /// Store a new value and notify subscribers if it changed.
    pub fn set_value(&self, value: f64) {
        let value = normalize(self.role, value);
        let previous = f64::from_bits(self.value.swap(value.to_bits(), Ordering::AcqRel));
        if previous != value {
            self.changed.emit(&());
        }
    }

    pub fn is_on(&self) -> bool {
        self.value() >= 0.5
    }

    pub fn set_on(&self, on: bool) {
        self.set_value(if on { 1.0 } else { 0.0 });
    }
}

fn normalize(role: ControlRole, value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    if role.is_toggle() {
        if value >= 0.5 {
            1.0
        } else {
            0.0
        }
    } else {
        value.clamp(0.0, MAX_GAIN)
    }
}

impl std::fmt::Debug for Controllable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controllable")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("value", &self.value())
            .finish()
    }
}
