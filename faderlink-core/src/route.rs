use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use faderlink_types::{ControlRole, PropertyChange, RemoteControlId, RouteKind, RouteProperty};

use crate::controllable::Controllable;
use crate::signal::Signal;

/// A mixer channel as seen by control surfaces.
///
/// Shared as `Arc<Route>` by the session. Observers keep only a `Weak`
/// reference and check liveness each time they are notified.
pub struct Route {
    remote_id: AtomicU32,
    name: RwLock<String>,
    kind: RouteKind,
    mute: Arc<Controllable>,
    solo: Arc<Controllable>,
    gain: Arc<Controllable>,
    rec_enable: Option<Arc<Controllable>>,
    listening: AtomicU32,
    /// Batched attribute changes (name, remote id, ...).
    pub property_changed: Signal<PropertyChange>,
    /// Listen (AFL/PFL) state toggled; surfaces show it as solo.
    pub listen_changed: Signal<()>,
}

impl Route {
    pub fn new(remote_id: RemoteControlId, name: impl Into<String>, kind: RouteKind) -> Self {
        Self {
            remote_id: AtomicU32::new(remote_id.get()),
            name: RwLock::new(name.into()),
            kind,
            mute: Arc::new(Controllable::new("mute", ControlRole::Mute, 0.0)),
            solo: Arc::new(Controllable::new("solo", ControlRole::Solo, 0.0)),
            gain: Arc::new(Controllable::new("gain", ControlRole::Gain, 1.0)),
            rec_enable: kind
                .is_track()
                .then(|| Arc::new(Controllable::new("recenable", ControlRole::RecEnable, 0.0))),
            listening: AtomicU32::new(0),
            property_changed: Signal::new(),
            listen_changed: Signal::new(),
        }
    }

    pub fn remote_control_id(&self) -> RemoteControlId {
        RemoteControlId::new(self.remote_id.load(Ordering::Acquire))
    }

    pub fn set_remote_control_id(&self, id: RemoteControlId) {
        if self.store_remote_control_id(id) {
            self.property_changed.emit(&RouteProperty::RemoteControlId.into());
        }
    }

    /// Change the id without notifying. Returns true if it changed.
    pub(crate) fn store_remote_control_id(&self, id: RemoteControlId) -> bool {
        self.remote_id.swap(id.get(), Ordering::AcqRel) != id.get()
    }

    pub fn name(&self) -> String {
        match self.name.read() {
            Ok(name) => name.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set_name(&self, name: impl Into<String>) {
        let name = name.into();
        let changed = match self.name.write() {
            Ok(mut current) => {
                let changed = *current != name;
                *current = name;
                changed
            }
            Err(_) => false,
        };
        if changed {
            self.property_changed.emit(&RouteProperty::Name.into());
        }
    }

    pub fn kind(&self) -> RouteKind {
        self.kind
    }

    pub fn is_track(&self) -> bool {
        self.kind.is_track()
    }

    pub fn mute_control(&self) -> &Arc<Controllable> {
        &self.mute
    }

    pub fn solo_control(&self) -> &Arc<Controllable> {
        &self.solo
    }

    pub fn gain_control(&self) -> &Arc<Controllable> {
        &self.gain
    }

    /// Present only on track routes.
    pub fn rec_enable_control(&self) -> Option<&Arc<Controllable>> {
        self.rec_enable.as_ref()
    }

    pub fn control(&self, role: ControlRole) -> Option<&Arc<Controllable>> {
        match role {
            ControlRole::Mute => Some(&self.mute),
            ControlRole::Solo => Some(&self.solo),
            ControlRole::Gain => Some(&self.gain),
            ControlRole::RecEnable => self.rec_enable.as_ref(),
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Acquire) != 0
    }

    pub fn set_listen(&self, on: bool) {
        let previous = self.listening.swap(on as u32, Ordering::AcqRel);
        if previous != on as u32 {
            self.listen_changed.emit(&());
        }
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("remote_id", &self.remote_control_id())
            .field("name", &self.name())
            .field("kind", &self.kind)
            .finish()
    }
}
