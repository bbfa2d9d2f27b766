//! Per-strip mirror of a route's state onto one OSC peer.
//!
//! A [`StripObserver`] subscribes to a route's name, mute, solo, gain and
//! (for tracks) record-enable, sends each current value once on creation,
//! then one message per change. Handlers hold only weak references and go
//! quiet once the route is gone.

use std::net::SocketAddr;
use std::sync::{Arc, Weak};

use faderlink_types::{PropertyChange, RouteProperty};

use crate::controllable::Controllable;
use crate::dispatch::{DispatchHandle, ObserverId, StripUpdate};
use crate::encoder::StripValue;
use crate::route::Route;
use crate::signal::Connection;
use crate::transport::Transport;

pub struct StripObserver {
    route: Weak<Route>,
    endpoint: SocketAddr,
    observer: ObserverId,
    dispatch: DispatchHandle,
    name_changed: Connection,
    mute_changed: Connection,
    solo_changed: Connection,
    listen_changed: Connection,
    gain_changed: Connection,
    rec_changed: Connection,
    closed: bool,
}

impl StripObserver {
    /// Bind `route` to the peer behind `transport` and send its current state.
    ///
    /// The transport becomes owned by the I/O thread until [`close`](Self::close).
    pub fn new(
        route: &Arc<Route>,
        transport: Box<dyn Transport>,
        dispatch: &DispatchHandle,
    ) -> Result<Self, String> {
        let endpoint = transport.endpoint();
        let observer = dispatch.register(transport)?;
        let weak_route = Arc::downgrade(route);

        let name_changed = {
            let weak = weak_route.clone();
            let dispatch = dispatch.clone();
            route.property_changed.connect(move |change: &PropertyChange| {
                if change.contains(RouteProperty::Name) {
                    if let Some(update) = name_update(&weak, observer) {
                        dispatch.push(update);
                    }
                }
            })
        };
        send_now(dispatch, name_update(&weak_route, observer))?;

        let rec_changed = match route.rec_enable_control() {
            Some(rec) => {
                let conn = watch(&weak_route, rec, StripValue::RecEnable, observer, dispatch);
                send_now(dispatch, value_update(&weak_route, rec, StripValue::RecEnable, observer))?;
                conn
            }
            None => Connection::empty(),
        };

        let mute = route.mute_control();
        let mute_changed = watch(&weak_route, mute, StripValue::Mute, observer, dispatch);
        send_now(dispatch, value_update(&weak_route, mute, StripValue::Mute, observer))?;

        let solo = route.solo_control();
        let solo_changed = watch(&weak_route, solo, StripValue::Solo, observer, dispatch);
        let listen_changed = {
            let weak = weak_route.clone();
            let weak_solo = Arc::downgrade(solo);
            let dispatch = dispatch.clone();
            route.listen_changed.connect(move |_| {
                let Some(solo) = weak_solo.upgrade() else {
                    return;
                };
                if let Some(update) = value_update(&weak, &solo, StripValue::Solo, observer) {
                    dispatch.push(update);
                }
            })
        };
        send_now(dispatch, value_update(&weak_route, solo, StripValue::Solo, observer))?;

        let gain = route.gain_control();
        let gain_changed = watch(&weak_route, gain, StripValue::Gain, observer, dispatch);
        send_now(dispatch, value_update(&weak_route, gain, StripValue::Gain, observer))?;

        log::debug!(target: "surface", "strip {} ({}) bound to {}", route.remote_control_id(), route.name(), endpoint);

        Ok(Self {
            route: weak_route,
            endpoint,
            observer,
            dispatch: dispatch.clone(),
            name_changed,
            mute_changed,
            solo_changed,
            listen_changed,
            gain_changed,
            rec_changed,
            closed: false,
        })
    }

    /// The route, if it still exists.
    pub fn route(&self) -> Option<Arc<Route>> {
        self.route.upgrade()
    }

    pub fn is_bound_to(&self, route: &Arc<Route>) -> bool {
        Weak::ptr_eq(&self.route, &Arc::downgrade(route))
    }

    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    pub fn id(&self) -> ObserverId {
        self.observer
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of watched properties (solo and listen count as one).
    pub fn subscription_count(&self) -> usize {
        [
            &self.name_changed,
            &self.mute_changed,
            &self.solo_changed,
            &self.gain_changed,
            &self.rec_changed,
        ]
        .iter()
        .filter(|c| c.is_connected())
        .count()
    }

    pub fn watches_rec_enable(&self) -> bool {
        self.rec_changed.is_connected()
    }

    /// Resend the gain, e.g. after the peer switched gain mode.
    pub fn refresh_gain(&self) {
        if self.closed {
            return;
        }
        if let Some(route) = self.route.upgrade() {
            self.resend(route.gain_control(), StripValue::Gain);
        }
    }

    /// Resend every watched property.
    pub fn refresh(&self) {
        if self.closed {
            return;
        }
        let Some(route) = self.route.upgrade() else {
            return;
        };
        self.deliver(name_update(&self.route, self.observer));
        if let Some(rec) = route.rec_enable_control() {
            self.resend(rec, StripValue::RecEnable);
        }
        self.resend(route.mute_control(), StripValue::Mute);
        self.resend(route.solo_control(), StripValue::Solo);
        self.resend(route.gain_control(), StripValue::Gain);
    }

    fn resend(&self, control: &Arc<Controllable>, wrap: fn(f64) -> StripValue) {
        self.deliver(value_update(&self.route, control, wrap, self.observer));
    }

    fn deliver(&self, update: Option<StripUpdate>) {
        if let Err(e) = send_now(&self.dispatch, update) {
            log::warn!(target: "surface", "resend to {} failed: {}", self.endpoint, e);
        }
    }

    /// Unsubscribe everything, then release the transport.
    ///
    /// Returns once the I/O thread has dropped the transport; nothing is
    /// sent for this observer afterwards. Safe to call more than once.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.name_changed.disconnect();
        self.rec_changed.disconnect();
        self.mute_changed.disconnect();
        self.solo_changed.disconnect();
        self.listen_changed.disconnect();
        self.gain_changed.disconnect();
        // Every handler has returned, so the release lands behind all of
        // this observer's queued updates.
        if let Err(e) = self.dispatch.release(self.observer) {
            log::debug!(target: "surface", "release of observer {}: {}", self.observer, e);
        }
        self.closed = true;
        log::debug!(target: "surface", "observer {} for {} closed", self.observer, self.endpoint);
    }
}

impl Drop for StripObserver {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for StripObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripObserver")
            .field("observer", &self.observer)
            .field("endpoint", &self.endpoint)
            .field("closed", &self.closed)
            .finish()
    }
}

fn watch(
    route: &Weak<Route>,
    control: &Arc<Controllable>,
    wrap: fn(f64) -> StripValue,
    observer: ObserverId,
    dispatch: &DispatchHandle,
) -> Connection {
    let route = route.clone();
    let weak_control = Arc::downgrade(control);
    let dispatch = dispatch.clone();
    control.changed.connect(move |_| {
        let Some(control) = weak_control.upgrade() else {
            return;
        };
        if let Some(update) = value_update(&route, &control, wrap, observer) {
            dispatch.push(update);
        }
    })
}

/// Current value of `control`, addressed by the route's id as of now.
fn value_update(
    route: &Weak<Route>,
    control: &Controllable,
    wrap: fn(f64) -> StripValue,
    observer: ObserverId,
) -> Option<StripUpdate> {
    let route = route.upgrade()?;
    Some(StripUpdate {
        observer,
        remote_id: route.remote_control_id(),
        value: wrap(control.value()),
    })
}

fn name_update(route: &Weak<Route>, observer: ObserverId) -> Option<StripUpdate> {
    let route = route.upgrade()?;
    Some(StripUpdate {
        observer,
        remote_id: route.remote_control_id(),
        value: StripValue::Name(route.name()),
    })
}

/// Blocking send for control-thread paths. Handlers use `push` instead.
fn send_now(dispatch: &DispatchHandle, update: Option<StripUpdate>) -> Result<(), String> {
    match update {
        Some(update) => dispatch.send_update(update),
        None => Ok(()),
    }
}
