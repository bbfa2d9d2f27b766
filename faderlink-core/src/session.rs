//! Route list shared between the engine, UI and control surfaces.

use std::sync::{Arc, RwLock};

use faderlink_types::{PropertyChange, RemoteControlId, RouteKind, RouteProperty};

use crate::route::Route;
use crate::signal::Signal;

/// Ordered set of routes. Remote-control ids follow the order (1-based).
pub struct Session {
    routes: RwLock<Vec<Arc<Route>>>,
    pub route_added: Signal<Arc<Route>>,
    /// Emitted after the route has left the list.
    pub route_removed: Signal<Arc<Route>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(Vec::new()),
            route_added: Signal::new(),
            route_removed: Signal::new(),
        }
    }

    /// Append a route. It gets the next free remote-control id.
    pub fn add_route(&self, name: impl Into<String>, kind: RouteKind) -> Arc<Route> {
        let route = {
            let mut routes = write(&self.routes);
            let id = RemoteControlId::new(routes.len() as u32 + 1);
            let route = Arc::new(Route::new(id, name, kind));
            routes.push(Arc::clone(&route));
            route
        };
        log::debug!(target: "session", "added route {} ({})", route.remote_control_id(), route.name());
        self.route_added.emit(&route);
        route
    }

    pub fn route(&self, id: RemoteControlId) -> Option<Arc<Route>> {
        read(&self.routes)
            .iter()
            .find(|r| r.remote_control_id() == id)
            .cloned()
    }

    pub fn routes(&self) -> Vec<Arc<Route>> {
        read(&self.routes).clone()
    }

    pub fn len(&self) -> usize {
        read(&self.routes).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.routes).is_empty()
    }

    /// Remove a route and renumber the ones after it.
    pub fn remove_route(&self, id: RemoteControlId) -> Option<Arc<Route>> {
        let (removed, renumbered) = {
            let mut routes = write(&self.routes);
            let idx = routes.iter().position(|r| r.remote_control_id() == id)?;
            let removed = routes.remove(idx);
            (removed, renumber(&routes))
        };
        notify_renumbered(&renumbered);
        log::debug!(target: "session", "removed route {}", removed.name());
        self.route_removed.emit(&removed);
        Some(removed)
    }

    /// Move the route at `from` (0-based) to `to` and renumber.
    /// Returns false if either index is out of range.
    pub fn move_route(&self, from: usize, to: usize) -> bool {
        let renumbered = {
            let mut routes = write(&self.routes);
            if from >= routes.len() || to >= routes.len() {
                return false;
            }
            let route = routes.remove(from);
            routes.insert(to, route);
            renumber(&routes)
        };
        notify_renumbered(&renumbered);
        true
    }
}

/// Assign ids by position. Called with the list locked; returns the routes
/// whose id changed so they can be notified once the lock is released.
fn renumber(routes: &[Arc<Route>]) -> Vec<Arc<Route>> {
    routes
        .iter()
        .enumerate()
        .filter(|(idx, route)| route.store_remote_control_id(RemoteControlId::new(*idx as u32 + 1)))
        .map(|(_, route)| Arc::clone(route))
        .collect()
}

fn notify_renumbered(routes: &[Arc<Route>]) {
    let change = PropertyChange::from(RouteProperty::RemoteControlId);
    for route in routes {
        route.property_changed.emit(&change);
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
