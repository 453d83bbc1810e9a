//! Route gating for the session bridge.
//!
//! Routing is a pure function of two booleans, "identity provider reports
//! authenticated" and "local session token present", with no network
//! calls. The guard re-evaluates on every session bus event by re-reading
//! token presence itself.

use bridge_storage::SessionStore;
use session_bus::SessionBus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// The three route classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// No local token: the unauthenticated landing flow.
    Landing,
    /// Local token present and the provider session is live: render the
    /// authenticated children while the verification bridge runs.
    Passthrough,
    /// Local token present without a live provider session (for example a
    /// cold start before the provider SDK hydrates): straight to the
    /// dashboard.
    Dashboard,
}

/// Resolve the route class for the given auth state.
pub fn resolve_route(provider_authenticated: bool, token_present: bool) -> RouteClass {
    match (token_present, provider_authenticated) {
        (false, _) => RouteClass::Landing,
        (true, true) => RouteClass::Passthrough,
        (true, false) => RouteClass::Dashboard,
    }
}

/// Caches the current route decision and re-evaluates it on demand or on
/// session bus events.
pub struct RouteGuard {
    store: Arc<SessionStore>,
    provider_authenticated: AtomicBool,
    current: Mutex<RouteClass>,
}

impl RouteGuard {
    /// Create a guard, evaluating the initial decision from current state.
    pub fn new(store: Arc<SessionStore>) -> Arc<Self> {
        let initial = resolve_route(false, store.token().is_some());
        Arc::new(Self {
            store,
            provider_authenticated: AtomicBool::new(false),
            current: Mutex::new(initial),
        })
    }

    /// Record the provider auth state and re-evaluate.
    pub fn set_provider_authenticated(&self, authenticated: bool) -> RouteClass {
        self.provider_authenticated
            .store(authenticated, Ordering::SeqCst);
        self.refresh()
    }

    /// Re-read token presence and recompute the decision.
    pub fn refresh(&self) -> RouteClass {
        let decision = resolve_route(
            self.provider_authenticated.load(Ordering::SeqCst),
            self.store.token().is_some(),
        );
        let mut current = self.current.lock().unwrap();
        if *current != decision {
            tracing::debug!(from = ?*current, to = ?decision, "route decision changed");
        }
        *current = decision;
        decision
    }

    /// The most recently computed decision.
    pub fn current(&self) -> RouteClass {
        *self.current.lock().unwrap()
    }

    /// Spawn a task that refreshes the decision on every bus event.
    ///
    /// The returned watcher owns the task; shut it down explicitly or by
    /// dropping it.
    pub fn spawn_watcher(self: &Arc<Self>, bus: &SessionBus) -> RouteWatcher {
        let guard = Arc::clone(self);
        let mut subscription = bus.subscribe();
        let handle = tokio::spawn(async move {
            while subscription.recv().await.is_some() {
                guard.refresh();
            }
        });
        RouteWatcher { handle }
    }
}

/// Handle for the guard's bus watcher task.
pub struct RouteWatcher {
    handle: JoinHandle<()>,
}

impl RouteWatcher {
    /// Stop watching.
    pub fn shutdown(self) {
        self.handle.abort();
    }
}

impl Drop for RouteWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
