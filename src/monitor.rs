//! Live monitoring of a filtered subset of the unit set.
//!
//! A monitor owns a named-keyed collection of unit handles plus a set of
//! observers. [`UnitTypeMonitor`] filters by unit kind: each refresh
//! re-enumerates the directory, classifies every snapshot and retains the
//! units whose kind is in the active filter set.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock, Weak};

use tokio::task::JoinHandle;

use crate::errors::Error;
use crate::manager::Manager;
use crate::types::{escape_name, UnitKind};
use crate::unit::Unit;

/// Observer of monitor refreshes. Invoked exactly once per refresh cycle,
/// outside the monitor's internal locks, so a listener may re-enter the
/// monitor or the directory.
pub trait MonitorListener: Send + Sync {
    fn monitor_refreshed(&self, units: &[Arc<Unit>]);
}

/// Shared machinery of a unit monitor: the monitored set keyed by escaped
/// identity, the listener list, and the refresh critical section.
pub struct UnitMonitor {
    manager: Arc<Manager>,
    /// Guards the whole enumerate-classify-replace cycle and any filter
    /// mutation; refreshes on one monitor instance never interleave.
    refresh_gate: tokio::sync::Mutex<()>,
    monitored: RwLock<HashMap<String, Arc<Unit>>>,
    listeners: Mutex<Vec<Arc<dyn MonitorListener>>>,
}

impl UnitMonitor {
    fn new(manager: Arc<Manager>) -> Self {
        Self {
            manager,
            refresh_gate: tokio::sync::Mutex::new(()),
            monitored: RwLock::new(HashMap::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    /// True if the name's escaped identity is a key of the current
    /// monitored set. Readers observe either the pre- or post-refresh set,
    /// never a partial one.
    pub fn monitors_unit(&self, name: &str) -> bool {
        self.monitored
            .read()
            .expect("monitored set lock poisoned")
            .contains_key(&escape_name(name))
    }

    /// The current monitored handles, in no particular order.
    pub fn monitored_units(&self) -> Vec<Arc<Unit>> {
        self.monitored
            .read()
            .expect("monitored set lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn add_listener(&self, listener: Arc<dyn MonitorListener>) {
        self.listeners
            .lock()
            .expect("listener list lock poisoned")
            .push(listener);
    }

    /// Removes a previously added listener by identity.
    pub fn remove_listener(&self, listener: &Arc<dyn MonitorListener>) {
        self.listeners
            .lock()
            .expect("listener list lock poisoned")
            .retain(|registered| !Arc::ptr_eq(registered, listener));
    }

    /// Replaces the monitored set wholesale.
    fn replace(&self, next: HashMap<String, Arc<Unit>>) {
        *self.monitored.write().expect("monitored set lock poisoned") = next;
    }

    fn clear(&self) {
        self.monitored
            .write()
            .expect("monitored set lock poisoned")
            .clear();
    }

    /// Notifies every listener with the current set. Runs outside the
    /// monitored-set and listener locks.
    fn notify_listeners(&self) {
        let listeners: Vec<Arc<dyn MonitorListener>> = self
            .listeners
            .lock()
            .expect("listener list lock poisoned")
            .clone();
        let units = self.monitored_units();
        for listener in listeners {
            listener.monitor_refreshed(&units);
        }
    }
}

/// Monitor specialized by a set of unit-kind filters.
pub struct UnitTypeMonitor {
    base: UnitMonitor,
    types: RwLock<HashSet<UnitKind>>,
    watch_task: Mutex<Option<JoinHandle<()>>>,
    /// Self-reference handed to the signal watch task, so the task never
    /// keeps the monitor alive on its own.
    self_ref: Weak<Self>,
}

impl UnitTypeMonitor {
    pub fn new(manager: Arc<Manager>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            base: UnitMonitor::new(manager),
            types: RwLock::new(HashSet::new()),
            watch_task: Mutex::new(None),
            self_ref: self_ref.clone(),
        })
    }

    pub fn manager(&self) -> &Arc<Manager> {
        self.base.manager()
    }

    /// The shared monitor machinery: monitored set and listener list.
    pub fn base(&self) -> &UnitMonitor {
        &self.base
    }

    pub fn add_listener(&self, listener: Arc<dyn MonitorListener>) {
        self.base.add_listener(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn MonitorListener>) {
        self.base.remove_listener(listener);
    }

    pub fn monitored_units(&self) -> Vec<Arc<Unit>> {
        self.base.monitored_units()
    }

    /// The currently active kind filters.
    pub fn monitored_types(&self) -> HashSet<UnitKind> {
        self.types
            .read()
            .expect("filter set lock poisoned")
            .clone()
    }

    /// Re-derives the monitored set from a fresh directory enumeration.
    ///
    /// Listeners are notified exactly once whether or not the cycle
    /// succeeds; on enumeration failure the previous set stays published
    /// and the error is returned after notification.
    pub async fn refresh(&self) -> Result<(), Error> {
        let _guard = self.base.refresh_gate.lock().await;
        self.refresh_locked().await
    }

    /// Adds kinds to the filter set, then refreshes within the same
    /// critical section.
    pub async fn add_monitored_types(&self, kinds: &[UnitKind]) -> Result<(), Error> {
        let _guard = self.base.refresh_gate.lock().await;
        {
            let mut types = self.types.write().expect("filter set lock poisoned");
            for kind in kinds {
                types.insert(*kind);
            }
        }
        self.refresh_locked().await
    }

    /// Removes kinds from the filter set, then refreshes within the same
    /// critical section.
    pub async fn remove_monitored_types(&self, kinds: &[UnitKind]) -> Result<(), Error> {
        let _guard = self.base.refresh_gate.lock().await;
        {
            let mut types = self.types.write().expect("filter set lock poisoned");
            for kind in kinds {
                types.remove(kind);
            }
        }
        self.refresh_locked().await
    }

    /// Clears filters and monitored units, returning the monitor to its
    /// initial state. Does not notify.
    pub async fn reset(&self) {
        let _guard = self.base.refresh_gate.lock().await;
        self.types
            .write()
            .expect("filter set lock poisoned")
            .clear();
        self.base.clear();
    }

    /// True if the unit is in the monitored set, or - as a looser,
    /// non-authoritative secondary check - if the name carries the suffix
    /// of any currently filtered kind. The suffix branch deliberately
    /// matches units that have not been materialized as handles yet.
    pub fn monitors_unit(&self, name: &str) -> bool {
        if self.base.monitors_unit(name) {
            return true;
        }

        let escaped = escape_name(name);
        let escaped_dot = escape_name(".");
        self.types
            .read()
            .expect("filter set lock poisoned")
            .iter()
            .any(|kind| escaped.ends_with(&format!("{escaped_dot}{}", kind.tag())))
    }

    /// Subscribes to the manager's unit-change signals and refreshes on
    /// every delivery until [`detach`] is called or the monitor is
    /// dropped.
    ///
    /// [`detach`]: UnitTypeMonitor::detach
    pub async fn attach(&self) -> Result<(), Error> {
        let mut events = self.base.manager.unit_change_events().await?;
        let monitor = self.self_ref.clone();

        let task = tokio::spawn(async move {
            while let Some(change) = events.recv().await {
                let Some(monitor) = monitor.upgrade() else {
                    break;
                };
                tracing::debug!(?change, "unit set changed, refreshing monitor");
                if let Err(err) = monitor.refresh().await {
                    tracing::warn!(error = %err, "signal-triggered refresh failed");
                }
            }
            tracing::debug!("unit change feed ended");
        });

        if let Some(previous) = self
            .watch_task
            .lock()
            .expect("watch task lock poisoned")
            .replace(task)
        {
            previous.abort();
        }
        Ok(())
    }

    /// Stops the signal-triggered refresh task, if one is running.
    pub fn detach(&self) {
        if let Some(task) = self
            .watch_task
            .lock()
            .expect("watch task lock poisoned")
            .take()
        {
            task.abort();
        }
    }

    async fn refresh_locked(&self) -> Result<(), Error> {
        let result = self.rebuild().await;
        if let Err(err) = &result {
            tracing::warn!(error = %err, "refresh failed, keeping previous unit set");
        }
        // Listeners hear about every cycle, failed ones included.
        self.base.notify_listeners();
        result
    }

    /// Builds the next monitored set and swaps it in. The published set is
    /// not touched before the swap, so a failed enumeration leaves the old
    /// complete set visible.
    async fn rebuild(&self) -> Result<(), Error> {
        let snapshots = self.base.manager.list_units().await?;
        let types = self.monitored_types();

        let mut next = HashMap::new();
        for snapshot in snapshots {
            let Some(kind) = snapshot.kind() else {
                tracing::trace!(unit = %snapshot.name, "no recognized kind, excluding");
                continue;
            };
            if !types.contains(&kind) {
                continue;
            }
            let unit = self.base.manager.resolve(&snapshot.name, kind);
            next.insert(escape_name(&snapshot.name), unit);
        }

        tracing::debug!(units = next.len(), "monitored set rebuilt");
        self.base.replace(next);
        Ok(())
    }
}

impl Drop for UnitTypeMonitor {
    fn drop(&mut self) {
        self.detach();
    }
}
