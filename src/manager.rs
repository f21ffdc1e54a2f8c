//! Manager-level unit directory: enumeration and identity-cached handle
//! resolution.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::errors::Error;
use crate::transport::{SystemdTransport, UnitChange};
use crate::types::{normalize_name, UnitKind, UnitSnapshot};
use crate::unit::Unit;

/// The directory of unit handles. Holds the authoritative reference to
/// every handle it has created, keyed by normalized identity; monitors and
/// callers share those handles.
pub struct Manager {
    transport: Arc<dyn SystemdTransport>,
    units: Mutex<HashMap<String, Arc<Unit>>>,
}

impl Manager {
    pub fn new(transport: Arc<dyn SystemdTransport>) -> Self {
        Self {
            transport,
            units: Mutex::new(HashMap::new()),
        }
    }

    /// Enumerates all currently loaded units. One remote call; a fresh
    /// sequence every time, never served from a cache.
    pub async fn list_units(&self) -> Result<Vec<UnitSnapshot>, Error> {
        self.transport.list_units().await
    }

    /// Resolves a unit name to its handle, appending the kind's canonical
    /// suffix if absent. The handle is created lazily on first resolution
    /// and cached by normalized identity; concurrent callers for the same
    /// identity always end up sharing one handle.
    pub fn resolve(&self, name: &str, kind: UnitKind) -> Arc<Unit> {
        let normalized = normalize_name(name, kind.suffix());

        let mut units = self.units.lock().expect("unit directory lock poisoned");
        if let Some(existing) = units.get(&normalized) {
            return existing.clone();
        }

        tracing::debug!(unit = %normalized, "creating unit handle");
        let unit = Arc::new(Unit::new(self.transport.clone(), normalized.clone()));
        units.insert(normalized, unit.clone());
        unit
    }

    /// Looks up an already-resolved handle without creating one.
    pub fn lookup(&self, name: &str) -> Option<Arc<Unit>> {
        self.units
            .lock()
            .expect("unit directory lock poisoned")
            .get(name)
            .cloned()
    }

    /// Opens the manager's unit-change signal feed. Delivery happens on
    /// the bus dispatch task.
    pub async fn unit_change_events(&self) -> Result<mpsc::Receiver<UnitChange>, Error> {
        self.transport.unit_change_events().await
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{snapshot, MockTransport};

    use super::*;

    fn manager() -> (Arc<MockTransport>, Arc<Manager>) {
        let transport = Arc::new(MockTransport::new());
        let manager = Arc::new(Manager::new(
            transport.clone() as Arc<dyn SystemdTransport>
        ));
        (transport, manager)
    }

    #[tokio::test]
    async fn enumeration_is_fresh_on_every_call() {
        let (transport, manager) = manager();
        transport.set_units(vec![snapshot("docker.service", "active")]);

        let first = manager.list_units().await.expect("list");
        assert_eq!(first.len(), 1);

        transport.set_units(vec![
            snapshot("docker.service", "active"),
            snapshot("foo.socket", "active"),
        ]);
        let second = manager.list_units().await.expect("list");
        assert_eq!(second.len(), 2);
        assert_eq!(transport.list_calls(), 2);
    }

    #[tokio::test]
    async fn resolve_normalizes_and_caches_by_identity() {
        let (_transport, manager) = manager();

        let bare = manager.resolve("docker", UnitKind::Service);
        let suffixed = manager.resolve("docker.service", UnitKind::Service);
        assert_eq!(bare.name(), "docker.service");
        assert!(Arc::ptr_eq(&bare, &suffixed));

        let other = manager.resolve("docker.socket", UnitKind::Socket);
        assert!(!Arc::ptr_eq(&bare, &other));
    }

    #[tokio::test]
    async fn lookup_does_not_create_handles() {
        let (_transport, manager) = manager();

        assert!(manager.lookup("docker.service").is_none());
        manager.resolve("docker", UnitKind::Service);
        assert!(manager.lookup("docker.service").is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_resolution_yields_one_handle() {
        let (_transport, manager) = manager();

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let manager = manager.clone();
            tasks.push(tokio::spawn(async move {
                manager.resolve("docker", UnitKind::Service)
            }));
        }

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.expect("join"));
        }
        let first = &handles[0];
        assert!(handles.iter().all(|handle| Arc::ptr_eq(first, handle)));
    }
}
