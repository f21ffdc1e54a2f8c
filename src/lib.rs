//! Typed unit handles and live unit monitoring for systemd over D-Bus.
//!
//! [`Systemd`] opens a [`Manager`] per bus address; the manager enumerates
//! units and resolves shared [`Unit`] handles; a [`UnitTypeMonitor`] keeps
//! a kind-filtered subset current and notifies its listeners on every
//! refresh.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

pub mod config;
pub mod errors;
pub mod logging;
pub mod manager;
pub mod monitor;
pub mod properties;
#[cfg(test)]
pub(crate) mod testing;
pub mod transport;
pub mod types;
pub mod unit;

pub use errors::Error;
pub use manager::Manager;
pub use monitor::{MonitorListener, UnitMonitor, UnitTypeMonitor};
pub use properties::PropertyCache;
pub use transport::{BusAddress, DbusTransport, SystemdTransport, UnitChange};
pub use types::{
    Condition, JobRef, LoadError, PropertyValue, UnitKind, UnitSnapshot,
};
pub use unit::{Mode, Unit, Who};

/// Registry of open bus connections, keyed by bus address. One manager per
/// address; `open` reuses an existing connection, `close_all` drops them.
///
/// Instantiable so tests and embedders can hold isolated registries; most
/// callers go through [`default_registry`].
pub struct Systemd {
    managers: Mutex<HashMap<BusAddress, Arc<Manager>>>,
}

impl Systemd {
    pub fn new() -> Self {
        Self {
            managers: Mutex::new(HashMap::new()),
        }
    }

    /// Connects to the given bus (or reuses the registry's existing
    /// connection) and returns its manager. Under concurrent first opens
    /// of the same address, the loser's fresh connection is dropped in
    /// favor of the one already registered.
    pub async fn open(&self, address: BusAddress) -> Result<Arc<Manager>, Error> {
        if let Some(existing) = self
            .managers
            .lock()
            .expect("registry lock poisoned")
            .get(&address)
        {
            return Ok(existing.clone());
        }

        tracing::info!(bus = address.as_str(), "connecting");
        let transport = DbusTransport::connect(address).await?;
        let manager = Arc::new(Manager::new(Arc::new(transport)));

        let mut managers = self.managers.lock().expect("registry lock poisoned");
        Ok(managers.entry(address).or_insert(manager).clone())
    }

    /// Drops every registered manager and its connection. Handles already
    /// resolved from those managers stay alive but their calls will fail.
    pub fn close_all(&self) {
        self.managers
            .lock()
            .expect("registry lock poisoned")
            .clear();
    }
}

impl Default for Systemd {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide registry.
pub fn default_registry() -> &'static Systemd {
    static REGISTRY: OnceLock<Systemd> = OnceLock::new();
    REGISTRY.get_or_init(Systemd::new)
}
