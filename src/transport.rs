//! Bus transport seam: the [`SystemdTransport`] trait consumed by the unit
//! directory and monitors, and its zbus implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use zbus::{zvariant::OwnedObjectPath, Connection, Proxy};

use crate::errors::Error;
use crate::types::{
    PropertyValue, UnitSnapshot, MANAGER_DESTINATION, MANAGER_INTERFACE, MANAGER_PATH,
    UNIT_INTERFACE,
};

const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";

/// Which message bus to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusAddress {
    System,
    Session,
}

impl BusAddress {
    pub fn as_str(self) -> &'static str {
        match self {
            BusAddress::System => "system",
            BusAddress::Session => "session",
        }
    }
}

/// Row shape of the manager's `ListUnits` reply.
type ListUnitRecord = (
    String,
    String,
    String,
    String,
    String,
    String,
    OwnedObjectPath,
    u32,
    String,
    OwnedObjectPath,
);

/// A unit appearing in or leaving the manager's loaded set, delivered on
/// the bus dispatch task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitChange {
    Added(String),
    Removed(String),
}

/// Request/response and signal-subscription primitives consumed by the
/// directory and the monitors. Production code uses [`DbusTransport`];
/// tests substitute a mock behind this trait.
#[async_trait]
pub trait SystemdTransport: Send + Sync {
    /// One `ListUnits` round trip; a fresh enumeration on every call.
    async fn list_units(&self) -> Result<Vec<UnitSnapshot>, Error>;

    /// Bulk property fetch for one object, `org.freedesktop.DBus.Properties.GetAll`.
    async fn get_all_properties(
        &self,
        object_path: &str,
        interface: &str,
    ) -> Result<HashMap<String, PropertyValue>, Error>;

    /// Fire-and-forget lifecycle call (`Start`, `Stop`, ...) on a unit
    /// object; returns the queued job's object path.
    async fn call_unit_method(
        &self,
        object_path: &str,
        method: &str,
        mode: &str,
    ) -> Result<String, Error>;

    async fn kill_unit(&self, object_path: &str, who: &str, signal: i32) -> Result<(), Error>;

    async fn reset_failed_unit(&self, object_path: &str) -> Result<(), Error>;

    /// Subscribes to the manager's `UnitNew`/`UnitRemoved` signals and
    /// returns a channel receiving them. Delivery happens on the bus
    /// dispatch task, concurrently with caller threads.
    async fn unit_change_events(&self) -> Result<mpsc::Receiver<UnitChange>, Error>;
}

/// zbus-backed transport against the system or session bus.
#[derive(Debug, Clone)]
pub struct DbusTransport {
    connection: Connection,
}

impl DbusTransport {
    pub async fn connect(address: BusAddress) -> Result<Self, Error> {
        let connection = match address {
            BusAddress::System => Connection::system().await,
            BusAddress::Session => Connection::session().await,
        }
        .map_err(|err| {
            Error::communication(format!(
                "failed to connect to {} dbus: {err}",
                address.as_str()
            ))
        })?;

        Ok(Self { connection })
    }

    async fn manager_proxy(&self) -> Result<Proxy<'static>, Error> {
        Proxy::new(
            &self.connection,
            MANAGER_DESTINATION,
            MANAGER_PATH,
            MANAGER_INTERFACE,
        )
        .await
        .map_err(|err| Error::communication(format!("failed to create manager proxy: {err}")))
    }

    async fn object_proxy(
        &self,
        object_path: &str,
        interface: &'static str,
    ) -> Result<Proxy<'static>, Error> {
        Proxy::new(
            &self.connection,
            MANAGER_DESTINATION,
            object_path.to_string(),
            interface,
        )
        .await
        .map_err(|err| {
            Error::communication(format!("failed to create proxy for {object_path}: {err}"))
        })
    }
}

#[async_trait]
impl SystemdTransport for DbusTransport {
    async fn list_units(&self) -> Result<Vec<UnitSnapshot>, Error> {
        let proxy = self.manager_proxy().await?;
        let rows: Vec<ListUnitRecord> = proxy
            .call("ListUnits", &())
            .await
            .map_err(|err| Error::communication(format!("failed to list units: {err}")))?;

        let snapshots = rows
            .into_iter()
            .map(
                |(
                    name,
                    description,
                    load_state,
                    active_state,
                    sub_state,
                    following,
                    object_path,
                    job_id,
                    job_type,
                    job_path,
                )| UnitSnapshot {
                    name,
                    description,
                    load_state,
                    active_state,
                    sub_state,
                    following,
                    object_path: object_path.to_string(),
                    job_id,
                    job_type,
                    job_path: job_path.to_string(),
                },
            )
            .collect();

        Ok(snapshots)
    }

    async fn get_all_properties(
        &self,
        object_path: &str,
        interface: &str,
    ) -> Result<HashMap<String, PropertyValue>, Error> {
        let proxy = self.object_proxy(object_path, PROPERTIES_INTERFACE).await?;
        let raw: HashMap<String, zbus::zvariant::OwnedValue> = proxy
            .call("GetAll", &(interface,))
            .await
            .map_err(|err| {
                Error::communication(format!(
                    "failed to fetch properties of {object_path}: {err}"
                ))
            })?;

        Ok(raw
            .into_iter()
            .map(|(name, value)| (name, PropertyValue::from(value)))
            .collect())
    }

    async fn call_unit_method(
        &self,
        object_path: &str,
        method: &str,
        mode: &str,
    ) -> Result<String, Error> {
        let proxy = self
            .object_proxy(object_path, UNIT_INTERFACE)
            .await?;
        let job: OwnedObjectPath = proxy.call(method, &(mode,)).await.map_err(|err| {
            Error::communication(format!("{method} failed for {object_path}: {err}"))
        })?;

        Ok(job.to_string())
    }

    async fn kill_unit(&self, object_path: &str, who: &str, signal: i32) -> Result<(), Error> {
        let proxy = self
            .object_proxy(object_path, UNIT_INTERFACE)
            .await?;
        proxy.call_method("Kill", &(who, signal)).await.map_err(|err| {
            Error::communication(format!("Kill failed for {object_path}: {err}"))
        })?;

        Ok(())
    }

    async fn reset_failed_unit(&self, object_path: &str) -> Result<(), Error> {
        let proxy = self
            .object_proxy(object_path, UNIT_INTERFACE)
            .await?;
        proxy.call_method("ResetFailed", &()).await.map_err(|err| {
            Error::communication(format!("ResetFailed failed for {object_path}: {err}"))
        })?;

        Ok(())
    }

    async fn unit_change_events(&self) -> Result<mpsc::Receiver<UnitChange>, Error> {
        let proxy = self.manager_proxy().await?;

        // The manager only emits UnitNew/UnitRemoved to subscribed peers.
        proxy
            .call_method("Subscribe", &())
            .await
            .map_err(|err| Error::communication(format!("Subscribe failed: {err}")))?;

        let mut new_units = proxy
            .receive_signal("UnitNew")
            .await
            .map_err(|err| Error::communication(format!("failed to watch UnitNew: {err}")))?;
        let mut removed_units = proxy
            .receive_signal("UnitRemoved")
            .await
            .map_err(|err| Error::communication(format!("failed to watch UnitRemoved: {err}")))?;

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            loop {
                let change = tokio::select! {
                    message = new_units.next() => match message {
                        Some(message) => decode_unit_signal(&message).map(UnitChange::Added),
                        None => break,
                    },
                    message = removed_units.next() => match message {
                        Some(message) => decode_unit_signal(&message).map(UnitChange::Removed),
                        None => break,
                    },
                };

                let Some(change) = change else {
                    continue;
                };
                if tx.send(change).await.is_err() {
                    break;
                }
            }
            tracing::debug!("unit change signal stream closed");
        });

        Ok(rx)
    }
}

fn decode_unit_signal(message: &zbus::Message) -> Option<String> {
    match message.body().deserialize::<(String, OwnedObjectPath)>() {
        Ok((name, _path)) => Some(name),
        Err(err) => {
            tracing::warn!(error = %err, "discarding malformed unit signal");
            None
        }
    }
}
