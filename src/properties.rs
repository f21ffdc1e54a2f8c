//! Last-known property bag for one remote object, refreshed on demand.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::errors::Error;
use crate::transport::SystemdTransport;
use crate::types::{Condition, JobRef, LoadError, PropertyValue};

/// Mutable key→value bag holding the most recently fetched properties of
/// one object. A read always reflects the last explicit [`refresh`]; there
/// is no background refresh, staleness is the caller's responsibility.
///
/// [`refresh`]: PropertyCache::refresh
pub struct PropertyCache {
    transport: Arc<dyn SystemdTransport>,
    object_path: String,
    interface: &'static str,
    values: RwLock<HashMap<String, PropertyValue>>,
}

impl PropertyCache {
    pub fn new(
        transport: Arc<dyn SystemdTransport>,
        object_path: String,
        interface: &'static str,
    ) -> Self {
        Self {
            transport,
            object_path,
            interface,
            values: RwLock::new(HashMap::new()),
        }
    }

    pub fn object_path(&self) -> &str {
        &self.object_path
    }

    /// Bulk-fetches all properties and replaces the bag atomically. On
    /// failure the previous contents are retained unchanged.
    pub async fn refresh(&self) -> Result<(), Error> {
        let fresh = self
            .transport
            .get_all_properties(&self.object_path, self.interface)
            .await?;
        *self.values.write().expect("property cache lock poisoned") = fresh;
        Ok(())
    }

    /// Returns the last-refreshed value, or `PropertyNotFound` if the name
    /// was never populated by a refresh.
    pub fn get(&self, name: &str) -> Result<PropertyValue, Error> {
        self.values
            .read()
            .expect("property cache lock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| Error::property_not_found(name))
    }

    // The typed accessors treat a value-kind mismatch as a programming
    // error: the remote schema declares each property's type, so a wrong
    // coercion is a bug in the caller, not a runtime condition.

    pub fn get_string(&self, name: &str) -> Result<String, Error> {
        match self.get(name)? {
            PropertyValue::Str(value) => Ok(value),
            other => panic!("property {name} is {}, expected string", other.kind_name()),
        }
    }

    pub fn get_bool(&self, name: &str) -> Result<bool, Error> {
        match self.get(name)? {
            PropertyValue::Bool(value) => Ok(value),
            other => panic!("property {name} is {}, expected boolean", other.kind_name()),
        }
    }

    pub fn get_u64(&self, name: &str) -> Result<u64, Error> {
        match self.get(name)? {
            PropertyValue::U64(value) => Ok(value),
            PropertyValue::U32(value) => Ok(u64::from(value)),
            other => panic!("property {name} is {}, expected u64", other.kind_name()),
        }
    }

    pub fn get_str_list(&self, name: &str) -> Result<Vec<String>, Error> {
        match self.get(name)? {
            PropertyValue::StrList(value) => Ok(value),
            other => panic!(
                "property {name} is {}, expected string list",
                other.kind_name()
            ),
        }
    }

    pub fn get_job(&self, name: &str) -> Result<JobRef, Error> {
        match self.get(name)? {
            PropertyValue::Job(value) => Ok(value),
            other => panic!(
                "property {name} is {}, expected job reference",
                other.kind_name()
            ),
        }
    }

    pub fn get_conditions(&self, name: &str) -> Result<Vec<Condition>, Error> {
        match self.get(name)? {
            PropertyValue::Conditions(value) => Ok(value),
            // An empty condition array is indistinguishable from an empty
            // string array on the wire.
            PropertyValue::StrList(items) if items.is_empty() => Ok(Vec::new()),
            other => panic!(
                "property {name} is {}, expected condition list",
                other.kind_name()
            ),
        }
    }

    pub fn get_load_error(&self, name: &str) -> Result<LoadError, Error> {
        match self.get(name)? {
            PropertyValue::LoadError(value) => Ok(value),
            other => panic!(
                "property {name} is {}, expected load error",
                other.kind_name()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use crate::testing::MockTransport;
    use crate::types::{unit_object_path, PropertyValue, UNIT_INTERFACE};

    use super::*;

    fn cache_for(transport: &Arc<MockTransport>, name: &str) -> PropertyCache {
        PropertyCache::new(
            transport.clone() as Arc<dyn SystemdTransport>,
            unit_object_path(name),
            UNIT_INTERFACE,
        )
    }

    fn docker_properties() -> HashMap<String, PropertyValue> {
        HashMap::from([
            (
                "ActiveState".to_string(),
                PropertyValue::Str("active".to_string()),
            ),
            ("CanStart".to_string(), PropertyValue::Bool(true)),
            (
                "ActiveEnterTimestamp".to_string(),
                PropertyValue::U64(1_700_000_000_000_000),
            ),
            (
                "Wants".to_string(),
                PropertyValue::StrList(vec!["network-online.target".to_string()]),
            ),
        ])
    }

    #[tokio::test]
    async fn read_reflects_last_refresh() {
        let transport = Arc::new(MockTransport::new());
        transport.set_unit_properties("docker.service", docker_properties());
        let cache = cache_for(&transport, "docker.service");

        cache.refresh().await.expect("refresh");
        assert_eq!(cache.get_string("ActiveState").expect("value"), "active");
        assert!(cache.get_bool("CanStart").expect("value"));
        assert_eq!(
            cache.get_u64("ActiveEnterTimestamp").expect("value"),
            1_700_000_000_000_000
        );
        assert_eq!(
            cache.get_str_list("Wants").expect("value"),
            vec!["network-online.target".to_string()]
        );
    }

    #[tokio::test]
    async fn unpopulated_name_is_not_found() {
        let transport = Arc::new(MockTransport::new());
        transport.set_unit_properties("docker.service", docker_properties());
        let cache = cache_for(&transport, "docker.service");

        let err = cache.get("ActiveState").expect_err("no refresh yet");
        assert!(matches!(err, Error::PropertyNotFound { .. }));

        cache.refresh().await.expect("refresh");
        let err = cache.get("NoSuchProperty").expect_err("unknown name");
        assert!(matches!(err, Error::PropertyNotFound { .. }));
    }

    #[tokio::test]
    async fn failed_refresh_retains_previous_bag() {
        let transport = Arc::new(MockTransport::new());
        transport.set_unit_properties("docker.service", docker_properties());
        let cache = cache_for(&transport, "docker.service");

        cache.refresh().await.expect("refresh");
        transport.fail_get_all(true);

        let err = cache.refresh().await.expect_err("transport failure");
        assert!(err.is_communication());
        assert_eq!(cache.get_string("ActiveState").expect("old value"), "active");
    }

    #[tokio::test]
    #[should_panic(expected = "expected boolean")]
    async fn kind_mismatch_is_fatal() {
        let transport = Arc::new(MockTransport::new());
        transport.set_unit_properties("docker.service", docker_properties());
        let cache = cache_for(&transport, "docker.service");

        cache.refresh().await.expect("refresh");
        let _ = cache.get_bool("ActiveState");
    }
}
