//! Shared mock transport for unit tests. Scriptable unit lists, property
//! bags, failure injection and recorded lifecycle calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::Error;
use crate::transport::{SystemdTransport, UnitChange};
use crate::types::{unit_object_path, PropertyValue, UnitSnapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub object_path: String,
    pub method: String,
    pub args: String,
}

#[derive(Default)]
pub struct MockTransport {
    units: Mutex<Vec<UnitSnapshot>>,
    properties: Mutex<HashMap<String, HashMap<String, PropertyValue>>>,
    fail_list_units: AtomicBool,
    fail_get_all: AtomicBool,
    list_calls: AtomicUsize,
    next_job_id: AtomicU32,
    calls: Mutex<Vec<RecordedCall>>,
    events: Mutex<Option<mpsc::Receiver<UnitChange>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_units(&self, units: Vec<UnitSnapshot>) {
        *self.units.lock().unwrap() = units;
    }

    pub fn set_unit_properties(&self, name: &str, values: HashMap<String, PropertyValue>) {
        self.properties
            .lock()
            .unwrap()
            .insert(unit_object_path(name), values);
    }

    pub fn fail_list_units(&self, fail: bool) {
        self.fail_list_units.store(fail, Ordering::SeqCst);
    }

    pub fn fail_get_all(&self, fail: bool) {
        self.fail_get_all.store(fail, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Installs an event channel to be handed out by `unit_change_events`
    /// and returns the sending half for the test to push changes through.
    pub fn event_channel(&self) -> mpsc::Sender<UnitChange> {
        let (tx, rx) = mpsc::channel(16);
        *self.events.lock().unwrap() = Some(rx);
        tx
    }

    fn record(&self, object_path: &str, method: &str, args: String) {
        self.calls.lock().unwrap().push(RecordedCall {
            object_path: object_path.to_string(),
            method: method.to_string(),
            args,
        });
    }
}

/// Builds a minimal snapshot for one unit, in the shape `ListUnits` returns.
pub fn snapshot(name: &str, active_state: &str) -> UnitSnapshot {
    UnitSnapshot {
        name: name.to_string(),
        description: format!("{name} (mock)"),
        load_state: "loaded".to_string(),
        active_state: active_state.to_string(),
        sub_state: "running".to_string(),
        following: String::new(),
        object_path: unit_object_path(name),
        job_id: 0,
        job_type: String::new(),
        job_path: "/".to_string(),
    }
}

#[async_trait]
impl SystemdTransport for MockTransport {
    async fn list_units(&self) -> Result<Vec<UnitSnapshot>, Error> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list_units.load(Ordering::SeqCst) {
            return Err(Error::communication("mock: ListUnits failure"));
        }
        Ok(self.units.lock().unwrap().clone())
    }

    async fn get_all_properties(
        &self,
        object_path: &str,
        _interface: &str,
    ) -> Result<HashMap<String, PropertyValue>, Error> {
        if self.fail_get_all.load(Ordering::SeqCst) {
            return Err(Error::communication("mock: GetAll failure"));
        }
        self.properties
            .lock()
            .unwrap()
            .get(object_path)
            .cloned()
            .ok_or_else(|| Error::communication(format!("mock: no object at {object_path}")))
    }

    async fn call_unit_method(
        &self,
        object_path: &str,
        method: &str,
        mode: &str,
    ) -> Result<String, Error> {
        self.record(object_path, method, mode.to_string());
        let job_id = self.next_job_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("/org/freedesktop/systemd1/job/{job_id}"))
    }

    async fn kill_unit(&self, object_path: &str, who: &str, signal: i32) -> Result<(), Error> {
        self.record(object_path, "Kill", format!("{who}:{signal}"));
        Ok(())
    }

    async fn reset_failed_unit(&self, object_path: &str) -> Result<(), Error> {
        self.record(object_path, "ResetFailed", String::new());
        Ok(())
    }

    async fn unit_change_events(&self) -> Result<mpsc::Receiver<UnitChange>, Error> {
        if let Some(rx) = self.events.lock().unwrap().take() {
            return Ok(rx);
        }
        // No installed channel: hand out one that is already closed.
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }
}
