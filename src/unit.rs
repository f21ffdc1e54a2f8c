//! One remote unit: identity, property cache and fire-and-forget
//! lifecycle operations.

use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::Error;
use crate::properties::PropertyCache;
use crate::transport::SystemdTransport;
use crate::types::{unit_object_path, Condition, JobRef, LoadError, PropertyValue, UNIT_INTERFACE};

/// Which of a unit's processes a kill request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Who {
    Main,
    Control,
    All,
}

impl Who {
    pub fn as_str(self) -> &'static str {
        match self {
            Who::Main => "main",
            Who::Control => "control",
            Who::All => "all",
        }
    }
}

/// Job mode passed through verbatim to lifecycle calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Replace,
    Fail,
    Isolate,
    IgnoreDependencies,
    IgnoreRequirements,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Replace => "replace",
            Mode::Fail => "fail",
            Mode::Isolate => "isolate",
            Mode::IgnoreDependencies => "ignore-dependencies",
            Mode::IgnoreRequirements => "ignore-requirements",
        }
    }
}

/// Property names of the `org.freedesktop.systemd1.Unit` interface, as an
/// explicit static table.
pub mod property {
    pub const ACTIVE_ENTER_TIMESTAMP: &str = "ActiveEnterTimestamp";
    pub const ACTIVE_ENTER_TIMESTAMP_MONOTONIC: &str = "ActiveEnterTimestampMonotonic";
    pub const ACTIVE_EXIT_TIMESTAMP: &str = "ActiveExitTimestamp";
    pub const ACTIVE_EXIT_TIMESTAMP_MONOTONIC: &str = "ActiveExitTimestampMonotonic";
    pub const ACTIVE_STATE: &str = "ActiveState";
    pub const AFTER: &str = "After";
    pub const ALLOW_ISOLATE: &str = "AllowIsolate";
    pub const ASSERT_RESULT: &str = "AssertResult";
    pub const ASSERT_TIMESTAMP: &str = "AssertTimestamp";
    pub const ASSERT_TIMESTAMP_MONOTONIC: &str = "AssertTimestampMonotonic";
    pub const ASSERTS: &str = "Asserts";
    pub const BEFORE: &str = "Before";
    pub const BINDS_TO: &str = "BindsTo";
    pub const BOUND_BY: &str = "BoundBy";
    pub const CAN_ISOLATE: &str = "CanIsolate";
    pub const CAN_RELOAD: &str = "CanReload";
    pub const CAN_START: &str = "CanStart";
    pub const CAN_STOP: &str = "CanStop";
    pub const CONDITION_RESULT: &str = "ConditionResult";
    pub const CONDITION_TIMESTAMP: &str = "ConditionTimestamp";
    pub const CONDITION_TIMESTAMP_MONOTONIC: &str = "ConditionTimestampMonotonic";
    pub const CONDITIONS: &str = "Conditions";
    pub const CONFLICTED_BY: &str = "ConflictedBy";
    pub const CONFLICTS: &str = "Conflicts";
    pub const CONSISTS_OF: &str = "ConsistsOf";
    pub const DEFAULT_DEPENDENCIES: &str = "DefaultDependencies";
    pub const DESCRIPTION: &str = "Description";
    pub const DOCUMENTATION: &str = "Documentation";
    pub const DROP_IN_PATHS: &str = "DropInPaths";
    pub const FOLLOWING: &str = "Following";
    pub const FRAGMENT_PATH: &str = "FragmentPath";
    pub const ID: &str = "Id";
    pub const IGNORE_ON_ISOLATE: &str = "IgnoreOnIsolate";
    pub const INACTIVE_ENTER_TIMESTAMP: &str = "InactiveEnterTimestamp";
    pub const INACTIVE_ENTER_TIMESTAMP_MONOTONIC: &str = "InactiveEnterTimestampMonotonic";
    pub const INACTIVE_EXIT_TIMESTAMP: &str = "InactiveExitTimestamp";
    pub const INACTIVE_EXIT_TIMESTAMP_MONOTONIC: &str = "InactiveExitTimestampMonotonic";
    pub const JOB: &str = "Job";
    pub const JOB_TIMEOUT_ACTION: &str = "JobTimeoutAction";
    pub const JOB_TIMEOUT_REBOOT_ARGUMENT: &str = "JobTimeoutRebootArgument";
    pub const JOB_TIMEOUT_USEC: &str = "JobTimeoutUSec";
    pub const JOINS_NAMESPACE_OF: &str = "JoinsNamespaceOf";
    pub const LOAD_ERROR: &str = "LoadError";
    pub const LOAD_STATE: &str = "LoadState";
    pub const NAMES: &str = "Names";
    pub const NEED_DAEMON_RELOAD: &str = "NeedDaemonReload";
    pub const ON_FAILURE: &str = "OnFailure";
    pub const ON_FAILURE_JOB_MODE: &str = "OnFailureJobMode";
    pub const PART_OF: &str = "PartOf";
    pub const PROPAGATES_RELOAD_TO: &str = "PropagatesReloadTo";
    pub const REFUSE_MANUAL_START: &str = "RefuseManualStart";
    pub const REFUSE_MANUAL_STOP: &str = "RefuseManualStop";
    pub const RELOAD_PROPAGATED_FROM: &str = "ReloadPropagatedFrom";
    pub const REQUIRED_BY: &str = "RequiredBy";
    pub const REQUIRES: &str = "Requires";
    pub const REQUIRES_MOUNTS_FOR: &str = "RequiresMountsFor";
    pub const REQUISITE: &str = "Requisite";
    pub const REQUISITE_OF: &str = "RequisiteOf";
    pub const SOURCE_PATH: &str = "SourcePath";
    pub const STOP_WHEN_UNNEEDED: &str = "StopWhenUnneeded";
    pub const SUB_STATE: &str = "SubState";
    pub const TRANSIENT: &str = "Transient";
    pub const TRIGGERED_BY: &str = "TriggeredBy";
    pub const TRIGGERS: &str = "Triggers";
    pub const WANTED_BY: &str = "WantedBy";
    pub const WANTS: &str = "Wants";

    pub const ALL: &[&str] = &[
        ACTIVE_ENTER_TIMESTAMP,
        ACTIVE_ENTER_TIMESTAMP_MONOTONIC,
        ACTIVE_EXIT_TIMESTAMP,
        ACTIVE_EXIT_TIMESTAMP_MONOTONIC,
        ACTIVE_STATE,
        AFTER,
        ALLOW_ISOLATE,
        ASSERT_RESULT,
        ASSERT_TIMESTAMP,
        ASSERT_TIMESTAMP_MONOTONIC,
        ASSERTS,
        BEFORE,
        BINDS_TO,
        BOUND_BY,
        CAN_ISOLATE,
        CAN_RELOAD,
        CAN_START,
        CAN_STOP,
        CONDITION_RESULT,
        CONDITION_TIMESTAMP,
        CONDITION_TIMESTAMP_MONOTONIC,
        CONDITIONS,
        CONFLICTED_BY,
        CONFLICTS,
        CONSISTS_OF,
        DEFAULT_DEPENDENCIES,
        DESCRIPTION,
        DOCUMENTATION,
        DROP_IN_PATHS,
        FOLLOWING,
        FRAGMENT_PATH,
        ID,
        IGNORE_ON_ISOLATE,
        INACTIVE_ENTER_TIMESTAMP,
        INACTIVE_ENTER_TIMESTAMP_MONOTONIC,
        INACTIVE_EXIT_TIMESTAMP,
        INACTIVE_EXIT_TIMESTAMP_MONOTONIC,
        JOB,
        JOB_TIMEOUT_ACTION,
        JOB_TIMEOUT_REBOOT_ARGUMENT,
        JOB_TIMEOUT_USEC,
        JOINS_NAMESPACE_OF,
        LOAD_ERROR,
        LOAD_STATE,
        NAMES,
        NEED_DAEMON_RELOAD,
        ON_FAILURE,
        ON_FAILURE_JOB_MODE,
        PART_OF,
        PROPAGATES_RELOAD_TO,
        REFUSE_MANUAL_START,
        REFUSE_MANUAL_STOP,
        RELOAD_PROPAGATED_FROM,
        REQUIRED_BY,
        REQUIRES,
        REQUIRES_MOUNTS_FOR,
        REQUISITE,
        REQUISITE_OF,
        SOURCE_PATH,
        STOP_WHEN_UNNEEDED,
        SUB_STATE,
        TRANSIENT,
        TRIGGERED_BY,
        TRIGGERS,
        WANTED_BY,
        WANTS,
    ];
}

/// Handle to one remote unit. Created once per identity by the directory
/// and shared from there; owns exactly one [`PropertyCache`].
pub struct Unit {
    name: String,
    object_path: String,
    transport: Arc<dyn SystemdTransport>,
    properties: PropertyCache,
}

impl Unit {
    pub(crate) fn new(transport: Arc<dyn SystemdTransport>, name: String) -> Self {
        let object_path = unit_object_path(&name);
        let properties =
            PropertyCache::new(transport.clone(), object_path.clone(), UNIT_INTERFACE);
        Self {
            name,
            object_path,
            transport,
            properties,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn object_path(&self) -> &str {
        &self.object_path
    }

    pub fn properties(&self) -> &PropertyCache {
        &self.properties
    }

    /// Re-fetches the unit's property bag. Read accessors reflect the last
    /// completed call.
    pub async fn refresh_properties(&self) -> Result<(), Error> {
        self.properties.refresh().await
    }

    // Lifecycle operations. All of these enqueue a job on the remote side
    // and return its object path without waiting for completion; completion
    // is observed via job-removal signals outside this crate.

    pub async fn start(&self, mode: Mode) -> Result<String, Error> {
        self.call("Start", mode).await
    }

    pub async fn stop(&self, mode: Mode) -> Result<String, Error> {
        self.call("Stop", mode).await
    }

    pub async fn restart(&self, mode: Mode) -> Result<String, Error> {
        self.call("Restart", mode).await
    }

    pub async fn try_restart(&self, mode: Mode) -> Result<String, Error> {
        self.call("TryRestart", mode).await
    }

    pub async fn reload(&self, mode: Mode) -> Result<String, Error> {
        self.call("Reload", mode).await
    }

    pub async fn reload_or_restart(&self, mode: Mode) -> Result<String, Error> {
        self.call("ReloadOrRestart", mode).await
    }

    pub async fn reload_or_try_restart(&self, mode: Mode) -> Result<String, Error> {
        self.call("ReloadOrTryRestart", mode).await
    }

    pub async fn kill(&self, who: Who, signal: i32) -> Result<(), Error> {
        self.transport
            .kill_unit(&self.object_path, who.as_str(), signal)
            .await
    }

    pub async fn reset_failed(&self) -> Result<(), Error> {
        self.transport.reset_failed_unit(&self.object_path).await
    }

    /// Not supported by this handle; always fails with
    /// [`Error::Unsupported`] so callers cannot mistake it for a no-op.
    pub fn set_properties(
        &self,
        _runtime: bool,
        _properties: HashMap<String, PropertyValue>,
    ) -> Result<(), Error> {
        Err(Error::unsupported("SetProperties"))
    }

    async fn call(&self, method: &str, mode: Mode) -> Result<String, Error> {
        self.transport
            .call_unit_method(&self.object_path, method, mode.as_str())
            .await
    }

    // Typed read accessors over the Unit interface property table. Each
    // reads the cached bag; call `refresh_properties` first.

    pub fn active_enter_timestamp(&self) -> Result<u64, Error> {
        self.properties.get_u64(property::ACTIVE_ENTER_TIMESTAMP)
    }

    pub fn active_enter_timestamp_monotonic(&self) -> Result<u64, Error> {
        self.properties
            .get_u64(property::ACTIVE_ENTER_TIMESTAMP_MONOTONIC)
    }

    pub fn active_exit_timestamp(&self) -> Result<u64, Error> {
        self.properties.get_u64(property::ACTIVE_EXIT_TIMESTAMP)
    }

    pub fn active_exit_timestamp_monotonic(&self) -> Result<u64, Error> {
        self.properties
            .get_u64(property::ACTIVE_EXIT_TIMESTAMP_MONOTONIC)
    }

    pub fn active_state(&self) -> Result<String, Error> {
        self.properties.get_string(property::ACTIVE_STATE)
    }

    pub fn after(&self) -> Result<Vec<String>, Error> {
        self.properties.get_str_list(property::AFTER)
    }

    pub fn allow_isolate(&self) -> Result<bool, Error> {
        self.properties.get_bool(property::ALLOW_ISOLATE)
    }

    pub fn assert_result(&self) -> Result<bool, Error> {
        self.properties.get_bool(property::ASSERT_RESULT)
    }

    pub fn assert_timestamp(&self) -> Result<u64, Error> {
        self.properties.get_u64(property::ASSERT_TIMESTAMP)
    }

    pub fn assert_timestamp_monotonic(&self) -> Result<u64, Error> {
        self.properties.get_u64(property::ASSERT_TIMESTAMP_MONOTONIC)
    }

    pub fn asserts(&self) -> Result<Vec<Condition>, Error> {
        self.properties.get_conditions(property::ASSERTS)
    }

    pub fn before(&self) -> Result<Vec<String>, Error> {
        self.properties.get_str_list(property::BEFORE)
    }

    pub fn binds_to(&self) -> Result<Vec<String>, Error> {
        self.properties.get_str_list(property::BINDS_TO)
    }

    pub fn bound_by(&self) -> Result<Vec<String>, Error> {
        self.properties.get_str_list(property::BOUND_BY)
    }

    pub fn can_isolate(&self) -> Result<bool, Error> {
        self.properties.get_bool(property::CAN_ISOLATE)
    }

    pub fn can_reload(&self) -> Result<bool, Error> {
        self.properties.get_bool(property::CAN_RELOAD)
    }

    pub fn can_start(&self) -> Result<bool, Error> {
        self.properties.get_bool(property::CAN_START)
    }

    pub fn can_stop(&self) -> Result<bool, Error> {
        self.properties.get_bool(property::CAN_STOP)
    }

    pub fn condition_result(&self) -> Result<bool, Error> {
        self.properties.get_bool(property::CONDITION_RESULT)
    }

    pub fn condition_timestamp(&self) -> Result<u64, Error> {
        self.properties.get_u64(property::CONDITION_TIMESTAMP)
    }

    pub fn condition_timestamp_monotonic(&self) -> Result<u64, Error> {
        self.properties
            .get_u64(property::CONDITION_TIMESTAMP_MONOTONIC)
    }

    pub fn conditions(&self) -> Result<Vec<Condition>, Error> {
        self.properties.get_conditions(property::CONDITIONS)
    }

    pub fn conflicted_by(&self) -> Result<Vec<String>, Error> {
        self.properties.get_str_list(property::CONFLICTED_BY)
    }

    pub fn conflicts(&self) -> Result<Vec<String>, Error> {
        self.properties.get_str_list(property::CONFLICTS)
    }

    pub fn consists_of(&self) -> Result<Vec<String>, Error> {
        self.properties.get_str_list(property::CONSISTS_OF)
    }

    pub fn default_dependencies(&self) -> Result<bool, Error> {
        self.properties.get_bool(property::DEFAULT_DEPENDENCIES)
    }

    pub fn description(&self) -> Result<String, Error> {
        self.properties.get_string(property::DESCRIPTION)
    }

    pub fn documentation(&self) -> Result<Vec<String>, Error> {
        self.properties.get_str_list(property::DOCUMENTATION)
    }

    pub fn drop_in_paths(&self) -> Result<Vec<String>, Error> {
        self.properties.get_str_list(property::DROP_IN_PATHS)
    }

    pub fn following(&self) -> Result<String, Error> {
        self.properties.get_string(property::FOLLOWING)
    }

    pub fn fragment_path(&self) -> Result<String, Error> {
        self.properties.get_string(property::FRAGMENT_PATH)
    }

    pub fn id(&self) -> Result<String, Error> {
        self.properties.get_string(property::ID)
    }

    pub fn ignore_on_isolate(&self) -> Result<bool, Error> {
        self.properties.get_bool(property::IGNORE_ON_ISOLATE)
    }

    pub fn inactive_enter_timestamp(&self) -> Result<u64, Error> {
        self.properties.get_u64(property::INACTIVE_ENTER_TIMESTAMP)
    }

    pub fn inactive_enter_timestamp_monotonic(&self) -> Result<u64, Error> {
        self.properties
            .get_u64(property::INACTIVE_ENTER_TIMESTAMP_MONOTONIC)
    }

    pub fn inactive_exit_timestamp(&self) -> Result<u64, Error> {
        self.properties.get_u64(property::INACTIVE_EXIT_TIMESTAMP)
    }

    pub fn inactive_exit_timestamp_monotonic(&self) -> Result<u64, Error> {
        self.properties
            .get_u64(property::INACTIVE_EXIT_TIMESTAMP_MONOTONIC)
    }

    pub fn job(&self) -> Result<JobRef, Error> {
        self.properties.get_job(property::JOB)
    }

    pub fn job_timeout_action(&self) -> Result<String, Error> {
        self.properties.get_string(property::JOB_TIMEOUT_ACTION)
    }

    pub fn job_timeout_reboot_argument(&self) -> Result<String, Error> {
        self.properties
            .get_string(property::JOB_TIMEOUT_REBOOT_ARGUMENT)
    }

    pub fn job_timeout_usec(&self) -> Result<u64, Error> {
        self.properties.get_u64(property::JOB_TIMEOUT_USEC)
    }

    pub fn joins_namespace_of(&self) -> Result<Vec<String>, Error> {
        self.properties.get_str_list(property::JOINS_NAMESPACE_OF)
    }

    pub fn load_error(&self) -> Result<LoadError, Error> {
        self.properties.get_load_error(property::LOAD_ERROR)
    }

    pub fn load_state(&self) -> Result<String, Error> {
        self.properties.get_string(property::LOAD_STATE)
    }

    pub fn names(&self) -> Result<Vec<String>, Error> {
        self.properties.get_str_list(property::NAMES)
    }

    pub fn need_daemon_reload(&self) -> Result<bool, Error> {
        self.properties.get_bool(property::NEED_DAEMON_RELOAD)
    }

    pub fn on_failure(&self) -> Result<Vec<String>, Error> {
        self.properties.get_str_list(property::ON_FAILURE)
    }

    pub fn on_failure_job_mode(&self) -> Result<String, Error> {
        self.properties.get_string(property::ON_FAILURE_JOB_MODE)
    }

    pub fn part_of(&self) -> Result<Vec<String>, Error> {
        self.properties.get_str_list(property::PART_OF)
    }

    pub fn propagates_reload_to(&self) -> Result<Vec<String>, Error> {
        self.properties.get_str_list(property::PROPAGATES_RELOAD_TO)
    }

    pub fn refuse_manual_start(&self) -> Result<bool, Error> {
        self.properties.get_bool(property::REFUSE_MANUAL_START)
    }

    pub fn refuse_manual_stop(&self) -> Result<bool, Error> {
        self.properties.get_bool(property::REFUSE_MANUAL_STOP)
    }

    pub fn reload_propagated_from(&self) -> Result<Vec<String>, Error> {
        self.properties
            .get_str_list(property::RELOAD_PROPAGATED_FROM)
    }

    pub fn required_by(&self) -> Result<Vec<String>, Error> {
        self.properties.get_str_list(property::REQUIRED_BY)
    }

    pub fn requires(&self) -> Result<Vec<String>, Error> {
        self.properties.get_str_list(property::REQUIRES)
    }

    pub fn requires_mounts_for(&self) -> Result<Vec<String>, Error> {
        self.properties.get_str_list(property::REQUIRES_MOUNTS_FOR)
    }

    pub fn requisite(&self) -> Result<Vec<String>, Error> {
        self.properties.get_str_list(property::REQUISITE)
    }

    pub fn requisite_of(&self) -> Result<Vec<String>, Error> {
        self.properties.get_str_list(property::REQUISITE_OF)
    }

    pub fn source_path(&self) -> Result<String, Error> {
        self.properties.get_string(property::SOURCE_PATH)
    }

    pub fn stop_when_unneeded(&self) -> Result<bool, Error> {
        self.properties.get_bool(property::STOP_WHEN_UNNEEDED)
    }

    pub fn sub_state(&self) -> Result<String, Error> {
        self.properties.get_string(property::SUB_STATE)
    }

    pub fn transient(&self) -> Result<bool, Error> {
        self.properties.get_bool(property::TRANSIENT)
    }

    pub fn triggered_by(&self) -> Result<Vec<String>, Error> {
        self.properties.get_str_list(property::TRIGGERED_BY)
    }

    pub fn triggers(&self) -> Result<Vec<String>, Error> {
        self.properties.get_str_list(property::TRIGGERS)
    }

    pub fn wanted_by(&self) -> Result<Vec<String>, Error> {
        self.properties.get_str_list(property::WANTED_BY)
    }

    pub fn wants(&self) -> Result<Vec<String>, Error> {
        self.properties.get_str_list(property::WANTS)
    }
}

impl std::fmt::Debug for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unit")
            .field("name", &self.name)
            .field("object_path", &self.object_path)
            .finish()
    }
}
