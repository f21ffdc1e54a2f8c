//! Shared value types for the unit view: unit kinds, enumeration snapshots,
//! variant-typed property values and name normalization helpers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use zbus::zvariant::{OwnedObjectPath, OwnedValue};

/// D-Bus object path of the systemd manager object.
pub const MANAGER_PATH: &str = "/org/freedesktop/systemd1";
/// Well-known bus name of systemd.
pub const MANAGER_DESTINATION: &str = "org.freedesktop.systemd1";
/// Interface carrying the manager-level calls and signals.
pub const MANAGER_INTERFACE: &str = "org.freedesktop.systemd1.Manager";
/// Interface carrying the per-unit properties and lifecycle methods.
pub const UNIT_INTERFACE: &str = "org.freedesktop.systemd1.Unit";

const UNIT_PATH_PREFIX: &str = "/org/freedesktop/systemd1/unit/";

/// The category of a unit, derived from its name suffix. Mutually exclusive
/// per unit in well-formed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Automount,
    BusName,
    Device,
    Mount,
    Path,
    Scope,
    Service,
    Slice,
    Snapshot,
    Socket,
    Swap,
    Target,
    Timer,
}

impl UnitKind {
    pub const ALL: [UnitKind; 13] = [
        UnitKind::Automount,
        UnitKind::BusName,
        UnitKind::Device,
        UnitKind::Mount,
        UnitKind::Path,
        UnitKind::Scope,
        UnitKind::Service,
        UnitKind::Slice,
        UnitKind::Snapshot,
        UnitKind::Socket,
        UnitKind::Swap,
        UnitKind::Target,
        UnitKind::Timer,
    ];

    /// Lowercase tag as it appears in unit name suffixes.
    pub fn tag(self) -> &'static str {
        match self {
            UnitKind::Automount => "automount",
            UnitKind::BusName => "busname",
            UnitKind::Device => "device",
            UnitKind::Mount => "mount",
            UnitKind::Path => "path",
            UnitKind::Scope => "scope",
            UnitKind::Service => "service",
            UnitKind::Slice => "slice",
            UnitKind::Snapshot => "snapshot",
            UnitKind::Socket => "socket",
            UnitKind::Swap => "swap",
            UnitKind::Target => "target",
            UnitKind::Timer => "timer",
        }
    }

    /// Canonical name suffix including the dot, e.g. `.service`.
    pub fn suffix(self) -> &'static str {
        match self {
            UnitKind::Automount => ".automount",
            UnitKind::BusName => ".busname",
            UnitKind::Device => ".device",
            UnitKind::Mount => ".mount",
            UnitKind::Path => ".path",
            UnitKind::Scope => ".scope",
            UnitKind::Service => ".service",
            UnitKind::Slice => ".slice",
            UnitKind::Snapshot => ".snapshot",
            UnitKind::Socket => ".socket",
            UnitKind::Swap => ".swap",
            UnitKind::Target => ".target",
            UnitKind::Timer => ".timer",
        }
    }

    /// Classifies a unit name by its suffix. Returns `None` for names
    /// without a recognized kind suffix.
    pub fn classify(name: &str) -> Option<Self> {
        let (_, suffix) = name.rsplit_once('.')?;
        Self::ALL.iter().copied().find(|kind| kind.tag() == suffix)
    }

    /// Parses a kind tag, case-insensitively. Used by the CLI.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let lowered = tag.to_ascii_lowercase();
        Self::ALL.iter().copied().find(|kind| kind.tag() == lowered)
    }
}

/// Immutable point-in-time record for one unit, as returned by the
/// manager's `ListUnits` enumeration. Superseded wholesale by the next
/// enumeration, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitSnapshot {
    pub name: String,
    pub description: String,
    pub load_state: String,
    pub active_state: String,
    pub sub_state: String,
    pub following: String,
    pub object_path: String,
    pub job_id: u32,
    pub job_type: String,
    pub job_path: String,
}

impl UnitSnapshot {
    pub fn kind(&self) -> Option<UnitKind> {
        UnitKind::classify(&self.name)
    }
}

/// Reference to a queued job, from the unit's `Job` property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRef {
    pub id: u32,
    pub object_path: String,
}

/// One entry of the `Conditions` or `Asserts` property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Condition {
    pub kind: String,
    pub trigger: bool,
    pub negate: bool,
    pub param: String,
    pub state: i32,
}

/// The unit's `LoadError` property: error name and message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadError {
    pub code: String,
    pub message: String,
}

/// A property value as stored in a [`crate::properties::PropertyCache`].
///
/// The transport converts raw bus values into this type, so the monitoring
/// core and its tests never handle zvariant directly. Values with a shape
/// this crate does not interpret are kept verbatim in `Raw`.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Str(String),
    Bool(bool),
    U64(u64),
    U32(u32),
    I32(i32),
    StrList(Vec<String>),
    Job(JobRef),
    Conditions(Vec<Condition>),
    LoadError(LoadError),
    Raw(OwnedValue),
}

impl PropertyValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            PropertyValue::Str(_) => "string",
            PropertyValue::Bool(_) => "boolean",
            PropertyValue::U64(_) => "u64",
            PropertyValue::U32(_) => "u32",
            PropertyValue::I32(_) => "i32",
            PropertyValue::StrList(_) => "string list",
            PropertyValue::Job(_) => "job reference",
            PropertyValue::Conditions(_) => "condition list",
            PropertyValue::LoadError(_) => "load error",
            PropertyValue::Raw(_) => "raw variant",
        }
    }
}

impl From<OwnedValue> for PropertyValue {
    fn from(value: OwnedValue) -> Self {
        if let Ok(text) = String::try_from(value.clone()) {
            return Self::Str(text);
        }
        if let Ok(flag) = bool::try_from(value.clone()) {
            return Self::Bool(flag);
        }
        if let Ok(number) = u64::try_from(value.clone()) {
            return Self::U64(number);
        }
        if let Ok(number) = u32::try_from(value.clone()) {
            return Self::U32(number);
        }
        if let Ok(number) = i32::try_from(value.clone()) {
            return Self::I32(number);
        }
        if let Ok(items) = <Vec<String>>::try_from(value.clone()) {
            return Self::StrList(items);
        }
        if let Ok((id, path)) = <(u32, OwnedObjectPath)>::try_from(value.clone()) {
            return Self::Job(JobRef {
                id,
                object_path: path.to_string(),
            });
        }
        if let Ok((code, message)) = <(String, String)>::try_from(value.clone()) {
            return Self::LoadError(LoadError { code, message });
        }
        if let Ok(rows) = <Vec<(String, bool, bool, String, i32)>>::try_from(value.clone()) {
            let conditions = rows
                .into_iter()
                .map(|(kind, trigger, negate, param, state)| Condition {
                    kind,
                    trigger,
                    negate,
                    param,
                    state,
                })
                .collect();
            return Self::Conditions(conditions);
        }
        Self::Raw(value)
    }
}

/// Appends `suffix` to `name` unless it is already present.
pub fn normalize_name(name: &str, suffix: &str) -> String {
    if name.ends_with(suffix) {
        name.to_string()
    } else {
        format!("{name}{suffix}")
    }
}

/// Escapes a unit name the way systemd escapes bus labels: ASCII letters
/// pass through, digits pass through except in leading position, every
/// other byte becomes `_` followed by two lowercase hex digits. The empty
/// string escapes to `_`.
pub fn escape_name(name: &str) -> String {
    if name.is_empty() {
        return "_".to_string();
    }

    let mut escaped = String::with_capacity(name.len());
    for (index, byte) in name.bytes().enumerate() {
        let keep = byte.is_ascii_alphabetic() || (index > 0 && byte.is_ascii_digit());
        if keep {
            escaped.push(byte as char);
        } else {
            escaped.push_str(&format!("_{byte:02x}"));
        }
    }
    escaped
}

/// D-Bus object path of the unit with the given (already normalized) name.
pub fn unit_object_path(name: &str) -> String {
    format!("{UNIT_PATH_PREFIX}{}", escape_name(name))
}

/// Converts a systemd CLOCK_REALTIME microsecond timestamp to UTC. Returns
/// `None` for the "never happened" encodings 0 and `u64::MAX`.
pub fn realtime_usec_to_utc(usec: u64) -> Option<DateTime<Utc>> {
    if usec == 0 || usec == u64::MAX {
        return None;
    }

    let secs = (usec / 1_000_000) as i64;
    let nanos = ((usec % 1_000_000) * 1_000) as u32;
    DateTime::from_timestamp(secs, nanos)
}

#[cfg(test)]
mod tests {
    use zbus::zvariant::{ObjectPath, Value};

    use super::*;

    fn owned(value: Value<'_>) -> OwnedValue {
        value.try_to_owned().expect("owned value conversion")
    }

    #[test]
    fn classify_recognizes_each_kind() {
        assert_eq!(UnitKind::classify("docker.service"), Some(UnitKind::Service));
        assert_eq!(UnitKind::classify("foo.socket"), Some(UnitKind::Socket));
        assert_eq!(UnitKind::classify("bar.timer"), Some(UnitKind::Timer));
        assert_eq!(
            UnitKind::classify("dev-sda1.device"),
            Some(UnitKind::Device)
        );
        assert_eq!(UnitKind::classify("-.mount"), Some(UnitKind::Mount));
    }

    #[test]
    fn classify_rejects_unknown_suffixes() {
        assert_eq!(UnitKind::classify("plainname"), None);
        assert_eq!(UnitKind::classify("strange.widget"), None);
        assert_eq!(UnitKind::classify(""), None);
    }

    #[test]
    fn from_tag_is_case_insensitive() {
        assert_eq!(UnitKind::from_tag("SERVICE"), Some(UnitKind::Service));
        assert_eq!(UnitKind::from_tag("socket"), Some(UnitKind::Socket));
        assert_eq!(UnitKind::from_tag("widget"), None);
    }

    #[test]
    fn normalize_appends_missing_suffix_only() {
        assert_eq!(normalize_name("docker", ".service"), "docker.service");
        assert_eq!(
            normalize_name("docker.service", ".service"),
            "docker.service"
        );
    }

    #[test]
    fn escape_follows_bus_label_rules() {
        assert_eq!(escape_name("docker.service"), "docker_2eservice");
        assert_eq!(escape_name("dev-sda1.swap"), "dev_2dsda1_2eswap");
        assert_eq!(escape_name("1st.service"), "_31st_2eservice");
        assert_eq!(escape_name(""), "_");
    }

    #[test]
    fn unit_paths_use_escaped_names() {
        assert_eq!(
            unit_object_path("docker.service"),
            "/org/freedesktop/systemd1/unit/docker_2eservice"
        );
    }

    #[test]
    fn property_value_conversion_covers_basic_shapes() {
        assert_eq!(
            PropertyValue::from(owned(Value::new("active"))),
            PropertyValue::Str("active".to_string())
        );
        assert_eq!(
            PropertyValue::from(owned(Value::new(true))),
            PropertyValue::Bool(true)
        );
        assert_eq!(
            PropertyValue::from(owned(Value::new(42u64))),
            PropertyValue::U64(42)
        );
        assert_eq!(
            PropertyValue::from(owned(Value::new(vec![
                "a.service".to_string(),
                "b.service".to_string()
            ]))),
            PropertyValue::StrList(vec!["a.service".to_string(), "b.service".to_string()])
        );
    }

    #[test]
    fn property_value_conversion_decodes_job_structure() {
        let path = ObjectPath::try_from("/org/freedesktop/systemd1/job/7").expect("path");
        let converted = PropertyValue::from(owned(Value::new((7u32, path))));
        assert_eq!(
            converted,
            PropertyValue::Job(JobRef {
                id: 7,
                object_path: "/org/freedesktop/systemd1/job/7".to_string(),
            })
        );
    }

    #[test]
    fn snapshot_kind_uses_name_suffix() {
        let snapshot = UnitSnapshot {
            name: "foo.socket".to_string(),
            description: "Foo".to_string(),
            load_state: "loaded".to_string(),
            active_state: "active".to_string(),
            sub_state: "listening".to_string(),
            following: String::new(),
            object_path: unit_object_path("foo.socket"),
            job_id: 0,
            job_type: String::new(),
            job_path: "/".to_string(),
        };
        assert_eq!(snapshot.kind(), Some(UnitKind::Socket));
    }

    #[test]
    fn realtime_conversion_handles_never_markers() {
        assert_eq!(realtime_usec_to_utc(0), None);
        assert_eq!(realtime_usec_to_utc(u64::MAX), None);

        let at = realtime_usec_to_utc(1_700_000_000_000_000).expect("timestamp");
        assert_eq!(at.timestamp(), 1_700_000_000);
    }
}
