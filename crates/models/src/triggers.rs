use schemars::JsonSchema;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Time-to-live applied to a newly created trigger which doesn't specify one.
pub const DEFAULT_TTL: &str = "600";

/// Identifier assigned to a trigger by the remote store upon its first save.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
#[serde(transparent)]
pub struct TriggerId(String);

impl TriggerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TriggerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Debug for TriggerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Self as std::fmt::Display>::fmt(self, f)
    }
}

/// State a trigger assumes when none of its targets produced data within its TTL.
#[derive(
    Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, Hash, JsonSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum TtlState {
    #[default]
    NoData,
    Error,
    Warn,
    Ok,
}

/// Day of the week on which a trigger is silenced.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    JsonSchema,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Weekday {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// TriggerSpec is the desired state of a single alerting trigger.
///
/// Optional fields which are left unset express no opinion: an existing
/// remote trigger keeps whatever value it already has, while a newly
/// created trigger receives the store's default.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TriggerSpec {
    /// # Name of the trigger.
    /// Names identify triggers across runs and must be unique within a run.
    pub name: String,
    /// # Description of the trigger.
    #[serde(default, alias = "description", skip_serializing_if = "String::is_empty")]
    pub desc: String,
    /// # Time to live, in seconds.
    #[serde(
        default,
        deserialize_with = "ttl_token",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(with = "Option<String>")]
    pub ttl: Option<String>,
    /// # State of the trigger once its TTL expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_state: Option<TtlState>,
    /// # Expression evaluated by the store against target values.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub expression: String,
    /// # Days on which the trigger is silenced.
    /// Given as a list, or as a YAML set such as `{ ? Sat, ? Sun }`.
    #[serde(
        default,
        deserialize_with = "day_set",
        skip_serializing_if = "BTreeSet::is_empty"
    )]
    #[schemars(with = "BTreeSet<Weekday>")]
    pub disabled_days: BTreeSet<Weekday>,
    /// # Metric targets of the trigger.
    /// Order is significant, as the store refers to targets by position.
    pub targets: Vec<String>,
    /// # Tags of the trigger.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    /// # Value at which the trigger enters WARN.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warn_value: Option<f64>,
    /// # Value at which the trigger enters ERROR.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_value: Option<f64>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum InvalidSpec {
    #[error("trigger name must not be empty")]
    EmptyName,
    #[error("trigger {0:?} must have at least one target")]
    NoTargets(String),
    #[error("trigger {name:?} has an empty target at position {index}")]
    EmptyTarget { name: String, index: usize },
}

impl TriggerSpec {
    /// Build a TriggerSpec having only its required fields.
    pub fn new<T: Into<String>>(name: impl Into<String>, targets: impl IntoIterator<Item = T>) -> Self {
        Self {
            name: name.into(),
            desc: String::new(),
            ttl: None,
            ttl_state: None,
            expression: String::new(),
            disabled_days: BTreeSet::new(),
            targets: targets.into_iter().map(Into::into).collect(),
            tags: BTreeSet::new(),
            warn_value: None,
            error_value: None,
        }
    }

    pub fn validate(&self) -> Result<(), InvalidSpec> {
        if self.name.is_empty() {
            return Err(InvalidSpec::EmptyName);
        }
        if self.targets.is_empty() {
            return Err(InvalidSpec::NoTargets(self.name.clone()));
        }
        if let Some(index) = self.targets.iter().position(|t| t.trim().is_empty()) {
            return Err(InvalidSpec::EmptyTarget {
                name: self.name.clone(),
                index,
            });
        }
        Ok(())
    }
}

// TTLs are frequently written as bare integers in YAML.
fn ttl_token<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Token {
        Text(String),
        Seconds(u64),
    }

    Ok(Option::<Token>::deserialize(deserializer)?.map(|token| match token {
        Token::Text(text) => text,
        Token::Seconds(seconds) => seconds.to_string(),
    }))
}

fn day_set<'de, D>(deserializer: D) -> Result<BTreeSet<Weekday>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Days {
        List(BTreeSet<Weekday>),
        Set(BTreeMap<Weekday, IgnoredAny>),
    }

    Ok(match Days::deserialize(deserializer)? {
        Days::List(days) => days,
        Days::Set(days) => days.into_keys().collect(),
    })
}

/// RemoteTrigger is a trigger as observed in, or drafted for, the remote store.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteTrigger {
    /// Assigned by the store when the trigger is first saved.
    pub id: Option<TriggerId>,
    pub name: String,
    pub desc: String,
    pub ttl: String,
    pub ttl_state: TtlState,
    pub expression: String,
    pub disabled_days: BTreeSet<Weekday>,
    pub targets: Vec<String>,
    pub tags: BTreeSet<String>,
    pub warn_value: Option<f64>,
    pub error_value: Option<f64>,
    /// Store-managed fields which are carried through updates untouched.
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RemoteTrigger {
    /// Draft an unsaved trigger from `spec`, filling unset fields with defaults.
    pub fn draft(spec: &TriggerSpec) -> Self {
        let TriggerSpec {
            name,
            desc,
            ttl,
            ttl_state,
            expression,
            disabled_days,
            targets,
            tags,
            warn_value,
            error_value,
        } = spec.clone();

        Self {
            id: None,
            name,
            desc,
            ttl: ttl.unwrap_or_else(|| DEFAULT_TTL.to_string()),
            ttl_state: ttl_state.unwrap_or_default(),
            expression,
            disabled_days,
            targets,
            tags,
            warn_value,
            error_value,
            extra: serde_json::Map::new(),
        }
    }
}

/// Tag as reported by the store's tag statistics.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Tag {
    pub name: String,
    /// Triggers which currently carry the tag.
    #[serde(default)]
    pub triggers: Vec<TriggerId>,
}
