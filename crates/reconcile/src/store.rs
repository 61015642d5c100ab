use models::{RemoteTrigger, Tag, TriggerId, TriggerSpec};
use std::collections::BTreeSet;

/// Components of the remote API which must be reachable before a run begins.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    serde::Serialize,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Component {
    Pattern,
    Tag,
    Trigger,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Error returned by a Store operation.
/// The variant name is reported to callers as the kind of failure.
#[derive(Debug, thiserror::Error, strum::IntoStaticStr)]
pub enum StoreError {
    #[error("trigger {0} was not found")]
    NotFound(TriggerId),
    #[error("request was rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("failed to reach the store: {0}")]
    Transport(String),
    #[error("failed to decode store response: {0}")]
    Decode(String),
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

/// A trait for allowing the engine access to the remote trigger store.
/// Engine passes only ever hold a borrowed Store, which makes it
/// straightforward to substitute a recording mock in tests.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Probe the availability of a single API component.
    async fn check(&self, component: Component) -> Result<(), StoreError>;

    /// Fetch every trigger known to the store, in the store's order.
    async fn fetch_all(&self) -> Result<Vec<RemoteTrigger>, StoreError>;

    async fn fetch_by_id(&self, id: &TriggerId) -> Result<RemoteTrigger, StoreError>;

    /// Draft a new, unsaved trigger from `spec`. Drafting never modifies the store.
    async fn create(&self, spec: &TriggerSpec) -> Result<RemoteTrigger, StoreError> {
        Ok(RemoteTrigger::draft(spec))
    }

    /// Returns whether a trigger equivalent to `candidate` already exists.
    /// Triggers are equivalent if they share a name, a set of targets,
    /// and a set of tags.
    async fn is_exist(&self, candidate: &RemoteTrigger) -> Result<bool, StoreError> {
        let targets: BTreeSet<&String> = candidate.targets.iter().collect();

        Ok(self.fetch_all().await?.iter().any(|existing| {
            existing.name == candidate.name
                && existing.tags == candidate.tags
                && existing.targets.iter().collect::<BTreeSet<_>>() == targets
        }))
    }

    /// Persist a drafted trigger, assigning its `id`.
    async fn save(&self, draft: &mut RemoteTrigger) -> Result<(), StoreError>;

    /// Persist all fields of an existing trigger, returning the
    /// trigger as it was stored.
    async fn update(&self, trigger: &RemoteTrigger) -> Result<RemoteTrigger, StoreError>;

    async fn delete(&self, id: &TriggerId) -> Result<(), StoreError>;

    /// Fetch all tags, each with the triggers which reference it.
    async fn stats(&self) -> Result<Vec<Tag>, StoreError>;

    async fn delete_tag(&self, name: &str) -> Result<(), StoreError>;
}
