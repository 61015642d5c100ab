use crate::fields::{Field, Mismatch};
use crate::store::StoreError;
use models::{TriggerId, TriggerSpec};
use serde::{ser::SerializeMap, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};

/// A store error, as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub error: String,
    pub details: String,
}

impl From<&StoreError> for Failure {
    fn from(err: &StoreError) -> Self {
        Self {
            error: err.kind().to_string(),
            details: err.to_string(),
        }
    }
}

/// Action which a dry run would have taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Update,
    Remove,
    Unchanged,
}

/// Outcome of reconciling a single trigger instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// A new trigger was created.
    Created { id: TriggerId },
    /// An existing trigger was updated. `changed` enumerates the fields
    /// which differed from the desired TriggerSpec.
    Updated { id: TriggerId, changed: Vec<Field> },
    Removed { id: TriggerId },
    /// The trigger is desired to be absent, and was not found.
    Absent,
    /// An equivalent trigger already exists, and the instance was not saved.
    /// `occurrence` indexes the report's `already_exists` bucket.
    AlreadyExists { occurrence: usize },
    Planned {
        action: Action,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<TriggerId>,
    },
    Failed(Failure),
    /// The store accepted an update, but did not persist the desired values.
    NotUpdated {
        id: TriggerId,
        parameters: BTreeMap<Field, Mismatch>,
    },
}

impl Outcome {
    pub fn failed(err: &StoreError) -> Self {
        Outcome::Failed(err.into())
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_) | Outcome::NotUpdated { .. })
    }

    pub fn is_change(&self) -> bool {
        matches!(
            self,
            Outcome::Created { .. } | Outcome::Updated { .. } | Outcome::Removed { .. }
        )
    }
}

/// Result of pruning metric targets from triggers.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct PruneReport {
    /// Targets which were removed from at least one trigger.
    #[serde(serialize_with = "group_by_count")]
    pub removed_targets: BTreeSet<String>,
    /// Triggers which were deleted because they were left without targets.
    #[serde(serialize_with = "group_by_count")]
    pub removed_triggers: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub failed: BTreeMap<String, Failure>,
}

impl PruneReport {
    pub fn is_empty(&self) -> bool {
        self.removed_targets.is_empty() && self.removed_triggers.is_empty()
    }
}

/// Result of renaming a tag across triggers.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct TagRename {
    pub previous: String,
    pub next: String,
    /// Triggers which had the tag renamed.
    pub updated: BTreeSet<TriggerId>,
    #[serde(skip)]
    pub warnings: Vec<String>,
}

/// Result of deleting tags which are attached to no trigger.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct TagCleanup {
    #[serde(serialize_with = "group_by_count")]
    pub removed_tags: BTreeSet<String>,
    #[serde(skip)]
    pub warnings: Vec<String>,
}

/// Report accumulates the outcomes of a run into a single structure
/// which may be serialized for the caller.
#[derive(Debug, Default, Serialize)]
pub struct Report {
    pub changed: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub dry_run: bool,
    /// Outcome of each trigger instance, by instance key.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub triggers: BTreeMap<String, Outcome>,
    /// TriggerSpecs which were not saved because an equivalent trigger
    /// exists, keyed by their order of occurrence.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub already_exists: BTreeMap<usize, TriggerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pruned: Option<PruneReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renamed_tag: Option<TagRename>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleaned_tags: Option<TagCleanup>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Report {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    /// Record the outcome of trigger instance `key`.
    pub fn record(&mut self, key: impl Into<String>, outcome: Outcome) {
        let key = key.into();
        self.changed |= outcome.is_change();

        if let Some(prev) = self.triggers.insert(key.clone(), outcome) {
            tracing::warn!(%key, ?prev, "trigger instance was reconciled more than once");
        }
    }

    /// Record that instance `key` was not saved because an equivalent
    /// trigger already exists.
    pub fn record_already_exists(&mut self, key: impl Into<String>, spec: TriggerSpec) {
        let occurrence = self.already_exists.len() + 1;
        self.already_exists.insert(occurrence, spec);
        self.record(key, Outcome::AlreadyExists { occurrence });
    }

    pub fn record_prune(&mut self, pruned: PruneReport) {
        self.changed |= !self.dry_run && !pruned.is_empty();
        self.pruned = Some(pruned);
    }

    pub fn record_rename(&mut self, mut renamed: TagRename) {
        self.changed |= !self.dry_run && !renamed.updated.is_empty();
        self.warnings.append(&mut renamed.warnings);
        self.renamed_tag = Some(renamed);
    }

    pub fn record_cleanup(&mut self, mut cleaned: TagCleanup) {
        self.changed |= !self.dry_run && !cleaned.removed_tags.is_empty();
        self.warnings.append(&mut cleaned.warnings);
        self.cleaned_tags = Some(cleaned);
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Returns whether any trigger instance or pruned trigger failed.
    /// Warnings never constitute a failure.
    pub fn is_failure(&self) -> bool {
        self.triggers.values().any(Outcome::is_failure)
            || self
                .pruned
                .as_ref()
                .map_or(false, |pruned| !pruned.failed.is_empty())
    }

    /// Instance keys and outcomes which failed.
    pub fn failures(&self) -> impl Iterator<Item = (&String, &Outcome)> {
        self.triggers
            .iter()
            .filter(|(_, outcome)| outcome.is_failure())
    }
}

/// Serialize names as a single-entry mapping of their count to the names,
/// or as an empty mapping if there are no names.
fn group_by_count<S>(names: &BTreeSet<String>, ser: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if names.is_empty() {
        return ser.serialize_map(Some(0))?.end();
    }
    let mut map = ser.serialize_map(Some(1))?;
    map.serialize_entry(&names.len(), names)?;
    map.end()
}
