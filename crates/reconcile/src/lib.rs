use models::{RemoteTrigger, TriggerSpec};
use std::collections::BTreeMap;
use strum::IntoEnumIterator;

mod error;
pub mod fields;
mod garden;
mod prune;
pub mod report;
pub mod resolve;
mod store;
pub mod template;

#[cfg(test)]
mod test_util;

pub use error::{Error, LeafError};
pub use fields::{Field, Mismatch};
pub use report::{Action, Failure, Outcome, PruneReport, Report, TagCleanup, TagRename};
pub use store::{Component, Store, StoreError};
pub use template::Template;

/// Desired state of a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Present,
    Absent,
}

/// Probe each API component of `store`, failing if any is unreachable.
pub async fn check_connectivity<S: Store + ?Sized>(store: &S) -> Result<(), Error> {
    let mut failures = BTreeMap::new();

    for component in Component::iter() {
        if let Err(err) = store.check(component).await {
            tracing::error!(component = component.as_str(), error = %err, "API component is unavailable");
            failures.insert(component, Failure::from(&err));
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(Error::Unreachable(failures))
    }
}

/// Reconciler converges triggers of a Store into their desired states.
///
/// Store operations are issued one at a time, in order. When `dry_run` is set,
/// the Reconciler only reads from the Store and reports planned actions.
pub struct Reconciler<'s, S: Store + ?Sized> {
    store: &'s S,
    dry_run: bool,
}

/// Result of pushing a synced trigger to the store.
enum Pushed {
    Converged(Vec<Field>),
    Diverged(BTreeMap<Field, Mismatch>),
}

impl<'s, S: Store + ?Sized> Reconciler<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            dry_run: false,
        }
    }

    pub fn with_dry_run(self, dry_run: bool) -> Self {
        Self { dry_run, ..self }
    }

    /// Reconcile a single trigger into its desired `state`.
    /// Store errors are captured as a failed Outcome.
    #[tracing::instrument(skip_all, fields(trigger = %spec.name, state = ?state))]
    pub async fn reconcile(&self, spec: &TriggerSpec, state: State) -> Outcome {
        match self.try_reconcile(spec, state).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(error = %err, "failed to reconcile trigger");
                Outcome::failed(&err)
            }
        }
    }

    /// Reconcile each of `specs` into `state`, recording outcomes into `report`.
    /// A failure of one instance doesn't prevent reconciliation of the rest.
    pub async fn reconcile_all(
        &self,
        specs: &BTreeMap<String, TriggerSpec>,
        state: State,
        report: &mut Report,
    ) {
        for (key, spec) in specs {
            let outcome = self.reconcile(spec, state).await;
            report.record(key, outcome);
        }
    }

    /// Create each of `specs` which doesn't already exist in the store,
    /// recording outcomes into `report`. Specs having an equivalent trigger
    /// are not saved and are instead added to the report's `already_exists`.
    /// A failure of one instance doesn't prevent creation of the rest.
    #[tracing::instrument(skip_all, fields(n_specs = specs.len()))]
    pub async fn create_all(&self, specs: &BTreeMap<String, TriggerSpec>, report: &mut Report) {
        for (key, spec) in specs {
            match self.try_create(spec).await {
                Ok(Some(outcome)) => report.record(key, outcome),
                Ok(None) => {
                    tracing::info!(%key, trigger = %spec.name, "trigger already exists");
                    report.record_already_exists(key, spec.clone());
                }
                Err(err) => {
                    tracing::warn!(%key, trigger = %spec.name, error = %err, "failed to create trigger");
                    report.record(key, Outcome::failed(&err));
                }
            }
        }
    }

    async fn try_reconcile(&self, spec: &TriggerSpec, state: State) -> Result<Outcome, StoreError> {
        let all_triggers = self.store.fetch_all().await?;
        let current_id = resolve::resolve(&spec.name, &all_triggers).cloned();

        match (state, current_id) {
            (State::Absent, None) => {
                tracing::debug!("trigger is already absent");
                Ok(Outcome::Absent)
            }
            (State::Absent, Some(id)) if self.dry_run => Ok(Outcome::Planned {
                action: Action::Remove,
                id: Some(id),
            }),
            (State::Absent, Some(id)) => {
                self.store.delete(&id).await?;
                tracing::info!(%id, "removed trigger");
                Ok(Outcome::Removed { id })
            }
            (State::Present, None) => {
                let draft = self.store.create(spec).await?;
                if self.dry_run {
                    return Ok(Outcome::Planned {
                        action: Action::Create,
                        id: None,
                    });
                }
                self.save_new(spec, draft).await
            }
            (State::Present, Some(id)) => {
                let remote = self.store.fetch_by_id(&id).await?;

                if self.dry_run {
                    let action = if fields::diff(spec, &remote).is_empty() {
                        Action::Unchanged
                    } else {
                        Action::Update
                    };
                    return Ok(Outcome::Planned {
                        action,
                        id: Some(id),
                    });
                }

                Ok(match self.push(spec, remote).await? {
                    Pushed::Converged(changed) => {
                        tracing::info!(%id, ?changed, "updated trigger");
                        Outcome::Updated { id, changed }
                    }
                    Pushed::Diverged(parameters) => Outcome::NotUpdated { id, parameters },
                })
            }
        }
    }

    /// Draft a trigger for `spec`, returning None if an equivalent exists.
    async fn try_create(&self, spec: &TriggerSpec) -> Result<Option<Outcome>, StoreError> {
        let draft = self.store.create(spec).await?;

        if self.store.is_exist(&draft).await? {
            return Ok(None);
        }
        if self.dry_run {
            return Ok(Some(Outcome::Planned {
                action: Action::Create,
                id: None,
            }));
        }
        self.save_new(spec, draft).await.map(Some)
    }

    async fn save_new(
        &self,
        spec: &TriggerSpec,
        mut draft: RemoteTrigger,
    ) -> Result<Outcome, StoreError> {
        self.store.save(&mut draft).await?;

        let Some(id) = draft.id.clone() else {
            return Err(StoreError::Other(format!(
                "store did not assign an id to saved trigger {:?}",
                spec.name
            )));
        };
        tracing::info!(%id, "created trigger");

        Ok(match self.push(spec, draft).await? {
            Pushed::Converged(_) => Outcome::Created { id },
            Pushed::Diverged(parameters) => Outcome::NotUpdated { id, parameters },
        })
    }

    /// Sync `spec` onto `remote`, push it with an update,
    /// and verify the trigger as it was persisted.
    async fn push(&self, spec: &TriggerSpec, mut remote: RemoteTrigger) -> Result<Pushed, StoreError> {
        let changed = fields::sync(spec, &mut remote);
        let persisted = self.store.update(&remote).await?;

        let mismatched = fields::verify(spec, &persisted);
        if mismatched.is_empty() {
            Ok(Pushed::Converged(changed))
        } else {
            tracing::warn!(
                id = ?persisted.id,
                fields = ?mismatched.keys().collect::<Vec<_>>(),
                "store did not persist desired trigger fields"
            );
            Ok(Pushed::Diverged(mismatched))
        }
    }
}
