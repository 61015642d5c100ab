use crate::{Failure, PruneReport, Reconciler, Store, StoreError};
use models::{RemoteTrigger, TriggerId};
use std::collections::BTreeMap;

impl<'s, S: Store + ?Sized> Reconciler<'s, S> {
    /// Remove each of `targets` from every trigger which references it.
    /// Triggers which are left without any targets are deleted.
    ///
    /// `targets` is keyed by the caller's name for each target.
    /// A failure to prune one trigger doesn't prevent pruning of the rest.
    /// Failures are keyed by `<key>/<trigger id>`, or by `<key>` alone
    /// if triggers couldn't be listed.
    #[tracing::instrument(skip_all, fields(n_targets = targets.len()))]
    pub async fn prune_targets(&self, targets: &BTreeMap<String, String>) -> PruneReport {
        let mut report = PruneReport::default();
        // Triggers as a dry run would have left them, which the store
        // doesn't reflect. `None` marks a trigger it would have deleted.
        let mut planned: BTreeMap<TriggerId, Option<RemoteTrigger>> = BTreeMap::new();

        for (key, target) in targets {
            // The inventory is re-fetched for each target, as pruning
            // a prior target may have updated or deleted triggers.
            let triggers = match self.store.fetch_all().await {
                Ok(triggers) => triggers,
                Err(err) => {
                    tracing::warn!(%key, error = %err, "failed to fetch triggers to prune");
                    report.failed.insert(key.clone(), Failure::from(&err));
                    continue;
                }
            };
            let triggers: Vec<_> = triggers
                .into_iter()
                .filter_map(|trigger| match trigger.id.as_ref().and_then(|id| planned.get(id)) {
                    Some(pruned) => pruned.clone(),
                    None => Some(trigger),
                })
                .collect();

            for mut trigger in triggers {
                if !trigger.targets.contains(target) {
                    continue;
                }
                trigger.targets.retain(|t| t != target);

                match self.prune_one(&trigger).await {
                    Ok(deleted) => {
                        report.removed_targets.insert(target.clone());
                        if deleted {
                            report.removed_triggers.insert(trigger.name.clone());
                        }
                        if self.dry_run {
                            if let Some(id) = trigger.id.clone() {
                                planned.insert(id, (!deleted).then_some(trigger));
                            }
                        }
                    }
                    Err(err) => {
                        let subject = trigger
                            .id
                            .as_ref()
                            .map_or(trigger.name.as_str(), TriggerId::as_str);

                        tracing::warn!(trigger = %trigger.name, %target, error = %err, "failed to prune target");
                        report
                            .failed
                            .insert(format!("{key}/{subject}"), Failure::from(&err));
                    }
                }
            }
        }
        report
    }

    /// Push a trigger which had targets removed, deleting it if no targets
    /// remain. Returns whether the trigger was deleted.
    async fn prune_one(&self, trigger: &RemoteTrigger) -> Result<bool, StoreError> {
        let Some(id) = trigger.id.as_ref() else {
            return Err(StoreError::Other(format!(
                "listed trigger {:?} has no id",
                trigger.name
            )));
        };
        let deleted = trigger.targets.is_empty();

        if self.dry_run {
            tracing::debug!(%id, deleted, "would prune trigger");
        } else if deleted {
            self.store.delete(id).await?;
            tracing::info!(%id, name = %trigger.name, "deleted trigger without remaining targets");
        } else {
            self.store.update(trigger).await?;
            tracing::info!(%id, targets = ?trigger.targets, "pruned trigger targets");
        }
        Ok(deleted)
    }
}
