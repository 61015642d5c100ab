use crate::{Reconciler, Store, StoreError, TagCleanup, TagRename};
use models::TriggerId;

impl<'s, S: Store + ?Sized> Reconciler<'s, S> {
    /// Rename tag `previous` to `next` on every trigger which carries it.
    /// Failures are reported as warnings, and don't stop the pass.
    #[tracing::instrument(skip(self))]
    pub async fn rename_tag(&self, previous: &str, next: &str) -> TagRename {
        let mut renamed = TagRename {
            previous: previous.to_string(),
            next: next.to_string(),
            ..Default::default()
        };
        if previous == next {
            return renamed;
        }

        let tags = match self.store.stats().await {
            Ok(tags) => tags,
            Err(err) => {
                renamed.warnings.push(format!(
                    "{}: tag rename incomplete, retry next run",
                    err.kind()
                ));
                return renamed;
            }
        };

        for tag in tags.iter().filter(|tag| tag.name == previous) {
            for id in &tag.triggers {
                match self.retag(id, previous, next).await {
                    Ok(()) => {
                        renamed.updated.insert(id.clone());
                    }
                    Err(err) => {
                        tracing::warn!(%id, error = %err, "failed to rename tag of trigger");
                        renamed.warnings.push(format!(
                            "{}: failed to rename tag {previous:?} of trigger {id}: {err}",
                            err.kind()
                        ));
                    }
                }
            }
        }
        renamed
    }

    /// Delete every tag which isn't carried by any trigger.
    /// The first failure stops the pass and is reported as a warning.
    #[tracing::instrument(skip_all)]
    pub async fn cleanup_tags(&self) -> TagCleanup {
        let mut cleanup = TagCleanup::default();

        if let Err(err) = self.try_cleanup_tags(&mut cleanup).await {
            tracing::warn!(error = %err, "failed to clean up unused tags");
            cleanup.warnings.push(format!(
                "{}: tag cleanup incomplete, retry next run",
                err.kind()
            ));
        }
        cleanup
    }

    async fn try_cleanup_tags(&self, cleanup: &mut TagCleanup) -> Result<(), StoreError> {
        for tag in self.store.stats().await? {
            if !tag.triggers.is_empty() {
                continue;
            }
            if !self.dry_run {
                self.store.delete_tag(&tag.name).await?;
                tracing::info!(tag = %tag.name, "deleted unused tag");
            }
            cleanup.removed_tags.insert(tag.name);
        }
        Ok(())
    }

    async fn retag(&self, id: &TriggerId, previous: &str, next: &str) -> Result<(), StoreError> {
        let mut trigger = self.store.fetch_by_id(id).await?;

        trigger.tags.remove(previous);
        trigger.tags.insert(next.to_string());

        if !self.dry_run {
            self.store.update(&trigger).await?;
        }
        Ok(())
    }
}
