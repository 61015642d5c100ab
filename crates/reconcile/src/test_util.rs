use crate::{Component, Store, StoreError};
use models::{RemoteTrigger, Tag, TriggerId, TriggerSpec};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

/// Returns a trigger drafted from `spec` which was saved as `id`.
pub fn saved(id: &str, spec: &TriggerSpec) -> RemoteTrigger {
    let mut trigger = RemoteTrigger::draft(spec);
    trigger.id = Some(TriggerId::new(id));
    trigger
}

type Coercion = Box<dyn Fn(&mut RemoteTrigger) + Send + Sync>;

/// An in-memory Store which records a trace of every call it receives.
#[derive(Default)]
pub struct MockStore {
    inner: Mutex<Inner>,
    coercion: Option<Coercion>,
}

#[derive(Default)]
struct Inner {
    triggers: Vec<RemoteTrigger>,
    // Tags which exist in the store apart from those carried by triggers.
    tags: BTreeSet<String>,
    calls: Vec<String>,
    // Pairs of (operation, subject) which fail. A subject of "*" matches any.
    failures: BTreeSet<(String, String)>,
    next_id: usize,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trigger(self, trigger: RemoteTrigger) -> Self {
        self.inner.lock().unwrap().triggers.push(trigger);
        self
    }

    pub fn with_tag(self, name: &str) -> Self {
        self.inner.lock().unwrap().tags.insert(name.to_string());
        self
    }

    pub fn with_failure(self, op: &str, subject: &str) -> Self {
        self.inner
            .lock()
            .unwrap()
            .failures
            .insert((op.to_string(), subject.to_string()));
        self
    }

    /// Apply `coerce` to every trigger as it's updated,
    /// emulating a store which alters submitted values.
    pub fn with_coercion(self, coerce: impl Fn(&mut RemoteTrigger) + Send + Sync + 'static) -> Self {
        Self {
            coercion: Some(Box::new(coerce)),
            ..self
        }
    }

    pub fn take_calls(&self) -> Vec<String> {
        std::mem::take(&mut self.inner.lock().unwrap().calls)
    }

    pub fn triggers(&self) -> Vec<RemoteTrigger> {
        self.inner.lock().unwrap().triggers.clone()
    }

    pub fn tag_names(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        Self::all_tags(&inner).into_keys().collect()
    }

    fn all_tags(inner: &Inner) -> BTreeMap<String, Vec<TriggerId>> {
        let mut tags: BTreeMap<String, Vec<TriggerId>> = inner
            .tags
            .iter()
            .map(|name| (name.clone(), Vec::new()))
            .collect();

        for trigger in &inner.triggers {
            for tag in &trigger.tags {
                let refs = tags.entry(tag.clone()).or_default();
                refs.extend(trigger.id.clone());
            }
        }
        tags
    }
}

impl Inner {
    fn call(&mut self, op: &str, subject: &str) -> Result<(), StoreError> {
        self.calls.push(if subject.is_empty() {
            op.to_string()
        } else {
            format!("{op}({subject})")
        });

        let failed = self.failures.contains(&(op.to_string(), subject.to_string()))
            || self.failures.contains(&(op.to_string(), "*".to_string()));
        if failed {
            return Err(StoreError::Rejected {
                status: 500,
                message: format!("injected {op} failure"),
            });
        }
        Ok(())
    }

    fn position(&self, id: &TriggerId) -> Result<usize, StoreError> {
        self.triggers
            .iter()
            .position(|trigger| trigger.id.as_ref() == Some(id))
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }
}

#[async_trait::async_trait]
impl Store for MockStore {
    async fn check(&self, component: Component) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .call("check", component.as_str())
    }

    async fn fetch_all(&self) -> Result<Vec<RemoteTrigger>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.call("fetch_all", "")?;
        Ok(inner.triggers.clone())
    }

    async fn fetch_by_id(&self, id: &TriggerId) -> Result<RemoteTrigger, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.call("fetch_by_id", id.as_str())?;
        let index = inner.position(id)?;
        Ok(inner.triggers[index].clone())
    }

    async fn create(&self, spec: &TriggerSpec) -> Result<RemoteTrigger, StoreError> {
        self.inner.lock().unwrap().call("create", &spec.name)?;
        Ok(RemoteTrigger::draft(spec))
    }

    async fn save(&self, draft: &mut RemoteTrigger) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.call("save", &draft.name)?;

        inner.next_id += 1;
        draft.id = Some(TriggerId::new(format!("id-{}", inner.next_id)));
        inner.triggers.push(draft.clone());
        Ok(())
    }

    async fn update(&self, trigger: &RemoteTrigger) -> Result<RemoteTrigger, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(id) = &trigger.id else {
            return Err(StoreError::Other("cannot update an unsaved trigger".to_string()));
        };
        inner.call("update", id.as_str())?;
        let index = inner.position(id)?;

        let mut persisted = trigger.clone();
        if let Some(coerce) = &self.coercion {
            coerce(&mut persisted);
        }
        inner.triggers[index] = persisted.clone();
        Ok(persisted)
    }

    async fn delete(&self, id: &TriggerId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.call("delete", id.as_str())?;
        let index = inner.position(id)?;
        inner.triggers.remove(index);
        Ok(())
    }

    async fn stats(&self) -> Result<Vec<Tag>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.call("stats", "")?;

        Ok(Self::all_tags(&inner)
            .into_iter()
            .map(|(name, triggers)| Tag { name, triggers })
            .collect())
    }

    async fn delete_tag(&self, name: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.call("delete_tag", name)?;
        inner.tags.remove(name);
        Ok(())
    }
}
