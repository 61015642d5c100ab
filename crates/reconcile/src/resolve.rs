use models::{RemoteTrigger, TriggerId};

/// Resolve the identifier of the trigger named `name` within `triggers`,
/// a complete listing of the store. The store does not enforce unique names:
/// if several triggers share `name`, the first in listing order wins.
pub fn resolve<'t>(name: &str, triggers: &'t [RemoteTrigger]) -> Option<&'t TriggerId> {
    let mut matched = triggers
        .iter()
        .filter(|trigger| trigger.name == name)
        .filter_map(|trigger| trigger.id.as_ref());

    let first = matched.next()?;

    let others: Vec<_> = matched.collect();
    if !others.is_empty() {
        tracing::warn!(
            name,
            id = %first,
            ?others,
            "multiple triggers share a name; using the first listed"
        );
    }
    Some(first)
}
