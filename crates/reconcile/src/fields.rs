use models::{RemoteTrigger, TriggerSpec};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use strum::IntoEnumIterator;

/// Field of a trigger which is managed by reconciliation.
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Field {
    Name,
    Desc,
    Ttl,
    TtlState,
    Expression,
    DisabledDays,
    Targets,
    Tags,
    WarnValue,
    ErrorValue,
}

/// Desired and actual values of a field which failed to converge.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Mismatch {
    pub desired: Value,
    pub actual: Value,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// Returns whether `spec` expresses a desired value for this field.
    /// Optional fields which were left unset are not managed.
    pub fn is_set(self, spec: &TriggerSpec) -> bool {
        match self {
            Field::Ttl => spec.ttl.is_some(),
            Field::TtlState => spec.ttl_state.is_some(),
            Field::WarnValue => spec.warn_value.is_some(),
            Field::ErrorValue => spec.error_value.is_some(),
            _ => true,
        }
    }

    /// Returns whether `remote` holds the value of this field desired by `spec`.
    /// Fields which are not set in `spec` always match.
    pub fn matches(self, spec: &TriggerSpec, remote: &RemoteTrigger) -> bool {
        match self {
            Field::Name => spec.name == remote.name,
            Field::Desc => spec.desc == remote.desc,
            Field::Ttl => spec.ttl.as_ref().map_or(true, |ttl| *ttl == remote.ttl),
            Field::TtlState => spec
                .ttl_state
                .map_or(true, |state| state == remote.ttl_state),
            Field::Expression => spec.expression == remote.expression,
            Field::DisabledDays => spec.disabled_days == remote.disabled_days,
            Field::Targets => spec.targets == remote.targets,
            Field::Tags => spec.tags == remote.tags,
            Field::WarnValue => spec.warn_value.is_none() || spec.warn_value == remote.warn_value,
            Field::ErrorValue => {
                spec.error_value.is_none() || spec.error_value == remote.error_value
            }
        }
    }

    /// Overwrite this field of `remote` with its desired value from `spec`.
    fn assign(self, spec: &TriggerSpec, remote: &mut RemoteTrigger) {
        match self {
            Field::Name => remote.name = spec.name.clone(),
            Field::Desc => remote.desc = spec.desc.clone(),
            Field::Ttl => {
                if let Some(ttl) = &spec.ttl {
                    remote.ttl = ttl.clone();
                }
            }
            Field::TtlState => {
                if let Some(state) = spec.ttl_state {
                    remote.ttl_state = state;
                }
            }
            Field::Expression => remote.expression = spec.expression.clone(),
            Field::DisabledDays => remote.disabled_days = spec.disabled_days.clone(),
            Field::Targets => remote.targets = spec.targets.clone(),
            Field::Tags => remote.tags = spec.tags.clone(),
            Field::WarnValue => {
                if spec.warn_value.is_some() {
                    remote.warn_value = spec.warn_value;
                }
            }
            Field::ErrorValue => {
                if spec.error_value.is_some() {
                    remote.error_value = spec.error_value;
                }
            }
        }
    }

    fn desired_value(self, spec: &TriggerSpec) -> Value {
        match self {
            Field::Name => json!(spec.name),
            Field::Desc => json!(spec.desc),
            Field::Ttl => json!(spec.ttl),
            Field::TtlState => json!(spec.ttl_state),
            Field::Expression => json!(spec.expression),
            Field::DisabledDays => json!(spec.disabled_days),
            Field::Targets => json!(spec.targets),
            Field::Tags => json!(spec.tags),
            Field::WarnValue => json!(spec.warn_value),
            Field::ErrorValue => json!(spec.error_value),
        }
    }

    fn actual_value(self, remote: &RemoteTrigger) -> Value {
        match self {
            Field::Name => json!(remote.name),
            Field::Desc => json!(remote.desc),
            Field::Ttl => json!(remote.ttl),
            Field::TtlState => json!(remote.ttl_state),
            Field::Expression => json!(remote.expression),
            Field::DisabledDays => json!(remote.disabled_days),
            Field::Targets => json!(remote.targets),
            Field::Tags => json!(remote.tags),
            Field::WarnValue => json!(remote.warn_value),
            Field::ErrorValue => json!(remote.error_value),
        }
    }
}

/// Fields set in `spec` whose value differs in `remote`.
pub fn diff(spec: &TriggerSpec, remote: &RemoteTrigger) -> Vec<Field> {
    Field::iter()
        .filter(|field| field.is_set(spec) && !field.matches(spec, remote))
        .collect()
}

/// Overwrite each field of `remote` which differs from `spec`,
/// returning the fields which were changed. Fields not set in `spec`
/// and store-managed fields are left as they are.
pub fn sync(spec: &TriggerSpec, remote: &mut RemoteTrigger) -> Vec<Field> {
    let changed = diff(spec, remote);
    for field in &changed {
        field.assign(spec, remote);
    }
    changed
}

/// Compare a persisted trigger against `spec`, mapping each field
/// which doesn't hold its desired value to the observed mismatch.
pub fn verify(spec: &TriggerSpec, persisted: &RemoteTrigger) -> BTreeMap<Field, Mismatch> {
    diff(spec, persisted)
        .into_iter()
        .map(|field| {
            (
                field,
                Mismatch {
                    desired: field.desired_value(spec),
                    actual: field.actual_value(persisted),
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use models::{TtlState, Weekday};

    fn remote() -> RemoteTrigger {
        let mut spec = TriggerSpec::new("cpu", ["host.cpu"]);
        spec.ttl = Some("60".to_string());
        spec.ttl_state = Some(TtlState::Error);
        spec.warn_value = Some(10.0);
        spec.error_value = Some(20.0);
        RemoteTrigger::draft(&spec)
    }

    #[test]
    fn test_unset_optional_fields_are_not_managed() {
        let spec = TriggerSpec::new("cpu", ["host.cpu"]);
        let mut remote = remote();

        assert!(diff(&spec, &remote).is_empty());
        assert!(sync(&spec, &mut remote).is_empty());
        assert_eq!(remote.ttl, "60");
        assert_eq!(remote.ttl_state, TtlState::Error);
        assert_eq!(remote.warn_value, Some(10.0));
        assert_eq!(remote.error_value, Some(20.0));
    }

    #[test]
    fn test_sync_overwrites_differing_fields() {
        let mut spec = TriggerSpec::new("cpu", ["host.load", "host.cpu"]);
        spec.desc = "load".to_string();
        spec.ttl_state = Some(TtlState::Ok);
        spec.disabled_days.insert(Weekday::Sun);
        spec.tags.insert("infra".to_string());
        spec.warn_value = Some(10.0);

        let mut remote = remote();
        remote
            .extra
            .insert("patterns".to_string(), json!(["host.*"]));

        let changed = sync(&spec, &mut remote);
        assert_eq!(
            changed,
            vec![
                Field::Desc,
                Field::TtlState,
                Field::DisabledDays,
                Field::Targets,
                Field::Tags
            ]
        );
        assert!(diff(&spec, &remote).is_empty());
        assert!(verify(&spec, &remote).is_empty());

        // Unmanaged and store-managed fields are retained.
        assert_eq!(remote.ttl, "60");
        assert_eq!(remote.error_value, Some(20.0));
        assert_eq!(remote.extra["patterns"], json!(["host.*"]));
    }

    #[test]
    fn test_target_order_is_significant() {
        let spec = TriggerSpec::new("cpu", ["b", "a"]);
        let mut remote = RemoteTrigger::draft(&TriggerSpec::new("cpu", ["a", "b"]));
        assert_eq!(diff(&spec, &remote), vec![Field::Targets]);
        sync(&spec, &mut remote);
        assert_eq!(remote.targets, vec!["b", "a"]);
    }

    #[test]
    fn test_verify_reports_mismatches() {
        let mut spec = TriggerSpec::new("cpu", ["host.cpu"]);
        spec.ttl = Some("90".to_string());
        spec.warn_value = Some(1.5);

        let mut persisted = remote();
        persisted.warn_value = Some(2.5);

        insta::assert_json_snapshot!(serde_json::to_value(verify(&spec, &persisted)).unwrap(), @r###"
        {
          "ttl": {
            "actual": "60",
            "desired": "90"
          },
          "warn_value": {
            "actual": 2.5,
            "desired": 1.5
          }
        }
        "###);
    }
}
