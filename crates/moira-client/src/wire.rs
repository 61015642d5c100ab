use models::{RemoteTrigger, TriggerId, TtlState, Weekday};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use strum::IntoEnumIterator;

/// Trigger as it's represented by the Moira API.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Trigger {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TriggerId>,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub desc: String,
    #[serde(default)]
    pub ttl: Option<Ttl>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ttl_state: TtlState,
    #[serde(default, deserialize_with = "null_as_default")]
    pub expression: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub targets: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub warn_value: Option<f64>,
    #[serde(default)]
    pub error_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sched: Option<Schedule>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Moira reports TTLs as numbers, but older triggers may carry text.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Ttl {
    Seconds(u64),
    Text(String),
}

/// Weekly schedule of a trigger. Days which are not enabled
/// are the trigger's disabled days.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Schedule {
    #[serde(default, deserialize_with = "null_as_default")]
    pub days: Vec<Day>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Day {
    pub name: Weekday,
    pub enabled: bool,
}

/// Envelope of listing responses.
#[derive(Deserialize, Debug)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct List<T> {
    #[serde(default = "Vec::new", deserialize_with = "null_as_default")]
    pub list: Vec<T>,
}

/// Response to the creation of a trigger.
#[derive(Deserialize, Debug)]
pub struct Created {
    pub id: TriggerId,
}

// Key of RemoteTrigger::extra under which non-day schedule fields are carried.
const SCHED: &str = "sched";

impl From<Trigger> for RemoteTrigger {
    fn from(wire: Trigger) -> Self {
        let Trigger {
            id,
            name,
            desc,
            ttl,
            ttl_state,
            expression,
            targets,
            tags,
            warn_value,
            error_value,
            sched,
            mut extra,
        } = wire;

        let disabled_days = match sched {
            Some(Schedule { days, rest }) => {
                extra.insert(SCHED.to_string(), Value::Object(rest));
                days.into_iter()
                    .filter(|day| !day.enabled)
                    .map(|day| day.name)
                    .collect()
            }
            None => Default::default(),
        };

        RemoteTrigger {
            id,
            name,
            desc,
            ttl: match ttl {
                Some(Ttl::Seconds(seconds)) => seconds.to_string(),
                Some(Ttl::Text(text)) => text,
                None => models::DEFAULT_TTL.to_string(),
            },
            ttl_state,
            expression,
            disabled_days,
            targets,
            tags: tags.into_iter().collect(),
            warn_value,
            error_value,
            extra,
        }
    }
}

impl From<&RemoteTrigger> for Trigger {
    fn from(trigger: &RemoteTrigger) -> Self {
        let mut extra = trigger.extra.clone();

        let rest = match extra.remove(SCHED) {
            Some(Value::Object(rest)) => rest,
            _ => default_schedule(),
        };
        let days = Weekday::iter()
            .map(|name| Day {
                name,
                enabled: !trigger.disabled_days.contains(&name),
            })
            .collect();

        Trigger {
            id: trigger.id.clone(),
            name: trigger.name.clone(),
            desc: trigger.desc.clone(),
            ttl: Some(match trigger.ttl.parse() {
                Ok(seconds) => Ttl::Seconds(seconds),
                Err(_) => Ttl::Text(trigger.ttl.clone()),
            }),
            ttl_state: trigger.ttl_state,
            expression: trigger.expression.clone(),
            targets: trigger.targets.clone(),
            tags: trigger.tags.iter().cloned().collect(),
            warn_value: trigger.warn_value,
            error_value: trigger.error_value,
            sched: Some(Schedule { days, rest }),
            extra,
        }
    }
}

// Schedule of a trigger which is active throughout each day, in UTC.
fn default_schedule() -> Map<String, Value> {
    [("startOffset", 0), ("endOffset", 1439), ("tzOffset", 0)]
        .into_iter()
        .map(|(field, offset)| (field.to_string(), Value::from(offset)))
        .collect()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod test {
    use super::*;
    use models::TriggerSpec;
    use serde_json::json;

    #[test]
    fn test_decoding_moira_trigger() {
        let wire: Trigger = serde_json::from_value(json!({
            "id": "8b7d",
            "name": "cpu",
            "desc": null,
            "targets": ["host.cpu"],
            "warn_value": 80.5,
            "error_value": null,
            "tags": ["infra", "cpu"],
            "ttl_state": "ERROR",
            "ttl": 300,
            "expression": "",
            "patterns": ["host.cpu"],
            "is_remote": false,
            "sched": {
                "startOffset": 0,
                "endOffset": 1439,
                "tzOffset": -180,
                "days": [
                    {"name": "Mon", "enabled": true},
                    {"name": "Sat", "enabled": false},
                    {"name": "Sun", "enabled": false},
                ],
            },
        }))
        .unwrap();

        let remote = RemoteTrigger::from(wire);
        assert_eq!(remote.id, Some(TriggerId::new("8b7d")));
        assert_eq!(remote.desc, "");
        assert_eq!(remote.ttl, "300");
        assert_eq!(remote.ttl_state, TtlState::Error);
        assert_eq!(
            remote.disabled_days.iter().collect::<Vec<_>>(),
            vec![&Weekday::Sat, &Weekday::Sun]
        );
        assert_eq!(
            remote.tags.iter().collect::<Vec<_>>(),
            vec!["cpu", "infra"]
        );
        assert_eq!(remote.warn_value, Some(80.5));
        assert_eq!(remote.error_value, None);

        insta::assert_json_snapshot!(Value::Object(remote.extra.clone()), @r###"
        {
          "is_remote": false,
          "patterns": [
            "host.cpu"
          ],
          "sched": {
            "endOffset": 1439,
            "startOffset": 0,
            "tzOffset": -180
          }
        }
        "###);
    }

    #[test]
    fn test_encoding_drafted_trigger() {
        let mut spec = TriggerSpec::new("cpu", ["host.cpu", "host.load"]);
        spec.disabled_days.insert(Weekday::Sun);
        spec.tags.insert("infra".to_string());
        spec.error_value = Some(90.5);

        let wire = Trigger::from(&RemoteTrigger::draft(&spec));

        insta::assert_json_snapshot!(serde_json::to_value(&wire).unwrap(), @r###"
        {
          "desc": "",
          "error_value": 90.5,
          "expression": "",
          "name": "cpu",
          "sched": {
            "days": [
              {
                "enabled": true,
                "name": "Mon"
              },
              {
                "enabled": true,
                "name": "Tue"
              },
              {
                "enabled": true,
                "name": "Wed"
              },
              {
                "enabled": true,
                "name": "Thu"
              },
              {
                "enabled": true,
                "name": "Fri"
              },
              {
                "enabled": true,
                "name": "Sat"
              },
              {
                "enabled": false,
                "name": "Sun"
              }
            ],
            "endOffset": 1439,
            "startOffset": 0,
            "tzOffset": 0
          },
          "tags": [
            "infra"
          ],
          "targets": [
            "host.cpu",
            "host.load"
          ],
          "ttl": 600,
          "ttl_state": "NODATA",
          "warn_value": null
        }
        "###);
    }

    #[test]
    fn test_text_ttl_is_preserved() {
        let mut spec = TriggerSpec::new("cpu", ["host.cpu"]);
        spec.ttl = Some("10m".to_string());

        let wire = Trigger::from(&RemoteTrigger::draft(&spec));
        assert_eq!(wire.ttl, Some(Ttl::Text("10m".to_string())));
        assert_eq!(RemoteTrigger::from(wire).ttl, "10m");
    }

    #[test]
    fn test_listing_and_created_responses() {
        let listed: List<Trigger> = serde_json::from_value(json!({"list": null})).unwrap();
        assert!(listed.list.is_empty());

        let tags: List<models::Tag> = serde_json::from_value(json!({
            "list": [{"name": "infra", "triggers": ["a", "b"], "subscriptions": []}],
        }))
        .unwrap();
        assert_eq!(tags.list[0].triggers, vec![TriggerId::new("a"), TriggerId::new("b")]);

        let created: Created =
            serde_json::from_value(json!({"id": "8b7d", "message": "trigger created"})).unwrap();
        assert_eq!(created.id, TriggerId::new("8b7d"));
    }
}
