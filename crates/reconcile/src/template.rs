use crate::error::{Error, LeafError};
use models::TriggerSpec;
use serde_json::Value;
use std::collections::BTreeMap;

/// Loosely-typed trigger fields, as written in a template.
pub type Fields = serde_json::Map<String, Value>;

/// Fields which may be written as `;`-delimited text rather than a list.
const DELIMITED_FIELDS: [&str; 2] = ["targets", "tags"];

/// Template of many triggers which share common fields.
#[derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Template {
    /// # Fields shared by every trigger of the template.
    #[serde(default)]
    pub branch: Fields,
    /// # Fields of each trigger, keyed by instance.
    /// Leaf fields take precedence over those of the branch.
    pub leaves: BTreeMap<String, Fields>,
}

impl Template {
    pub fn expand(&self) -> Result<BTreeMap<String, TriggerSpec>, Error> {
        expand(&self.branch, &self.leaves)
    }
}

/// Expand `branch` crossed with each of `leaves` into a TriggerSpec per leaf key.
/// Expansion fails as a whole if there are no leaves, or if any leaf
/// doesn't produce a valid and uniquely-named TriggerSpec.
pub fn expand(
    branch: &Fields,
    leaves: &BTreeMap<String, Fields>,
) -> Result<BTreeMap<String, TriggerSpec>, Error> {
    if leaves.is_empty() {
        return Err(Error::EmptyTemplate);
    }

    let mut specs = BTreeMap::new();
    let mut names: BTreeMap<String, &String> = BTreeMap::new();

    for (key, leaf) in leaves {
        let spec = expand_leaf(branch, leaf).map_err(|source| Error::InvalidLeaf {
            key: key.clone(),
            source,
        })?;

        if let Some(first) = names.insert(spec.name.clone(), key) {
            return Err(Error::DuplicateName {
                name: spec.name,
                first: first.clone(),
                second: key.clone(),
            });
        }
        specs.insert(key.clone(), spec);
    }
    tracing::debug!(leaves = specs.len(), "expanded trigger template");

    Ok(specs)
}

fn expand_leaf(branch: &Fields, leaf: &Fields) -> Result<TriggerSpec, LeafError> {
    let mut fields = branch.clone();
    for (field, value) in leaf {
        fields.insert(field.clone(), value.clone());
    }

    for field in DELIMITED_FIELDS {
        if let Some(Value::String(text)) = fields.get(field) {
            let list = split_delimited(text);
            fields.insert(field.to_string(), list);
        }
    }

    let spec: TriggerSpec = serde_json::from_value(Value::Object(fields))?;
    spec.validate()?;

    Ok(spec)
}

fn split_delimited(text: &str) -> Value {
    text.split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| Value::String(part.to_string()))
        .collect()
}
