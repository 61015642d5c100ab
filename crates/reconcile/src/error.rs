use crate::report::Failure;
use crate::store::Component;
use std::collections::BTreeMap;

/// Error which aborts a run before any trigger is reconciled.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("remote API is unavailable ({})", describe_unreachable(.0))]
    Unreachable(BTreeMap<Component, Failure>),
    #[error("template has no leaves to expand")]
    EmptyTemplate,
    #[error("template leaf {key:?} is invalid")]
    InvalidLeaf {
        key: String,
        #[source]
        source: LeafError,
    },
    #[error("template leaves {first:?} and {second:?} both expand to trigger {name:?}")]
    DuplicateName {
        name: String,
        first: String,
        second: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum LeafError {
    #[error("failed to parse trigger fields")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] models::InvalidSpec),
}

fn describe_unreachable(failures: &BTreeMap<Component, Failure>) -> String {
    failures
        .iter()
        .map(|(component, failure)| {
            format!("{}: {}: {}", component.as_str(), failure.error, failure.details)
        })
        .collect::<Vec<_>>()
        .join("; ")
}
