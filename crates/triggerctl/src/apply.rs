use anyhow::Context;
use models::TriggerSpec;
use reconcile::{Reconciler, Report, State, Store, Template};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Converge triggers of an apply file into a desired state.
#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct Apply {
    /// Path to a YAML or JSON apply file.
    #[clap(long)]
    file: PathBuf,
    /// Desired state of the file's triggers.
    #[clap(long, value_enum, default_value = "present")]
    state: DesiredState,
    /// Don't delete tags which are left unused once triggers are applied.
    #[clap(long)]
    skip_tag_cleanup: bool,
}

#[derive(clap::ValueEnum, Debug, Copy, Clone, PartialEq)]
enum DesiredState {
    Present,
    Absent,
}

impl From<DesiredState> for State {
    fn from(state: DesiredState) -> Self {
        match state {
            DesiredState::Present => State::Present,
            DesiredState::Absent => State::Absent,
        }
    }
}

/// # Triggers to apply.
/// Either a list of triggers, or a template which expands into triggers.
#[derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema, Debug)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum ApplyFile {
    /// # Triggers, each keyed by its name.
    Triggers(Vec<TriggerSpec>),
    /// # Template of triggers, each keyed by its leaf.
    Template(Template),
}

impl ApplyFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse apply file {}", path.display()))
    }

    /// Resolve the file into TriggerSpecs keyed by instance.
    pub fn into_specs(self) -> anyhow::Result<BTreeMap<String, TriggerSpec>> {
        let specs = match self {
            ApplyFile::Template(template) => template.expand()?,
            ApplyFile::Triggers(triggers) => {
                let mut specs = BTreeMap::new();

                for spec in triggers {
                    spec.validate()?;
                    if let Some(prev) = specs.insert(spec.name.clone(), spec) {
                        anyhow::bail!("trigger {:?} is specified more than once", prev.name);
                    }
                }
                specs
            }
        };
        Ok(specs)
    }

    fn is_template(&self) -> bool {
        matches!(self, ApplyFile::Template(_))
    }
}

/// Triggers of a loaded apply file.
pub struct Loaded {
    specs: BTreeMap<String, TriggerSpec>,
    is_template: bool,
}

impl Apply {
    pub fn load(&self) -> anyhow::Result<Loaded> {
        let file = ApplyFile::load(&self.file)?;
        let is_template = file.is_template();
        let specs = file.into_specs()?;

        tracing::debug!(n_specs = specs.len(), is_template, "loaded apply file");
        Ok(Loaded { specs, is_template })
    }

    pub async fn run<S: Store + ?Sized>(
        &self,
        reconciler: &Reconciler<'_, S>,
        Loaded { specs, is_template }: Loaded,
        report: &mut Report,
    ) {
        let state = State::from(self.state);

        // Template instances are created only if no equivalent trigger exists.
        if is_template && state == State::Present {
            reconciler.create_all(&specs, report).await;
        } else {
            reconciler.reconcile_all(&specs, state, report).await;
        }

        if !self.skip_tag_cleanup {
            report.record_cleanup(reconciler.cleanup_tags().await);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_trigger_list_file() {
        let file: ApplyFile = serde_yaml::from_str(
            r#"
triggers:
  - name: cpu
    targets: [host.cpu]
    ttl: 60
  - name: disk
    targets: [host.disk]
    tags: [infra]
"#,
        )
        .unwrap();
        assert!(!file.is_template());

        let specs = file.into_specs().unwrap();
        assert_eq!(specs.keys().collect::<Vec<_>>(), vec!["cpu", "disk"]);
        assert_eq!(specs["cpu"].ttl.as_deref(), Some("60"));
    }

    #[test]
    fn test_template_file() {
        let file: ApplyFile = serde_yaml::from_str(
            r#"
template:
  branch:
    tags: infra;hosts
    ttl_state: ERROR
  leaves:
    leaf0: { name: cpu, targets: host.cpu }
    leaf1: { name: load, targets: host.load1;host.load5 }
"#,
        )
        .unwrap();
        assert!(file.is_template());

        let specs = file.into_specs().unwrap();
        assert_eq!(specs.keys().collect::<Vec<_>>(), vec!["leaf0", "leaf1"]);
        assert_eq!(specs["leaf1"].targets, vec!["host.load1", "host.load5"]);
        assert_eq!(
            specs["leaf0"].tags.iter().collect::<Vec<_>>(),
            vec!["hosts", "infra"]
        );
    }

    #[test]
    fn test_invalid_files() {
        let duplicated: ApplyFile = serde_yaml::from_str(
            r#"
triggers:
  - { name: cpu, targets: [a] }
  - { name: cpu, targets: [b] }
"#,
        )
        .unwrap();
        assert_eq!(
            duplicated.into_specs().unwrap_err().to_string(),
            "trigger \"cpu\" is specified more than once"
        );

        let untargeted: ApplyFile =
            serde_yaml::from_str("triggers: [{ name: cpu, targets: [] }]").unwrap();
        assert_eq!(
            untargeted.into_specs().unwrap_err().to_string(),
            "trigger \"cpu\" must have at least one target"
        );

        let empty: ApplyFile =
            serde_yaml::from_str("template: { branch: { ttl: 60 }, leaves: {} }").unwrap();
        assert_eq!(
            empty.into_specs().unwrap_err().to_string(),
            "template has no leaves to expand"
        );

        assert!(serde_yaml::from_str::<ApplyFile>("other: []").is_err());
    }
}
