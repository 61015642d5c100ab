use anyhow::Context;
use clap::Parser;
use reconcile::{Reconciler, Report};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

mod apply;
mod output;

pub use apply::ApplyFile;
use output::Output;

/// A command-line tool for managing Moira alerting triggers.
#[derive(Debug, Parser)]
#[clap(author, version)]
pub struct Cli {
    /// Base URL of the Moira API, such as `https://moira.example/api/`.
    #[clap(long, env = "MOIRA_API_URL")]
    api_url: Option<url::Url>,
    /// Timeout of each request to the Moira API.
    #[clap(long, default_value = "30s", value_parser = humantime::parse_duration)]
    timeout: Duration,
    /// Report what would change, without applying any changes.
    #[clap(long, global = true)]
    dry_run: bool,

    #[clap(subcommand)]
    cmd: Command,

    #[clap(flatten)]
    output: Output,
}

#[derive(Debug, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
pub enum Command {
    /// Create, update or remove the triggers of an apply file.
    ///
    /// Each trigger is matched with a remote trigger of the same name.
    /// Triggers of a template are created only if no trigger having the
    /// same name, targets and tags already exists.
    Apply(apply::Apply),
    /// Remove metric targets from every trigger which references them.
    ///
    /// Triggers which are left without any targets are deleted.
    PruneTargets(PruneTargets),
    /// Rename a tag on every trigger which carries it.
    RenameTag(RenameTag),
    /// Delete tags which aren't carried by any trigger.
    CleanupTags,
    /// Print the JSON schema of apply files.
    Schema,
}

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct PruneTargets {
    /// Path to a YAML or JSON mapping of names to targets.
    #[clap(long, conflicts_with = "targets", required_unless_present = "targets")]
    file: Option<PathBuf>,
    /// Target to prune, as NAME=TARGET. May be repeated.
    #[clap(long = "target", value_parser = parse_key_val)]
    targets: Vec<(String, String)>,
}

#[derive(Debug, clap::Args)]
pub struct RenameTag {
    /// Current name of the tag.
    #[clap(long)]
    previous: String,
    /// New name of the tag.
    #[clap(long)]
    next: String,
}

impl Cli {
    pub async fn run(&self) -> anyhow::Result<()> {
        let mut report = Report::new(self.dry_run);

        // Inputs are loaded before connecting, so that invalid
        // configuration fails without any call to the API.
        match &self.cmd {
            Command::Schema => return self.output.print(&schemars::schema_for!(ApplyFile)),
            Command::Apply(apply) => {
                let loaded = apply.load()?;
                let client = self.connect().await?;
                apply.run(&self.reconciler(&client), loaded, &mut report).await;
            }
            Command::PruneTargets(prune) => {
                let targets = prune.load()?;
                let client = self.connect().await?;
                report.record_prune(self.reconciler(&client).prune_targets(&targets).await);
            }
            Command::RenameTag(RenameTag { previous, next }) => {
                let client = self.connect().await?;
                report.record_rename(self.reconciler(&client).rename_tag(previous, next).await);
            }
            Command::CleanupTags => {
                let client = self.connect().await?;
                report.record_cleanup(self.reconciler(&client).cleanup_tags().await);
            }
        }

        for warning in &report.warnings {
            tracing::warn!(%warning, "completed with warning");
        }
        self.output.print(&report)?;

        let failed = report.failures().count()
            + report.pruned.as_ref().map_or(0, |pruned| pruned.failed.len());
        if failed != 0 {
            anyhow::bail!("failed to reconcile {failed} trigger(s)");
        }
        Ok(())
    }

    /// Build a client of the Moira API, and check that it's reachable.
    async fn connect(&self) -> anyhow::Result<moira_client::Client> {
        let Some(api_url) = &self.api_url else {
            anyhow::bail!("the Moira API URL is required (set --api-url or MOIRA_API_URL)");
        };
        let client = moira_client::Client::new(api_url.clone(), self.timeout)
            .context("failed to build Moira API client")?;

        reconcile::check_connectivity(&client)
            .await
            .with_context(|| format!("failed to connect to {api_url}"))?;

        Ok(client)
    }

    fn reconciler<'c>(&self, client: &'c moira_client::Client) -> Reconciler<'c, moira_client::Client> {
        Reconciler::new(client).with_dry_run(self.dry_run)
    }
}

impl PruneTargets {
    fn load(&self) -> anyhow::Result<BTreeMap<String, String>> {
        let Some(path) = &self.file else {
            return Ok(self.targets.iter().cloned().collect());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse targets file {}", path.display()))
    }
}

fn parse_key_val(s: &str) -> anyhow::Result<(String, String)> {
    let Some((key, value)) = s.split_once('=') else {
        anyhow::bail!("invalid NAME=TARGET: no `=` found in `{s}`");
    };
    if key.is_empty() || value.is_empty() {
        anyhow::bail!("invalid NAME=TARGET: `{s}` has an empty name or target");
    }
    Ok((key.to_string(), value.to_string()))
}
