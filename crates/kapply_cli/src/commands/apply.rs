//! Apply command - Render templates and apply them to the cluster.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use kapply_assets::{AssetSource, DirSource};
use kapply_core::{Applier, ApplierOptions, KubeClusterClient, KubeSchemaClient};

use super::load_values;

#[derive(Args)]
pub struct ApplyArgs {
    /// Directory containing the manifest templates
    #[arg(short = 'd', long = "templates-dir")]
    templates_dir: PathBuf,

    /// Template names to apply (default: every asset in the directory)
    #[arg(short = 't', long = "template")]
    templates: Vec<String>,

    /// YAML file with the value context for rendering
    #[arg(short = 'f', long = "values")]
    values: Option<PathBuf>,

    /// Validate and preview without mutating the cluster
    #[arg(long)]
    dry_run: bool,

    /// Apply without waiting for custom resource definitions to establish
    #[arg(long)]
    no_wait: bool,

    /// Stop at the first per-resource failure instead of continuing
    #[arg(long)]
    fail_fast: bool,

    /// Schema readiness poll interval in seconds
    #[arg(long, default_value_t = 2)]
    poll_secs: u64,

    /// Overall schema readiness timeout in seconds
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,
}

pub async fn execute(args: ApplyArgs) -> Result<()> {
    let assets = DirSource::new(&args.templates_dir);
    let templates = if args.templates.is_empty() {
        assets.names()
    } else {
        args.templates.clone()
    };
    if templates.is_empty() {
        anyhow::bail!(
            "no templates found under {}",
            args.templates_dir.display()
        );
    }
    let values = load_values(args.values.as_deref())?;

    let client = kube::Client::try_default()
        .await
        .context("failed to build cluster client")?;
    let applier = Applier::new(ApplierOptions {
        cluster: Some(Arc::new(KubeClusterClient::new(client.clone()))),
        schema: Some(Arc::new(KubeSchemaClient::new(client))),
        dry_run: args.dry_run,
        continue_on_error: !args.fail_fast,
        poll_interval: Some(Duration::from_secs(args.poll_secs)),
        timeout: Some(Duration::from_secs(args.timeout_secs)),
        ..Default::default()
    })?;

    info!(
        "Applying {} template(s) from {}",
        templates.len(),
        args.templates_dir.display()
    );
    let names: Vec<&str> = templates.iter().map(String::as_str).collect();
    let result = if args.no_wait {
        applier.apply_directly(&assets, &names, &values).await?
    } else {
        applier
            .apply_custom_resources(&assets, &names, &values)
            .await?
    };

    for outcome in &result.outcomes {
        match &outcome.error {
            Some(error) => println!("{:<10} {}  ({})", outcome.action, outcome.ident, error),
            None => println!("{:<10} {}", outcome.action, outcome.ident),
        }
    }

    result.ensure_success()?;
    Ok(())
}
