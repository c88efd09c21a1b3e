//! CLI command definitions.
//!
//! This module defines the command structure for the kapply CLI.
//! Each subcommand maps to one pipeline entry point.

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

pub mod apply;
pub mod render;

/// Load the value context from a YAML file; no file means an empty
/// context.
pub(crate) fn load_values(path: Option<&Path>) -> Result<serde_json::Value> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read values file {}", path.display()))?;
            serde_yaml::from_str(&raw)
                .with_context(|| format!("values file {} is not valid YAML", path.display()))
        }
        None => Ok(serde_json::json!({})),
    }
}

/// kapply - template, render, and apply Kubernetes manifests
#[derive(Parser)]
#[command(name = "kapply")]
#[command(version, about = "kapply - template, render, and apply Kubernetes manifests")]
#[command(long_about = r#"
kapply renders manifest templates against a value context and applies the
result idempotently against a cluster, waiting for custom resource
definitions to establish before their instances are applied.

WORKFLOWS:
  apply   → Render templates and apply the resources to the cluster
  render  → Render templates and print the documents without applying

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments or configuration
  3 - One or more resources failed to apply
  4 - Template or manifest error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render templates and apply the resources to the cluster
    Apply(apply::ApplyArgs),

    /// Render templates and print the documents without applying
    Render(render::RenderArgs),
}
