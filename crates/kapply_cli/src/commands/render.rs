//! Render command - Print rendered manifest documents without applying.
//!
//! Works entirely offline: no cluster connection is made.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use kapply_assets::{AssetSource, DirSource};
use kapply_core::decode_manifests;
use kapply_templates::{TemplateContext, TemplateRenderer};

use super::load_values;

#[derive(Args)]
pub struct RenderArgs {
    /// Directory containing the manifest templates
    #[arg(short = 'd', long = "templates-dir")]
    templates_dir: PathBuf,

    /// Template names to render (default: every asset in the directory)
    #[arg(short = 't', long = "template")]
    templates: Vec<String>,

    /// YAML file with the value context for rendering
    #[arg(short = 'f', long = "values")]
    values: Option<PathBuf>,
}

pub async fn execute(args: RenderArgs) -> Result<()> {
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
    let ctx = TemplateContext::new(values);
    let renderer = TemplateRenderer::new();

    for name in &templates {
        let rendered = renderer
            .render(name, &assets, &ctx)
            .map_err(kapply_core::ApplierError::Render)?;
        // Decode to validate before printing, so broken templates fail
        // the same way they would on apply.
        let resources = decode_manifests(&rendered).map_err(kapply_core::ApplierError::Decode)?;
        for resource in resources {
            println!("---");
            print!("{}", serde_yaml::to_string(&resource.body)?);
        }
    }
    Ok(())
}
