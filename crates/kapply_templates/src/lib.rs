//! # kapply_templates
//!
//! Manifest template rendering for kapply.
//!
//! A [`TemplateRenderer`] expands `{{variable}}` placeholders and
//! `{{function(...)}}` invocations against a [`TemplateContext`] of JSON
//! values and named functions. Templates are resolved by name through a
//! [`kapply_assets::AssetSource`].
//!
//! ## Example
//!
//! ```rust
//! use kapply_assets::MemorySource;
//! use kapply_templates::{TemplateContext, TemplateRenderer};
//! use serde_json::json;
//!
//! let assets = MemorySource::new().with_asset("cm.yaml", "name: {{name}}");
//! let ctx = TemplateContext::new(json!({"name": "file1"}));
//! let rendered = TemplateRenderer::new().render("cm.yaml", &assets, &ctx).unwrap();
//! assert_eq!(rendered, b"name: file1");
//! ```

pub mod context;
pub mod error;
pub mod renderer;

pub use context::{TemplateContext, TemplateFn};
pub use error::{RenderError, RenderResult};
pub use renderer::TemplateRenderer;
