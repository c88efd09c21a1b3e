//! Template expansion.
//!
//! Templates interpolate `{{path.to.value}}` placeholders from the
//! context's value tree and `{{name(arg, ...)}}` invocations against the
//! context's function table. Function arguments are either quoted string
//! literals or variable paths resolved from the context. Rendering is
//! deterministic for identical (template, context) inputs and performs no
//! I/O beyond reading the named asset.

use regex::{Captures, Regex};
use serde_json::Value;
use tracing::debug;

use kapply_assets::AssetSource;

use crate::context::TemplateContext;
use crate::error::{RenderError, RenderResult};

/// Renderer for manifest templates.
pub struct TemplateRenderer {
    function_pattern: Regex,
    variable_pattern: Regex,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self {
            // Match {{name(arg, ...)}} invocations
            function_pattern: Regex::new(
                r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*)\(([^()]*)\)\s*\}\}",
            )
            .unwrap(),
            // Match {{path.to.value}} placeholders
            variable_pattern: Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_.]*)\s*\}\}").unwrap(),
        }
    }

    /// Render a named template from `assets` against `ctx`.
    pub fn render(
        &self,
        name: &str,
        assets: &dyn AssetSource,
        ctx: &TemplateContext,
    ) -> RenderResult<Vec<u8>> {
        let raw = assets.read(name)?;
        let content =
            String::from_utf8(raw).map_err(|_| RenderError::InvalidUtf8(name.to_string()))?;
        debug!("Rendering template {}", name);
        Ok(self.render_content(&content, ctx)?.into_bytes())
    }

    /// Render raw template content against `ctx`.
    pub fn render_content(&self, content: &str, ctx: &TemplateContext) -> RenderResult<String> {
        // Functions first so their quoted arguments are not mistaken for
        // variable placeholders.
        let expanded = expand(&self.function_pattern, content, |caps| {
            let name = &caps[1];
            let f = ctx
                .function(name)
                .ok_or_else(|| RenderError::UnknownFunction(name.to_string()))?;
            let args = resolve_args(&caps[2], ctx)?;
            f(&args).map_err(|message| RenderError::FunctionFailed {
                function: name.to_string(),
                message,
            })
        })?;

        expand(&self.variable_pattern, &expanded, |caps| {
            let path = &caps[1];
            let value = ctx
                .lookup(path)
                .ok_or_else(|| RenderError::MissingVariable(path.to_string()))?;
            value_to_string(path, value)
        })
    }
}

fn expand<F>(pattern: &Regex, input: &str, mut substitute: F) -> RenderResult<String>
where
    F: FnMut(&Captures) -> RenderResult<String>,
{
    let mut out = String::with_capacity(input.len());
    let mut last = 0;
    for caps in pattern.captures_iter(input) {
        let whole = caps.get(0).unwrap();
        out.push_str(&input[last..whole.start()]);
        out.push_str(&substitute(&caps)?);
        last = whole.end();
    }
    out.push_str(&input[last..]);
    Ok(out)
}

/// Resolve a comma-separated argument list: quoted literals pass through,
/// anything else is looked up as a variable path.
fn resolve_args(raw: &str, ctx: &TemplateContext) -> RenderResult<Vec<String>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    raw.split(',')
        .map(|arg| {
            let arg = arg.trim();
            if let Some(literal) = unquote(arg) {
                return Ok(literal.to_string());
            }
            let value = ctx
                .lookup(arg)
                .ok_or_else(|| RenderError::MissingVariable(arg.to_string()))?;
            value_to_string(arg, value)
        })
        .collect()
}

fn unquote(arg: &str) -> Option<&str> {
    let stripped = arg
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| arg.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')));
    stripped
}

fn value_to_string(path: &str, value: &Value) -> RenderResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Err(RenderError::MissingVariable(path.to_string())),
        // Compound values are embedded as compact JSON, which is valid YAML.
        other => serde_json::to_string(other)
            .map_err(|_| RenderError::MissingVariable(path.to_string())),
    }
}
