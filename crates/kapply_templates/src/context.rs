//! Value context and function table for rendering.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

/// A named function callable from a template.
///
/// Receives the already-resolved argument strings and returns the
/// replacement text, or a message describing why it failed.
pub type TemplateFn = Arc<dyn Fn(&[String]) -> Result<String, String> + Send + Sync>;

/// Values and functions available while rendering a template.
///
/// Read-only to the renderer; constructed fresh per call by the caller.
#[derive(Clone, Default)]
pub struct TemplateContext {
    values: Value,
    functions: HashMap<String, TemplateFn>,
}

impl TemplateContext {
    /// Create a context over a structured value, typically a JSON object.
    pub fn new(values: Value) -> Self {
        Self {
            values,
            functions: HashMap::new(),
        }
    }

    /// Register a named function, replacing any previous one.
    pub fn with_function<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[String]) -> Result<String, String> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(f));
        self
    }

    /// Resolve a dotted path (`spec.replicas`) into the value tree.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut current = &self.values;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current)
    }

    /// Add every function from `table` that is not already registered;
    /// existing registrations take precedence.
    pub fn with_functions(mut self, table: &HashMap<String, TemplateFn>) -> Self {
        for (name, f) in table {
            self.functions
                .entry(name.clone())
                .or_insert_with(|| f.clone());
        }
        self
    }

    pub fn function(&self, name: &str) -> Option<&TemplateFn> {
        self.functions.get(name)
    }
}

impl std::fmt::Debug for TemplateContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("TemplateContext")
            .field("values", &self.values)
            .field("functions", &names)
            .finish()
    }
}
