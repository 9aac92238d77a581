//! Prompt template rendering using Tera
//!
//! Templates are registered once by name so syntax errors surface when the
//! reasoning service is built, not halfway through a workflow run.

use serde_json::Value;
use tera::{Context, Tera};

use crate::{Error, Result};

pub struct PromptTemplates {
    tera: Tera,
}

impl PromptTemplates {
    pub fn new(templates: &[(&str, &str)]) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(templates.iter().copied())
            .map_err(|e| Error::Template(format!("Failed to parse templates: {}", e)))?;
        Ok(Self { tera })
    }

    pub fn render(&self, name: &str, context: &Value) -> Result<String> {
        self.tera
            .render(name, &to_context(context))
            .map_err(|e| Error::Template(format!("Failed to render template {}: {}", name, e)))
    }
}

fn to_context(value: &Value) -> Context {
    let mut context = Context::new();
    match value {
        Value::Object(map) => {
            for (key, value) in map {
                context.insert(key, value);
            }
        }
        // Non-object values are available as "data"
        _ => context.insert("data", value),
    }
    context
}
