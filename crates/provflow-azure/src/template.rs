//! Provisioning script templating
//!
//! Scripts are rendered with Tera against the descriptor's
//! `provisioningTemplateView`. A script without `{{` or `{%` is returned
//! as-is. `{#` is always literal text, so bash `${#var}` needs no escaping
//! and Tera comments are not available; a literal `{%` or `{{` in bash must
//! be wrapped in `{% raw %}`.

use crate::descriptor::TemplateView;
use provflow_cloud::{CloudError, Result};
use std::path::Path;
use tera::{Context, Tera};

/// Renders provisioning scripts
pub struct ScriptTemplate {
    tera: Tera,
}

impl ScriptTemplate {
    pub fn new() -> Self {
        Self {
            tera: Tera::default(),
        }
    }

    /// Render `template` with `view`; no view means an empty context
    pub fn render_str(&mut self, template: &str, view: Option<&TemplateView>) -> Result<String> {
        if !is_template(template) {
            return Ok(template.to_string());
        }

        let context = match view {
            Some(view) => Context::from_value(serde_json::Value::Object(view.clone()))
                .map_err(|e| CloudError::Template(tera_error_detail(&e)))?,
            None => Context::new(),
        };

        self.tera
            .render_str(&escape_comment_openers(template), &context)
            .map_err(|e| CloudError::Template(tera_error_detail(&e)))
    }

    /// Read a script file and render it
    pub async fn render_file(&mut self, path: &Path, view: Option<&TemplateView>) -> Result<String> {
        let content = tokio::fs::read_to_string(path).await?;

        self.render_str(&content, view)
            .map_err(|e| match e {
                CloudError::Template(msg) => {
                    CloudError::Template(format!("{}: {msg}", path.display()))
                }
                other => other,
            })
    }
}

impl Default for ScriptTemplate {
    fn default() -> Self {
        Self::new()
    }
}

fn is_template(text: &str) -> bool {
    text.contains("{{") || text.contains("{%")
}

/// Rewrite `{#` outside raw blocks and expressions as an expression that
/// prints `{`, so Tera never sees a comment opener
fn escape_comment_openers(template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut in_raw = false;

    while let Some(idx) = rest.find('{') {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx..];

        let close = if tail.starts_with("{%") {
            Some("%}")
        } else if tail.starts_with("{{") {
            Some("}}")
        } else {
            None
        };

        match close {
            Some(close) => {
                let end = tail.find(close).map_or(tail.len(), |e| e + close.len());
                let tag = &tail[..end];
                if tag.starts_with("{%") {
                    match tag_name(tag) {
                        "raw" => in_raw = true,
                        "endraw" => in_raw = false,
                        _ => {}
                    }
                }
                out.push_str(tag);
                rest = &tail[end..];
            }
            None if tail.starts_with("{#") && !in_raw => {
                out.push_str("{{ \"{\" }}#");
                rest = &tail[2..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// `{%- raw %}` -> `raw`
fn tag_name(tag: &str) -> &str {
    tag.trim_start_matches("{%")
        .trim_end_matches("%}")
        .trim_matches(|c: char| c == '-' || c.is_whitespace())
}

/// Flatten the Tera error chain, naming undefined variables when possible
fn tera_error_detail(e: &tera::Error) -> String {
    use std::error::Error;

    let mut details = vec![e.to_string()];
    let mut source = e.source();
    while let Some(err) = source {
        details.push(err.to_string());
        source = err.source();
    }
    let full = details.join(" | ");

    if let Some(start) = full.find("Variable `") {
        if let Some(end) = full[start..].find("` not found") {
            let name = &full[start + "Variable `".len()..start + end];
            return format!(
                "undefined variable `{name}`; add it to 'provisioningTemplateView'"
            );
        }
    }

    full
}
