//! Prompt template store.
//!
//! Prompts live in a single YAML mapping of `name -> template`. Templates use
//! handlebars placeholders (`{{ tool_results }}`) and are rendered in strict
//! mode: a placeholder without a value is an error, never an empty string.
//! Values are inserted verbatim since the output goes to a model, not a browser.

use colonylab_core::error::PromptError;
use handlebars::Handlebars;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info};

/// The prompt file shipped with the binary.
pub const EMBEDDED_PROMPTS: &str = include_str!("../../../prompts/system.yaml");

/// Identifiers the analysis pipeline relies on.
pub const SIGN_DETECTOR: &str = "sign_detector";
pub const COLONY_ANALYZER: &str = "colony_analyzer";
pub const COLONY_REPORT_WRITER: &str = "colony_report_writer";

/// Variables supplied when rendering a prompt.
pub type PromptVars = BTreeMap<String, String>;

/// Named prompt templates, parsed and compiled once.
#[derive(Debug)]
pub struct PromptStore {
    sources: BTreeMap<String, String>,
    hbs: Handlebars<'static>,
}

impl PromptStore {
    /// Build a store from YAML text. `origin` names the source in errors.
    pub fn from_yaml(yaml: &str, origin: &str) -> Result<Self, PromptError> {
        let sources: BTreeMap<String, String> =
            serde_yaml::from_str(yaml).map_err(|e| PromptError::Load {
                path: origin.to_string(),
                reason: e.to_string(),
            })?;

        let mut hbs = Handlebars::new();
        hbs.set_strict_mode(true);
        hbs.register_escape_fn(handlebars::no_escape);

        for (name, body) in &sources {
            hbs.register_template_string(name, body)
                .map_err(|e| PromptError::Template {
                    prompt: name.clone(),
                    reason: e.to_string(),
                })?;
        }

        debug!(origin, count = sources.len(), "Prompt templates compiled");
        Ok(Self { sources, hbs })
    }

    /// Load the store from a YAML file.
    pub fn load(path: &Path) -> Result<Self, PromptError> {
        let yaml = std::fs::read_to_string(path).map_err(|e| PromptError::Load {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let store = Self::from_yaml(&yaml, &path.display().to_string())?;
        info!(path = %path.display(), prompts = ?store.names(), "Loaded prompt templates");
        Ok(store)
    }

    /// The store compiled into the binary.
    pub fn embedded() -> Result<Self, PromptError> {
        Self::from_yaml(EMBEDDED_PROMPTS, "embedded system.yaml")
    }

    /// Load from `path` when given, else fall back to the embedded prompts.
    pub fn load_or_embedded(path: Option<&Path>) -> Result<Self, PromptError> {
        match path {
            Some(p) => Self::load(p),
            None => Self::embedded(),
        }
    }

    /// Sorted template identifiers.
    pub fn names(&self) -> Vec<String> {
        self.sources.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    /// The raw template body.
    pub fn source(&self, name: &str) -> Result<&str, PromptError> {
        self.sources
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| self.not_found(name))
    }

    /// Variable names a template references, sorted and deduplicated.
    pub fn placeholders(&self, name: &str) -> Result<Vec<String>, PromptError> {
        Ok(scan_placeholders(self.source(name)?).into_iter().collect())
    }

    /// Render a template with the given variables.
    pub fn render(&self, name: &str, vars: &PromptVars) -> Result<String, PromptError> {
        for variable in self.placeholders(name)? {
            if !vars.contains_key(&variable) {
                return Err(PromptError::MissingVariable {
                    prompt: name.to_string(),
                    variable,
                });
            }
        }

        self.hbs
            .render(name, vars)
            .map_err(|e| PromptError::Template {
                prompt: name.to_string(),
                reason: e.to_string(),
            })
    }

    /// Render a template that takes no variables.
    pub fn render_plain(&self, name: &str) -> Result<String, PromptError> {
        self.render(name, &PromptVars::new())
    }

    fn not_found(&self, name: &str) -> PromptError {
        tracing::error!(prompt = name, available = ?self.names(), "System prompt not found");
        PromptError::NotFound {
            name: name.to_string(),
            available: self.names(),
        }
    }
}

/// Collect the root identifiers of simple `{{ var }}` expressions.
///
/// Block helpers, comments, partials and `this`/`@` references are ignored.
fn scan_placeholders(template: &str) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else { break };
        let expr = after[..end].trim_start_matches('{').trim().trim_start_matches('~').trim();
        rest = &after[end + 2..];

        if expr.is_empty() || expr.starts_with(['#', '/', '!', '>', '^', '@', '&']) {
            continue;
        }
        let Some(token) = expr.split_whitespace().next() else { continue };
        if token == "else" || token == "this" || token.starts_with("this.") {
            continue;
        }
        let root = token.split(['.', '/', '[']).next().unwrap_or_default();
        if is_identifier(root) {
            found.insert(root.to_string());
        }
    }
    found
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
