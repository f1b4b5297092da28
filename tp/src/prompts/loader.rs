//! Prompt Loader
//!
//! Loads prompt templates from an override directory or falls back to
//! embedded defaults.

use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::embedded;

/// Context for the intent prompt
#[derive(Debug, Clone, Serialize)]
pub struct IntentContext {
    /// Current date, for resolving relative dates
    pub today: String,
    /// Collected slots as pretty JSON
    pub slots: String,
    /// Whether an itinerary already exists
    pub plan_exists: bool,
    /// Comma separated missing required slots
    pub missing: String,
}

/// Context for the revise prompt
#[derive(Debug, Clone, Serialize)]
pub struct ReviseContext {
    pub instruction: String,
    /// Current plan as pretty JSON
    pub plan: String,
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine
    hbs: Handlebars<'static>,
    /// User override directory (e.g., `~/.config/tripplanner/prompts/`)
    user_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader that checks `dir` before the embedded prompts
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let exists = dir.exists();
        debug!(?dir, %exists, "PromptLoader::new: called");
        Self {
            hbs: Handlebars::new(),
            user_dir: exists.then(|| dir.to_path_buf()),
        }
    }

    /// Loader using the per-user override directory when present
    pub fn from_user_config() -> Self {
        match dirs::config_dir() {
            Some(dir) => Self::new(dir.join("tripplanner").join("prompts")),
            None => Self::embedded_only(),
        }
    }

    /// Create a loader that only uses embedded prompts (for testing)
    pub fn embedded_only() -> Self {
        debug!("PromptLoader::embedded_only: called");
        Self {
            hbs: Handlebars::new(),
            user_dir: None,
        }
    }

    /// Load a template by name
    ///
    /// Checks in order:
    /// 1. User override: `{user_dir}/{name}.pmt`
    /// 2. Embedded fallback
    fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "PromptLoader::load_template: called");
        if let Some(ref user_dir) = self.user_dir {
            let path = user_dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found in user override");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read user prompt {}: {}", path.display(), e));
            }
        }

        if let Some(content) = embedded::get_embedded(name) {
            debug!(%name, "PromptLoader::load_template: found in embedded");
            return Ok(content.to_string());
        }

        debug!(%name, "PromptLoader::load_template: not found anywhere");
        Err(eyre!("Prompt template not found: {}", name))
    }

    /// Render a template with the given context
    pub fn render<C: Serialize>(&self, template_name: &str, context: &C) -> Result<String> {
        debug!(%template_name, "PromptLoader::render: called");
        let template = self.load_template(template_name)?;
        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", template_name, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn intent_context(plan_exists: bool) -> IntentContext {
        IntentContext {
            today: "2025-10-01".to_string(),
            slots: r#"{"origin": "Istanbul"}"#.to_string(),
            plan_exists,
            missing: "destination, start_date".to_string(),
        }
    }

    #[test]
    fn test_render_intent_keeps_json_unescaped() {
        let loader = PromptLoader::embedded_only();
        let rendered = loader.render("intent", &intent_context(false)).unwrap();
        assert!(rendered.contains(r#"{"origin": "Istanbul"}"#));
        assert!(rendered.contains("No itinerary exists yet"));
        assert!(rendered.contains("destination, start_date"));
        assert!(rendered.contains("2025-10-01"));
    }

    #[test]
    fn test_render_intent_with_plan() {
        let loader = PromptLoader::embedded_only();
        let rendered = loader.render("intent", &intent_context(true)).unwrap();
        assert!(rendered.contains("already been generated"));
    }

    #[test]
    fn test_user_override_wins() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("revise.pmt"), "CUSTOM {{instruction}}").unwrap();
        let loader = PromptLoader::new(dir.path());
        let rendered = loader
            .render(
                "revise",
                &ReviseContext {
                    instruction: "more museums".to_string(),
                    plan: "{}".to_string(),
                },
            )
            .unwrap();
        assert_eq!(rendered, "CUSTOM more museums");
    }

    #[test]
    fn test_missing_template() {
        let loader = PromptLoader::embedded_only();
        assert!(loader.render("nope", &intent_context(false)).is_err());
    }
}
