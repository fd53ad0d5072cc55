use log::info;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

use crate::error::AgentError;

/// Response-format contract sent with every completion request. Overridable
/// from a prompts file; this is the shipped default.
const DEFAULT_SYSTEM_PROMPT: &str = "You are a multimodal AI agent.
Tasks:
1. Analyze text and images.
2. If image present, describe it or answer questions about it.
3. If text only, answer text.
4. Output structured, helpful responses.
Format:
Answer: <clear explanation>
If image analyzed:
Found on image:
- ...
Agent actions:
- received request
- analyzed input
- generated response";

#[derive(Deserialize, Debug, Clone)]
pub struct PromptConfig {
    pub system_prompt: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// Loads the prompt configuration. A missing file is not an error: the
/// built-in default applies. A present-but-broken file is.
pub fn load_prompts(path: &str) -> Result<Arc<PromptConfig>, AgentError> {
    if !Path::new(path).exists() {
        info!("Prompts file '{}' not found, using built-in defaults", path);
        return Ok(Arc::new(PromptConfig::default()));
    }

    let file_content = std::fs::read_to_string(path)
        .map_err(|e| AgentError::Config(format!("Failed to read prompts file '{}': {}", path, e)))?;
    let config: PromptConfig = serde_json::from_str(&file_content)
        .map_err(|e| AgentError::Config(format!("Failed to parse prompts file '{}': {}", path, e)))?;
    Ok(Arc::new(config))
}

/// Combines the system prompt with optional retrieval context into the one
/// instruction string handed to the relay.
pub fn compose_instruction(config: &PromptConfig, context: Option<&str>) -> String {
    match context {
        Some(context) if !context.is_empty() => {
            format!(
                "{}\n\nRelevant context from the knowledge base:\n{}",
                config.system_prompt, context
            )
        }
        _ => config.system_prompt.clone(),
    }
}
