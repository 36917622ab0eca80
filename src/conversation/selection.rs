use log::{ info, warn };

use crate::cli::Args;
use crate::llm::chat::ChatClient;

/// Static model-routing settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPolicy {
    /// Substituted when the chosen model is not available to the credential.
    pub baseline_model: String,
    pub vision_model: String,
    pub vision_enabled: bool,
    pub max_tokens: u32,
    /// Smaller output bound for image-bearing requests.
    pub vision_max_tokens: u32,
}

impl ModelPolicy {
    pub fn from_args(args: &Args) -> Self {
        Self {
            baseline_model: args.baseline_model.clone(),
            vision_model: args.vision_model.clone(),
            vision_enabled: args.vision_enabled,
            max_tokens: args.max_tokens,
            vision_max_tokens: args.vision_max_tokens,
        }
    }
}

impl Default for ModelPolicy {
    fn default() -> Self {
        Self {
            baseline_model: "gpt-3.5-turbo".to_string(),
            vision_model: "gpt-4o".to_string(),
            vision_enabled: true,
            max_tokens: 2048,
            vision_max_tokens: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelChoice {
    pub model: String,
    pub max_tokens: u32,
    pub vision: bool,
    /// True when validation replaced the chosen model with the baseline.
    pub substituted: bool,
}

/// Picks the model before availability is known.
pub fn choose(
    policy: &ModelPolicy,
    requested: Option<&str>,
    default_model: &str,
    has_image: bool
) -> ModelChoice {
    if has_image && policy.vision_enabled {
        return ModelChoice {
            model: policy.vision_model.clone(),
            max_tokens: policy.vision_max_tokens,
            vision: true,
            substituted: false,
        };
    }

    let model = requested
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(default_model);
    ModelChoice {
        model: model.to_string(),
        max_tokens: policy.max_tokens,
        vision: false,
        substituted: false,
    }
}

/// Checks the choice against the gateway listing. An unavailable model falls
/// back to the baseline text model; a failed or empty listing keeps the choice.
pub async fn validate(
    policy: &ModelPolicy,
    choice: ModelChoice,
    client: &dyn ChatClient
) -> ModelChoice {
    let available = match client.list_models().await {
        Ok(models) if !models.is_empty() => models,
        Ok(_) => {
            warn!("Model listing was empty; using '{}' unvalidated", choice.model);
            return choice;
        }
        Err(e) => {
            warn!("Could not validate model '{}': {}", choice.model, e);
            return choice;
        }
    };

    if available.iter().any(|m| m == &choice.model) {
        return choice;
    }

    info!(
        "Model '{}' is not available to this credential; substituting '{}'",
        choice.model,
        policy.baseline_model
    );
    ModelChoice {
        model: policy.baseline_model.clone(),
        max_tokens: policy.max_tokens,
        vision: false,
        substituted: true,
    }
}
