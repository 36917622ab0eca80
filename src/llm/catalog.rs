use crate::models::api::ModelEntry;

const NON_CHAT_MARKERS: &[&str] = &[
    "embedding",
    "whisper",
    "tts",
    "dall-e",
    "davinci",
    "babbage",
    "moderation",
    "transcribe",
    "realtime",
    "audio",
    "image",
    "search",
];

/// Whether a listed identifier is usable for chat completions.
pub fn is_chat_model(id: &str) -> bool {
    let id = id.to_ascii_lowercase();
    if NON_CHAT_MARKERS.iter().any(|m| id.contains(m)) {
        return false;
    }
    id.starts_with("gpt-") ||
        id.starts_with("chatgpt") ||
        id.starts_with('o') && id.chars().nth(1).is_some_and(|c| c.is_ascii_digit()) ||
        id.contains("llama") ||
        id.contains("mixtral") ||
        id.contains("grok") ||
        id.contains("deepseek") ||
        id.contains("qwen") ||
        id.contains("gemma")
}

fn category_of(id: &str) -> &'static str {
    let id = id.to_ascii_lowercase();
    if id.starts_with('o') && id.chars().nth(1).is_some_and(|c| c.is_ascii_digit()) {
        "reasoning"
    } else if id.contains("reasoner") || id.contains("-r1") {
        "reasoning"
    } else if id.starts_with("gpt-4o") || id.starts_with("gpt-4.1") || id.contains("vision") {
        "vision"
    } else {
        "chat"
    }
}

fn describe(id: &str, category: &str) -> String {
    let lower = id.to_ascii_lowercase();
    let size = if lower.contains("mini") || lower.contains("nano") || lower.contains("instant") {
        "Fast, low-cost"
    } else if lower.starts_with("gpt-3.5") {
        "Legacy general-purpose"
    } else {
        "General-purpose"
    };
    match category {
        "reasoning" => format!("{} reasoning model for multi-step problems", size),
        "vision" => format!("{} multimodal model that accepts images", size),
        _ => format!("{} chat model", size),
    }
}

/// Chat-capable models from a gateway listing, sorted by identifier.
pub fn chat_catalog(ids: &[String]) -> Vec<ModelEntry> {
    let mut entries: Vec<ModelEntry> = ids
        .iter()
        .filter(|id| is_chat_model(id))
        .map(|id| {
            let category = category_of(id);
            ModelEntry {
                id: id.clone(),
                category: category.to_string(),
                description: describe(id, category),
            }
        })
        .collect();
    entries.sort_by(|a, b| a.id.cmp(&b.id));
    entries.dedup_by(|a, b| a.id == b.id);
    entries
}
