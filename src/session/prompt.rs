use serde_json::json;

use crate::models::{Message, ModelKind, ServiceConfiguration};

/// Prompt text sent to the provider: the whole conversation as
/// `User:`/`Assistant:` lines, then the new question
pub fn build_prompt(history: &[Message], prompt: &str) -> String {
    let context = history
        .iter()
        .map(|m| {
            if m.is_user() {
                format!("User: {}", m.content)
            } else {
                format!("Assistant: {}", m.content)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}\nUser: {}", context, prompt)
}

/// Prompt asking a second model to check the first one's answers
pub fn build_validation_prompt(history: &[Message]) -> String {
    let exchange: Vec<serde_json::Value> = history
        .iter()
        .map(|m| {
            if m.is_user() {
                json!({ "prompt": m.content })
            } else {
                json!({ "assistant": m.content })
            }
        })
        .collect();
    format!(
        "Validate alternative AI assistant's response: {} to the user's prompt.",
        serde_json::Value::Array(exchange)
    )
}

/// User turn posted to the timeline for a validation request
pub fn validation_post(service: &ServiceConfiguration) -> String {
    format!("Validate with {}", service.model_id().unwrap_or_default())
}

pub fn contacting_status(service: &ServiceConfiguration) -> String {
    format!("Contacting {} with a prompt. Please wait…", service.id())
}

/// Guidance shown when nothing else is going on
pub fn default_info_message(
    prompt: Option<&ServiceConfiguration>,
    validation: Option<&ServiceConfiguration>,
) -> String {
    let Some(model) = prompt.and_then(|s| s.model.as_ref()) else {
        return String::new();
    };

    match model.kind {
        ModelKind::Llm => {
            let question = format!("Ask <{}> a question", model.id);
            match validation.and_then(|v| v.model_id()) {
                Some(validator) => format!("{}.\n<{}> will validate it.", question, validator),
                None => format!("{}. You can follow up in the same context.", question),
            }
        }
        ModelKind::Vlm => format!("Attach an image and ask <{}> to describe it.", model.id),
    }
}

/// Plain-text export of the conversation
pub fn transcript(history: &[Message], include_prompt: bool) -> String {
    history
        .iter()
        .filter_map(|m| {
            if m.is_user() {
                include_prompt.then(|| format!("\nPrompt: {}", m.content))
            } else {
                Some(format!("Response: {}", m.content))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ModelDescriptor, ProviderKind};

    fn service(id: &str, kind: ModelKind) -> ServiceConfiguration {
        ServiceConfiguration::new(ProviderKind::OnDevice, Some(ModelDescriptor::new(id, kind)))
    }

    #[test]
    fn test_prompt_embeds_history() {
        let history = vec![Message::user("hi"), Message::assistant("hello")];
        assert_eq!(
            build_prompt(&history, "how are you"),
            "User: hi\nAssistant: hello\nUser: how are you"
        );
        assert_eq!(build_prompt(&[], "first"), "\nUser: first");
    }

    #[test]
    fn test_validation_prompt() {
        let history = vec![Message::user("2+2?"), Message::assistant("4")];
        assert_eq!(
            build_validation_prompt(&history),
            r#"Validate alternative AI assistant's response: [{"prompt":"2+2?"},{"assistant":"4"}] to the user's prompt."#
        );
        assert_eq!(
            validation_post(&service("judge", ModelKind::Llm)),
            "Validate with judge"
        );
    }

    #[test]
    fn test_info_messages() {
        let llm = service("llama", ModelKind::Llm);
        let judge = service("judge", ModelKind::Llm);
        let vlm = service("eyes", ModelKind::Vlm);

        assert_eq!(default_info_message(None, None), "");
        assert_eq!(
            default_info_message(Some(&llm), None),
            "Ask <llama> a question. You can follow up in the same context."
        );
        assert_eq!(
            default_info_message(Some(&llm), Some(&judge)),
            "Ask <llama> a question.\n<judge> will validate it."
        );
        assert_eq!(
            default_info_message(Some(&vlm), None),
            "Attach an image and ask <eyes> to describe it."
        );
    }

    #[test]
    fn test_transcript() {
        let history = vec![Message::user("q"), Message::assistant("a")];
        assert_eq!(transcript(&history, true), "\nPrompt: q\nResponse: a");
        assert_eq!(transcript(&history, false), "Response: a");
    }
}
