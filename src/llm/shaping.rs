use crate::llm::{ContentPart, ProviderContent, ProviderMessage};

/// Where the system instruction goes in the outgoing `messages` array.
///
/// Most models take a leading `system` message. Some families reject the
/// `system` role outright and want the instruction folded into the latest
/// user turn instead; each such quirk is one registry entry keyed by
/// model-identifier prefix, so supporting a new family is additive.
pub trait RequestShaper: Send + Sync {
    fn shape(&self, instruction: &str, history: Vec<ProviderMessage>) -> Vec<ProviderMessage>;
}

pub struct SystemFirst;

impl RequestShaper for SystemFirst {
    fn shape(&self, instruction: &str, history: Vec<ProviderMessage>) -> Vec<ProviderMessage> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ProviderMessage::text("system", instruction.to_string()));
        messages.extend(history);
        messages
    }
}

pub struct SystemIntoLastUser;

impl RequestShaper for SystemIntoLastUser {
    fn shape(&self, instruction: &str, mut history: Vec<ProviderMessage>) -> Vec<ProviderMessage> {
        let target = history.iter_mut().rev().find(|m| m.role == "user");
        match target {
            Some(message) => {
                prefix_text(&mut message.content, instruction);
                history
            }
            None => SystemFirst.shape(instruction, history),
        }
    }
}

fn prefix_text(content: &mut ProviderContent, instruction: &str) {
    match content {
        ProviderContent::Text(text) => {
            *text = format!("{}\n\n{}", instruction, text);
        }
        ProviderContent::Parts(parts) => {
            for part in parts.iter_mut() {
                if let ContentPart::Text { text } = part {
                    *text = format!("{}\n\n{}", instruction, text);
                    return;
                }
            }
            parts.insert(
                0,
                ContentPart::Text {
                    text: instruction.to_string(),
                },
            );
        }
    }
}

static SYSTEM_FIRST: SystemFirst = SystemFirst;
static SYSTEM_INTO_LAST_USER: SystemIntoLastUser = SystemIntoLastUser;

/// Model families that cannot take a `system` role message.
static SHAPER_OVERRIDES: &[(&str, &(dyn RequestShaper))] = &[
    ("google/gemma", &SYSTEM_INTO_LAST_USER),
    ("arcee-ai/", &SYSTEM_INTO_LAST_USER),
];

pub fn shaper_for_model(model: &str) -> &'static dyn RequestShaper {
    for (prefix, shaper) in SHAPER_OVERRIDES {
        if model.starts_with(prefix) {
            return *shaper;
        }
    }
    &SYSTEM_FIRST
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ImageRef;

    fn text_of(message: &ProviderMessage) -> &str {
        match &message.content {
            ProviderContent::Text(text) => text,
            ProviderContent::Parts(_) => panic!("expected plain text content"),
        }
    }

    #[test]
    fn default_shaper_prepends_a_system_message() {
        let history = vec![
            ProviderMessage::text("user", "hi".into()),
            ProviderMessage::text("assistant", "hello".into()),
        ];
        let shaped = shaper_for_model("openai/gpt-4o").shape("be brief", history);

        assert_eq!(shaped.len(), 3);
        assert_eq!(shaped[0].role, "system");
        assert_eq!(text_of(&shaped[0]), "be brief");
        assert_eq!(shaped[1].role, "user");
    }

    #[test]
    fn quirk_models_fold_instruction_into_last_user_turn() {
        let history = vec![
            ProviderMessage::text("user", "first".into()),
            ProviderMessage::text("assistant", "reply".into()),
            ProviderMessage::text("user", "second".into()),
        ];
        let shaped = shaper_for_model("google/gemma-3-27b-it").shape("be brief", history);

        assert_eq!(shaped.len(), 3);
        assert!(shaped.iter().all(|m| m.role != "system"));
        assert_eq!(text_of(&shaped[0]), "first");
        assert_eq!(text_of(&shaped[2]), "be brief\n\nsecond");
    }

    #[test]
    fn quirk_shaper_targets_the_text_part_of_multimodal_turns() {
        let history = vec![ProviderMessage {
            role: "user".into(),
            content: ProviderContent::Parts(vec![
                ContentPart::Text {
                    text: "what is this?".into(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageRef {
                        url: "https://example.com/cat.png".into(),
                    },
                },
            ]),
        }];
        let shaped = SystemIntoLastUser.shape("be brief", history);

        match &shaped[0].content {
            ProviderContent::Parts(parts) => match &parts[0] {
                ContentPart::Text { text } => assert_eq!(text, "be brief\n\nwhat is this?"),
                _ => panic!("first part should stay text"),
            },
            _ => panic!("multimodal content should stay multi-part"),
        }
    }

    #[test]
    fn quirk_shaper_without_user_turn_falls_back_to_system_first() {
        let shaped = SystemIntoLastUser.shape("be brief", Vec::new());
        assert_eq!(shaped.len(), 1);
        assert_eq!(shaped[0].role, "system");
    }
}
