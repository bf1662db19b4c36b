use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::chat::{ChatMessage, Conversation, ConversationId, MessageId};

/// Event delivered by the push-messaging hub.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HubEvent {
    MessageReceived { message: ChatMessage },
    ConversationCreated { conversation_id: ConversationId },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InboxEffect {
    Appended,
    Duplicate,
    /// Local state cannot be patched; fetch every conversation again.
    ReloadRequired,
}

/// Client-side chat state fed by hub events and full reloads.
///
/// Messages are applied at most once per id. New conversations are never
/// merged incrementally.
#[derive(Clone, Debug, Default)]
pub struct ChatInbox {
    conversations: BTreeMap<ConversationId, Conversation>,
    seen: HashSet<MessageId>,
}

impl ChatInbox {
    pub fn replace_all(&mut self, conversations: Vec<Conversation>) {
        self.seen = conversations
            .iter()
            .flat_map(|conversation| conversation.messages.iter().map(|message| message.id.clone()))
            .collect();
        self.conversations = conversations
            .into_iter()
            .map(|conversation| (conversation.id.clone(), conversation))
            .collect();
    }

    pub fn apply(&mut self, event: HubEvent) -> InboxEffect {
        match event {
            HubEvent::ConversationCreated { .. } => InboxEffect::ReloadRequired,
            HubEvent::MessageReceived { message } => self.append(message),
        }
    }

    fn append(&mut self, message: ChatMessage) -> InboxEffect {
        if self.seen.contains(&message.id) {
            return InboxEffect::Duplicate;
        }

        let Some(conversation) = self.conversations.get_mut(&message.conversation_id) else {
            return InboxEffect::ReloadRequired;
        };

        self.seen.insert(message.id.clone());
        conversation.messages.push(message);
        InboxEffect::Appended
    }

    pub fn conversation(&self, id: &ConversationId) -> Option<&Conversation> {
        self.conversations.get(id)
    }

    pub fn conversations(&self) -> impl Iterator<Item = &Conversation> {
        self.conversations.values()
    }

    pub fn message_count(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::chat::{ChatMessage, Conversation, ConversationId, MessageId};

    use super::{ChatInbox, HubEvent, InboxEffect};

    fn message(id: &str, conversation: &str) -> ChatMessage {
        ChatMessage {
            id: MessageId(id.to_string()),
            conversation_id: ConversationId(conversation.to_string()),
            author: "soporte".to_string(),
            body: format!("mensaje {id}"),
            sent_at: None,
        }
    }

    fn inbox_with(conversation: &str) -> ChatInbox {
        let mut inbox = ChatInbox::default();
        inbox.replace_all(vec![Conversation {
            id: ConversationId(conversation.to_string()),
            title: "Soporte".to_string(),
            messages: vec![message("m1", conversation)],
        }]);
        inbox
    }

    #[test]
    fn duplicate_message_ids_are_suppressed() {
        let mut inbox = inbox_with("c1");

        let first = inbox.apply(HubEvent::MessageReceived { message: message("m2", "c1") });
        let again = inbox.apply(HubEvent::MessageReceived { message: message("m2", "c1") });
        let preloaded = inbox.apply(HubEvent::MessageReceived { message: message("m1", "c1") });

        assert_eq!(first, InboxEffect::Appended);
        assert_eq!(again, InboxEffect::Duplicate);
        assert_eq!(preloaded, InboxEffect::Duplicate);
        let conversation = inbox.conversation(&ConversationId("c1".to_string())).expect("c1");
        assert_eq!(conversation.messages.len(), 2);
    }

    #[test]
    fn new_conversation_requests_full_reload() {
        let mut inbox = inbox_with("c1");
        let effect = inbox
            .apply(HubEvent::ConversationCreated { conversation_id: ConversationId("c2".into()) });
        assert_eq!(effect, InboxEffect::ReloadRequired);
    }

    #[test]
    fn message_for_unknown_conversation_requests_reload_without_marking_seen() {
        let mut inbox = inbox_with("c1");
        let effect = inbox.apply(HubEvent::MessageReceived { message: message("m9", "c7") });
        assert_eq!(effect, InboxEffect::ReloadRequired);
        assert_eq!(inbox.message_count(), 1);
    }

    #[test]
    fn hub_events_deserialize_from_tagged_json() {
        let raw = r#"{"type":"conversation_created","conversation_id":"c3"}"#;
        let event: HubEvent = serde_json::from_str(raw).expect("tagged event");
        assert_eq!(event, HubEvent::ConversationCreated { conversation_id: ConversationId("c3".into()) });
    }
}
