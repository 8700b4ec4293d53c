//! Conversation-related types.

use agent_router_model::{ModelMessage, Role};

/// Log lines show at most this many characters of a message.
const LOG_PREVIEW_CHARS: usize = 200;

/// The ordered messages of one run.
///
/// A conversation only grows. Every appended message is logged together with
/// its index, so logs and traces agree on the order.
#[derive(Clone, Default, Debug)]
pub struct Conversation {
    items: Vec<Item>,
}

/// An item in the conversation.
#[derive(Clone, Debug)]
pub struct Item {
    msg: ModelMessage,
    transcript: String,
}

impl Item {
    /// Returns the role of this item.
    #[inline]
    pub fn role(&self) -> Role {
        self.msg.role()
    }

    /// Returns the message sent to the model.
    #[inline]
    pub fn message(&self) -> &ModelMessage {
        &self.msg
    }

    /// Returns the transcript of this item.
    ///
    /// The transcript is a string representation of the message item,
    /// which can be exported later. But transcript alone is not enough
    /// to reconstruct the message item.
    #[inline]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }
}

impl Conversation {
    /// Returns all items, oldest first.
    #[inline]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Returns the number of items.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing has been appended yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Appends a message and returns its index.
    pub(crate) fn push(&mut self, msg: ModelMessage, transcript: String) -> usize {
        let index = self.items.len();
        debug!(
            index,
            role = %msg.role(),
            "appended message: {}",
            preview(&transcript)
        );
        self.items.push(Item { msg, transcript });
        index
    }

    pub(crate) fn to_messages(&self) -> Vec<ModelMessage> {
        self.items.iter().map(|item| item.msg.clone()).collect()
    }
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(LOG_PREVIEW_CHARS) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_keeps_order() {
        let mut conversation = Conversation::default();
        assert!(conversation.is_empty());
        assert_eq!(
            conversation.push(
                ModelMessage::System("Be brief.".to_owned()),
                "Be brief.".to_owned()
            ),
            0
        );
        assert_eq!(
            conversation
                .push(ModelMessage::User("Hi".to_owned()), "Hi".to_owned()),
            1
        );

        let roles: Vec<_> =
            conversation.items().iter().map(Item::role).collect();
        assert_eq!(roles, [Role::System, Role::User]);
        assert_eq!(conversation.to_messages().len(), 2);
        assert_eq!(conversation.items()[1].transcript(), "Hi");
    }

    #[test]
    fn test_preview() {
        let long = "é".repeat(LOG_PREVIEW_CHARS + 1);
        assert_eq!(preview(&long).chars().count(), LOG_PREVIEW_CHARS);
        assert_eq!(preview("short"), "short");
    }
}
