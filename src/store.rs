use time::OffsetDateTime;

/// Opaque message identifier; stable for the life of the conversation.
pub type MessageId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One conversation turn entry.
///
/// Content is mutable only while `streaming` is true; a closed message is
/// immutable until the conversation is cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub streaming: bool,
    pub error: bool,
    pub created_at: OffsetDateTime,
}

/// Ordered list of conversation turns, each addressable by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageStore {
    messages: Vec<Message>,
    next_id: u64,
}

impl MessageStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message and returns its identifier.
    pub fn add(&mut self, role: Role, content: impl Into<String>, streaming: bool) -> MessageId {
        self.next_id += 1;
        let id = format!("msg_{}", self.next_id);
        self.messages.push(Message {
            id: id.clone(),
            role,
            content: content.into(),
            streaming,
            error: false,
            created_at: OffsetDateTime::now_utc(),
        });
        id
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == id)
    }

    /// Returns the id of the one open (still streaming) message, if any.
    #[must_use]
    pub fn open_message_id(&self) -> Option<MessageId> {
        self.messages
            .iter()
            .find(|message| message.streaming)
            .map(|message| message.id.clone())
    }

    #[must_use]
    pub fn has_open_message(&self) -> bool {
        self.messages.iter().any(|message| message.streaming)
    }

    /// Mutates the content of an open message. Closed messages are left
    /// untouched; returns whether a mutation happened.
    pub fn update_open(&mut self, id: &str, update: impl FnOnce(&mut String)) -> bool {
        match self.message_mut(id) {
            Some(message) if message.streaming => {
                update(&mut message.content);
                true
            }
            _ => false,
        }
    }

    /// Closes a message, leaving its content as last reconciled.
    pub fn finalize(&mut self, id: &str) -> bool {
        match self.message_mut(id) {
            Some(message) => {
                message.streaming = false;
                true
            }
            None => false,
        }
    }

    /// Closes a message with an error annotation replacing its content.
    pub fn fail(&mut self, id: &str, annotation: impl Into<String>) -> bool {
        match self.message_mut(id) {
            Some(message) => {
                message.content = annotation.into();
                message.error = true;
                message.streaming = false;
                true
            }
            None => false,
        }
    }

    /// Closes a message with a non-error annotation replacing its content.
    pub fn close_annotated(&mut self, id: &str, annotation: impl Into<String>) -> bool {
        match self.message_mut(id) {
            Some(message) => {
                message.content = annotation.into();
                message.streaming = false;
                true
            }
            None => false,
        }
    }

    /// Removes a message by id; used to roll back a failed submit.
    pub fn remove(&mut self, id: &str) -> Option<Message> {
        let index = self.messages.iter().position(|message| message.id == id)?;
        Some(self.messages.remove(index))
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn message_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|message| message.id == id)
    }
}
