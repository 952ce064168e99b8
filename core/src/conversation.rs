//! Conversation reconciliation for the messaging desk
//!
//! A conversation is not stored anywhere. It is the chat of one complaint,
//! keyed by (owner user id, complaint id), with its unread state derived from
//! the messages every time a `users` snapshot arrives.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};
use crate::models::*;
use crate::store::RemoteStore;
use crate::timestamp;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey {
    pub user_id: String,
    pub complaint_id: String,
}

impl ConversationKey {
    pub fn new(user_id: &str, complaint_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            complaint_id: complaint_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Read,
    Unread,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub key: ConversationKey,
    pub complainant_name: String,
    pub complaint_type: String,
    pub complaint_status: ComplaintStatus,
    /// Stored order of the chat. The store is trusted to keep insertion
    /// order; no timestamp sort happens here.
    pub messages: Vec<Message>,
    pub last_message: Option<Message>,
    pub unread_count: usize,
    pub status: ConversationStatus,
}

impl Conversation {
    pub fn new(
        key: ConversationKey,
        complainant_name: String,
        complaint_type: String,
        complaint_status: ComplaintStatus,
        messages: Vec<Message>,
    ) -> Self {
        let mut conversation = Self {
            key,
            complainant_name,
            complaint_type,
            complaint_status,
            messages,
            last_message: None,
            unread_count: 0,
            status: ConversationStatus::Read,
        };
        conversation.refresh();
        conversation
    }

    /// Recompute the derived fields from `messages`.
    pub fn refresh(&mut self) {
        self.last_message = self.messages.last().cloned();
        self.unread_count = self.messages.iter().filter(|m| m.is_unread()).count();
        self.status = if self.unread_count > 0 {
            ConversationStatus::Unread
        } else {
            ConversationStatus::Read
        };
    }

    pub fn is_unread(&self) -> bool {
        self.status == ConversationStatus::Unread
    }

    /// Store paths of the citizen messages still unread.
    pub fn unread_message_paths(&self) -> Vec<String> {
        self.messages
            .iter()
            .filter(|m| m.is_unread())
            .map(|m| message_path(&self.key.user_id, &self.key.complaint_id, &m.id))
            .collect()
    }

    pub fn mark_all_read(&mut self) {
        for message in self.messages.iter_mut().filter(|m| m.is_from_citizen()) {
            message.read = true;
        }
        self.refresh();
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
        self.refresh();
    }
}

/// Unread conversations first, then those with at least one message, then
/// complainant name without regard to case.
pub fn compare_conversations(a: &Conversation, b: &Conversation) -> Ordering {
    b.is_unread()
        .cmp(&a.is_unread())
        .then_with(|| (!b.messages.is_empty()).cmp(&!a.messages.is_empty()))
        .then_with(|| {
            a.complainant_name
                .to_lowercase()
                .cmp(&b.complainant_name.to_lowercase())
        })
}

pub fn sort_conversations(conversations: &mut [Conversation]) {
    conversations.sort_by(compare_conversations);
}

/// Flatten a `users` snapshot into sorted conversation summaries, one per
/// (user, complaint) pair.
pub fn reconcile(users: &Value) -> Vec<Conversation> {
    let mut conversations = Vec::new();

    for (user_id, user) in keyed_entries::<UserRecord>(users) {
        for (complaint_id, complaint) in
            keyed_entries::<ComplaintRecord>(&Value::Object(user.user_complaints))
        {
            conversations.push(Conversation::new(
                ConversationKey::new(&user_id, &complaint_id),
                user.name.clone(),
                complaint.complaint_type,
                complaint.status,
                chat_messages(&complaint.chat),
            ));
        }
    }

    sort_conversations(&mut conversations);
    conversations
}

/// One multi-path update flipping every unread citizen message to read.
pub fn read_receipt_updates(conversation: &Conversation) -> Map<String, Value> {
    conversation
        .unread_message_paths()
        .into_iter()
        .map(|path| (format!("{}/read", path), Value::Bool(true)))
        .collect()
}

/// Build the record for a staff reply. Blank text is rejected.
pub fn admin_reply(text: &str) -> Result<ChatMessageRecord> {
    let body = text.trim();
    if body.is_empty() {
        return Err(Error::Validation("Reply cannot be empty".to_string()));
    }

    Ok(ChatMessageRecord {
        sender_id: ADMIN_SENDER.to_string(),
        body: body.to_string(),
        timestamp: timestamp::now_timestamp(),
        read: false,
    })
}

/// Mark a conversation read in the store. Returns how many messages flipped.
pub async fn mark_conversation_read<S: RemoteStore>(
    store: &S,
    conversation: &Conversation,
) -> Result<usize> {
    let updates = read_receipt_updates(conversation);
    let count = updates.len();
    if count > 0 {
        store.update_many(updates).await?;
    }
    Ok(count)
}

/// Push a staff reply into a conversation's chat, returning the stored message.
pub async fn post_reply<S: RemoteStore>(
    store: &S,
    key: &ConversationKey,
    text: &str,
) -> Result<Message> {
    let record = admin_reply(text)?;
    let id = store
        .push(&chat_path(&key.user_id, &key.complaint_id), json!(record))
        .await?;
    Ok(Message::from_record(id, record))
}

// ============================================================================
// Messaging desk
// ============================================================================

/// The messaging page's mirrored state: every conversation plus the one the
/// operator has open.
pub struct MessagingDesk<S: RemoteStore> {
    store: S,
    conversations: Vec<Conversation>,
    open: Option<ConversationKey>,
}

impl<S: RemoteStore> MessagingDesk<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            conversations: Vec::new(),
            open: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Replace the mirror wholesale from a fresh `users` snapshot.
    pub fn apply_snapshot(&mut self, users: &Value) {
        self.conversations = reconcile(users);
        if let Some(key) = &self.open {
            if self.find(key).is_none() {
                self.open = None;
            }
        }
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn find(&self, key: &ConversationKey) -> Option<&Conversation> {
        self.conversations.iter().find(|c| &c.key == key)
    }

    pub fn open_conversation_view(&self) -> Option<&Conversation> {
        self.open.as_ref().and_then(|key| self.find(key))
    }

    pub fn total_unread(&self) -> usize {
        self.conversations.iter().map(|c| c.unread_count).sum()
    }

    /// Conversations whose complainant name or complaint type contains `term`.
    pub fn search(&self, term: &str) -> Vec<&Conversation> {
        let term = term.trim().to_lowercase();
        self.conversations
            .iter()
            .filter(|c| {
                term.is_empty()
                    || c.complainant_name.to_lowercase().contains(&term)
                    || c.complaint_type.to_lowercase().contains(&term)
            })
            .collect()
    }

    /// Open a conversation and mark its citizen messages read. The store
    /// write is one atomic update; if it fails the mirror is left as it was.
    pub async fn open_conversation(&mut self, key: &ConversationKey) -> Result<()> {
        let conversation = self
            .find(key)
            .ok_or_else(|| Error::NotFound(format!("conversation {}/{}", key.user_id, key.complaint_id)))?
            .clone();

        self.open = Some(key.clone());

        if let Err(e) = mark_conversation_read(&self.store, &conversation).await {
            log::warn!(
                "Failed to mark conversation {}/{} read: {}",
                key.user_id,
                key.complaint_id,
                e
            );
            return Err(e);
        }

        if let Some(entry) = self.conversations.iter_mut().find(|c| &c.key == key) {
            entry.mark_all_read();
        }
        sort_conversations(&mut self.conversations);
        Ok(())
    }

    pub fn close_conversation(&mut self) {
        self.open = None;
    }

    /// Send a staff reply and echo it into the mirror once the store accepts it.
    pub async fn send_reply(&mut self, key: &ConversationKey, text: &str) -> Result<Message> {
        if self.find(key).is_none() {
            return Err(Error::NotFound(format!(
                "conversation {}/{}",
                key.user_id, key.complaint_id
            )));
        }

        let message = post_reply(&self.store, key, text).await?;

        if let Some(entry) = self.conversations.iter_mut().find(|c| &c.key == key) {
            entry.append(message.clone());
        }
        sort_conversations(&mut self.conversations);
        Ok(message)
    }
}
