use chrono::{DateTime, Utc};
use diesel::prelude::{Identifiable, Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};

use crate::user::model::UserInfo;
use crate::{conversation, user};

use super::Id;

#[derive(Queryable, Selectable, Identifiable, Clone, Debug, PartialEq)]
#[diesel(table_name = crate::schema::messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Message {
    id: Id,
    conversation_id: conversation::Id,
    sender_id: user::Id,
    receiver_id: user::Id,
    content: String,
    created_at: DateTime<Utc>,
    seen: bool,
    seen_at: Option<DateTime<Utc>>,
}

impl Message {
    pub const fn id(&self) -> &Id {
        &self.id
    }

    pub const fn conversation_id(&self) -> &conversation::Id {
        &self.conversation_id
    }

    pub const fn sender_id(&self) -> &user::Id {
        &self.sender_id
    }

    pub const fn receiver_id(&self) -> &user::Id {
        &self.receiver_id
    }

    pub const fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }

    pub const fn seen(&self) -> bool {
        self.seen
    }

    #[cfg(test)]
    pub(super) fn mark_seen(&mut self, at: DateTime<Utc>) -> bool {
        if self.seen {
            return false;
        }
        self.seen = true;
        self.seen_at = Some(at);
        true
    }
}

#[cfg(test)]
impl From<NewMessage<'_>> for Message {
    fn from(m: NewMessage<'_>) -> Self {
        Self {
            id: m.id,
            conversation_id: m.conversation_id,
            sender_id: m.sender_id,
            receiver_id: m.receiver_id,
            content: m.content.to_string(),
            created_at: m.created_at,
            seen: false,
            seen_at: None,
        }
    }
}

#[derive(Insertable, Clone, Copy, Debug)]
#[diesel(table_name = crate::schema::messages)]
pub struct NewMessage<'a> {
    id: Id,
    conversation_id: conversation::Id,
    sender_id: user::Id,
    receiver_id: user::Id,
    content: &'a str,
    created_at: DateTime<Utc>,
}

impl<'a> NewMessage<'a> {
    pub fn new(
        conversation_id: &conversation::Id,
        sender_id: &user::Id,
        receiver_id: &user::Id,
        content: &'a str,
    ) -> Self {
        Self {
            id: Id::new(),
            conversation_id: *conversation_id,
            sender_id: *sender_id,
            receiver_id: *receiver_id,
            content,
            created_at: Utc::now(),
        }
    }
}

/// Message as exposed to clients, with the sender resolved to its profile.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MessageDto {
    id: Id,
    conversation_id: conversation::Id,
    sender: UserInfo,
    receiver_id: user::Id,
    content: String,
    created_at: DateTime<Utc>,
    seen: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    seen_at: Option<DateTime<Utc>>,
}

impl MessageDto {
    pub fn new(m: Message, sender: UserInfo) -> Self {
        Self {
            id: m.id,
            conversation_id: m.conversation_id,
            sender,
            receiver_id: m.receiver_id,
            content: m.content,
            created_at: m.created_at,
            seen: m.seen,
            seen_at: m.seen_at,
        }
    }

    pub const fn id(&self) -> &Id {
        &self.id
    }

    pub const fn conversation_id(&self) -> &conversation::Id {
        &self.conversation_id
    }

    pub const fn sender(&self) -> &UserInfo {
        &self.sender
    }

    pub const fn receiver_id(&self) -> &user::Id {
        &self.receiver_id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub const fn seen(&self) -> bool {
        self.seen
    }
}

#[derive(Serialize, Debug)]
pub struct MessagePage {
    messages: Vec<MessageDto>,
    page: i64,
    page_size: i64,
    #[serde(skip)]
    newly_seen: usize,
}

impl MessagePage {
    pub fn new(messages: Vec<MessageDto>, page: i64, page_size: i64, newly_seen: usize) -> Self {
        Self {
            messages,
            page,
            page_size,
            newly_seen,
        }
    }

    pub fn messages(&self) -> &[MessageDto] {
        &self.messages
    }

    /// Number of messages this read transitioned to seen.
    pub const fn newly_seen(&self) -> usize {
        self.newly_seen
    }
}

#[derive(Serialize, Debug, PartialEq)]
pub struct UnreadCount {
    count: i64,
}

impl UnreadCount {
    pub const fn new(count: i64) -> Self {
        Self { count }
    }
}
