use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::model::MessageDto;
use crate::{conversation, message, user};

pub type EventStream = Pin<Box<dyn Stream<Item = Envelope> + Send>>;

/// Identifies one WebSocket connection, so a connection can skip its own signals.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Identify {
        #[serde(default)]
        user_id: Option<user::Id>,
    },
    JoinConversation {
        conversation_id: conversation::Id,
    },
    LeaveConversation {
        conversation_id: conversation::Id,
    },
    TypingStart {
        conversation_id: conversation::Id,
    },
    TypingStop {
        conversation_id: conversation::Id,
    },
    MessageSeen {
        conversation_id: conversation::Id,
        message_id: message::Id,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewMessage,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    NewMessage {
        message: MessageDto,
    },
    NewNotification {
        kind: NotificationKind,
        conversation_id: conversation::Id,
        message: MessageDto,
    },
    TypingStart {
        conversation_id: conversation::Id,
        user_id: user::Id,
    },
    TypingStop {
        conversation_id: conversation::Id,
        user_id: user::Id,
    },
    MessageSeen {
        conversation_id: conversation::Id,
        message_id: message::Id,
        user_id: user::Id,
    },
    MessagesSeen {
        conversation_id: conversation::Id,
        reader_id: user::Id,
    },
}

/// An event on its way through a room, tagged with the connection it came from, if any.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    origin: Option<ConnectionId>,
    event: Event,
}

impl Envelope {
    pub fn broadcast(event: Event) -> Self {
        Self {
            origin: None,
            event,
        }
    }

    pub fn from_connection(origin: ConnectionId, event: Event) -> Self {
        Self {
            origin: Some(origin),
            event,
        }
    }

    pub fn is_from(&self, c: &ConnectionId) -> bool {
        self.origin.as_ref() == Some(c)
    }

    pub const fn event(&self) -> &Event {
        &self.event
    }

    pub fn into_event(self) -> Event {
        self.event
    }
}
