use std::env;

use bytes::Bytes;
use log::{error, warn};

use crate::event;
use crate::integration::Result;

#[derive(Clone)]
pub struct Config {
    host: String,
    port: u16,
}

impl Config {
    pub fn env() -> Option<Self> {
        let host = env::var("NATS_HOST").ok();
        let port = env::var("NATS_PORT")
            .unwrap_or_else(|_| "4222".to_string())
            .parse()
            .ok();

        if let (Some(host), Some(port)) = (host, port) {
            Some(Self { host, port })
        } else {
            warn!("NATS env is not configured, rooms stay in-process");
            None
        }
    }

    pub async fn connect(&self) -> Result<async_nats::Client> {
        let client = async_nats::connect(format!("{}:{}", self.host, self.port)).await?;
        Ok(client)
    }
}

impl async_nats::subject::ToSubject for &event::Subject {
    fn to_subject(&self) -> async_nats::Subject {
        match self {
            event::Subject::User(id) => format!("users.{id}").into(),
            event::Subject::Conversation(id) => format!("conversations.{id}").into(),
        }
    }
}

impl From<&event::Envelope> for Bytes {
    fn from(e: &event::Envelope) -> Self {
        let mut bytes: Vec<u8> = Vec::new();
        if let Err(e) = serde_json::to_writer(&mut bytes, e) {
            error!("could not serialize event envelope: {e:?}");
        }
        bytes.into()
    }
}

#[cfg(test)]
mod tests {
    use async_nats::subject::ToSubject;
    use uuid::Uuid;

    use crate::{conversation, event, user};

    #[test]
    fn should_map_rooms_to_subjects() {
        let id = Uuid::nil();

        let user_room = event::Subject::User(user::Id::from(id));
        let conversation_room = event::Subject::Conversation(conversation::Id::from(id));

        assert_eq!((&user_room).to_subject().as_str(), format!("users.{id}"));
        assert_eq!(
            (&conversation_room).to_subject().as_str(),
            format!("conversations.{id}")
        );
    }
}
