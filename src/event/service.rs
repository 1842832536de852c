use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use log::{debug, error, warn};
use tokio::sync::broadcast;

use crate::message::model::MessageDto;
use crate::{conversation, user};

use super::Subject;
use super::model::{Envelope, Event, EventStream, NotificationKind};

const ROOM_CAPACITY: usize = 256;

/// Room router. Publishing is best-effort: events sent to a room with no
/// listeners are dropped and failures are logged, never returned.
#[async_trait]
pub trait EventService {
    async fn publish(&self, s: &Subject, e: Envelope);

    /// Subscribes to a room. Every event published after this returns is
    /// delivered to the stream in publish order.
    async fn subscribe(&self, s: &Subject) -> super::Result<EventStream>;
}

type Rooms = Mutex<HashMap<Subject, broadcast::Sender<Envelope>>>;

/// In-process rooms backed by one broadcast channel per subject. A room
/// lives as long as it has at least one listener.
#[derive(Default)]
pub struct LocalEventService {
    rooms: Arc<Rooms>,
}

impl LocalEventService {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock(rooms: &Rooms) -> MutexGuard<'_, HashMap<Subject, broadcast::Sender<Envelope>>> {
    rooms.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl EventService for LocalEventService {
    async fn publish(&self, s: &Subject, e: Envelope) {
        let delivered = match lock(&self.rooms).get(s) {
            Some(tx) => tx.send(e).is_ok(),
            None => false,
        };

        if !delivered {
            debug!("No listeners in {s}, dropping event");
        }
    }

    async fn subscribe(&self, s: &Subject) -> super::Result<EventStream> {
        let rx = lock(&self.rooms)
            .entry(*s)
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .subscribe();

        let mut listener = Listener {
            subject: *s,
            rx,
            rooms: Arc::downgrade(&self.rooms),
        };

        let stream = async_stream::stream! {
            loop {
                match listener.rx.recv().await {
                    Ok(e) => yield e,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Listener of {} lagged behind, skipped {n} event(s)", listener.subject);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Receiving end of a local room. Removes the room when the last listener goes away.
struct Listener {
    subject: Subject,
    rx: broadcast::Receiver<Envelope>,
    rooms: Weak<Rooms>,
}

impl Drop for Listener {
    fn drop(&mut self) {
        let Some(shared) = self.rooms.upgrade() else {
            return;
        };

        let mut rooms = lock(&shared);
        // `self.rx` is still alive here
        if rooms
            .get(&self.subject)
            .is_some_and(|tx| tx.receiver_count() <= 1)
        {
            rooms.remove(&self.subject);
            debug!("Closed empty room {}", self.subject);
        }
    }
}

/// Rooms mapped onto NATS subjects, shared by every running instance.
#[derive(Clone)]
pub struct NatsEventService {
    pubsub: async_nats::Client,
}

impl NatsEventService {
    pub fn new(pubsub: async_nats::Client) -> Self {
        Self { pubsub }
    }
}

#[async_trait]
impl EventService for NatsEventService {
    async fn publish(&self, s: &Subject, e: Envelope) {
        if let Err(e) = self.pubsub.publish(s, Bytes::from(&e)).await {
            error!("Failed to publish event to {s}: {e:?}");
        }
    }

    async fn subscribe(&self, s: &Subject) -> super::Result<EventStream> {
        let subscriber = self.pubsub.subscribe(s).await?;

        let stream = subscriber.filter_map(|msg| async move {
            match serde_json::from_slice::<Envelope>(&msg.payload) {
                Ok(e) => Some(e),
                Err(e) => {
                    error!("Failed to deserialize event envelope: {e:?}");
                    None
                }
            }
        });

        Ok(Box::pin(stream))
    }
}

/// Fans an appended message out: the full message to the conversation room
/// and a compact notification to the receiver's user room.
pub async fn notify_new_message(event_service: &super::Service, msg: &MessageDto) {
    event_service
        .publish(
            &Subject::Conversation(*msg.conversation_id()),
            Envelope::broadcast(Event::NewMessage {
                message: msg.clone(),
            }),
        )
        .await;

    event_service
        .publish(
            &Subject::User(*msg.receiver_id()),
            Envelope::broadcast(Event::NewNotification {
                kind: NotificationKind::NewMessage,
                conversation_id: *msg.conversation_id(),
                message: msg.clone(),
            }),
        )
        .await;
}

pub async fn notify_messages_seen(
    event_service: &super::Service,
    conversation_id: &conversation::Id,
    reader_id: &user::Id,
) {
    event_service
        .publish(
            &Subject::Conversation(*conversation_id),
            Envelope::broadcast(Event::MessagesSeen {
                conversation_id: *conversation_id,
                reader_id: *reader_id,
            }),
        )
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typing(conversation_id: conversation::Id, user_id: user::Id) -> Event {
        Event::TypingStart {
            conversation_id,
            user_id,
        }
    }

    #[tokio::test]
    async fn should_deliver_in_publish_order() {
        let service = LocalEventService::new();
        let room = Subject::Conversation(conversation::Id::random());
        let mut stream = service.subscribe(&room).await.unwrap();

        let cid = conversation::Id::random();
        let users = [user::Id::random(), user::Id::random(), user::Id::random()];
        for u in users {
            service.publish(&room, Envelope::broadcast(typing(cid, u))).await;
        }

        for u in users {
            let e = stream.next().await.unwrap();
            assert_eq!(e.into_event(), typing(cid, u));
        }
    }

    #[tokio::test]
    async fn should_isolate_rooms() {
        let service = LocalEventService::new();
        let c1 = Subject::Conversation(conversation::Id::random());
        let c2 = Subject::Conversation(conversation::Id::random());
        let mut s1 = service.subscribe(&c1).await.unwrap();
        let mut s2 = service.subscribe(&c2).await.unwrap();

        let e1 = typing(conversation::Id::random(), user::Id::random());
        let e2 = typing(conversation::Id::random(), user::Id::random());
        service.publish(&c2, Envelope::broadcast(e2.clone())).await;
        service.publish(&c1, Envelope::broadcast(e1.clone())).await;

        assert_eq!(s1.next().await.unwrap().into_event(), e1);
        assert_eq!(s2.next().await.unwrap().into_event(), e2);
    }

    #[tokio::test]
    async fn should_drop_events_without_listeners() {
        let service = LocalEventService::new();
        let room = Subject::User(user::Id::random());

        service
            .publish(
                &room,
                Envelope::broadcast(typing(conversation::Id::random(), user::Id::random())),
            )
            .await;

        let stream = service.subscribe(&room).await.unwrap();
        drop(stream);
        service
            .publish(
                &room,
                Envelope::broadcast(typing(conversation::Id::random(), user::Id::random())),
            )
            .await;

        assert!(lock(&service.rooms).is_empty());
    }

    #[tokio::test]
    async fn should_close_room_when_last_listener_leaves() {
        let service = LocalEventService::new();
        let room = Subject::User(user::Id::random());

        let first = service.subscribe(&room).await.unwrap();
        let second = service.subscribe(&room).await.unwrap();

        drop(first);
        assert!(lock(&service.rooms).contains_key(&room));

        drop(second);
        assert!(lock(&service.rooms).is_empty());
    }

    #[tokio::test]
    async fn should_notify_conversation_and_receiver_rooms() {
        let service: crate::event::Service = Arc::new(LocalEventService::new());

        let sender_id = user::Id::random();
        let receiver_id = user::Id::random();
        let cid = conversation::Id::random();
        let msg: MessageDto = serde_json::from_value(serde_json::json!({
            "id": uuid::Uuid::now_v7(),
            "conversation_id": cid,
            "sender": {"id": sender_id, "name": "ion"},
            "receiver_id": receiver_id,
            "content": "hello",
            "created_at": "2025-01-10T10:00:00Z",
            "seen": false,
        }))
        .unwrap();

        let mut room = service.subscribe(&Subject::Conversation(cid)).await.unwrap();
        let mut inbox = service.subscribe(&Subject::User(receiver_id)).await.unwrap();
        let mut sender_inbox = service.subscribe(&Subject::User(sender_id)).await.unwrap();

        notify_new_message(&service, &msg).await;

        assert_eq!(
            room.next().await.unwrap().into_event(),
            Event::NewMessage {
                message: msg.clone()
            }
        );
        assert_eq!(
            inbox.next().await.unwrap().into_event(),
            Event::NewNotification {
                kind: NotificationKind::NewMessage,
                conversation_id: cid,
                message: msg.clone(),
            }
        );

        let nothing =
            tokio::time::timeout(std::time::Duration::from_millis(50), sender_inbox.next()).await;
        assert!(nothing.is_err());
    }
}
