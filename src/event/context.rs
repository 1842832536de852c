use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use log::debug;
use tokio::sync::{Notify, RwLock, mpsc};
use tokio::task::JoinHandle;

use crate::{auth, event, user};

use super::Subject;
use super::model::{ConnectionId, Event, EventStream};

#[derive(Clone, Copy, Debug, PartialEq)]
enum Phase {
    Connected,
    Identified,
    Disconnected,
}

struct State {
    phase: Phase,
    rooms: HashMap<Subject, JoinHandle<()>>,
}

/// Per-connection state shared by the read and write halves of a WebSocket.
#[derive(Clone)]
pub struct Ws {
    pub id: ConnectionId,
    pub auth_user: auth::User,
    state: Arc<RwLock<State>>,
    outbox: mpsc::Sender<Event>,
    pub close: Arc<Notify>,
}

impl Ws {
    pub fn new(auth_user: auth::User, outbox: mpsc::Sender<Event>) -> Self {
        Self {
            id: ConnectionId::random(),
            auth_user,
            state: Arc::new(RwLock::new(State {
                phase: Phase::Connected,
                rooms: HashMap::new(),
            })),
            outbox,
            close: Arc::new(Notify::new()),
        }
    }
}

impl Ws {
    /// Joins the user room of the verified identity. A claimed id is only
    /// accepted when it matches that identity.
    pub async fn identify(
        &self,
        event_service: &event::Service,
        claimed: Option<&user::Id>,
    ) -> super::Result<()> {
        let verified = self.auth_user.id();
        if let Some(claimed) = claimed.filter(|c| c.ne(&verified)) {
            return Err(event::Error::IdentityMismatch {
                verified: *verified,
                claimed: *claimed,
            });
        }

        self.join(event_service, Subject::User(*verified)).await?;

        let mut state = self.state.write().await;
        if state.phase == Phase::Connected {
            state.phase = Phase::Identified;
        }
        Ok(())
    }

    pub async fn join(&self, event_service: &event::Service, s: Subject) -> super::Result<()> {
        let mut state = self.state.write().await;
        if state.phase == Phase::Disconnected {
            return Err(event::Error::Disconnected);
        }
        if state.rooms.contains_key(&s) {
            return Ok(());
        }

        let stream = event_service.subscribe(&s).await?;
        let task = tokio::spawn(forward(stream, self.id, self.outbox.clone()));
        state.rooms.insert(s, task);

        debug!("Connection {:?} joined {s}", self.id);
        Ok(())
    }

    pub async fn leave(&self, s: &Subject) {
        if let Some(task) = self.state.write().await.rooms.remove(s) {
            task.abort();
            debug!("Connection {:?} left {s}", self.id);
        }
    }

    /// Terminal: drops every room membership.
    pub async fn disconnect(&self) {
        let mut state = self.state.write().await;
        state.phase = Phase::Disconnected;
        for (_, task) in state.rooms.drain() {
            task.abort();
        }
    }

    #[cfg(test)]
    pub async fn is_identified(&self) -> bool {
        self.state.read().await.phase == Phase::Identified
    }

    #[cfg(test)]
    pub async fn is_joined(&self, s: &Subject) -> bool {
        self.state.read().await.rooms.contains_key(s)
    }
}

async fn forward(mut stream: EventStream, conn: ConnectionId, outbox: mpsc::Sender<Event>) {
    while let Some(envelope) = stream.next().await {
        if envelope.is_from(&conn) {
            continue;
        }
        if outbox.send(envelope.into_event()).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use crate::conversation;
    use crate::event::model::Envelope;
    use crate::event::service::LocalEventService;

    use super::*;

    fn connect(u: user::Id) -> (Ws, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(16);
        (Ws::new(auth::User::new(u), tx), rx)
    }

    fn typing(conversation_id: conversation::Id, user_id: user::Id) -> Event {
        Event::TypingStart {
            conversation_id,
            user_id,
        }
    }

    async fn nothing_received(rx: &mut mpsc::Receiver<Event>) -> bool {
        timeout(Duration::from_millis(50), rx.recv()).await.is_err()
    }

    #[tokio::test]
    async fn should_identify_with_verified_identity() {
        let service: event::Service = Arc::new(LocalEventService::new());
        let me = user::Id::random();
        let (ws, mut rx) = connect(me);

        ws.identify(&service, None).await.unwrap();
        ws.identify(&service, Some(&me)).await.unwrap();

        assert!(ws.is_identified().await);
        let e = typing(conversation::Id::random(), me);
        service
            .publish(&Subject::User(me), Envelope::broadcast(e.clone()))
            .await;
        assert_eq!(rx.recv().await.unwrap(), e);
        assert!(nothing_received(&mut rx).await);
    }

    #[tokio::test]
    async fn should_reject_foreign_identity() {
        let service: event::Service = Arc::new(LocalEventService::new());
        let (ws, _rx) = connect(user::Id::random());
        let someone_else = user::Id::random();

        let res = ws.identify(&service, Some(&someone_else)).await;

        assert!(matches!(res, Err(event::Error::IdentityMismatch { .. })));
        assert!(!ws.is_identified().await);
        assert!(!ws.is_joined(&Subject::User(someone_else)).await);
    }

    #[tokio::test]
    async fn should_join_idempotently() {
        let service: event::Service = Arc::new(LocalEventService::new());
        let (ws, mut rx) = connect(user::Id::random());
        let cid = conversation::Id::random();
        let room = Subject::Conversation(cid);

        ws.join(&service, room).await.unwrap();
        ws.join(&service, room).await.unwrap();

        let e = typing(cid, user::Id::random());
        service.publish(&room, Envelope::broadcast(e.clone())).await;

        assert_eq!(rx.recv().await.unwrap(), e);
        assert!(nothing_received(&mut rx).await);
    }

    #[tokio::test]
    async fn should_stop_receiving_after_leave() {
        let service: event::Service = Arc::new(LocalEventService::new());
        let (ws, mut rx) = connect(user::Id::random());
        let cid = conversation::Id::random();
        let room = Subject::Conversation(cid);

        ws.join(&service, room).await.unwrap();
        ws.leave(&room).await;
        ws.leave(&room).await;
        service
            .publish(&room, Envelope::broadcast(typing(cid, user::Id::random())))
            .await;

        assert!(!ws.is_joined(&room).await);
        assert!(nothing_received(&mut rx).await);
    }

    #[tokio::test]
    async fn should_skip_own_signals() {
        let service: event::Service = Arc::new(LocalEventService::new());
        let (u1, u2) = (user::Id::random(), user::Id::random());
        let (ws1, mut rx1) = connect(u1);
        let (ws2, mut rx2) = connect(u2);
        let cid = conversation::Id::random();
        let room = Subject::Conversation(cid);
        ws1.join(&service, room).await.unwrap();
        ws2.join(&service, room).await.unwrap();

        service
            .publish(&room, Envelope::from_connection(ws1.id, typing(cid, u1)))
            .await;

        assert_eq!(rx2.recv().await.unwrap(), typing(cid, u1));
        assert!(nothing_received(&mut rx1).await);
    }

    #[tokio::test]
    async fn should_drop_memberships_on_disconnect() {
        let service: event::Service = Arc::new(LocalEventService::new());
        let me = user::Id::random();
        let (ws, mut rx) = connect(me);
        let room = Subject::Conversation(conversation::Id::random());
        ws.identify(&service, None).await.unwrap();
        ws.join(&service, room).await.unwrap();

        ws.disconnect().await;

        assert!(!ws.is_joined(&room).await);
        assert!(!ws.is_joined(&Subject::User(me)).await);
        assert!(matches!(
            ws.join(&service, room).await,
            Err(event::Error::Disconnected)
        ));
        service
            .publish(
                &Subject::User(me),
                Envelope::broadcast(typing(conversation::Id::random(), me)),
            )
            .await;
        assert!(nothing_received(&mut rx).await);
    }
}
