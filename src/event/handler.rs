use axum::Extension;
use axum::extract::ws::Message::{Binary, Close, Text};
use axum::extract::ws::{self, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use log::{debug, error, warn};
use serde_json::from_str;
use tokio::sync::mpsc;
use tokio::try_join;

use super::Subject;
use super::context;
use super::model::{Command, Envelope, Event};
use crate::{auth, conversation, event};

const OUTBOX_CAPACITY: usize = 64;

pub async fn ws(
    Extension(auth_user): Extension<auth::User>,
    ws: WebSocketUpgrade,
    State(event_service): State<event::Service>,
    State(conversation_service): State<conversation::Service>,
) -> Response {
    ws.on_upgrade(move |socket| {
        handle_socket(auth_user, socket, event_service, conversation_service)
    })
}

async fn handle_socket(
    auth_user: auth::User,
    ws: WebSocket,
    event_service: event::Service,
    conversation_service: conversation::Service,
) {
    let (tx, rx) = mpsc::channel(OUTBOX_CAPACITY);
    let ctx = context::Ws::new(auth_user, tx);
    debug!("WS connection {:?} opened by {}", ctx.id, ctx.auth_user.id());

    let (sender, receiver) = ws.split();

    let read_task = tokio::spawn(read(
        ctx.clone(),
        receiver,
        event_service,
        conversation_service,
    ));
    let write_task = tokio::spawn(write(ctx.clone(), sender, rx));

    match try_join!(read_task, write_task) {
        Ok(_) => debug!("WS disconnected gracefully"),
        Err(e) => error!("WS disconnected with error: {e}"),
    }

    ctx.disconnect().await;
}

async fn read(
    ctx: context::Ws,
    mut receiver: SplitStream<WebSocket>,
    event_service: event::Service,
    conversation_service: conversation::Service,
) {
    loop {
        tokio::select! {
            // close is notified => stop 'read' task
            _ = ctx.close.notified() => break,

            // read next frame from WS connection
            frame = receiver.next() => {
                match frame {
                    None => {
                        ctx.close.notify_one();
                        break;
                    }
                    Some(Err(e)) => {
                        error!("Failed to read WS frame: {e}");
                        ctx.close.notify_one(); // notify 'write' task to stop
                        break;
                    }
                    Some(Ok(Close(frame))) => {
                        debug!("WS connection closed by client: {frame:?}");
                        ctx.close.notify_one(); // notify 'write' task to stop
                        break;
                    }
                    Some(Ok(Text(content))) => {
                        handle_text_frame(&ctx, content.as_str(), &event_service, &conversation_service).await;
                    }
                    Some(Ok(Binary(content))) => warn!("Received binary WS frame: {content:?}"),
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

async fn handle_text_frame(
    ctx: &context::Ws,
    content: &str,
    event_service: &event::Service,
    conversation_service: &conversation::Service,
) {
    match from_str::<Command>(content) {
        Ok(command) => {
            if let Err(e) = handle_command(ctx, command, event_service, conversation_service).await
            {
                error!("Failed to handle command from {:?}: {e}", ctx.id);
            }
        }
        Err(e) => warn!("Skipping text frame, content is malformed: {e}"),
    }
}

async fn handle_command(
    ctx: &context::Ws,
    command: Command,
    event_service: &event::Service,
    conversation_service: &conversation::Service,
) -> super::Result<()> {
    let me = ctx.auth_user.id();

    match command {
        Command::Identify { user_id } => ctx.identify(event_service, user_id.as_ref()).await?,
        Command::JoinConversation { conversation_id } => {
            conversation_service
                .check_member(&conversation_id, me)
                .await?;
            ctx.join(event_service, Subject::Conversation(conversation_id))
                .await?;
        }
        Command::LeaveConversation { conversation_id } => {
            ctx.leave(&Subject::Conversation(conversation_id)).await;
        }
        Command::TypingStart { conversation_id } => {
            conversation_service
                .check_member(&conversation_id, me)
                .await?;
            let e = Event::TypingStart {
                conversation_id,
                user_id: *me,
            };
            event_service
                .publish(
                    &Subject::Conversation(conversation_id),
                    Envelope::from_connection(ctx.id, e),
                )
                .await;
        }
        Command::TypingStop { conversation_id } => {
            conversation_service
                .check_member(&conversation_id, me)
                .await?;
            let e = Event::TypingStop {
                conversation_id,
                user_id: *me,
            };
            event_service
                .publish(
                    &Subject::Conversation(conversation_id),
                    Envelope::from_connection(ctx.id, e),
                )
                .await;
        }
        Command::MessageSeen {
            conversation_id,
            message_id,
        } => {
            conversation_service
                .check_member(&conversation_id, me)
                .await?;
            let e = Event::MessageSeen {
                conversation_id,
                message_id,
                user_id: *me,
            };
            event_service
                .publish(
                    &Subject::Conversation(conversation_id),
                    Envelope::broadcast(e),
                )
                .await;
        }
    }

    Ok(())
}

async fn write(
    ctx: context::Ws,
    mut sender: SplitSink<WebSocket, ws::Message>,
    mut outbox: mpsc::Receiver<Event>,
) {
    loop {
        tokio::select! {
            // close is notified => stop 'write' task
            _ = ctx.close.notified() => break,

            // event routed from a joined room => send it to the client
            item = outbox.recv() => {
                let Some(event) = item else { break };

                let json = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize event: {e:?}");
                        continue;
                    }
                };

                if let Err(e) = sender.send(Text(json.into())).await {
                    error!("Failed to send event to client: {e}");
                    ctx.close.notify_one(); // notify 'read' task to stop
                    break;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::time::timeout;

    use crate::conversation::repository::fake::InMemoryConversationRepository;
    use crate::conversation::service::{ConversationService, ConversationServiceImpl};
    use crate::event::service::{LocalEventService, notify_new_message};
    use crate::integration::cache;
    use crate::message;
    use crate::message::repository::fake::InMemoryMessageRepository;
    use crate::message::service::{MessageService, MessageServiceImpl};
    use crate::user;
    use crate::user::model::User;
    use crate::user::repository::fake::InMemoryUserRepository;
    use crate::user::service::UserServiceImpl;

    use super::*;

    struct World {
        u1: user::Id,
        u2: user::Id,
        c1: conversation::Id,
        events: event::Service,
        conversations: conversation::Service,
        messages: message::Service,
    }

    async fn world() -> World {
        let u1 = user::Id::random();
        let u2 = user::Id::random();
        let user_service: user::Service = Arc::new(UserServiceImpl::new(
            Arc::new(InMemoryUserRepository::with(&[
                User::new(u1, "ion", None),
                User::new(u2, "maria", None),
            ])),
            cache::Redis::disabled(),
        ));
        let message_repo: message::Repository = Arc::new(InMemoryMessageRepository::default());
        let conversations: conversation::Service = Arc::new(ConversationServiceImpl::new(
            Arc::new(InMemoryConversationRepository::default()),
            message_repo.clone(),
            user_service.clone(),
            cache::Redis::disabled(),
        ));
        let messages: message::Service = Arc::new(MessageServiceImpl::new(
            message_repo,
            conversations.clone(),
            user_service,
        ));

        let c1 = *conversations
            .get_or_create(&u1, Some(&u2), None)
            .await
            .unwrap()
            .id();

        World {
            u1,
            u2,
            c1,
            events: Arc::new(LocalEventService::new()),
            conversations,
            messages,
        }
    }

    impl World {
        fn connect(&self, u: user::Id) -> (context::Ws, mpsc::Receiver<Event>) {
            let (tx, rx) = mpsc::channel(16);
            (context::Ws::new(auth::User::new(u), tx), rx)
        }

        async fn run(&self, ctx: &context::Ws, command: Command) -> event::Result<()> {
            handle_command(ctx, command, &self.events, &self.conversations).await
        }

        async fn send(&self, from: user::Id, text: &str) -> message::model::MessageDto {
            let msg = self.messages.append(&self.c1, &from, text).await.unwrap();
            notify_new_message(&self.events, &msg).await;
            msg
        }
    }

    async fn next(rx: &mut mpsc::Receiver<Event>) -> Event {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("event expected")
            .expect("outbox open")
    }

    async fn silent(rx: &mut mpsc::Receiver<Event>) -> bool {
        timeout(Duration::from_millis(50), rx.recv()).await.is_err()
    }

    #[tokio::test]
    async fn should_deliver_new_messages_to_room_members_in_order() {
        let w = world().await;
        let (ws1, mut rx1) = w.connect(w.u1);
        let (ws2, mut rx2) = w.connect(w.u2);
        for ws in [&ws1, &ws2] {
            w.run(ws, Command::JoinConversation { conversation_id: w.c1 })
                .await
                .unwrap();
        }

        let m2 = w.send(w.u1, "M2").await;
        let m3 = w.send(w.u1, "M3").await;

        for rx in [&mut rx1, &mut rx2] {
            assert_eq!(next(rx).await, Event::NewMessage { message: m2.clone() });
            assert_eq!(next(rx).await, Event::NewMessage { message: m3.clone() });
        }
    }

    #[tokio::test]
    async fn should_notify_identified_user_outside_the_room() {
        let w = world().await;
        let (ws1, mut rx1) = w.connect(w.u1);
        let (ws2, mut rx2) = w.connect(w.u2);
        w.run(&ws1, Command::JoinConversation { conversation_id: w.c1 })
            .await
            .unwrap();
        w.run(&ws2, Command::Identify { user_id: Some(w.u2) })
            .await
            .unwrap();

        let m2 = w.send(w.u1, "M2").await;

        assert_eq!(next(&mut rx1).await, Event::NewMessage { message: m2.clone() });
        match next(&mut rx2).await {
            Event::NewNotification {
                conversation_id,
                message,
                ..
            } => {
                assert_eq!(conversation_id, w.c1);
                assert_eq!(message, m2);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(silent(&mut rx2).await);
    }

    #[tokio::test]
    async fn should_broadcast_typing_to_others_only() {
        let w = world().await;
        let (ws1, mut rx1) = w.connect(w.u1);
        let (ws2, mut rx2) = w.connect(w.u2);
        for ws in [&ws1, &ws2] {
            w.run(ws, Command::JoinConversation { conversation_id: w.c1 })
                .await
                .unwrap();
        }

        w.run(&ws1, Command::TypingStart { conversation_id: w.c1 })
            .await
            .unwrap();
        w.run(&ws1, Command::TypingStop { conversation_id: w.c1 })
            .await
            .unwrap();

        assert_eq!(
            next(&mut rx2).await,
            Event::TypingStart {
                conversation_id: w.c1,
                user_id: w.u1
            }
        );
        assert_eq!(
            next(&mut rx2).await,
            Event::TypingStop {
                conversation_id: w.c1,
                user_id: w.u1
            }
        );
        assert!(silent(&mut rx1).await);
    }

    #[tokio::test]
    async fn should_broadcast_message_seen() {
        let w = world().await;
        let (ws1, mut rx1) = w.connect(w.u1);
        let (ws2, _rx2) = w.connect(w.u2);
        w.run(&ws1, Command::JoinConversation { conversation_id: w.c1 })
            .await
            .unwrap();
        let m = w.send(w.u1, "hello").await;
        assert_eq!(next(&mut rx1).await, Event::NewMessage { message: m.clone() });

        w.run(
            &ws2,
            Command::MessageSeen {
                conversation_id: w.c1,
                message_id: *m.id(),
            },
        )
        .await
        .unwrap();

        assert_eq!(
            next(&mut rx1).await,
            Event::MessageSeen {
                conversation_id: w.c1,
                message_id: *m.id(),
                user_id: w.u2,
            }
        );
    }

    #[tokio::test]
    async fn should_refuse_joining_foreign_conversation() {
        let w = world().await;
        let stranger = user::Id::random();
        let (ws, mut rx) = w.connect(stranger);

        let res = w
            .run(&ws, Command::JoinConversation { conversation_id: w.c1 })
            .await;
        w.send(w.u1, "private").await;

        assert!(matches!(
            res,
            Err(event::Error::_Conversation(conversation::Error::NotMember(_)))
        ));
        assert!(silent(&mut rx).await);
    }

    #[tokio::test]
    async fn should_refuse_spoofed_identity() {
        let w = world().await;
        let (ws, mut rx) = w.connect(w.u1);

        let res = w.run(&ws, Command::Identify { user_id: Some(w.u2) }).await;
        w.send(w.u1, "for u2").await;

        assert!(matches!(res, Err(event::Error::IdentityMismatch { .. })));
        assert!(silent(&mut rx).await);
    }

    #[tokio::test]
    async fn should_read_through_the_scenario() {
        let w = world().await;

        let again = w
            .conversations
            .get_or_create(&w.u1, Some(&w.u2), None)
            .await
            .unwrap();
        assert_eq!(again.id(), &w.c1);

        let m1 = w.send(w.u1, "hello").await;
        assert!(!m1.seen());
        assert_eq!(m1.receiver_id(), &w.u2);

        let page = w.messages.list_page(&w.c1, &w.u2, 1, 50).await.unwrap();
        assert_eq!(page.messages().len(), 1);
        assert_eq!(page.messages()[0].content(), "hello");
        assert_eq!(w.messages.unread_count_for(&w.u2).await.unwrap(), 0);
    }
}
