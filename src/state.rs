use std::sync::Arc;

use axum::extract::FromRef;
use log::info;

use crate::conversation::repository::PgConversationRepository;
use crate::conversation::service::ConversationServiceImpl;
use crate::event::service::{LocalEventService, NatsEventService};
use crate::integration::{self, cache};
use crate::message::repository::PgMessageRepository;
use crate::message::service::MessageServiceImpl;
use crate::user::repository::PgUserRepository;
use crate::user::service::UserServiceImpl;
use crate::{auth, conversation, event, message, user};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub auth_service: auth::Service,
    pub user_service: user::Service,
    pub conversation_service: conversation::Service,
    pub message_service: message::Service,
    pub event_service: event::Service,
}

impl AppState {
    pub async fn init(cfg: &integration::Config) -> crate::Result<Self> {
        let pg = cfg.postgres.connect()?;

        let redis = match &cfg.redis {
            Some(redis_cfg) => redis_cfg.connect().await?,
            None => cache::Redis::disabled(),
        };

        let event_service: event::Service = match &cfg.pubsub {
            Some(pubsub_cfg) => {
                info!("Routing rooms through NATS");
                Arc::new(NatsEventService::new(pubsub_cfg.connect().await?))
            }
            None => {
                info!("Routing rooms in-process");
                Arc::new(LocalEventService::new())
            }
        };

        let auth_service = Arc::new(auth::service::AuthServiceImpl::new(&cfg.idp));

        let user_repo = Arc::new(PgUserRepository::new(pg.clone()));
        let user_service: user::Service =
            Arc::new(UserServiceImpl::new(user_repo, redis.clone()));

        let message_repo: message::Repository = Arc::new(PgMessageRepository::new(pg.clone()));

        let conversation_repo = Arc::new(PgConversationRepository::new(pg));
        let conversation_service: conversation::Service = Arc::new(ConversationServiceImpl::new(
            conversation_repo,
            message_repo.clone(),
            user_service.clone(),
            redis,
        ));

        let message_service = Arc::new(MessageServiceImpl::new(
            message_repo,
            conversation_service.clone(),
            user_service.clone(),
        ));

        Ok(Self {
            auth_service,
            user_service,
            conversation_service,
            message_service,
            event_service,
        })
    }
}
