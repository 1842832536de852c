use async_trait::async_trait;
use futures::future::try_join_all;
use log::{debug, warn};

use crate::integration::cache;
use crate::message;
use crate::message::model::MessageDto;
use crate::user;

use super::model::{Conversation, ConversationDto, NewConversation, Participants};
use super::{Id, ListingId, Repository};

#[async_trait]
pub trait ConversationService {
    async fn get_or_create(
        &self,
        requester: &user::Id,
        participant: Option<&user::Id>,
        listing_id: Option<&ListingId>,
    ) -> super::Result<Conversation>;

    async fn find_all(&self, u: &user::Id) -> super::Result<Vec<ConversationDto>>;

    async fn check_member(&self, id: &Id, u: &user::Id) -> super::Result<Participants>;
}

#[derive(Clone)]
pub struct ConversationServiceImpl {
    repo: Repository,
    message_repo: message::Repository,
    user_service: user::Service,
    redis: cache::Redis,
}

impl ConversationServiceImpl {
    pub fn new(
        repo: Repository,
        message_repo: message::Repository,
        user_service: user::Service,
        redis: cache::Redis,
    ) -> Self {
        Self {
            repo,
            message_repo,
            user_service,
            redis,
        }
    }
}

#[async_trait]
impl ConversationService for ConversationServiceImpl {
    async fn get_or_create(
        &self,
        requester: &user::Id,
        participant: Option<&user::Id>,
        listing_id: Option<&ListingId>,
    ) -> super::Result<Conversation> {
        let participant = participant.ok_or(super::Error::MissingParticipant)?;
        if requester.eq(participant) {
            return Err(super::Error::SelfConversation);
        }

        if let Some(c) = self
            .repo
            .find_by_participants(requester, participant, listing_id)?
        {
            return Ok(c);
        }

        if !self.user_service.exists(participant).await? {
            return Err(super::Error::_User(user::Error::NotFound(*participant)));
        }

        let new_conversation = NewConversation::new(requester, participant, listing_id);
        if let Some(c) = self.repo.insert(&new_conversation)? {
            debug!("Created conversation {}", c.id());
            return Ok(c);
        }

        warn!("Concurrent insert of conversation between {requester} and {participant}");
        self.repo
            .find_by_participants(requester, participant, listing_id)?
            .ok_or(super::Error::NotCreated)
    }

    async fn find_all(&self, u: &user::Id) -> super::Result<Vec<ConversationDto>> {
        let conversations = self.repo.find_by_participant(u)?;

        try_join_all(
            conversations
                .iter()
                .map(|c| async move { self.conversation_to_dto(c, u).await }),
        )
        .await
    }

    async fn check_member(&self, id: &Id, u: &user::Id) -> super::Result<Participants> {
        let participants = match self.find_cached_participants(id).await {
            Some(p) => p,
            None => {
                let c = self
                    .repo
                    .find_by_id(id)?
                    .ok_or(super::Error::NotFound(*id))?;
                let p = c.participants();
                self.cache_participants(id, &p).await;
                p
            }
        };

        if !participants.contains(u) {
            return Err(super::Error::NotMember(*u));
        }

        Ok(participants)
    }
}

impl ConversationServiceImpl {
    async fn conversation_to_dto(
        &self,
        c: &Conversation,
        u: &user::Id,
    ) -> super::Result<ConversationDto> {
        let counterpart = c
            .participants()
            .other(u)
            .ok_or(super::Error::NotMember(*u))?;
        let counterpart = self.user_service.find_user_info(&counterpart).await?;

        let last_message = match self.message_repo.find_last(c.id())? {
            Some(m) => {
                let sender = if m.sender_id() == counterpart.id() {
                    counterpart.clone()
                } else {
                    self.user_service.find_user_info(m.sender_id()).await?
                };
                Some(MessageDto::new(m, sender))
            }
            None => None,
        };

        let unread = self.message_repo.count_unread_in(c.id(), u)?;

        Ok(ConversationDto::new(c, counterpart, last_message, unread))
    }
}

// cache operations
impl ConversationServiceImpl {
    async fn find_cached_participants(&self, id: &Id) -> Option<Participants> {
        let members = self
            .redis
            .smembers::<user::Id>(cache::Key::Participants(*id))
            .await?;

        Participants::try_from(members).ok()
    }

    async fn cache_participants(&self, id: &Id, p: &Participants) {
        self.redis
            .sadd_ex(cache::Key::Participants(*id), &p.as_array())
            .await;
    }
}
