use async_trait::async_trait;
use chrono::Utc;
use log::debug;

use crate::user::model::UserInfo;
use crate::{conversation, user};

use super::model::{MessageDto, MessagePage, NewMessage};
use super::{MAX_PAGE_SIZE, Repository};

#[async_trait]
pub trait MessageService {
    async fn append(
        &self,
        conversation_id: &conversation::Id,
        sender: &user::Id,
        content: &str,
    ) -> super::Result<MessageDto>;

    /// Reads a page of the conversation and marks everything addressed to
    /// `requester` as seen, not only the returned page.
    async fn list_page(
        &self,
        conversation_id: &conversation::Id,
        requester: &user::Id,
        page: i64,
        page_size: i64,
    ) -> super::Result<MessagePage>;

    async fn unread_count_for(&self, u: &user::Id) -> super::Result<i64>;
}

#[derive(Clone)]
pub struct MessageServiceImpl {
    repo: Repository,
    conversation_service: conversation::Service,
    user_service: user::Service,
}

impl MessageServiceImpl {
    pub fn new(
        repo: Repository,
        conversation_service: conversation::Service,
        user_service: user::Service,
    ) -> Self {
        Self {
            repo,
            conversation_service,
            user_service,
        }
    }
}

#[async_trait]
impl MessageService for MessageServiceImpl {
    async fn append(
        &self,
        conversation_id: &conversation::Id,
        sender: &user::Id,
        content: &str,
    ) -> super::Result<MessageDto> {
        if content.trim().is_empty() {
            return Err(super::Error::EmptyContent);
        }

        let participants = self
            .conversation_service
            .check_member(conversation_id, sender)
            .await?;
        let receiver = participants
            .other(sender)
            .ok_or(conversation::Error::NotMember(*sender))?;

        let msg = self
            .repo
            .insert(&NewMessage::new(conversation_id, sender, &receiver, content))?;
        debug!("Appended message {} to {conversation_id}", msg.id());

        let sender = self.user_service.find_user_info(sender).await?;
        Ok(MessageDto::new(msg, sender))
    }

    async fn list_page(
        &self,
        conversation_id: &conversation::Id,
        requester: &user::Id,
        page: i64,
        page_size: i64,
    ) -> super::Result<MessagePage> {
        let participants = self
            .conversation_service
            .check_member(conversation_id, requester)
            .await?;

        let offset = page_offset(page, page_size)?;

        let newly_seen = self.repo.mark_seen(conversation_id, requester, Utc::now())?;
        if newly_seen > 0 {
            debug!("{requester} has seen {newly_seen} message(s) in {conversation_id}");
        }

        let msgs = self
            .repo
            .find_page(conversation_id, page_size, offset)?;

        let [a, b] = participants.as_array();
        let a = self.user_service.find_user_info(&a).await?;
        let b = self.user_service.find_user_info(&b).await?;
        let sender_of = |id: &user::Id| -> UserInfo {
            if a.id() == id { a.clone() } else { b.clone() }
        };

        let messages = msgs
            .into_iter()
            .map(|m| {
                let sender = sender_of(m.sender_id());
                MessageDto::new(m, sender)
            })
            .collect();

        Ok(MessagePage::new(messages, page, page_size, newly_seen))
    }

    async fn unread_count_for(&self, u: &user::Id) -> super::Result<i64> {
        let count = self.repo.count_unread(u)?;
        Ok(count)
    }
}

/// Number of messages to skip, counted from the most recent one.
fn page_offset(page: i64, page_size: i64) -> super::Result<i64> {
    if page < 1 {
        return Err(super::Error::InvalidPage(format!(
            "page must be at least 1, got {page}"
        )));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(super::Error::InvalidPage(format!(
            "page_size must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"
        )));
    }

    (page - 1)
        .checked_mul(page_size)
        .ok_or_else(|| super::Error::InvalidPage(format!("page {page} is out of range")))
}
