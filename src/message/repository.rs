use chrono::{DateTime, Utc};
use diesel::Connection;
use diesel::ExpressionMethods;
use diesel::OptionalExtension;
use diesel::PgConnection;
use diesel::QueryDsl;
use diesel::RunQueryDsl;
use diesel::SelectableHelper;
use diesel::r2d2::ConnectionManager;

use crate::schema::{conversations, messages};
use crate::{conversation, user};

use super::model::{Message, NewMessage};

pub trait MessageRepository {
    /// Stores the message and bumps the conversation's last activity
    /// in a single transaction.
    fn insert(&self, m: &NewMessage) -> super::Result<Message>;

    /// Page of messages in chronological order. `offset` counts from the most recent one.
    fn find_page(
        &self,
        conversation_id: &conversation::Id,
        limit: i64,
        offset: i64,
    ) -> super::Result<Vec<Message>>;

    fn find_last(&self, conversation_id: &conversation::Id) -> super::Result<Option<Message>>;

    /// Marks every unseen message addressed to `receiver` as seen at `at`.
    fn mark_seen(
        &self,
        conversation_id: &conversation::Id,
        receiver: &user::Id,
        at: DateTime<Utc>,
    ) -> super::Result<usize>;

    fn count_unread(&self, receiver: &user::Id) -> super::Result<i64>;

    fn count_unread_in(
        &self,
        conversation_id: &conversation::Id,
        receiver: &user::Id,
    ) -> super::Result<i64>;
}

pub struct PgMessageRepository {
    pool: r2d2::Pool<ConnectionManager<PgConnection>>,
}

impl PgMessageRepository {
    pub fn new(pool: r2d2::Pool<ConnectionManager<PgConnection>>) -> Self {
        Self { pool }
    }
}

impl MessageRepository for PgMessageRepository {
    fn insert(&self, m: &NewMessage) -> super::Result<Message> {
        let mut conn = self.pool.get()?;

        let msg = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let msg = diesel::insert_into(messages::table)
                .values(m)
                .returning(Message::as_returning())
                .get_result(conn)?;

            diesel::update(conversations::table.find(msg.conversation_id()))
                .set(conversations::last_activity_at.eq(*msg.created_at()))
                .execute(conn)?;

            Ok(msg)
        })?;

        Ok(msg)
    }

    fn find_page(
        &self,
        conversation_id: &conversation::Id,
        limit: i64,
        offset: i64,
    ) -> super::Result<Vec<Message>> {
        let mut conn = self.pool.get()?;

        let mut msgs = messages::table
            .filter(messages::conversation_id.eq(conversation_id))
            .order((messages::created_at.desc(), messages::id.desc()))
            .limit(limit)
            .offset(offset)
            .select(Message::as_select())
            .load(&mut conn)?;

        msgs.reverse();
        Ok(msgs)
    }

    fn find_last(&self, conversation_id: &conversation::Id) -> super::Result<Option<Message>> {
        let mut conn = self.pool.get()?;

        let msg = messages::table
            .filter(messages::conversation_id.eq(conversation_id))
            .order((messages::created_at.desc(), messages::id.desc()))
            .select(Message::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(msg)
    }

    fn mark_seen(
        &self,
        conversation_id: &conversation::Id,
        receiver: &user::Id,
        at: DateTime<Utc>,
    ) -> super::Result<usize> {
        let mut conn = self.pool.get()?;

        let updated = diesel::update(
            messages::table
                .filter(messages::conversation_id.eq(conversation_id))
                .filter(messages::receiver_id.eq(receiver))
                .filter(messages::seen.eq(false)),
        )
        .set((messages::seen.eq(true), messages::seen_at.eq(Some(at))))
        .execute(&mut conn)?;

        Ok(updated)
    }

    fn count_unread(&self, receiver: &user::Id) -> super::Result<i64> {
        let mut conn = self.pool.get()?;

        let count = messages::table
            .filter(messages::receiver_id.eq(receiver))
            .filter(messages::seen.eq(false))
            .count()
            .get_result(&mut conn)?;

        Ok(count)
    }

    fn count_unread_in(
        &self,
        conversation_id: &conversation::Id,
        receiver: &user::Id,
    ) -> super::Result<i64> {
        let mut conn = self.pool.get()?;

        let count = messages::table
            .filter(messages::conversation_id.eq(conversation_id))
            .filter(messages::receiver_id.eq(receiver))
            .filter(messages::seen.eq(false))
            .count()
            .get_result(&mut conn)?;

        Ok(count)
    }
}
