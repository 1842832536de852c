use diesel::BoolExpressionMethods;
use diesel::ExpressionMethods;
use diesel::OptionalExtension;
use diesel::PgConnection;
use diesel::QueryDsl;
use diesel::RunQueryDsl;
use diesel::SelectableHelper;
use diesel::r2d2::ConnectionManager;

use crate::schema::conversations;
use crate::user;

use super::model::{Conversation, NewConversation};
use super::{Id, ListingId};

pub trait ConversationRepository {
    fn find_by_id(&self, id: &Id) -> super::Result<Option<Conversation>>;

    /// Looks up the conversation between `a` and `b`. Without a listing the
    /// most recently active conversation of the pair is returned.
    fn find_by_participants(
        &self,
        a: &user::Id,
        b: &user::Id,
        listing_id: Option<&ListingId>,
    ) -> super::Result<Option<Conversation>>;

    fn find_by_participant(&self, u: &user::Id) -> super::Result<Vec<Conversation>>;

    /// Returns `None` when a concurrent insert already took the same key.
    fn insert(&self, c: &NewConversation) -> super::Result<Option<Conversation>>;
}

pub struct PgConversationRepository {
    pool: r2d2::Pool<ConnectionManager<PgConnection>>,
}

impl PgConversationRepository {
    pub fn new(pool: r2d2::Pool<ConnectionManager<PgConnection>>) -> Self {
        Self { pool }
    }
}

impl ConversationRepository for PgConversationRepository {
    fn find_by_id(&self, id: &Id) -> super::Result<Option<Conversation>> {
        let mut conn = self.pool.get()?;

        let c = conversations::table
            .find(id)
            .select(Conversation::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(c)
    }

    fn find_by_participants(
        &self,
        a: &user::Id,
        b: &user::Id,
        listing_id: Option<&ListingId>,
    ) -> super::Result<Option<Conversation>> {
        let mut conn = self.pool.get()?;
        let (a, b) = if a <= b { (a, b) } else { (b, a) };

        let mut query = conversations::table
            .filter(conversations::user_a.eq(a))
            .filter(conversations::user_b.eq(b))
            .into_boxed();

        if let Some(l) = listing_id {
            query = query.filter(conversations::listing_id.eq(l));
        }

        let c = query
            .order(conversations::last_activity_at.desc())
            .select(Conversation::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(c)
    }

    fn find_by_participant(&self, u: &user::Id) -> super::Result<Vec<Conversation>> {
        let mut conn = self.pool.get()?;

        let cs = conversations::table
            .filter(conversations::user_a.eq(u).or(conversations::user_b.eq(u)))
            .order(conversations::last_activity_at.desc())
            .select(Conversation::as_select())
            .get_results(&mut conn)?;

        Ok(cs)
    }

    fn insert(&self, c: &NewConversation) -> super::Result<Option<Conversation>> {
        let mut conn = self.pool.get()?;

        let c = diesel::insert_into(conversations::table)
            .values(c)
            .on_conflict_do_nothing()
            .returning(Conversation::as_returning())
            .get_result(&mut conn)
            .optional()?;

        Ok(c)
    }
}
