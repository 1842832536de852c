use diesel::ExpressionMethods;
use diesel::OptionalExtension;
use diesel::PgConnection;
use diesel::QueryDsl;
use diesel::RunQueryDsl;
use diesel::SelectableHelper;
use diesel::r2d2::ConnectionManager;

use crate::schema::users;

use super::Id;
use super::model::User;

pub trait UserRepository {
    fn find_by_id(&self, id: &Id) -> super::Result<Option<User>>;
}

pub struct PgUserRepository {
    pool: r2d2::Pool<ConnectionManager<PgConnection>>,
}

impl PgUserRepository {
    pub fn new(pool: r2d2::Pool<ConnectionManager<PgConnection>>) -> Self {
        Self { pool }
    }
}

impl UserRepository for PgUserRepository {
    fn find_by_id(&self, id: &Id) -> super::Result<Option<User>> {
        let mut conn = self.pool.get()?;

        let u = users::table
            .filter(users::id.eq(id))
            .select(User::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(u)
    }
}
