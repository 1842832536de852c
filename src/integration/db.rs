use std::env;
use std::time::Duration;

use axum::http::StatusCode;
use diesel::PgConnection;
use diesel::r2d2::ConnectionManager;
use diesel::result::DatabaseErrorKind;

use crate::integration::Result;

pub type Pool = r2d2::Pool<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct Config {
    host: String,
    port: u16,
    user: String,
    password: String,
    db: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: 5432,
            user: String::from("postgres"),
            password: String::from("postgres"),
            db: String::from("marketplace"),
        }
    }
}

impl Config {
    pub fn env() -> Result<Self> {
        let host = env::var("POSTGRES_HOST")?;
        let port = env::var("POSTGRES_PORT")?.parse()?;
        let user = env::var("POSTGRES_USER")?;
        let password = env::var("POSTGRES_PASSWORD")?;
        let db = env::var("POSTGRES_DB")?;
        Ok(Self {
            host,
            port,
            user,
            password,
            db,
        })
    }

    fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.db
        )
    }

    pub fn connect(&self) -> Result<Pool> {
        let manager = ConnectionManager::<PgConnection>::new(self.url());
        let pool = r2d2::Pool::builder()
            .connection_timeout(Duration::from_secs(5))
            .build(manager)?;

        Ok(pool)
    }
}

/// Maps store failures onto HTTP statuses. Unique violations surface as conflicts,
/// a missing row as not found, everything else as an internal error.
pub fn status_of(e: &diesel::result::Error) -> StatusCode {
    match e {
        diesel::result::Error::NotFound => StatusCode::NOT_FOUND,
        diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            StatusCode::CONFLICT
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Implements diesel (de)serialization for a `Uuid` newtype declared with
/// `#[derive(FromSqlRow, AsExpression)]` and `#[diesel(sql_type = diesel::sql_types::Uuid)]`.
macro_rules! impl_uuid_sql {
    ($id:ty) => {
        impl diesel::serialize::ToSql<diesel::sql_types::Uuid, diesel::pg::Pg> for $id {
            fn to_sql<'b>(
                &'b self,
                out: &mut diesel::serialize::Output<'b, '_, diesel::pg::Pg>,
            ) -> diesel::serialize::Result {
                <uuid::Uuid as diesel::serialize::ToSql<diesel::sql_types::Uuid, diesel::pg::Pg>>::to_sql(
                    self.get(),
                    out,
                )
            }
        }

        impl diesel::deserialize::FromSql<diesel::sql_types::Uuid, diesel::pg::Pg> for $id {
            fn from_sql(bytes: diesel::pg::PgValue<'_>) -> diesel::deserialize::Result<Self> {
                <uuid::Uuid as diesel::deserialize::FromSql<diesel::sql_types::Uuid, diesel::pg::Pg>>::from_sql(bytes)
                    .map(Self::from)
            }
        }
    };
}

pub(crate) use impl_uuid_sql;
