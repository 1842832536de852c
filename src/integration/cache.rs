use std::collections::HashSet;
use std::env;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use log::{error, warn};
use redis::AsyncCommands;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::integration::Result;
use crate::{conversation, user};

const ONE_HOUR: u64 = 60 * 60;

#[derive(Clone)]
pub struct Config {
    host: String,
    port: u16,
}

impl Config {
    pub fn env() -> Result<Self> {
        let host = env::var("REDIS_HOST")?;
        let port = env::var("REDIS_PORT")?.parse()?;
        Ok(Self { host, port })
    }

    pub async fn connect(&self) -> Result<Redis> {
        let con = redis::Client::open(format!("redis://{}:{}", self.host, self.port))?
            .get_connection_manager()
            .await?;

        Ok(Redis { con: Some(con) })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Key {
    UserInfo(user::Id),
    Participants(conversation::Id),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::UserInfo(id) => write!(f, "user_info:{id}"),
            Key::Participants(id) => write!(f, "participants:{id}"),
        }
    }
}

impl redis::ToRedisArgs for Key {
    fn write_redis_args<W>(&self, out: &mut W)
    where
        W: ?Sized + redis::RedisWrite,
    {
        out.write_arg(self.to_string().as_bytes())
    }
}

/// Best-effort cache. Every failure is logged and reported as a miss,
/// so callers always fall back to the store.
#[derive(Clone)]
pub struct Redis {
    con: Option<redis::aio::ConnectionManager>,
}

impl Redis {
    pub fn disabled() -> Self {
        Self { con: None }
    }

    pub async fn json_get<T: DeserializeOwned>(&self, key: Key) -> Option<T> {
        let mut con = self.con.clone()?;

        match con.get::<_, Option<String>>(&key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("Malformed cache entry for {key}: {e:?}");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                error!("Failed to GET {key}: {e:?}");
                None
            }
        }
    }

    pub async fn json_set_ex<T: Serialize>(&self, key: Key, value: &T) {
        let Some(mut con) = self.con.clone() else {
            return;
        };

        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                error!("Failed to serialize cache entry for {key}: {e:?}");
                return;
            }
        };

        if let Err(e) = con.set_ex::<_, _, ()>(&key, raw, ONE_HOUR).await {
            error!("Failed to SETEX {key}: {e:?}");
        }
    }

    pub async fn smembers<T>(&self, key: Key) -> Option<HashSet<T>>
    where
        T: FromStr + Eq + Hash,
    {
        let mut con = self.con.clone()?;

        match con.smembers::<_, HashSet<String>>(&key).await {
            Ok(members) if members.is_empty() => None,
            Ok(members) => members
                .iter()
                .map(|m| m.parse::<T>().ok())
                .collect::<Option<HashSet<T>>>(),
            Err(e) => {
                error!("Failed to SMEMBERS {key}: {e:?}");
                None
            }
        }
    }

    pub async fn sadd_ex<T: ToString>(&self, key: Key, members: &[T]) {
        let Some(mut con) = self.con.clone() else {
            return;
        };

        let members = members.iter().map(ToString::to_string).collect::<Vec<_>>();
        if let Err(e) = con.sadd::<_, _, ()>(&key, members).await {
            error!("Failed to SADD {key}: {e:?}");
            return;
        }

        if let Err(e) = con.expire::<_, ()>(&key, ONE_HOUR as i64).await {
            error!("Failed to EXPIRE {key}: {e:?}");
        }
    }
}
