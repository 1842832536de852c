use async_trait::async_trait;
use log::debug;

use crate::integration::cache;

use super::model::UserInfo;
use super::{Id, Repository};

#[async_trait]
pub trait UserService {
    async fn find_user_info(&self, id: &Id) -> super::Result<UserInfo>;

    async fn exists(&self, id: &Id) -> super::Result<bool>;
}

#[derive(Clone)]
pub struct UserServiceImpl {
    repo: Repository,
    redis: cache::Redis,
}

impl UserServiceImpl {
    pub fn new(repo: Repository, redis: cache::Redis) -> Self {
        Self { repo, redis }
    }
}

#[async_trait]
impl UserService for UserServiceImpl {
    async fn find_user_info(&self, id: &Id) -> super::Result<UserInfo> {
        if let Some(user_info) = self.find_cached_user_info(id).await {
            return Ok(user_info);
        }

        let user_info: UserInfo = self
            .repo
            .find_by_id(id)?
            .map(UserInfo::from)
            .ok_or(super::Error::NotFound(*id))?;

        self.cache_user_info(&user_info).await;
        Ok(user_info)
    }

    async fn exists(&self, id: &Id) -> super::Result<bool> {
        match self.find_user_info(id).await {
            Ok(_) => Ok(true),
            Err(super::Error::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

// cache operations
impl UserServiceImpl {
    async fn cache_user_info(&self, user_info: &UserInfo) {
        debug!("Caching user info for {}", user_info.id());
        let key = cache::Key::UserInfo(*user_info.id());
        self.redis.json_set_ex(key, user_info).await;
    }

    async fn find_cached_user_info(&self, id: &Id) -> Option<UserInfo> {
        let key = cache::Key::UserInfo(*id);
        self.redis.json_get::<UserInfo>(key).await
    }
}
