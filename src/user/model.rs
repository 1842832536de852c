use diesel::prelude::{Identifiable, Queryable, Selectable};
use serde::{Deserialize, Serialize};

use super::Id;

#[derive(Queryable, Selectable, Identifiable, Clone, Debug, PartialEq)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    id: Id,
    name: String,
    picture: Option<String>,
}

impl User {
    #[cfg(test)]
    pub fn new(id: Id, name: impl Into<String>, picture: Option<String>) -> Self {
        Self {
            id,
            name: name.into(),
            picture,
        }
    }

    pub const fn id(&self) -> &Id {
        &self.id
    }
}

#[cfg(test)]
#[derive(diesel::prelude::Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser<'a> {
    id: &'a Id,
    name: &'a str,
    picture: Option<&'a str>,
}

#[cfg(test)]
impl<'a> NewUser<'a> {
    pub fn new(id: &'a Id, name: &'a str, picture: Option<&'a str>) -> Self {
        Self { id, name, picture }
    }
}

/// Lightweight projection used to render a message sender or a conversation counterpart.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserInfo {
    id: Id,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    picture: Option<String>,
}

impl UserInfo {
    pub const fn id(&self) -> &Id {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl From<User> for UserInfo {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            picture: u.picture,
        }
    }
}
