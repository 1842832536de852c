use std::collections::HashSet;

use chrono::{DateTime, Utc};
use diesel::prelude::{Identifiable, Insertable, Queryable, Selectable};
use serde::Serialize;

use crate::message::model::MessageDto;
use crate::user::{self, model::UserInfo};

use super::{Id, ListingId};

#[derive(Queryable, Selectable, Identifiable, Serialize, Clone, Debug, PartialEq)]
#[diesel(table_name = crate::schema::conversations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Conversation {
    id: Id,
    user_a: user::Id,
    user_b: user::Id,
    #[serde(skip_serializing_if = "Option::is_none")]
    listing_id: Option<ListingId>,
    created_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
}

impl Conversation {
    pub const fn id(&self) -> &Id {
        &self.id
    }

    pub const fn listing_id(&self) -> Option<&ListingId> {
        self.listing_id.as_ref()
    }

    pub const fn last_activity_at(&self) -> &DateTime<Utc> {
        &self.last_activity_at
    }

    pub fn participants(&self) -> Participants {
        Participants::new(self.user_a, self.user_b)
    }
}

impl From<NewConversation> for Conversation {
    fn from(c: NewConversation) -> Self {
        Self {
            id: c.id,
            user_a: c.user_a,
            user_b: c.user_b,
            listing_id: c.listing_id,
            created_at: c.created_at,
            last_activity_at: c.last_activity_at,
        }
    }
}

/// A conversation about to be stored. Participants are kept in canonical
/// order so the pair `{a, b}` maps to exactly one row.
#[derive(Insertable, Clone, Debug)]
#[diesel(table_name = crate::schema::conversations)]
pub struct NewConversation {
    id: Id,
    user_a: user::Id,
    user_b: user::Id,
    listing_id: Option<ListingId>,
    created_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
}

impl NewConversation {
    pub fn new(a: &user::Id, b: &user::Id, listing_id: Option<&ListingId>) -> Self {
        let participants = Participants::new(*a, *b);
        let now = Utc::now();
        Self {
            id: Id::random(),
            user_a: participants.a,
            user_b: participants.b,
            listing_id: listing_id.copied(),
            created_at: now,
            last_activity_at: now,
        }
    }

    pub const fn participants(&self) -> (&user::Id, &user::Id) {
        (&self.user_a, &self.user_b)
    }

    pub const fn listing_id(&self) -> Option<&ListingId> {
        self.listing_id.as_ref()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Participants {
    a: user::Id,
    b: user::Id,
}

impl Participants {
    pub fn new(x: user::Id, y: user::Id) -> Self {
        if x <= y {
            Self { a: x, b: y }
        } else {
            Self { a: y, b: x }
        }
    }

    pub fn contains(&self, u: &user::Id) -> bool {
        self.a.eq(u) || self.b.eq(u)
    }

    /// The counterpart of `u`, or `None` when `u` does not take part.
    pub fn other(&self, u: &user::Id) -> Option<user::Id> {
        if self.a.eq(u) {
            Some(self.b)
        } else if self.b.eq(u) {
            Some(self.a)
        } else {
            None
        }
    }

    pub const fn as_array(&self) -> [user::Id; 2] {
        [self.a, self.b]
    }
}

impl TryFrom<HashSet<user::Id>> for Participants {
    type Error = usize;

    fn try_from(set: HashSet<user::Id>) -> std::result::Result<Self, Self::Error> {
        let mut it = set.iter();
        match (it.next(), it.next(), it.next()) {
            (Some(x), Some(y), None) => Ok(Self::new(*x, *y)),
            _ => Err(set.len()),
        }
    }
}

#[derive(Serialize, Clone, Debug)]
pub struct ConversationDto {
    id: Id,
    counterpart: UserInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    listing_id: Option<ListingId>,
    last_activity_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_message: Option<MessageDto>,
    unread: i64,
}

impl ConversationDto {
    pub fn new(
        c: &Conversation,
        counterpart: UserInfo,
        last_message: Option<MessageDto>,
        unread: i64,
    ) -> Self {
        Self {
            id: c.id,
            counterpart,
            listing_id: c.listing_id,
            last_activity_at: c.last_activity_at,
            last_message,
            unread,
        }
    }

    pub const fn id(&self) -> &Id {
        &self.id
    }

    pub const fn counterpart(&self) -> &UserInfo {
        &self.counterpart
    }

    pub const fn last_message(&self) -> Option<&MessageDto> {
        self.last_message.as_ref()
    }

    pub const fn unread(&self) -> i64 {
        self.unread
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_order_participants_canonically() {
        let x = user::Id::random();
        let y = user::Id::random();

        assert_eq!(Participants::new(x, y), Participants::new(y, x));

        let c = NewConversation::new(&x, &y, None);
        let (a, b) = c.participants();
        assert!(a < b);
    }

    #[test]
    fn should_resolve_counterpart() {
        let x = user::Id::random();
        let y = user::Id::random();
        let p = Participants::new(x, y);

        assert_eq!(p.other(&x), Some(y));
        assert_eq!(p.other(&y), Some(x));
        assert_eq!(p.other(&user::Id::random()), None);
        assert!(p.contains(&x));
    }

    #[test]
    fn should_rebuild_participants_from_cached_set() {
        let x = user::Id::random();
        let y = user::Id::random();

        let p = Participants::try_from(HashSet::from([x, y])).unwrap();
        assert_eq!(p, Participants::new(x, y));

        assert_eq!(Participants::try_from(HashSet::from([x])), Err(1));
    }
}
