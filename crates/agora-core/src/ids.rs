//! Opaque integer identifiers.
//!
//! Every id is a distinct newtype over the store's `INTEGER PRIMARY KEY`, so
//! a post id can never be passed where a reply id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(
      Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
      Deserialize,
    )]
    #[serde(transparent)]
    pub struct $name(pub i64);

    impl $name {
      pub fn get(self) -> i64 { self.0 }
    }

    impl From<i64> for $name {
      fn from(raw: i64) -> Self { Self(raw) }
    }

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
      }
    }
  };
}

id_type!(
  /// A registered user; owned by the identity layer.
  UserId
);
id_type!(
  /// A channel that posts live in; only ever carried, never resolved.
  ChannelId
);
id_type!(
  /// A top-level post; owned by the posting layer.
  PostId
);
id_type!(ReplyId);
id_type!(VoteId);
