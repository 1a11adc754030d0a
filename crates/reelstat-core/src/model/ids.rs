use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_id!(TitleId, "Surrogate identifier of a stored title.");
define_id!(UserId, "Identifier of a user owning a set of ratings.");

impl TitleId {
    /// The id a title with this external id always gets, so a rebuilt
    /// collection keeps the ids of the previous one.
    #[must_use]
    pub fn for_imdb_id(imdb_id: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, imdb_id.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_id_generation() {
        let id1 = TitleId::new();
        let id2 = TitleId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_title_id_for_imdb_id_is_stable() {
        assert_eq!(
            TitleId::for_imdb_id("tt0111161"),
            TitleId::for_imdb_id("tt0111161")
        );
        assert_ne!(
            TitleId::for_imdb_id("tt0111161"),
            TitleId::for_imdb_id("tt0068646")
        );
    }

    #[test]
    fn test_user_id_parse_round_trip() {
        let id = UserId::new();
        let parsed: UserId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_user_id_rejects_garbage() {
        assert!("not-a-uuid".parse::<UserId>().is_err());
    }

    #[test]
    fn test_id_serializes_as_plain_string() {
        let uuid = Uuid::new_v4();
        let json = serde_json::to_string(&TitleId::from_uuid(uuid)).unwrap();
        assert_eq!(json, format!("\"{uuid}\""));
    }
}
