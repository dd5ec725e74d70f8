//! Type-safe identifier wrappers.
//!
//! Guilds and territories are addressed by stable string keys
//! (`player_guild`, `territory_central_capital`) so that saves and
//! configuration files stay human-readable. Battles are transient and use
//! UUID v7 (time-ordered) identifiers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

/// Generates a newtype wrapper around a stable string key.
macro_rules! define_key {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a key.
            pub fn new(key: impl Into<String>) -> Self {
                Self(key.into())
            }

            /// Borrow the key as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(key: &str) -> Self {
                Self(key.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(key: String) -> Self {
                Self(key)
            }
        }
    };
}

define_key! {
    /// Unique identifier for a guild (the player guild or an NPC guild).
    GuildId
}

define_key! {
    /// Unique identifier for a capturable territory.
    TerritoryId
}

define_id! {
    /// Unique identifier for a scheduled territory battle.
    BattleId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_display_their_slug() {
        let guild = GuildId::from("guild_iron_wolves");
        assert_eq!(guild.to_string(), "guild_iron_wolves");
        assert_eq!(guild.as_str(), "guild_iron_wolves");
    }

    #[test]
    fn key_serializes_as_plain_string() {
        let territory = TerritoryId::new("territory_bridge");
        let json = serde_json::to_string(&territory).ok();
        assert_eq!(json.as_deref(), Some("\"territory_bridge\""));
    }

    #[test]
    fn battle_ids_are_unique() {
        let a = BattleId::new();
        let b = BattleId::new();
        assert_ne!(a, b);
        assert_ne!(a.into_inner(), Uuid::nil());
    }
}
