//! Shared type definitions for the Dominion territory conquest simulation.
//!
//! This crate is the single source of truth for data that crosses crate
//! boundaries: identifiers, enumerations, small value objects, the battle
//! record and the notification enum.
//!
//! # Modules
//!
//! - [`ids`] -- Stable string keys for guilds and territories, UUIDs for battles
//! - [`enums`] -- Territory, diplomacy, guild and resource enumerations
//! - [`structs`] -- Grid positions, personalities, unit references, resource bundles
//! - [`battle`] -- The [`TerritoryBattle`] state machine record
//! - [`events`] -- [`ConquestEvent`] notifications

pub mod battle;
pub mod enums;
pub mod events;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use battle::{BattleState, JoinRejection, TerritoryBattle};
pub use enums::{
    BattleSide, BuildingKind, DiplomaticAction, RelationshipLevel, ResourceKind, Specialization,
    TerritoryBonus, TerritoryType, UnitClass,
};
pub use events::ConquestEvent;
pub use ids::{BattleId, GuildId, TerritoryId};
pub use structs::{GridPos, Personality, ResourceBundle, UnitRef};
