//! NPC guilds and diplomacy for the Dominion simulation.
//!
//! This crate holds everything about guilds as political actors: the NPC
//! roster with personality-driven metrics, bilateral relationships, the
//! eight diplomatic actions, and the narrow interfaces through which the
//! simulation reaches systems it does not own (treasury, guild progression,
//! unit combat, notifications).
//!
//! # Modules
//!
//! - [`guild`] -- The [`NpcGuild`] actor and its derived Power, Wealth and
//!   Influence.
//! - [`registry`] -- The [`NpcGuildRegistry`] catalog and the standard roster.
//! - [`relationship`] -- Scored, leveled [`GuildRelationship`]s and the
//!   [`RelationshipBook`] that stores them.
//! - [`diplomacy`] -- The [`DiplomacyEngine`]: action execution, cooldowns and
//!   decay.
//! - [`raid`] -- Generated opposing forces for raids.
//! - [`strength`] -- Guild strength evaluation.
//! - [`collaborators`] -- Ledger, guild facts and battle resolver traits.
//! - [`events`] -- The [`EventSink`] notification interface.
//! - [`config`] -- [`DiplomacyRules`] tunables.
//! - [`error`] -- Rejection reasons for diplomatic actions.

pub mod collaborators;
pub mod config;
pub mod diplomacy;
pub mod error;
pub mod events;
pub mod guild;
pub mod raid;
pub mod registry;
pub mod relationship;
pub mod strength;

// Re-export primary types at crate root.
pub use collaborators::{
    BattleOutcome, BattleResolver, GuildFacts, GuildProfile, LedgerError, LevelSumResolver,
    ResourceLedger, StaticGuildFacts, Treasury,
};
pub use config::DiplomacyRules;
pub use diplomacy::{ActionContext, ActionOutcome, DiplomacyEngine, score_delta, success_chance};
pub use error::DiplomacyError;
pub use events::{EventLog, EventSink, NullSink};
pub use guild::NpcGuild;
pub use raid::{DifficultyTier, RaidForce, generate_raid_force};
pub use registry::{NpcGuildRegistry, standard_roster};
pub use relationship::{GuildRelationship, RelationshipBook};
pub use strength::StrengthModel;
