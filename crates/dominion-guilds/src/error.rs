//! Error types for the `dominion-guilds` crate.
//!
//! A [`DiplomacyError`] always means the action was rejected before any
//! side effect: no resources spent, no score change, no cooldown started.

use chrono::{DateTime, Utc};
use dominion_types::{BuildingKind, DiplomaticAction, GuildId, RelationshipLevel};
use rust_decimal::Decimal;

use crate::collaborators::LedgerError;

/// Reasons a diplomatic action was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiplomacyError {
    /// The target is not a known NPC guild.
    #[error("unknown guild: {0}")]
    UnknownGuild(GuildId),

    /// The last interaction with the target is too recent.
    #[error("interaction with {guild} on cooldown until {ready_at}")]
    Cooldown {
        /// The target guild.
        guild: GuildId,
        /// When the next action becomes possible.
        ready_at: DateTime<Utc>,
    },

    /// The current standing is below what the action requires.
    #[error("{action:?} requires {required:?} standing with {guild}, current is {actual:?}")]
    RelationshipTooLow {
        /// The attempted action.
        action: DiplomaticAction,
        /// The target guild.
        guild: GuildId,
        /// Minimum level.
        required: RelationshipLevel,
        /// Current level.
        actual: RelationshipLevel,
    },

    /// The initiating guild lacks a required building.
    #[error("{action:?} requires {building:?} level {required}, have {actual}")]
    MissingBuilding {
        /// The attempted action.
        action: DiplomaticAction,
        /// The building.
        building: BuildingKind,
        /// Minimum level.
        required: u32,
        /// Current level.
        actual: u32,
    },

    /// The initiator is too weak for the target to consider an alliance.
    #[error("strength {strength} is below the required {required}")]
    InsufficientStrength {
        /// Initiator strength.
        strength: Decimal,
        /// Half the target's Power.
        required: Decimal,
    },

    /// The treasury cannot pay the action's cost.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
