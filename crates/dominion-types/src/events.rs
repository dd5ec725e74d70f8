//! Notifications published by the conquest and diplomacy engines.
//!
//! Events are fire-and-forget: collaborators subscribe through an event sink
//! and nothing the engine does depends on how (or whether) they are handled.
//! Listener ordering is not guaranteed.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enums::{BattleSide, RelationshipLevel, TerritoryBonus};
use crate::ids::{BattleId, GuildId, TerritoryId};

/// A notification emitted by the simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConquestEvent {
    /// A territory changed hands.
    TerritoryCaptured {
        /// The territory.
        territory_id: TerritoryId,
        /// The new owner.
        new_owner: GuildId,
        /// The previous owner, if the territory was claimed.
        previous_owner: Option<GuildId>,
    },
    /// A territory battle was scheduled.
    TerritoryBattleStarted {
        /// The battle.
        battle_id: BattleId,
        /// The contested territory.
        territory_id: TerritoryId,
        /// The challenger.
        attacker: GuildId,
        /// The owner at challenge time.
        defender: Option<GuildId>,
        /// When the battle becomes due.
        resolve_at: DateTime<Utc>,
    },
    /// A territory battle was settled.
    TerritoryBattleEnded {
        /// The battle.
        battle_id: BattleId,
        /// The contested territory.
        territory_id: TerritoryId,
        /// The winning side.
        winner: BattleSide,
        /// The winning guild, if any.
        winner_guild: Option<GuildId>,
        /// Aggregate attacking strength.
        attack_strength: Decimal,
        /// Aggregate defending strength after defender advantage.
        defense_strength: Decimal,
    },
    /// The player's standing with a guild crossed a level boundary.
    RelationshipChanged {
        /// The other guild.
        guild: GuildId,
        /// The new level.
        level: RelationshipLevel,
    },
    /// A treaty was established with a guild.
    TreatyEstablished {
        /// The other guild.
        guild: GuildId,
        /// Treaty name (the action that established it).
        treaty: String,
    },
    /// War was declared on a guild.
    WarDeclared {
        /// The target guild.
        guild: GuildId,
    },
    /// Two guilds formed a military alliance.
    AllianceFormed {
        /// The initiating guild.
        guild_a: GuildId,
        /// The accepting guild.
        guild_b: GuildId,
    },
    /// A guild's aggregate territory bonuses were recomputed.
    GuildBonusesChanged {
        /// The guild.
        guild: GuildId,
        /// Per-kind totals across all owned territories.
        bonuses: BTreeMap<TerritoryBonus, Decimal>,
    },
}

impl ConquestEvent {
    /// Short stable label for logging.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::TerritoryCaptured { .. } => "territory_captured",
            Self::TerritoryBattleStarted { .. } => "territory_battle_started",
            Self::TerritoryBattleEnded { .. } => "territory_battle_ended",
            Self::RelationshipChanged { .. } => "relationship_changed",
            Self::TreatyEstablished { .. } => "treaty_established",
            Self::WarDeclared { .. } => "war_declared",
            Self::AllianceFormed { .. } => "alliance_formed",
            Self::GuildBonusesChanged { .. } => "guild_bonuses_changed",
        }
    }
}
