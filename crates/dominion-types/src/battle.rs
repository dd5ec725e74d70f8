//! The scheduled territory battle record.
//!
//! A [`TerritoryBattle`] is created when a guild challenges a territory and
//! settled once its preparation window has elapsed. The record is a plain
//! state machine: `Active` until resolved, then `Resolved` forever.

use std::collections::BTreeSet;

use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enums::BattleSide;
use crate::ids::{BattleId, GuildId, TerritoryId};

/// Lifecycle state of a territory battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleState {
    /// Waiting for the preparation window to elapse.
    Active,
    /// Settled. Terminal.
    Resolved {
        /// The side that won.
        winner: BattleSide,
        /// When the battle was settled.
        resolved_at: DateTime<Utc>,
        /// Aggregate attacking strength at resolution time.
        attack_strength: Decimal,
        /// Aggregate defending strength (after defender advantage).
        defense_strength: Decimal,
    },
}

/// Why a guild could not be added to a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinRejection {
    /// The battle has already been resolved.
    BattleResolved,
    /// The guild is the attacker or the defender.
    PrincipalParty,
    /// The guild already fights for the other side.
    OppositeSide,
}

/// A scheduled conquest battle over one territory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerritoryBattle {
    id: BattleId,
    territory_id: TerritoryId,
    attacker: GuildId,
    defender: Option<GuildId>,
    created_at: DateTime<Utc>,
    resolve_at: DateTime<Utc>,
    attacker_allies: BTreeSet<GuildId>,
    defender_allies: BTreeSet<GuildId>,
    state: BattleState,
}

impl TerritoryBattle {
    /// Schedule a new battle resolving `preparation` after `now`.
    ///
    /// `defender` is the territory's owner at challenge time, or `None` for
    /// an unclaimed territory. A preparation window that would overflow the
    /// calendar resolves at `DateTime::<Utc>::MAX_UTC`.
    pub fn new(
        territory_id: TerritoryId,
        attacker: GuildId,
        defender: Option<GuildId>,
        now: DateTime<Utc>,
        preparation: TimeDelta,
    ) -> Self {
        let resolve_at = now
            .checked_add_signed(preparation)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            id: BattleId::new(),
            territory_id,
            attacker,
            defender,
            created_at: now,
            resolve_at,
            attacker_allies: BTreeSet::new(),
            defender_allies: BTreeSet::new(),
            state: BattleState::Active,
        }
    }

    /// Battle identifier.
    pub const fn id(&self) -> BattleId {
        self.id
    }

    /// The contested territory.
    pub const fn territory_id(&self) -> &TerritoryId {
        &self.territory_id
    }

    /// The challenging guild.
    pub const fn attacker(&self) -> &GuildId {
        &self.attacker
    }

    /// The owner at challenge time, if the territory was claimed.
    pub const fn defender(&self) -> Option<&GuildId> {
        self.defender.as_ref()
    }

    /// When the battle was scheduled.
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the battle becomes due.
    pub const fn resolve_at(&self) -> DateTime<Utc> {
        self.resolve_at
    }

    /// Current state.
    pub const fn state(&self) -> &BattleState {
        &self.state
    }

    /// Whether the battle is still pending.
    pub const fn is_active(&self) -> bool {
        matches!(self.state, BattleState::Active)
    }

    /// Whether the battle is active and its preparation window has elapsed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && now >= self.resolve_at
    }

    /// Whether `guild` is the attacker or the defender.
    pub fn is_principal(&self, guild: &GuildId) -> bool {
        &self.attacker == guild || self.defender.as_ref() == Some(guild)
    }

    /// Allies on one side.
    pub const fn allies(&self, side: BattleSide) -> &BTreeSet<GuildId> {
        match side {
            BattleSide::Attacker => &self.attacker_allies,
            BattleSide::Defender => &self.defender_allies,
        }
    }

    /// The side `guild` fights on as an ally, if any.
    pub fn ally_side(&self, guild: &GuildId) -> Option<BattleSide> {
        if self.attacker_allies.contains(guild) {
            Some(BattleSide::Attacker)
        } else if self.defender_allies.contains(guild) {
            Some(BattleSide::Defender)
        } else {
            None
        }
    }

    /// Add an ally to one side.
    ///
    /// Returns `Ok(true)` if the guild was added, `Ok(false)` if it was
    /// already on that side (joining is idempotent).
    pub fn join(&mut self, guild: GuildId, side: BattleSide) -> Result<bool, JoinRejection> {
        if !self.is_active() {
            return Err(JoinRejection::BattleResolved);
        }
        if self.is_principal(&guild) {
            return Err(JoinRejection::PrincipalParty);
        }
        if self.allies(side.opposite()).contains(&guild) {
            return Err(JoinRejection::OppositeSide);
        }
        let set = match side {
            BattleSide::Attacker => &mut self.attacker_allies,
            BattleSide::Defender => &mut self.defender_allies,
        };
        Ok(set.insert(guild))
    }

    /// Settle the battle. Has no effect if it is already resolved.
    ///
    /// Returns `true` if this call performed the transition.
    pub fn resolve(
        &mut self,
        winner: BattleSide,
        resolved_at: DateTime<Utc>,
        attack_strength: Decimal,
        defense_strength: Decimal,
    ) -> bool {
        if !self.is_active() {
            return false;
        }
        self.state = BattleState::Resolved {
            winner,
            resolved_at,
            attack_strength,
            defense_strength,
        };
        true
    }

    /// The winning side, once resolved.
    pub const fn winner(&self) -> Option<BattleSide> {
        match self.state {
            BattleState::Active => None,
            BattleState::Resolved { winner, .. } => Some(winner),
        }
    }

    /// The winning guild, once resolved. `None` when an unclaimed territory
    /// held out against its challenger.
    pub fn winner_guild(&self) -> Option<&GuildId> {
        match self.winner()? {
            BattleSide::Attacker => Some(&self.attacker),
            BattleSide::Defender => self.defender.as_ref(),
        }
    }
}
