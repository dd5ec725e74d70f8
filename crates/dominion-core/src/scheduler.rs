//! Territory battle scheduling, resolution and territory economy.
//!
//! The [`ConquestScheduler`] owns the [`TerritoryGraph`] and every
//! [`TerritoryBattle`]. A battle moves through
//! `Uncontested -> Challenged -> Resolved`:
//!
//! 1. [`ConquestScheduler::start_battle`] validates the challenge (territory
//!    exists, not already contested, attacker owns an adjacent territory and
//!    not the target itself), schedules resolution one preparation window
//!    later, and pulls allied NPC guilds onto either side.
//! 2. [`ConquestScheduler::join_battle`] lets further guilds join explicitly.
//! 3. [`ConquestScheduler::resolve_due`] settles every battle whose window
//!    has elapsed by comparing aggregate strengths evaluated at resolution
//!    time, transfers ownership on an attacker victory, and archives the
//!    battle.
//!
//! # Invariants
//!
//! - At most one active battle per territory.
//! - A resolved battle is never resolved again; it leaves the active set in
//!   the same step that settles it.
//! - No third-party guild is ever on both sides of one battle.
//! - Ownership in the graph and the owner index always agree.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use dominion_guilds::{
    EventSink, GuildFacts, LedgerError, NpcGuildRegistry, RelationshipBook, ResourceLedger,
    StrengthModel,
};
use dominion_types::{
    BattleId, BattleSide, ConquestEvent, GridPos, GuildId, JoinRejection, RelationshipLevel,
    ResourceBundle, TerritoryBattle, TerritoryBonus, TerritoryId, TerritoryType, UnitRef,
};
use dominion_world::{Territory, TerritoryGraph, WorldError};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Reasons a conquest operation was rejected. A rejection never has side
/// effects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConquestError {
    /// The territory does not exist.
    #[error("territory not found: {0}")]
    TerritoryNotFound(TerritoryId),

    /// No active battle has this id.
    #[error("no active battle with id {0}")]
    BattleNotFound(BattleId),

    /// The territory already has an active battle.
    #[error("territory {territory} is already contested by battle {battle}")]
    AlreadyContested {
        /// The territory.
        territory: TerritoryId,
        /// The active battle.
        battle: BattleId,
    },

    /// The attacker owns no territory adjacent to the target.
    #[error("{guild} owns no territory adjacent to {territory}")]
    NotAdjacent {
        /// The target territory.
        territory: TerritoryId,
        /// The attacker.
        guild: GuildId,
    },

    /// The attacker already owns the target.
    #[error("{guild} already owns {territory}")]
    AlreadyOwned {
        /// The target territory.
        territory: TerritoryId,
        /// The attacker.
        guild: GuildId,
    },

    /// The operation requires the player to own the territory.
    #[error("{guild} does not own {territory}")]
    NotOwner {
        /// The territory.
        territory: TerritoryId,
        /// The guild that tried to act on it.
        guild: GuildId,
    },

    /// The guild cannot join the battle.
    #[error("{guild} cannot join battle {battle}: {reason:?}")]
    JoinRejected {
        /// The battle.
        battle: BattleId,
        /// The guild.
        guild: GuildId,
        /// Why the join was rejected.
        reason: JoinRejection,
    },

    /// The treasury cannot pay the cost.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The graph rejected an update.
    #[error(transparent)]
    World(#[from] WorldError),
}

// ---------------------------------------------------------------------------
// Rules, context and reports
// ---------------------------------------------------------------------------

/// Battle and development constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConquestRules {
    /// Time between a challenge and its resolution (default: 24h).
    pub preparation: TimeDelta,

    /// Share of an ally's strength added to its side (default: 0.5).
    pub ally_contribution: Decimal,

    /// Multiplier on the defending total (default: 1.2).
    pub defender_advantage: Decimal,

    /// Production and bonus multiplier per development level (default: 1.2).
    pub development_growth: Decimal,
}

impl Default for ConquestRules {
    fn default() -> Self {
        Self {
            preparation: TimeDelta::hours(24),
            ally_contribution: Decimal::new(5, 1),
            defender_advantage: Decimal::new(12, 1),
            development_growth: Decimal::new(12, 1),
        }
    }
}

/// State outside the scheduler that conquest operations read or update.
pub struct ConquestContext<'a> {
    /// Current game time.
    pub now: DateTime<Utc>,
    /// NPC guilds (metrics are recomputed after ownership changes).
    pub registry: &'a mut NpcGuildRegistry,
    /// Standing between guilds, for alliance aggregation.
    pub relations: &'a RelationshipBook,
    /// Guild levels, for strength evaluation.
    pub facts: &'a dyn GuildFacts,
    /// The player's treasury.
    pub ledger: &'a mut dyn ResourceLedger,
    /// Notification sink.
    pub sink: &'a mut dyn EventSink,
}

/// Aggregate strengths of both sides of a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleStrengths {
    /// Attacker plus weighted allies.
    pub attack: Decimal,
    /// Garrison, defender and weighted allies, times the defender advantage.
    pub defense: Decimal,
}

impl BattleStrengths {
    /// The winning side. Ties go to the defender.
    pub fn winner(&self) -> BattleSide {
        if self.attack > self.defense {
            BattleSide::Attacker
        } else {
            BattleSide::Defender
        }
    }
}

/// Outcome of one resolved battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleReport {
    /// The battle.
    pub battle_id: BattleId,
    /// The contested territory.
    pub territory_id: TerritoryId,
    /// The challenger.
    pub attacker: GuildId,
    /// The owner at challenge time.
    pub defender: Option<GuildId>,
    /// The winning side.
    pub winner: BattleSide,
    /// Final strengths.
    pub strengths: BattleStrengths,
    /// Whether ownership changed hands.
    pub captured: bool,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Owns the territory graph and all territory battles.
#[derive(Debug, Clone)]
pub struct ConquestScheduler {
    player: GuildId,
    rules: ConquestRules,
    strength: StrengthModel,
    graph: TerritoryGraph,
    active: BTreeMap<BattleId, TerritoryBattle>,
    contested: BTreeMap<TerritoryId, BattleId>,
    history: Vec<TerritoryBattle>,
}

impl ConquestScheduler {
    /// Create a scheduler over `graph` with no battles.
    pub fn new(graph: TerritoryGraph, rules: ConquestRules, strength: StrengthModel) -> Self {
        Self {
            player: strength.player().clone(),
            rules,
            strength,
            graph,
            active: BTreeMap::new(),
            contested: BTreeMap::new(),
            history: Vec::new(),
        }
    }

    /// The player guild.
    pub const fn player(&self) -> &GuildId {
        &self.player
    }

    /// Active rules.
    pub const fn rules(&self) -> &ConquestRules {
        &self.rules
    }

    /// Strength model used for resolution.
    pub const fn strength(&self) -> &StrengthModel {
        &self.strength
    }

    /// The territory graph.
    pub const fn graph(&self) -> &TerritoryGraph {
        &self.graph
    }

    /// Look up a territory.
    pub fn territory(&self, id: &TerritoryId) -> Option<&Territory> {
        self.graph.get(id)
    }

    /// The territory occupying a grid cell.
    pub fn territory_at(&self, position: GridPos) -> Option<&Territory> {
        self.graph.territory_at(position)
    }

    /// Territories the player owns.
    pub fn player_territories(&self) -> Vec<&Territory> {
        self.guild_territories(&self.player)
    }

    /// Territories `guild` owns, in id order.
    pub fn guild_territories(&self, guild: &GuildId) -> Vec<&Territory> {
        self.graph
            .owned_by(guild)
            .iter()
            .filter_map(|id| self.graph.get(id))
            .collect()
    }

    /// Active battles in id order.
    pub fn active_battles(&self) -> impl Iterator<Item = &TerritoryBattle> {
        self.active.values()
    }

    /// Look up an active battle.
    pub fn battle(&self, id: BattleId) -> Option<&TerritoryBattle> {
        self.active.get(&id)
    }

    /// The active battle over a territory, if any.
    pub fn battle_for(&self, territory: &TerritoryId) -> Option<&TerritoryBattle> {
        self.contested
            .get(territory)
            .and_then(|id| self.active.get(id))
    }

    /// Resolved battles in resolution order.
    pub fn history(&self) -> &[TerritoryBattle] {
        &self.history
    }

    /// Per-kind bonus totals across the territories `guild` owns.
    pub fn guild_bonuses(&self, guild: &GuildId) -> BTreeMap<TerritoryBonus, Decimal> {
        self.graph.bonus_totals(guild)
    }

    /// Total of one bonus kind across the territories `guild` owns.
    pub fn bonus_total(&self, guild: &GuildId, kind: TerritoryBonus) -> Decimal {
        self.guild_bonuses(guild)
            .get(&kind)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    // -------------------------------------------------------------------
    // Battle lifecycle
    // -------------------------------------------------------------------

    /// Challenge `territory` on behalf of `attacker`.
    ///
    /// The defender is the territory's owner at challenge time (`None` for
    /// an unclaimed territory). Eligible NPC guilds join immediately.
    ///
    /// # Errors
    ///
    /// Returns a [`ConquestError`] if the territory is unknown, already
    /// contested, owned by the attacker, or not adjacent to any territory
    /// the attacker owns.
    pub fn start_battle(
        &mut self,
        territory: &TerritoryId,
        attacker: &GuildId,
        ctx: &mut ConquestContext<'_>,
    ) -> Result<BattleId, ConquestError> {
        let target = self
            .graph
            .get(territory)
            .ok_or_else(|| ConquestError::TerritoryNotFound(territory.clone()))?;
        if let Some(&battle) = self.contested.get(territory) {
            return Err(ConquestError::AlreadyContested {
                territory: territory.clone(),
                battle,
            });
        }
        if target.is_owned_by(attacker) {
            return Err(ConquestError::AlreadyOwned {
                territory: territory.clone(),
                guild: attacker.clone(),
            });
        }
        if !self.graph.can_reach(attacker, territory) {
            return Err(ConquestError::NotAdjacent {
                territory: territory.clone(),
                guild: attacker.clone(),
            });
        }

        let mut battle = TerritoryBattle::new(
            territory.clone(),
            attacker.clone(),
            target.owner().cloned(),
            ctx.now,
            self.rules.preparation,
        );
        aggregate_allies(&mut battle, ctx.registry, ctx.relations);

        let id = battle.id();
        info!(
            battle = %id,
            territory = %territory,
            attacker = %attacker,
            defender = ?battle.defender(),
            attacker_allies = battle.allies(BattleSide::Attacker).len(),
            defender_allies = battle.allies(BattleSide::Defender).len(),
            resolve_at = %battle.resolve_at(),
            "Territory battle started"
        );
        ctx.sink.publish(ConquestEvent::TerritoryBattleStarted {
            battle_id: id,
            territory_id: territory.clone(),
            attacker: attacker.clone(),
            defender: battle.defender().cloned(),
            resolve_at: battle.resolve_at(),
        });

        self.contested.insert(territory.clone(), id);
        self.active.insert(id, battle);
        Ok(id)
    }

    /// Add `guild` to one side of an active battle.
    ///
    /// Returns `true` if the guild was added and `false` if it was already
    /// on that side.
    ///
    /// # Errors
    ///
    /// Returns [`ConquestError::BattleNotFound`] if no active battle has
    /// this id, or [`ConquestError::JoinRejected`] if the guild is a
    /// principal or already fights for the other side.
    pub fn join_battle(
        &mut self,
        battle_id: BattleId,
        guild: &GuildId,
        side: BattleSide,
    ) -> Result<bool, ConquestError> {
        let battle = self
            .active
            .get_mut(&battle_id)
            .ok_or(ConquestError::BattleNotFound(battle_id))?;
        let added = battle
            .join(guild.clone(), side)
            .map_err(|reason| ConquestError::JoinRejected {
                battle: battle_id,
                guild: guild.clone(),
                reason,
            })?;
        if added {
            debug!(battle = %battle_id, guild = %guild, side = ?side, "Guild joined battle");
        }
        Ok(added)
    }

    /// Aggregate strengths of an active battle if it were resolved now.
    pub fn evaluate(
        &self,
        battle_id: BattleId,
        registry: &NpcGuildRegistry,
        facts: &dyn GuildFacts,
    ) -> Option<BattleStrengths> {
        let battle = self.active.get(&battle_id)?;
        let garrison = self
            .graph
            .get(battle.territory_id())
            .map_or(Decimal::ZERO, Territory::defense_strength);
        Some(self.strengths(battle, garrison, registry, facts))
    }

    /// Settle every active battle whose preparation window has elapsed.
    ///
    /// Battles resolve in order of their resolution time. Strengths are
    /// evaluated against the guild state at the moment of resolution.
    pub fn resolve_due(&mut self, ctx: &mut ConquestContext<'_>) -> Vec<BattleReport> {
        let mut due: Vec<(DateTime<Utc>, BattleId)> = self
            .active
            .values()
            .filter(|b| b.is_due(ctx.now))
            .map(|b| (b.resolve_at(), b.id()))
            .collect();
        due.sort();

        let mut reports = Vec::with_capacity(due.len());
        for (_, id) in due {
            if let Some(report) = self.resolve_battle(id, ctx) {
                reports.push(report);
            }
        }
        reports
    }

    fn resolve_battle(
        &mut self,
        id: BattleId,
        ctx: &mut ConquestContext<'_>,
    ) -> Option<BattleReport> {
        let mut battle = self.active.remove(&id)?;
        self.contested.remove(battle.territory_id());

        let garrison = self
            .graph
            .get(battle.territory_id())
            .map_or(Decimal::ZERO, Territory::defense_strength);
        let strengths = self.strengths(&battle, garrison, ctx.registry, ctx.facts);
        let winner = strengths.winner();
        battle.resolve(winner, ctx.now, strengths.attack, strengths.defense);

        let territory = battle.territory_id().clone();
        let attacker = battle.attacker().clone();
        let mut captured = false;
        if winner == BattleSide::Attacker {
            match self.assign_territory(&territory, &attacker, ctx) {
                Ok(_) => captured = true,
                Err(e) => warn!(territory = %territory, error = %e, "Capture failed"),
            }
        }

        info!(
            battle = %id,
            territory = %territory,
            attacker = %attacker,
            winner = ?winner,
            attack = %strengths.attack,
            defense = %strengths.defense,
            captured,
            "Territory battle resolved"
        );
        ctx.sink.publish(ConquestEvent::TerritoryBattleEnded {
            battle_id: id,
            territory_id: territory.clone(),
            winner,
            winner_guild: battle.winner_guild().cloned(),
            attack_strength: strengths.attack,
            defense_strength: strengths.defense,
        });

        let report = BattleReport {
            battle_id: id,
            territory_id: territory,
            attacker,
            defender: battle.defender().cloned(),
            winner,
            strengths,
            captured,
        };
        self.history.push(battle);
        Some(report)
    }

    fn strengths(
        &self,
        battle: &TerritoryBattle,
        garrison: Decimal,
        registry: &NpcGuildRegistry,
        facts: &dyn GuildFacts,
    ) -> BattleStrengths {
        let strength_of = |guild: &GuildId| self.strength.strength_of(guild, registry, facts);
        let allied = |side: BattleSide| {
            battle.allies(side).iter().fold(Decimal::ZERO, |acc, ally| {
                acc.saturating_add(strength_of(ally).saturating_mul(self.rules.ally_contribution))
            })
        };

        let attack = strength_of(battle.attacker()).saturating_add(allied(BattleSide::Attacker));
        let defender = battle.defender().map_or(Decimal::ZERO, &strength_of);
        let defense = garrison
            .saturating_add(defender)
            .saturating_add(allied(BattleSide::Defender))
            .saturating_mul(self.rules.defender_advantage);
        BattleStrengths { attack, defense }
    }

    // -------------------------------------------------------------------
    // Ownership and bonuses
    // -------------------------------------------------------------------

    /// Give `territory` to `guild`.
    ///
    /// Stamps the capture time and recomputes the territory's defense
    /// strength. A change of owner disbands the garrison, since its units
    /// belonged to the previous holder. Then refreshes the derived metrics
    /// and bonus totals of both the new and the previous owner and publishes
    /// the capture. Returns the previous owner.
    ///
    /// # Errors
    ///
    /// Returns [`ConquestError::TerritoryNotFound`] if the territory is
    /// unknown.
    pub fn assign_territory(
        &mut self,
        territory: &TerritoryId,
        guild: &GuildId,
        ctx: &mut ConquestContext<'_>,
    ) -> Result<Option<GuildId>, ConquestError> {
        let previous = self.graph.assign(territory, guild, ctx.now)?;
        if let Some(t) = self.graph.get_mut(territory) {
            if previous.as_ref() == Some(guild) || t.defenders().is_empty() {
                t.recompute_defense_strength();
            } else {
                debug!(
                    territory = %territory,
                    disbanded = t.defenders().len(),
                    "Garrison disbanded on capture"
                );
                t.assign_defenders(Vec::new());
            }
        }

        info!(
            territory = %territory,
            new_owner = %guild,
            previous_owner = ?previous,
            "Territory captured"
        );
        ctx.sink.publish(ConquestEvent::TerritoryCaptured {
            territory_id: territory.clone(),
            new_owner: guild.clone(),
            previous_owner: previous.clone(),
        });

        self.refresh_guild(guild, ctx);
        if let Some(old) = previous.as_ref().filter(|old| *old != guild) {
            self.refresh_guild(old, ctx);
        }
        Ok(previous)
    }

    /// Recompute a guild's bonus totals and publish them.
    pub fn recompute_guild_bonuses(
        &self,
        guild: &GuildId,
        sink: &mut dyn EventSink,
    ) -> BTreeMap<TerritoryBonus, Decimal> {
        let bonuses = self.graph.bonus_totals(guild);
        debug!(guild = %guild, kinds = bonuses.len(), "Guild bonuses recomputed");
        sink.publish(ConquestEvent::GuildBonusesChanged {
            guild: guild.clone(),
            bonuses: bonuses.clone(),
        });
        bonuses
    }

    fn refresh_guild(&self, guild: &GuildId, ctx: &mut ConquestContext<'_>) {
        let count = self.graph.territory_count(guild);
        if ctx.registry.recompute_metrics(guild, count) {
            debug!(guild = %guild, territories = count, "NPC metrics recomputed");
        }
        self.recompute_guild_bonuses(guild, ctx.sink);
    }

    /// Replace a territory's garrison. Returns the new defense strength.
    ///
    /// # Errors
    ///
    /// Returns [`ConquestError::TerritoryNotFound`] if the territory is
    /// unknown.
    pub fn assign_defenders(
        &mut self,
        territory: &TerritoryId,
        defenders: Vec<UnitRef>,
    ) -> Result<Decimal, ConquestError> {
        let t = self
            .graph
            .get_mut(territory)
            .ok_or_else(|| ConquestError::TerritoryNotFound(territory.clone()))?;
        t.assign_defenders(defenders);
        debug!(
            territory = %territory,
            defenders = t.defenders().len(),
            defense_strength = %t.defense_strength(),
            "Defenders assigned"
        );
        Ok(t.defense_strength())
    }

    // -------------------------------------------------------------------
    // Economy
    // -------------------------------------------------------------------

    /// Credit the income of every player-owned territory to the ledger.
    ///
    /// NPC guilds have no treasury; their economy is reflected in their
    /// derived metrics. Returns the total paid.
    pub fn pay_income(&self, ledger: &mut dyn ResourceLedger) -> ResourceBundle {
        let total = self
            .player_territories()
            .iter()
            .fold(ResourceBundle::ZERO, |acc, t| acc.saturating_add(&t.income()));
        ledger.add_bundle(&total);
        if !total.is_empty() {
            debug!(
                gold = total.gold,
                wood = total.wood,
                stone = total.stone,
                mana_stone = total.mana_stone,
                "Territory income paid"
            );
        }
        total
    }

    /// Develop a player-owned territory. Returns the new development level.
    ///
    /// Only the player's own territories can be developed; the treasury is
    /// not charged for anything else.
    ///
    /// # Errors
    ///
    /// Returns [`ConquestError::TerritoryNotFound`] for an unknown territory,
    /// [`ConquestError::NotOwner`] when the player does not hold it, and
    /// [`ConquestError::Ledger`] when the treasury cannot pay.
    pub fn develop_territory(
        &mut self,
        territory: &TerritoryId,
        ctx: &mut ConquestContext<'_>,
    ) -> Result<u32, ConquestError> {
        let growth = self.rules.development_growth;
        let cost = self.player_owned(territory)?.development_cost();
        ctx.ledger.spend(&cost)?;
        let t = self
            .graph
            .get_mut(territory)
            .ok_or_else(|| ConquestError::TerritoryNotFound(territory.clone()))?;
        t.develop(growth);
        let level = t.development_level();
        info!(
            territory = %territory,
            level,
            gold_generation = t.gold_generation(),
            "Territory developed"
        );
        let player = self.player.clone();
        self.recompute_guild_bonuses(&player, ctx.sink);
        Ok(level)
    }

    /// Upgrade a player-owned territory's defense. Returns the new defense
    /// level.
    ///
    /// Only the player's own territories can be fortified; the treasury is
    /// not charged for anything else.
    ///
    /// # Errors
    ///
    /// Returns [`ConquestError::TerritoryNotFound`] for an unknown territory,
    /// [`ConquestError::NotOwner`] when the player does not hold it, and
    /// [`ConquestError::Ledger`] when the treasury cannot pay.
    pub fn upgrade_territory_defense(
        &mut self,
        territory: &TerritoryId,
        ledger: &mut dyn ResourceLedger,
    ) -> Result<u32, ConquestError> {
        let cost = self.player_owned(territory)?.defense_upgrade_cost();
        ledger.spend(&cost)?;
        let t = self
            .graph
            .get_mut(territory)
            .ok_or_else(|| ConquestError::TerritoryNotFound(territory.clone()))?;
        t.upgrade_defense();
        info!(
            territory = %territory,
            level = t.defense_level(),
            defense_strength = %t.defense_strength(),
            "Territory defense upgraded"
        );
        Ok(t.defense_level())
    }

    fn player_owned(&self, territory: &TerritoryId) -> Result<&Territory, ConquestError> {
        let t = self
            .graph
            .get(territory)
            .ok_or_else(|| ConquestError::TerritoryNotFound(territory.clone()))?;
        if t.is_owned_by(&self.player) {
            Ok(t)
        } else {
            Err(ConquestError::NotOwner {
                territory: territory.clone(),
                guild: self.player.clone(),
            })
        }
    }

    // -------------------------------------------------------------------
    // World setup
    // -------------------------------------------------------------------

    /// Distribute territories to NPC guilds at world start.
    ///
    /// Guilds in descending Power order each take the first unclaimed
    /// capital or city. Half of the territories still unclaimed afterwards
    /// go to randomly chosen NPC guilds. Returns the number assigned.
    pub fn assign_initial_territories<R: Rng>(
        &mut self,
        rng: &mut R,
        ctx: &mut ConquestContext<'_>,
    ) -> u32 {
        let mut assigned: u32 = 0;

        for guild in ctx.registry.by_power_desc() {
            let seat = self
                .graph
                .iter()
                .find(|t| {
                    t.owner().is_none()
                        && matches!(
                            t.territory_type(),
                            TerritoryType::Capital | TerritoryType::City
                        )
                })
                .map(|t| t.id().clone());
            let Some(seat) = seat else {
                continue;
            };
            if self.assign_territory(&seat, &guild, ctx).is_ok() {
                assigned = assigned.saturating_add(1);
            }
        }

        let guilds = ctx.registry.ids();
        let mut remaining = self.graph.unclaimed();
        let extra = remaining.len().checked_div(2).unwrap_or(0);
        for _ in 0..extra {
            if remaining.is_empty() || guilds.is_empty() {
                break;
            }
            let territory = remaining.swap_remove(rng.random_range(0..remaining.len()));
            let Some(guild) = guilds.get(rng.random_range(0..guilds.len())) else {
                continue;
            };
            if self.assign_territory(&territory, guild, ctx).is_ok() {
                assigned = assigned.saturating_add(1);
            }
        }

        info!(
            assigned,
            unclaimed = self.graph.unclaimed().len(),
            "Initial territories assigned"
        );
        assigned
    }
}

/// Pull NPC guilds with `Allied` or better standing into a new battle.
///
/// Standing toward the defender is checked first, so a guild allied with
/// both principals defends. Principals are never added as allies.
fn aggregate_allies(
    battle: &mut TerritoryBattle,
    registry: &NpcGuildRegistry,
    relations: &RelationshipBook,
) {
    let allied = |a: &GuildId, b: &GuildId| {
        relations
            .level_between(a, b)
            .is_some_and(|level| level >= RelationshipLevel::Allied)
    };

    for guild in registry.ids() {
        if battle.is_principal(&guild) {
            continue;
        }
        let side = if battle.defender().is_some_and(|d| allied(&guild, d)) {
            BattleSide::Defender
        } else if allied(&guild, battle.attacker()) {
            BattleSide::Attacker
        } else {
            continue;
        };
        if let Ok(true) = battle.join(guild.clone(), side) {
            debug!(battle = %battle.id(), guild = %guild, side = ?side, "Ally called in");
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::arithmetic_side_effects,
    clippy::indexing_slicing
)]
mod tests {
    use dominion_guilds::{EventLog, NpcGuild, StaticGuildFacts, Treasury};
    use dominion_types::{Personality, Specialization, UnitClass};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use rust_decimal_macros::dec;

    use super::*;

    const PLAYER: &str = "player_guild";

    struct Fixture {
        scheduler: ConquestScheduler,
        registry: NpcGuildRegistry,
        relations: RelationshipBook,
        facts: StaticGuildFacts,
        treasury: Treasury,
        log: EventLog,
        now: DateTime<Utc>,
    }

    impl Fixture {
        // A 3x1 strip: home (player), middle (unclaimed), far.
        fn new() -> Self {
            let mut graph = TerritoryGraph::new(3, 1);
            for (x, id, kind) in [
                (0, "home", TerritoryType::Village),
                (1, "middle", TerritoryType::City),
                (2, "far", TerritoryType::Fortress),
            ] {
                graph
                    .insert(Territory::new(
                        TerritoryId::from(id),
                        id,
                        kind,
                        GridPos::new(x, 0),
                    ))
                    .unwrap();
            }
            graph.connect_adjacent();
            let now = DateTime::<Utc>::UNIX_EPOCH;
            graph
                .assign(&TerritoryId::from("home"), &GuildId::from(PLAYER), now)
                .unwrap();

            let mut registry = NpcGuildRegistry::new();
            for (id, level) in [("guild_x", 2), ("guild_y", 4)] {
                registry.insert(NpcGuild::new(
                    GuildId::from(id),
                    id,
                    level,
                    Specialization::Balanced,
                    vec![UnitClass::Knight],
                    Personality::new(dec!(0.5), dec!(0.5), dec!(0.5)),
                ));
            }
            let mut facts = StaticGuildFacts::new();
            facts.set_level(&GuildId::from(PLAYER), 10);

            Self {
                scheduler: ConquestScheduler::new(
                    graph,
                    ConquestRules::default(),
                    StrengthModel::with_defaults(GuildId::from(PLAYER)),
                ),
                registry,
                relations: RelationshipBook::new(),
                facts,
                treasury: Treasury::new(ResourceBundle::new(10_000, 1_000, 1_000, 0)),
                log: EventLog::new(),
                now,
            }
        }

        fn split(&mut self) -> (&mut ConquestScheduler, ConquestContext<'_>) {
            (
                &mut self.scheduler,
                ConquestContext {
                    now: self.now,
                    registry: &mut self.registry,
                    relations: &self.relations,
                    facts: &self.facts,
                    ledger: &mut self.treasury,
                    sink: &mut self.log,
                },
            )
        }
    }

    fn id(s: &str) -> TerritoryId {
        TerritoryId::from(s)
    }

    #[test]
    fn start_battle_validates_challenge() {
        let mut f = Fixture::new();
        let player = GuildId::from(PLAYER);
        let (s, mut ctx) = f.split();

        assert!(matches!(
            s.start_battle(&id("nowhere"), &player, &mut ctx),
            Err(ConquestError::TerritoryNotFound(_))
        ));
        assert!(matches!(
            s.start_battle(&id("far"), &player, &mut ctx),
            Err(ConquestError::NotAdjacent { .. })
        ));
        assert!(matches!(
            s.start_battle(&id("home"), &player, &mut ctx),
            Err(ConquestError::AlreadyOwned { .. })
        ));

        let battle = s.start_battle(&id("middle"), &player, &mut ctx).unwrap();
        assert!(matches!(
            s.start_battle(&id("middle"), &player, &mut ctx),
            Err(ConquestError::AlreadyContested { battle: b, .. }) if b == battle
        ));
        let active = s.battle(battle).unwrap();
        assert_eq!(active.defender(), None);
        assert_eq!(active.resolve_at(), ctx.now + TimeDelta::hours(24));
        assert_eq!(s.active_battles().count(), 1);
        assert!(matches!(
            f.log.events(),
            [ConquestEvent::TerritoryBattleStarted { .. }]
        ));
    }

    #[test]
    fn battle_waits_for_preparation_window() {
        let mut f = Fixture::new();
        let player = GuildId::from(PLAYER);
        let (s, mut ctx) = f.split();
        s.start_battle(&id("middle"), &player, &mut ctx).unwrap();

        ctx.now += TimeDelta::hours(23);
        assert!(s.resolve_due(&mut ctx).is_empty());

        ctx.now += TimeDelta::hours(1);
        let reports = s.resolve_due(&mut ctx);
        assert_eq!(reports.len(), 1);
        // 1000 against the unclaimed city's garrison of 100 * 1.2.
        assert_eq!(reports[0].strengths.attack, dec!(1000));
        assert_eq!(reports[0].strengths.defense, dec!(120));
        assert!(reports[0].captured);
        assert!(s.territory(&id("middle")).unwrap().is_owned_by(&player));
        assert_eq!(s.history().len(), 1);
        assert!(s.battle_for(&id("middle")).is_none());

        // Resolving again finds nothing.
        assert!(s.resolve_due(&mut ctx).is_empty());
        assert!(s.graph().ownership_consistent());
    }

    #[test]
    fn allies_are_pulled_in_by_standing() {
        let mut f = Fixture::new();
        let player = GuildId::from(PLAYER);
        let x = GuildId::from("guild_x");
        let y = GuildId::from("guild_y");
        f.scheduler
            .graph
            .assign(&id("middle"), &x, f.now)
            .unwrap();
        // Y stands allied with both principals; the defender wins priority.
        f.relations.get_or_create(&y, &x, f.now).modify(600);
        f.relations.get_or_create(&player, &y, f.now).modify(600);

        let (s, mut ctx) = f.split();
        let battle = s.start_battle(&id("middle"), &player, &mut ctx).unwrap();
        let b = s.battle(battle).unwrap();
        assert!(b.allies(BattleSide::Defender).contains(&y));
        assert!(b.allies(BattleSide::Attacker).is_empty());
        assert!(!b.allies(BattleSide::Defender).contains(&x));

        // Explicit joins are idempotent and cannot switch sides.
        assert!(!s.join_battle(battle, &y, BattleSide::Defender).unwrap());
        assert!(matches!(
            s.join_battle(battle, &y, BattleSide::Attacker),
            Err(ConquestError::JoinRejected {
                reason: JoinRejection::OppositeSide,
                ..
            })
        ));
        assert!(matches!(
            s.join_battle(battle, &x, BattleSide::Attacker),
            Err(ConquestError::JoinRejected {
                reason: JoinRejection::PrincipalParty,
                ..
            })
        ));
    }

    #[test]
    fn exact_tie_goes_to_defender() {
        let tie = BattleStrengths {
            attack: dec!(960),
            defense: dec!(960),
        };
        assert_eq!(tie.winner(), BattleSide::Defender);
        let edge = BattleStrengths {
            attack: dec!(1000),
            defense: dec!(999),
        };
        assert_eq!(edge.winner(), BattleSide::Attacker);
    }

    #[test]
    fn income_goes_to_player_only() {
        let mut f = Fixture::new();
        f.scheduler
            .graph
            .assign(&id("far"), &GuildId::from("guild_x"), f.now)
            .unwrap();
        let paid = f.scheduler.pay_income(&mut f.treasury);
        assert_eq!(paid, ResourceBundle::gold(50));
        assert_eq!(f.treasury.balance().gold, 10_050);
    }

    #[test]
    fn development_costs_and_compounds() {
        let mut f = Fixture::new();
        let (s, mut ctx) = f.split();
        assert_eq!(s.develop_territory(&id("home"), &mut ctx).unwrap(), 2);
        assert_eq!(s.develop_territory(&id("home"), &mut ctx).unwrap(), 3);
        // Village base 50 -> 60 -> 72.
        assert_eq!(s.territory(&id("home")).unwrap().gold_generation(), 72);
        assert!(matches!(
            s.develop_territory(&id("middle"), &mut ctx),
            Err(ConquestError::NotOwner { .. })
        ));
        // 500 + 1000 gold, 200 + 400 stone.
        assert_eq!(f.treasury.balance(), ResourceBundle::new(8_500, 1_000, 400, 0));
    }

    #[test]
    fn unaffordable_upgrade_changes_nothing() {
        let mut f = Fixture::new();
        f.treasury = Treasury::new(ResourceBundle::gold(300));
        let result = f
            .scheduler
            .upgrade_territory_defense(&id("home"), &mut f.treasury);
        assert!(matches!(result, Err(ConquestError::Ledger(_))));
        assert_eq!(f.scheduler.territory(&id("home")).unwrap().defense_level(), 1);
        assert_eq!(f.treasury.balance(), ResourceBundle::gold(300));
    }

    #[test]
    fn capture_refreshes_metrics_and_bonuses() {
        let mut f = Fixture::new();
        let x = GuildId::from("guild_x");
        let (s, mut ctx) = f.split();
        let previous = s.assign_territory(&id("middle"), &x, &mut ctx).unwrap();
        assert_eq!(previous, None);
        assert_eq!(ctx.registry.get(&x).unwrap().power(), 250);
        assert_eq!(s.bonus_total(&x, TerritoryBonus::GoldProduction), dec!(0.10));

        let previous = s
            .assign_territory(&id("middle"), &GuildId::from(PLAYER), &mut ctx)
            .unwrap();
        assert_eq!(previous, Some(x.clone()));
        assert_eq!(ctx.registry.get(&x).unwrap().power(), 200);
        assert!(s.guild_territories(&x).is_empty());
        assert_eq!(s.player_territories().len(), 2);
        assert!(f.log.events().iter().any(|e| matches!(
            e,
            ConquestEvent::GuildBonusesChanged { guild, bonuses } if guild == &x && bonuses.is_empty()
        )));
    }

    #[test]
    fn capture_disbands_the_previous_garrison() {
        let mut f = Fixture::new();
        let x = GuildId::from("guild_x");
        let (s, mut ctx) = f.split();
        s.assign_territory(&id("middle"), &x, &mut ctx).unwrap();
        let bare = s.territory(&id("middle")).unwrap().defense_strength();

        let garrisoned = s
            .assign_defenders(
                &id("middle"),
                vec![
                    UnitRef::new("guard", UnitClass::Knight, 10),
                    UnitRef::new("scout", UnitClass::Ranger, 5),
                ],
            )
            .unwrap();
        assert!(garrisoned > bare);

        // Reasserting the same owner keeps the garrison.
        s.assign_territory(&id("middle"), &x, &mut ctx).unwrap();
        assert_eq!(s.territory(&id("middle")).unwrap().defenders().len(), 2);
        assert_eq!(s.territory(&id("middle")).unwrap().defense_strength(), garrisoned);

        s.assign_territory(&id("middle"), &GuildId::from(PLAYER), &mut ctx)
            .unwrap();
        let middle = s.territory(&id("middle")).unwrap();
        assert!(middle.defenders().is_empty());
        assert_eq!(middle.defense_strength(), bare);
    }

    #[test]
    fn initial_assignment_seats_strongest_guilds_first() {
        let graph = dominion_world::build_graph(
            10,
            10,
            &dominion_world::standard_layout(),
            dec!(0.3),
            &mut SmallRng::seed_from_u64(42),
        )
        .unwrap();
        let mut f = Fixture::new();
        f.scheduler = ConquestScheduler::new(
            graph,
            ConquestRules::default(),
            StrengthModel::with_defaults(GuildId::from(PLAYER)),
        );
        let mut rng = SmallRng::seed_from_u64(42);
        let (s, mut ctx) = f.split();
        let total = s.graph().len();
        let assigned = s.assign_initial_territories(&mut rng, &mut ctx);

        // guild_y (Power 400) outranks guild_x and takes the capital.
        let capital = s.territory(&id("territory_central_capital")).unwrap();
        assert_eq!(capital.owner(), Some(&GuildId::from("guild_y")));
        let seats = 2;
        let extra = (total - seats) / 2;
        assert_eq!(assigned as usize, seats + extra);
        assert_eq!(s.graph().unclaimed().len(), total - seats - extra);
        assert!(s.graph().ownership_consistent());
    }
}
