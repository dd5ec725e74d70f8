//! Interfaces to systems outside the conquest core.
//!
//! The engine reads and writes the player's treasury through a
//! [`ResourceLedger`], asks a [`GuildFacts`] source about levels, units and
//! buildings, and hands raids to a [`BattleResolver`]. Each trait ships with a
//! small in-memory implementation used by the binary and the tests.
//!
//! Implementations must not call back into the engine.

use std::collections::BTreeMap;

use dominion_types::{BuildingKind, GuildId, ResourceBundle, ResourceKind, UnitRef};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Resource ledger
// ---------------------------------------------------------------------------

/// Errors from the resource ledger.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The treasury cannot cover the cost.
    #[error("insufficient resources: need {needed:?}, have {available:?}")]
    InsufficientResources {
        /// The requested cost.
        needed: ResourceBundle,
        /// The balance at the time of the request.
        available: ResourceBundle,
    },
}

/// The player's resource store.
pub trait ResourceLedger {
    /// Current balance.
    fn balance(&self) -> ResourceBundle;

    /// Whether the balance covers `cost` in every component.
    fn can_afford(&self, cost: &ResourceBundle) -> bool {
        self.balance().covers(cost)
    }

    /// Deduct `cost`. Nothing is deducted unless all of it is affordable.
    fn spend(&mut self, cost: &ResourceBundle) -> Result<(), LedgerError>;

    /// Credit one resource.
    fn add(&mut self, kind: ResourceKind, amount: u32);

    /// Credit every component of a bundle.
    fn add_bundle(&mut self, bundle: &ResourceBundle) {
        for (kind, amount) in bundle.entries() {
            if amount > 0 {
                self.add(kind, amount);
            }
        }
    }

    /// Spend `give` and receive `take` as one exchange.
    fn exchange(&mut self, give: &ResourceBundle, take: &ResourceBundle) -> Result<(), LedgerError> {
        self.spend(give)?;
        self.add_bundle(take);
        Ok(())
    }
}

/// An in-memory treasury.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treasury {
    balance: ResourceBundle,
}

impl Treasury {
    /// A treasury holding `balance`.
    pub const fn new(balance: ResourceBundle) -> Self {
        Self { balance }
    }
}

impl ResourceLedger for Treasury {
    fn balance(&self) -> ResourceBundle {
        self.balance
    }

    fn spend(&mut self, cost: &ResourceBundle) -> Result<(), LedgerError> {
        if !self.balance.covers(cost) {
            return Err(LedgerError::InsufficientResources {
                needed: *cost,
                available: self.balance,
            });
        }
        self.balance = ResourceBundle::new(
            self.balance.gold.saturating_sub(cost.gold),
            self.balance.wood.saturating_sub(cost.wood),
            self.balance.stone.saturating_sub(cost.stone),
            self.balance.mana_stone.saturating_sub(cost.mana_stone),
        );
        Ok(())
    }

    fn add(&mut self, kind: ResourceKind, amount: u32) {
        let slot = match kind {
            ResourceKind::Gold => &mut self.balance.gold,
            ResourceKind::Wood => &mut self.balance.wood,
            ResourceKind::Stone => &mut self.balance.stone,
            ResourceKind::ManaStone => &mut self.balance.mana_stone,
        };
        *slot = slot.saturating_add(amount);
    }
}

// ---------------------------------------------------------------------------
// Guild facts
// ---------------------------------------------------------------------------

/// Read access to guild progression owned by another system.
pub trait GuildFacts {
    /// A guild's level, if known.
    fn guild_level(&self, guild: &GuildId) -> Option<u32>;

    /// Units the guild can send into battle.
    fn available_units(&self, guild: &GuildId) -> Vec<UnitRef>;

    /// Level of a building the guild owns (0 if not built).
    fn building_level(&self, guild: &GuildId, building: BuildingKind) -> u32;

    /// Grant reputation to a guild.
    fn add_reputation(&mut self, guild: &GuildId, amount: u32);
}

/// Everything [`StaticGuildFacts`] knows about one guild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildProfile {
    /// Guild level.
    pub level: u32,
    /// Units available for battle.
    pub units: Vec<UnitRef>,
    /// Building levels.
    pub buildings: BTreeMap<BuildingKind, u32>,
    /// Accumulated reputation.
    pub reputation: u32,
}

/// An in-memory [`GuildFacts`] source.
#[derive(Debug, Clone, Default)]
pub struct StaticGuildFacts {
    profiles: BTreeMap<GuildId, GuildProfile>,
}

impl StaticGuildFacts {
    /// Create an empty source.
    pub const fn new() -> Self {
        Self {
            profiles: BTreeMap::new(),
        }
    }

    /// Set a guild's level.
    pub fn set_level(&mut self, guild: &GuildId, level: u32) -> &mut Self {
        self.profiles.entry(guild.clone()).or_default().level = level;
        self
    }

    /// Replace a guild's units.
    pub fn set_units(&mut self, guild: &GuildId, units: Vec<UnitRef>) -> &mut Self {
        self.profiles.entry(guild.clone()).or_default().units = units;
        self
    }

    /// Set a building level.
    pub fn set_building(&mut self, guild: &GuildId, building: BuildingKind, level: u32) -> &mut Self {
        self.profiles
            .entry(guild.clone())
            .or_default()
            .buildings
            .insert(building, level);
        self
    }

    /// A guild's profile.
    pub fn profile(&self, guild: &GuildId) -> Option<&GuildProfile> {
        self.profiles.get(guild)
    }

    /// A guild's accumulated reputation.
    pub fn reputation(&self, guild: &GuildId) -> u32 {
        self.profiles.get(guild).map_or(0, |p| p.reputation)
    }
}

impl GuildFacts for StaticGuildFacts {
    fn guild_level(&self, guild: &GuildId) -> Option<u32> {
        self.profiles.get(guild).map(|p| p.level)
    }

    fn available_units(&self, guild: &GuildId) -> Vec<UnitRef> {
        self.profiles
            .get(guild)
            .map(|p| p.units.clone())
            .unwrap_or_default()
    }

    fn building_level(&self, guild: &GuildId, building: BuildingKind) -> u32 {
        self.profiles
            .get(guild)
            .and_then(|p| p.buildings.get(&building).copied())
            .unwrap_or(0)
    }

    fn add_reputation(&mut self, guild: &GuildId, amount: u32) {
        let profile = self.profiles.entry(guild.clone()).or_default();
        profile.reputation = profile.reputation.saturating_add(amount);
    }
}

// ---------------------------------------------------------------------------
// Battle resolver
// ---------------------------------------------------------------------------

/// Result of a unit-level battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleOutcome {
    /// Whether the attacking units won.
    pub attacker_won: bool,
    /// Attacking side rating as computed by the resolver.
    pub attacker_rating: u32,
    /// Defending side rating as computed by the resolver.
    pub defender_rating: u32,
}

/// Fights two sets of units. Opaque to the conquest core.
pub trait BattleResolver {
    /// Resolve a battle between two forces.
    fn resolve(&mut self, attackers: &[UnitRef], defenders: &[UnitRef]) -> BattleOutcome;
}

/// Compares the summed unit levels of both sides. Ties go to the defender.
#[derive(Debug, Clone, Copy, Default)]
pub struct LevelSumResolver;

impl BattleResolver for LevelSumResolver {
    fn resolve(&mut self, attackers: &[UnitRef], defenders: &[UnitRef]) -> BattleOutcome {
        let rating = |units: &[UnitRef]| {
            units
                .iter()
                .fold(0_u32, |acc, unit| acc.saturating_add(unit.level))
        };
        let attacker_rating = rating(attackers);
        let defender_rating = rating(defenders);
        BattleOutcome {
            attacker_won: attacker_rating > defender_rating,
            attacker_rating,
            defender_rating,
        }
    }
}

#[cfg(test)]
mod tests {
    use dominion_types::UnitClass;

    use super::*;

    #[test]
    fn failed_spend_deducts_nothing() {
        let mut t = Treasury::new(ResourceBundle::new(100, 10, 0, 0));
        let cost = ResourceBundle::new(50, 20, 0, 0);
        assert!(!t.can_afford(&cost));
        assert!(matches!(
            t.spend(&cost),
            Err(LedgerError::InsufficientResources { .. })
        ));
        assert_eq!(t.balance(), ResourceBundle::new(100, 10, 0, 0));
        assert!(t.spend(&ResourceBundle::gold(100)).is_ok());
        assert_eq!(t.balance(), ResourceBundle::new(0, 10, 0, 0));
    }

    #[test]
    fn exchange_swaps_resources() {
        let mut t = Treasury::new(ResourceBundle::gold(150));
        let give = ResourceBundle::gold(100);
        let take = ResourceBundle::new(0, 50, 50, 0);
        assert!(t.exchange(&give, &take).is_ok());
        assert_eq!(t.balance(), ResourceBundle::new(50, 50, 50, 0));
        assert!(t.exchange(&give, &take).is_err());
        assert_eq!(t.balance(), ResourceBundle::new(50, 50, 50, 0));
    }

    #[test]
    fn static_facts_answer_queries() {
        let player = GuildId::from("player_guild");
        let mut facts = StaticGuildFacts::new();
        facts
            .set_level(&player, 10)
            .set_building(&player, BuildingKind::ResearchLab, 2);
        assert_eq!(facts.guild_level(&player), Some(10));
        assert_eq!(facts.building_level(&player, BuildingKind::ResearchLab), 2);
        assert_eq!(facts.building_level(&player, BuildingKind::TrainingGround), 0);
        facts.add_reputation(&player, 10);
        facts.add_reputation(&player, 10);
        assert_eq!(facts.reputation(&player), 20);
        assert_eq!(facts.guild_level(&GuildId::from("nobody")), None);
    }

    #[test]
    fn level_sum_ties_favor_defender() {
        let unit = |level| UnitRef::new("u", UnitClass::Warrior, level);
        let mut resolver = LevelSumResolver;
        assert!(resolver.resolve(&[unit(5)], &[unit(4)]).attacker_won);
        assert!(!resolver.resolve(&[unit(5)], &[unit(5)]).attacker_won);
        assert!(!resolver.resolve(&[], &[]).attacker_won);
    }
}
