//! Catalog of NPC guilds.

use std::collections::BTreeMap;

use dominion_types::{GuildId, Personality, Specialization, UnitClass};
use rand::Rng;
use rust_decimal::Decimal;
use tracing::debug;

use crate::guild::NpcGuild;

/// Lowest level rolled for a roster guild.
pub const ROSTER_MIN_LEVEL: u32 = 1;
/// Highest level rolled for a roster guild.
pub const ROSTER_MAX_LEVEL: u32 = 9;

/// All NPC guilds in the simulation, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct NpcGuildRegistry {
    guilds: BTreeMap<GuildId, NpcGuild>,
}

impl NpcGuildRegistry {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            guilds: BTreeMap::new(),
        }
    }

    /// Add or replace a guild. Returns the replaced guild, if any.
    pub fn insert(&mut self, guild: NpcGuild) -> Option<NpcGuild> {
        self.guilds.insert(guild.id().clone(), guild)
    }

    /// Look up a guild.
    pub fn get(&self, id: &GuildId) -> Option<&NpcGuild> {
        self.guilds.get(id)
    }

    /// Look up a guild mutably.
    pub fn get_mut(&mut self, id: &GuildId) -> Option<&mut NpcGuild> {
        self.guilds.get_mut(id)
    }

    /// Whether `id` is an NPC guild.
    pub fn contains(&self, id: &GuildId) -> bool {
        self.guilds.contains_key(id)
    }

    /// Number of guilds.
    pub fn len(&self) -> usize {
        self.guilds.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.guilds.is_empty()
    }

    /// Iterate over guilds in id order.
    pub fn iter(&self) -> impl Iterator<Item = &NpcGuild> {
        self.guilds.values()
    }

    /// Guild ids in id order.
    pub fn ids(&self) -> Vec<GuildId> {
        self.guilds.keys().cloned().collect()
    }

    /// Guild ids ordered by descending Power, ties broken by id.
    pub fn by_power_desc(&self) -> Vec<GuildId> {
        let mut ranked: Vec<&NpcGuild> = self.guilds.values().collect();
        ranked.sort_by(|a, b| b.power().cmp(&a.power()).then_with(|| a.id().cmp(b.id())));
        ranked.into_iter().map(|g| g.id().clone()).collect()
    }

    /// Recompute a guild's metrics for a new territory count.
    ///
    /// Returns `false` if `id` is not an NPC guild.
    pub fn recompute_metrics(&mut self, id: &GuildId, territory_count: u32) -> bool {
        match self.guilds.get_mut(id) {
            Some(guild) => {
                guild.recompute_metrics(territory_count);
                true
            }
            None => false,
        }
    }
}

/// The five standard NPC guilds with fixed personalities and random levels.
pub fn standard_roster<R: Rng>(rng: &mut R) -> NpcGuildRegistry {
    let pct = |n: i64| Decimal::new(n, 1);
    let entries = [
        (
            "guild_iron_wolves",
            "Iron Wolves",
            Specialization::Military,
            vec![UnitClass::Warrior, UnitClass::Knight],
            (7, 6, 4),
        ),
        (
            "guild_silver_merchants",
            "Silver Merchants Union",
            Specialization::Trade,
            vec![UnitClass::Assassin, UnitClass::Sage],
            (3, 8, 8),
        ),
        (
            "guild_crystal_mages",
            "Crystal Mages Society",
            Specialization::Magic,
            vec![UnitClass::Mage, UnitClass::Sage],
            (4, 7, 5),
        ),
        (
            "guild_holy_order",
            "Holy Order",
            Specialization::Balanced,
            vec![UnitClass::Knight, UnitClass::Priest],
            (5, 9, 2),
        ),
        (
            "guild_shadow_daggers",
            "Shadow Daggers",
            Specialization::Military,
            vec![UnitClass::Assassin, UnitClass::Ranger],
            (8, 3, 7),
        ),
    ];

    let mut registry = NpcGuildRegistry::new();
    for (id, name, specialization, classes, (aggression, trust, greed)) in entries {
        let level = rng.random_range(ROSTER_MIN_LEVEL..=ROSTER_MAX_LEVEL);
        let guild = NpcGuild::new(
            GuildId::from(id),
            name,
            level,
            specialization,
            classes,
            Personality::new(pct(aggression), pct(trust), pct(greed)),
        );
        debug!(guild = id, level, power = guild.power(), "NPC guild created");
        registry.insert(guild);
    }
    registry
}
