//! AI-controlled guild actors.
//!
//! An [`NpcGuild`] has a fixed personality and specialization. Its derived
//! metrics (Power, Wealth, Influence) are pure functions of level and
//! territory count and are recomputed after every territory change.

use dominion_types::{GuildId, Personality, Specialization, UnitClass};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Power contributed by each guild level.
pub const POWER_PER_LEVEL: u32 = 100;
/// Power contributed by each owned territory.
pub const POWER_PER_TERRITORY: u32 = 50;
/// Wealth contributed by each guild level.
pub const WEALTH_PER_LEVEL: u32 = 200;
/// Wealth contributed by a greed of 1.0.
pub const WEALTH_PER_GREED: u32 = 500;
/// Influence contributed by each guild level.
pub const INFLUENCE_PER_LEVEL: u32 = 50;
/// Influence contributed by each owned territory.
pub const INFLUENCE_PER_TERRITORY: u32 = 30;

/// An AI-controlled guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpcGuild {
    id: GuildId,
    name: String,
    level: u32,
    specialization: Specialization,
    preferred_classes: Vec<UnitClass>,
    personality: Personality,
    territory_count: u32,
    power: u32,
    wealth: u32,
    influence: u32,
}

impl NpcGuild {
    /// Create a guild holding no territories, with metrics computed.
    pub fn new(
        id: GuildId,
        name: impl Into<String>,
        level: u32,
        specialization: Specialization,
        preferred_classes: Vec<UnitClass>,
        personality: Personality,
    ) -> Self {
        let mut guild = Self {
            id,
            name: name.into(),
            level: level.max(1),
            specialization,
            preferred_classes,
            personality,
            territory_count: 0,
            power: 0,
            wealth: 0,
            influence: 0,
        };
        guild.recompute_metrics(0);
        guild
    }

    /// Guild identifier.
    pub const fn id(&self) -> &GuildId {
        &self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Guild level (1+).
    pub const fn level(&self) -> u32 {
        self.level
    }

    /// Specialization tag.
    pub const fn specialization(&self) -> Specialization {
        self.specialization
    }

    /// Unit classes the guild fields.
    pub fn preferred_classes(&self) -> &[UnitClass] {
        &self.preferred_classes
    }

    /// Whether the guild fields `class`.
    pub fn prefers(&self, class: UnitClass) -> bool {
        self.preferred_classes.contains(&class)
    }

    /// Fixed personality.
    pub const fn personality(&self) -> &Personality {
        &self.personality
    }

    /// Territories held at the last recomputation.
    pub const fn territory_count(&self) -> u32 {
        self.territory_count
    }

    /// Military strength.
    pub const fn power(&self) -> u32 {
        self.power
    }

    /// Economic strength.
    pub const fn wealth(&self) -> u32 {
        self.wealth
    }

    /// Political reach.
    pub const fn influence(&self) -> u32 {
        self.influence
    }

    /// Recompute Power, Wealth and Influence for a new territory count.
    pub fn recompute_metrics(&mut self, territory_count: u32) {
        self.territory_count = territory_count;
        self.power = self
            .level
            .saturating_mul(POWER_PER_LEVEL)
            .saturating_add(territory_count.saturating_mul(POWER_PER_TERRITORY));
        let greed_wealth = self
            .personality
            .greed()
            .saturating_mul(Decimal::from(WEALTH_PER_GREED))
            .trunc()
            .to_u32()
            .unwrap_or(0);
        self.wealth = self
            .level
            .saturating_mul(WEALTH_PER_LEVEL)
            .saturating_add(greed_wealth);
        self.influence = self
            .level
            .saturating_mul(INFLUENCE_PER_LEVEL)
            .saturating_add(territory_count.saturating_mul(INFLUENCE_PER_TERRITORY));
    }

    /// Scale cached Power by `factor` (truncated). Lasts until the next
    /// [`NpcGuild::recompute_metrics`].
    pub fn weaken(&mut self, factor: Decimal) {
        self.power = Decimal::from(self.power)
            .saturating_mul(factor.max(Decimal::ZERO))
            .trunc()
            .to_u32()
            .unwrap_or(self.power);
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn wolves(level: u32) -> NpcGuild {
        NpcGuild::new(
            GuildId::from("guild_iron_wolves"),
            "Iron Wolves",
            level,
            Specialization::Military,
            vec![UnitClass::Warrior, UnitClass::Knight],
            Personality::new(dec!(0.7), dec!(0.6), dec!(0.4)),
        )
    }

    #[test]
    fn metrics_follow_level_and_territories() {
        let mut g = wolves(3);
        assert_eq!(g.power(), 300);
        assert_eq!(g.wealth(), 800);
        assert_eq!(g.influence(), 150);
        g.recompute_metrics(4);
        assert_eq!(g.power(), 500);
        assert_eq!(g.influence(), 270);
        assert_eq!(g.wealth(), 800);
    }

    #[test]
    fn weakening_lasts_until_recompute() {
        let mut g = wolves(5);
        g.weaken(dec!(0.8));
        assert_eq!(g.power(), 400);
        g.recompute_metrics(0);
        assert_eq!(g.power(), 500);
    }

    #[test]
    fn level_is_at_least_one() {
        assert_eq!(wolves(0).level(), 1);
    }
}
