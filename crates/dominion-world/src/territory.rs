//! The capturable territory entity.
//!
//! A [`Territory`] is created once at world generation and never destroyed.
//! Its economy and bonuses are seeded from its [`TerritoryType`] and grow
//! multiplicatively with development. Ownership and adjacency are maintained
//! by [`TerritoryGraph`](crate::TerritoryGraph), which keeps the owner index
//! consistent, so the setters for those fields are crate-private.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use dominion_types::{
    GridPos, GuildId, ResourceBundle, TerritoryBonus, TerritoryId, TerritoryType, UnitRef,
};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Defense strength contributed by each defense level.
pub const STRENGTH_PER_DEFENSE_LEVEL: u32 = 100;

/// Defense strength contributed by each level of a garrisoned unit.
pub const STRENGTH_PER_UNIT_LEVEL: u32 = 10;

/// Per-level base cost of developing a territory.
pub const DEVELOPMENT_COST_PER_LEVEL: ResourceBundle = ResourceBundle::new(500, 0, 200, 0);

/// Per-level base cost of upgrading a territory's defenses.
pub const DEFENSE_UPGRADE_COST_PER_LEVEL: ResourceBundle = ResourceBundle::new(300, 150, 0, 0);

/// A capturable region of the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Territory {
    id: TerritoryId,
    name: String,
    territory_type: TerritoryType,
    position: GridPos,
    owner: Option<GuildId>,
    captured_at: Option<DateTime<Utc>>,
    defense_level: u32,
    development_level: u32,
    defense_strength: Decimal,
    gold_generation: u32,
    resource_generation: u32,
    bonuses: BTreeMap<TerritoryBonus, Decimal>,
    defenders: Vec<UnitRef>,
    /// Derived from grid placement; recomputed on restore, never stored.
    #[serde(skip)]
    adjacent: BTreeSet<TerritoryId>,
}

impl Territory {
    /// Create an unclaimed level-1 territory initialized for its type.
    pub fn new(
        id: TerritoryId,
        name: impl Into<String>,
        territory_type: TerritoryType,
        position: GridPos,
    ) -> Self {
        let (gold_generation, resource_generation, bonuses) = type_profile(territory_type);
        let mut territory = Self {
            id,
            name: name.into(),
            territory_type,
            position,
            owner: None,
            captured_at: None,
            defense_level: 1,
            development_level: 1,
            defense_strength: Decimal::ZERO,
            gold_generation,
            resource_generation,
            bonuses,
            defenders: Vec::new(),
            adjacent: BTreeSet::new(),
        };
        territory.recompute_defense_strength();
        territory
    }

    // -------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------

    /// Territory identifier.
    pub const fn id(&self) -> &TerritoryId {
        &self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Territory type.
    pub const fn territory_type(&self) -> TerritoryType {
        self.territory_type
    }

    /// Grid cell.
    pub const fn position(&self) -> GridPos {
        self.position
    }

    /// Owning guild, or `None` if unclaimed.
    pub const fn owner(&self) -> Option<&GuildId> {
        self.owner.as_ref()
    }

    /// Whether `guild` owns this territory.
    pub fn is_owned_by(&self, guild: &GuildId) -> bool {
        self.owner.as_ref() == Some(guild)
    }

    /// When the current owner took the territory.
    pub const fn captured_at(&self) -> Option<DateTime<Utc>> {
        self.captured_at
    }

    /// Defense level (1+).
    pub const fn defense_level(&self) -> u32 {
        self.defense_level
    }

    /// Development level (1+).
    pub const fn development_level(&self) -> u32 {
        self.development_level
    }

    /// Garrison defense strength, including the territory's defense bonus.
    pub const fn defense_strength(&self) -> Decimal {
        self.defense_strength
    }

    /// Gold produced per income payout.
    pub const fn gold_generation(&self) -> u32 {
        self.gold_generation
    }

    /// Secondary resources produced per income payout.
    pub const fn resource_generation(&self) -> u32 {
        self.resource_generation
    }

    /// All bonuses this territory grants its owner.
    pub const fn bonuses(&self) -> &BTreeMap<TerritoryBonus, Decimal> {
        &self.bonuses
    }

    /// Magnitude of one bonus kind (zero if absent).
    pub fn bonus(&self, kind: TerritoryBonus) -> Decimal {
        self.bonuses.get(&kind).copied().unwrap_or(Decimal::ZERO)
    }

    /// Units garrisoned here.
    pub fn defenders(&self) -> &[UnitRef] {
        &self.defenders
    }

    /// Directly adjacent territories.
    pub const fn adjacent(&self) -> &BTreeSet<TerritoryId> {
        &self.adjacent
    }

    /// Whether `other` is directly adjacent.
    pub fn is_adjacent_to(&self, other: &TerritoryId) -> bool {
        self.adjacent.contains(other)
    }

    // -------------------------------------------------------------------
    // Economy
    // -------------------------------------------------------------------

    /// Resources paid to the owner per income payout.
    ///
    /// Resource sites split their secondary output: half to wood, half to
    /// stone, a quarter to mana stone.
    pub const fn income(&self) -> ResourceBundle {
        let secondary = self.resource_generation;
        if matches!(self.territory_type, TerritoryType::Resource) {
            ResourceBundle::new(
                self.gold_generation,
                secondary / 2,
                secondary / 2,
                secondary / 4,
            )
        } else {
            ResourceBundle::gold(self.gold_generation)
        }
    }

    /// Cost of the next development level.
    pub const fn development_cost(&self) -> ResourceBundle {
        DEVELOPMENT_COST_PER_LEVEL.scaled(self.development_level)
    }

    /// Cost of the next defense level.
    pub const fn defense_upgrade_cost(&self) -> ResourceBundle {
        DEFENSE_UPGRADE_COST_PER_LEVEL.scaled(self.defense_level)
    }

    // -------------------------------------------------------------------
    // Mutation
    // -------------------------------------------------------------------

    /// Raise the development level by one.
    ///
    /// Gold and secondary generation are multiplied by `growth` (truncated
    /// to whole units), every bonus magnitude is multiplied by `growth`, and
    /// defense strength is recomputed.
    pub fn develop(&mut self, growth: Decimal) {
        self.development_level = self.development_level.saturating_add(1);
        self.gold_generation = scale_whole(self.gold_generation, growth);
        self.resource_generation = scale_whole(self.resource_generation, growth);
        for magnitude in self.bonuses.values_mut() {
            *magnitude = magnitude.saturating_mul(growth);
        }
        self.recompute_defense_strength();
    }

    /// Raise the defense level by one and recompute defense strength.
    pub fn upgrade_defense(&mut self) {
        self.defense_level = self.defense_level.saturating_add(1);
        self.recompute_defense_strength();
    }

    /// Replace the garrison and recompute defense strength.
    pub fn assign_defenders(&mut self, defenders: Vec<UnitRef>) {
        self.defenders = defenders;
        self.recompute_defense_strength();
    }

    /// Recompute defense strength from defense level, garrison and bonus.
    pub fn recompute_defense_strength(&mut self) {
        let base = self
            .defense_level
            .saturating_mul(STRENGTH_PER_DEFENSE_LEVEL);
        let garrison = self.defenders.iter().fold(0_u32, |acc, unit| {
            acc.saturating_add(unit.level.saturating_mul(STRENGTH_PER_UNIT_LEVEL))
        });
        let multiplier = Decimal::ONE.saturating_add(self.bonus(TerritoryBonus::DefenseBonus));
        self.defense_strength =
            Decimal::from(base.saturating_add(garrison)).saturating_mul(multiplier);
    }

    pub(crate) fn set_owner(&mut self, owner: GuildId, at: DateTime<Utc>) {
        self.owner = Some(owner);
        self.captured_at = Some(at);
    }

    pub(crate) fn link(&mut self, other: TerritoryId) {
        self.adjacent.insert(other);
    }

    pub(crate) fn clear_links(&mut self) {
        self.adjacent.clear();
    }
}

/// Multiply a whole amount by a decimal factor, truncating toward zero.
fn scale_whole(amount: u32, factor: Decimal) -> u32 {
    Decimal::from(amount)
        .saturating_mul(factor)
        .trunc()
        .to_u32()
        .unwrap_or(u32::MAX)
}

/// Base gold, base secondary output and bonuses for a territory type.
fn type_profile(kind: TerritoryType) -> (u32, u32, BTreeMap<TerritoryBonus, Decimal>) {
    let pct = |n: i64| Decimal::new(n, 2);
    let (gold, secondary, bonuses): (u32, u32, Vec<(TerritoryBonus, Decimal)>) = match kind {
        TerritoryType::Village => (50, 0, vec![(TerritoryBonus::GoldProduction, pct(5))]),
        TerritoryType::City => (
            100,
            0,
            vec![
                (TerritoryBonus::GoldProduction, pct(10)),
                (TerritoryBonus::RecruitmentBonus, pct(10)),
            ],
        ),
        TerritoryType::Fortress => (
            75,
            0,
            vec![
                (TerritoryBonus::DefenseBonus, pct(20)),
                (TerritoryBonus::ExperienceBonus, pct(10)),
            ],
        ),
        TerritoryType::Capital => (
            200,
            0,
            vec![
                (TerritoryBonus::GoldProduction, pct(15)),
                (TerritoryBonus::RecruitmentBonus, pct(15)),
                (TerritoryBonus::ResearchSpeed, pct(10)),
            ],
        ),
        TerritoryType::Strategic => (
            80,
            0,
            vec![
                (TerritoryBonus::DefenseBonus, pct(15)),
                (TerritoryBonus::ExperienceBonus, pct(15)),
            ],
        ),
        TerritoryType::Resource => (
            25,
            50,
            vec![(TerritoryBonus::ResourceProduction, pct(25))],
        ),
    };
    (gold, secondary, bonuses.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use dominion_types::UnitClass;
    use rust_decimal_macros::dec;

    use super::*;

    fn territory(kind: TerritoryType) -> Territory {
        Territory::new(
            TerritoryId::from("territory_test"),
            "Test",
            kind,
            GridPos::new(0, 0),
        )
    }

    #[test]
    fn development_compounds_gold_generation() {
        let mut t = territory(TerritoryType::City);
        assert_eq!(t.gold_generation(), 100);
        t.develop(dec!(1.2));
        assert_eq!(t.gold_generation(), 120);
        t.develop(dec!(1.2));
        assert_eq!(t.gold_generation(), 144);
        assert_eq!(t.development_level(), 3);
        assert_eq!(t.bonus(TerritoryBonus::GoldProduction), dec!(0.144));
    }

    #[test]
    fn defense_strength_includes_garrison_and_bonus() {
        let mut t = territory(TerritoryType::Fortress);
        // (1 * 100) * 1.2
        assert_eq!(t.defense_strength(), dec!(120));
        t.assign_defenders(vec![
            UnitRef::new("a", UnitClass::Knight, 5),
            UnitRef::new("b", UnitClass::Warrior, 5),
        ]);
        // (100 + 100) * 1.2
        assert_eq!(t.defense_strength(), dec!(240));
        t.upgrade_defense();
        assert_eq!(t.defense_level(), 2);
        assert_eq!(t.defense_strength(), dec!(360));
    }

    #[test]
    fn costs_scale_with_level() {
        let mut t = territory(TerritoryType::Village);
        assert_eq!(t.development_cost(), ResourceBundle::new(500, 0, 200, 0));
        t.develop(dec!(1.2));
        assert_eq!(t.development_cost(), ResourceBundle::new(1000, 0, 400, 0));
        t.upgrade_defense();
        t.upgrade_defense();
        assert_eq!(t.defense_upgrade_cost(), ResourceBundle::new(900, 450, 0, 0));
    }

    #[test]
    fn resource_sites_split_secondary_income() {
        let t = territory(TerritoryType::Resource);
        assert_eq!(t.income(), ResourceBundle::new(25, 25, 25, 12));
        let village = territory(TerritoryType::Village);
        assert_eq!(village.income(), ResourceBundle::gold(50));
    }
}
