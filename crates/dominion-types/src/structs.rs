//! Value structs shared across the Dominion workspace.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enums::{ResourceKind, UnitClass};

// ---------------------------------------------------------------------------
// GridPos
// ---------------------------------------------------------------------------

/// Integer cell coordinate on the territory map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridPos {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl GridPos {
    /// Create a grid position.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The four orthogonal neighbors (east, west, north, south).
    ///
    /// Neighbors that would overflow `i32` are omitted.
    pub fn orthogonal_neighbors(self) -> Vec<Self> {
        [
            self.x.checked_add(1).map(|x| Self::new(x, self.y)),
            self.x.checked_sub(1).map(|x| Self::new(x, self.y)),
            self.y.checked_add(1).map(|y| Self::new(self.x, y)),
            self.y.checked_sub(1).map(|y| Self::new(self.x, y)),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

impl core::fmt::Display for GridPos {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Personality
// ---------------------------------------------------------------------------

/// Immutable personality of an NPC guild.
///
/// Each trait is a [`Decimal`] in `0.0..=1.0`. Traits bias diplomatic success
/// chances and never change after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Personality {
    aggressiveness: Decimal,
    trustworthiness: Decimal,
    greed: Decimal,
}

impl Personality {
    /// Build a personality, clamping every trait into `0.0..=1.0`.
    pub fn new(aggressiveness: Decimal, trustworthiness: Decimal, greed: Decimal) -> Self {
        Self {
            aggressiveness: clamp_unit(aggressiveness),
            trustworthiness: clamp_unit(trustworthiness),
            greed: clamp_unit(greed),
        }
    }

    /// Tendency toward conflict.
    pub const fn aggressiveness(&self) -> Decimal {
        self.aggressiveness
    }

    /// Reliability as a partner.
    pub const fn trustworthiness(&self) -> Decimal {
        self.trustworthiness
    }

    /// Appetite for material gain.
    pub const fn greed(&self) -> Decimal {
        self.greed
    }
}

fn clamp_unit(value: Decimal) -> Decimal {
    value.clamp(Decimal::ZERO, Decimal::ONE)
}

// ---------------------------------------------------------------------------
// UnitRef
// ---------------------------------------------------------------------------

/// Reference to a combat unit, as consumed by the external battle resolver
/// and by territory garrisons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRef {
    /// Display name.
    pub name: String,
    /// Adventurer class.
    pub class: UnitClass,
    /// Unit level (1+).
    pub level: u32,
}

impl UnitRef {
    /// Create a unit reference.
    pub fn new(name: impl Into<String>, class: UnitClass, level: u32) -> Self {
        Self {
            name: name.into(),
            class,
            level,
        }
    }
}

// ---------------------------------------------------------------------------
// ResourceBundle
// ---------------------------------------------------------------------------

/// A quantity of each treasury resource. Used for costs and income.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceBundle {
    /// Gold.
    pub gold: u32,
    /// Wood.
    pub wood: u32,
    /// Stone.
    pub stone: u32,
    /// Mana stone.
    pub mana_stone: u32,
}

impl ResourceBundle {
    /// The empty bundle.
    pub const ZERO: Self = Self {
        gold: 0,
        wood: 0,
        stone: 0,
        mana_stone: 0,
    };

    /// Create a bundle.
    pub const fn new(gold: u32, wood: u32, stone: u32, mana_stone: u32) -> Self {
        Self {
            gold,
            wood,
            stone,
            mana_stone,
        }
    }

    /// A bundle holding only gold.
    pub const fn gold(amount: u32) -> Self {
        Self::new(amount, 0, 0, 0)
    }

    /// Amount of a single resource.
    pub const fn get(&self, kind: ResourceKind) -> u32 {
        match kind {
            ResourceKind::Gold => self.gold,
            ResourceKind::Wood => self.wood,
            ResourceKind::Stone => self.stone,
            ResourceKind::ManaStone => self.mana_stone,
        }
    }

    /// Whether every component is zero.
    pub const fn is_empty(&self) -> bool {
        self.gold == 0 && self.wood == 0 && self.stone == 0 && self.mana_stone == 0
    }

    /// Multiply every component, saturating at `u32::MAX`.
    pub const fn scaled(&self, factor: u32) -> Self {
        Self {
            gold: self.gold.saturating_mul(factor),
            wood: self.wood.saturating_mul(factor),
            stone: self.stone.saturating_mul(factor),
            mana_stone: self.mana_stone.saturating_mul(factor),
        }
    }

    /// Component-wise sum, saturating at `u32::MAX`.
    pub const fn saturating_add(&self, other: &Self) -> Self {
        Self {
            gold: self.gold.saturating_add(other.gold),
            wood: self.wood.saturating_add(other.wood),
            stone: self.stone.saturating_add(other.stone),
            mana_stone: self.mana_stone.saturating_add(other.mana_stone),
        }
    }

    /// Whether `self` covers `cost` in every component.
    pub const fn covers(&self, cost: &Self) -> bool {
        self.gold >= cost.gold
            && self.wood >= cost.wood
            && self.stone >= cost.stone
            && self.mana_stone >= cost.mana_stone
    }

    /// Iterate over `(kind, amount)` pairs.
    pub fn entries(&self) -> [(ResourceKind, u32); 4] {
        [
            (ResourceKind::Gold, self.gold),
            (ResourceKind::Wood, self.wood),
            (ResourceKind::Stone, self.stone),
            (ResourceKind::ManaStone, self.mana_stone),
        ]
    }
}
