//! Enumeration types for the Dominion simulation.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Territories
// ---------------------------------------------------------------------------

/// The kind of a capturable territory. Determines base income and bonuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TerritoryType {
    /// Small settlement scattered across empty map cells.
    Village,
    /// Major trade and recruitment hub.
    City,
    /// Fortified border position.
    Fortress,
    /// The single central capital.
    Capital,
    /// Crossroads and bridges with tactical value.
    Strategic,
    /// Mines, forests, quarries and springs producing secondary resources.
    Resource,
}

/// A bonus granted to the owning guild by a territory.
///
/// Magnitudes are fractions (`0.05` means +5%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TerritoryBonus {
    /// Gold production increase.
    GoldProduction,
    /// Secondary resource production increase.
    ResourceProduction,
    /// Adventurer recruitment odds increase.
    RecruitmentBonus,
    /// Experience gain increase.
    ExperienceBonus,
    /// Defense strength increase (also applied to the territory itself).
    DefenseBonus,
    /// Research speed increase.
    ResearchSpeed,
}

// ---------------------------------------------------------------------------
// Diplomacy
// ---------------------------------------------------------------------------

/// Discrete diplomatic standing derived from a relationship score.
///
/// Variants are declared in ascending order, so `Ord` comparisons such as
/// `level >= RelationshipLevel::Allied` follow the diplomatic ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RelationshipLevel {
    /// Score <= -750.
    Hostile,
    /// Score in (-750, -500].
    Unfriendly,
    /// Score in (-500, -250].
    Cold,
    /// Score in (-250, 250].
    Neutral,
    /// Score in (250, 500].
    Friendly,
    /// Score in (500, 750].
    Allied,
    /// Score > 750.
    Brotherhood,
}

impl RelationshipLevel {
    /// Map a relationship score onto its threshold bucket.
    pub const fn from_score(score: i32) -> Self {
        if score <= -750 {
            Self::Hostile
        } else if score <= -500 {
            Self::Unfriendly
        } else if score <= -250 {
            Self::Cold
        } else if score <= 250 {
            Self::Neutral
        } else if score <= 500 {
            Self::Friendly
        } else if score <= 750 {
            Self::Allied
        } else {
            Self::Brotherhood
        }
    }
}

/// A discrete diplomatic action the player guild can take toward an NPC guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DiplomaticAction {
    /// Send gold as a gift.
    SendGift,
    /// Share research; establishes a technology treaty on success.
    TechnologyExchange,
    /// Train adventurers together.
    JointTraining,
    /// Trade resources.
    ResourceTrade,
    /// Formalize a military alliance.
    MilitaryAlliance,
    /// Exchange culture for reputation.
    CulturalExchange,
    /// Covertly weaken the target's military.
    Sabotage,
    /// Attack the target directly; always declares war.
    Raid,
}

impl DiplomaticAction {
    /// All actions in declaration order.
    pub const ALL: [Self; 8] = [
        Self::SendGift,
        Self::TechnologyExchange,
        Self::JointTraining,
        Self::ResourceTrade,
        Self::MilitaryAlliance,
        Self::CulturalExchange,
        Self::Sabotage,
        Self::Raid,
    ];

    /// Whether the action is hostile. Hostile actions always cost standing.
    pub const fn is_hostile(self) -> bool {
        matches!(self, Self::Sabotage | Self::Raid)
    }

    /// Stable name used for action history and treaty records.
    pub const fn name(self) -> &'static str {
        match self {
            Self::SendGift => "SendGift",
            Self::TechnologyExchange => "TechnologyExchange",
            Self::JointTraining => "JointTraining",
            Self::ResourceTrade => "ResourceTrade",
            Self::MilitaryAlliance => "MilitaryAlliance",
            Self::CulturalExchange => "CulturalExchange",
            Self::Sabotage => "Sabotage",
            Self::Raid => "Raid",
        }
    }
}

// ---------------------------------------------------------------------------
// Guilds and units
// ---------------------------------------------------------------------------

/// The focus of an NPC guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Specialization {
    /// Warfare focused.
    Military,
    /// Commerce focused.
    Trade,
    /// Arcane research focused.
    Magic,
    /// No dominant focus.
    Balanced,
}

/// Adventurer class of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UnitClass {
    /// Frontline melee.
    Warrior,
    /// Armored melee.
    Knight,
    /// Ranged arcane damage.
    Mage,
    /// Healer.
    Priest,
    /// Stealth melee.
    Assassin,
    /// Ranged physical damage.
    Ranger,
    /// Support caster.
    Sage,
}

/// Guild buildings that gate diplomatic actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BuildingKind {
    /// Required (level 2+) for technology exchange.
    ResearchLab,
    /// Required for joint training.
    TrainingGround,
    /// Not used by the conquest engine; part of the guild facts surface.
    Barracks,
    /// Not used by the conquest engine; part of the guild facts surface.
    Market,
}

/// A storable resource in the player's treasury.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Currency.
    Gold,
    /// Building material.
    Wood,
    /// Building material.
    Stone,
    /// Magical reagent.
    ManaStone,
}

/// One of the two sides of a territory battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BattleSide {
    /// The challenging guild and its allies.
    Attacker,
    /// The owning guild, the garrison and its allies.
    Defender,
}

impl BattleSide {
    /// The other side.
    pub const fn opposite(self) -> Self {
        match self {
            Self::Attacker => Self::Defender,
            Self::Defender => Self::Attacker,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_thresholds_at_boundaries() {
        assert_eq!(RelationshipLevel::from_score(-1000), RelationshipLevel::Hostile);
        assert_eq!(RelationshipLevel::from_score(-751), RelationshipLevel::Hostile);
        assert_eq!(RelationshipLevel::from_score(-750), RelationshipLevel::Hostile);
        assert_eq!(RelationshipLevel::from_score(-749), RelationshipLevel::Unfriendly);
        assert_eq!(RelationshipLevel::from_score(-500), RelationshipLevel::Unfriendly);
        assert_eq!(RelationshipLevel::from_score(-499), RelationshipLevel::Cold);
        assert_eq!(RelationshipLevel::from_score(-250), RelationshipLevel::Cold);
        assert_eq!(RelationshipLevel::from_score(-249), RelationshipLevel::Neutral);
        assert_eq!(RelationshipLevel::from_score(0), RelationshipLevel::Neutral);
        assert_eq!(RelationshipLevel::from_score(250), RelationshipLevel::Neutral);
        assert_eq!(RelationshipLevel::from_score(251), RelationshipLevel::Friendly);
        assert_eq!(RelationshipLevel::from_score(500), RelationshipLevel::Friendly);
        assert_eq!(RelationshipLevel::from_score(501), RelationshipLevel::Allied);
        assert_eq!(RelationshipLevel::from_score(750), RelationshipLevel::Allied);
        assert_eq!(RelationshipLevel::from_score(751), RelationshipLevel::Brotherhood);
        assert_eq!(RelationshipLevel::from_score(1000), RelationshipLevel::Brotherhood);
    }

    #[test]
    fn levels_are_ordered_along_the_ladder() {
        assert!(RelationshipLevel::Brotherhood >= RelationshipLevel::Allied);
        assert!(RelationshipLevel::Friendly < RelationshipLevel::Allied);
        assert!(RelationshipLevel::Hostile < RelationshipLevel::Neutral);
    }

    #[test]
    fn only_sabotage_and_raid_are_hostile() {
        let hostile: Vec<_> = DiplomaticAction::ALL
            .into_iter()
            .filter(|a| a.is_hostile())
            .collect();
        assert_eq!(hostile, vec![DiplomaticAction::Sabotage, DiplomaticAction::Raid]);
    }
}
