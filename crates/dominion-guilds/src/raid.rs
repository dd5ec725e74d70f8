//! Raid force generation.
//!
//! A raid pits the player's available units against a freshly generated
//! force for the target guild: four squads of six units, classes cycled
//! from the guild's preferred classes, levels spread two either side of the
//! guild's level.

use dominion_types::{UnitClass, UnitRef};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::guild::NpcGuild;

/// Squads per raid force.
pub const SQUADS_PER_FORCE: usize = 4;
/// Units per squad.
pub const UNITS_PER_SQUAD: usize = 6;
/// Level spread either side of the guild level.
pub const LEVEL_SPREAD: u32 = 2;

const FIRST_NAMES: [&str; 20] = [
    "Alex", "Blake", "Casey", "Drew", "Ellis", "Finn", "Gray", "Harper", "Iris", "Jay", "Kai",
    "Luna", "Max", "Nova", "Oak", "Phoenix", "Quinn", "River", "Sage", "Sky",
];

const TITLES: [&str; 10] = [
    "the Bold",
    "the Swift",
    "the Wise",
    "the Strong",
    "the Cunning",
    "the Brave",
    "the Mighty",
    "the Silent",
    "the Fierce",
    "the Noble",
];

/// Difficulty bracket of a generated force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DifficultyTier {
    /// Level below 5.
    Novice,
    /// Level below 10.
    Bronze,
    /// Level below 15.
    Silver,
    /// Level below 20.
    Gold,
    /// Level below 25.
    Platinum,
    /// Level below 30.
    Diamond,
    /// Level 30 and above.
    Legendary,
}

impl DifficultyTier {
    /// The tier for a guild level.
    pub const fn for_level(level: u32) -> Self {
        match level {
            0..5 => Self::Novice,
            5..10 => Self::Bronze,
            10..15 => Self::Silver,
            15..20 => Self::Gold,
            20..25 => Self::Platinum,
            25..30 => Self::Diamond,
            _ => Self::Legendary,
        }
    }
}

/// A generated raid opponent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaidForce {
    /// Difficulty bracket.
    pub tier: DifficultyTier,
    /// Units grouped by squad.
    pub squads: Vec<Vec<UnitRef>>,
}

impl RaidForce {
    /// Every unit across all squads.
    pub fn units(&self) -> Vec<UnitRef> {
        self.squads.iter().flatten().cloned().collect()
    }
}

/// Generate a raid force for `guild`.
pub fn generate_raid_force<R: Rng>(guild: &NpcGuild, rng: &mut R) -> RaidForce {
    let level = guild.level();
    let min_level = level.saturating_sub(LEVEL_SPREAD).max(1);
    let max_level = level.saturating_add(LEVEL_SPREAD);
    let classes: &[UnitClass] = if guild.preferred_classes().is_empty() {
        &[UnitClass::Warrior]
    } else {
        guild.preferred_classes()
    };

    let squads = (0..SQUADS_PER_FORCE)
        .map(|squad| {
            (0..UNITS_PER_SQUAD)
                .map(|slot| {
                    let index = squad.wrapping_add(slot).checked_rem(classes.len()).unwrap_or(0);
                    let class = classes
                        .get(index)
                        .copied()
                        .unwrap_or(UnitClass::Warrior);
                    UnitRef::new(
                        adventurer_name(rng),
                        class,
                        rng.random_range(min_level..=max_level),
                    )
                })
                .collect()
        })
        .collect();

    RaidForce {
        tier: DifficultyTier::for_level(level),
        squads,
    }
}

fn adventurer_name<R: Rng>(rng: &mut R) -> String {
    let first = FIRST_NAMES
        .get(rng.random_range(0..FIRST_NAMES.len()))
        .copied()
        .unwrap_or("Alex");
    if rng.random_range(0..10_u32) < 3 {
        let title = TITLES
            .get(rng.random_range(0..TITLES.len()))
            .copied()
            .unwrap_or("the Bold");
        format!("{first} {title}")
    } else {
        first.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use dominion_types::{GuildId, Personality, Specialization};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use rust_decimal::Decimal;

    use super::*;

    fn guild(level: u32) -> NpcGuild {
        NpcGuild::new(
            GuildId::from("guild_crystal_mages"),
            "Crystal Mages Society",
            level,
            Specialization::Magic,
            vec![UnitClass::Mage, UnitClass::Sage],
            Personality::new(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
        )
    }

    #[test]
    fn tiers_follow_level_brackets() {
        assert_eq!(DifficultyTier::for_level(1), DifficultyTier::Novice);
        assert_eq!(DifficultyTier::for_level(4), DifficultyTier::Novice);
        assert_eq!(DifficultyTier::for_level(5), DifficultyTier::Bronze);
        assert_eq!(DifficultyTier::for_level(14), DifficultyTier::Silver);
        assert_eq!(DifficultyTier::for_level(29), DifficultyTier::Diamond);
        assert_eq!(DifficultyTier::for_level(30), DifficultyTier::Legendary);
    }

    #[test]
    fn force_has_four_squads_of_six_within_level_band() {
        let mut rng = SmallRng::seed_from_u64(42);
        let force = generate_raid_force(&guild(7), &mut rng);
        assert_eq!(force.tier, DifficultyTier::Bronze);
        assert_eq!(force.squads.len(), SQUADS_PER_FORCE);
        assert!(force.squads.iter().all(|s| s.len() == UNITS_PER_SQUAD));
        let units = force.units();
        assert_eq!(units.len(), 24);
        assert!(units.iter().all(|u| (5..=9).contains(&u.level)));
        assert!(
            units
                .iter()
                .all(|u| matches!(u.class, UnitClass::Mage | UnitClass::Sage))
        );
    }

    #[test]
    fn low_levels_never_drop_below_one() {
        let mut rng = SmallRng::seed_from_u64(3);
        let force = generate_raid_force(&guild(1), &mut rng);
        assert!(force.units().iter().all(|u| (1..=3).contains(&u.level)));
    }
}
