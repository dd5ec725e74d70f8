//! Aggregate strength of a guild.
//!
//! The player guild's strength is its level times a fixed factor. An NPC
//! guild's strength is its cached Power. Anything else gets a fallback.

use dominion_types::GuildId;
use rust_decimal::Decimal;

use crate::collaborators::GuildFacts;
use crate::registry::NpcGuildRegistry;

/// Evaluates guild strength for battles and alliance checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrengthModel {
    player: GuildId,
    per_level: Decimal,
    fallback: Decimal,
}

impl StrengthModel {
    /// Default strength per player guild level.
    pub const DEFAULT_PER_LEVEL: u32 = 100;
    /// Default strength for guilds the model knows nothing about.
    pub const DEFAULT_FALLBACK: u32 = 100;

    /// Create a model for `player`.
    pub const fn new(player: GuildId, per_level: Decimal, fallback: Decimal) -> Self {
        Self {
            player,
            per_level,
            fallback,
        }
    }

    /// A model with the default factors.
    pub fn with_defaults(player: GuildId) -> Self {
        Self::new(
            player,
            Decimal::from(Self::DEFAULT_PER_LEVEL),
            Decimal::from(Self::DEFAULT_FALLBACK),
        )
    }

    /// The player guild.
    pub const fn player(&self) -> &GuildId {
        &self.player
    }

    /// Strength of the player guild.
    pub fn player_strength(&self, facts: &dyn GuildFacts) -> Decimal {
        facts
            .guild_level(&self.player)
            .map_or(self.fallback, |level| {
                Decimal::from(level).saturating_mul(self.per_level)
            })
    }

    /// Strength of any guild.
    pub fn strength_of(
        &self,
        guild: &GuildId,
        registry: &NpcGuildRegistry,
        facts: &dyn GuildFacts,
    ) -> Decimal {
        if guild == &self.player {
            return self.player_strength(facts);
        }
        registry
            .get(guild)
            .map_or(self.fallback, |g| Decimal::from(g.power()))
    }
}

#[cfg(test)]
mod tests {
    use dominion_types::{Personality, Specialization};

    use super::*;
    use crate::collaborators::StaticGuildFacts;
    use crate::guild::NpcGuild;

    #[test]
    fn strength_sources() {
        let player = GuildId::from("player_guild");
        let model = StrengthModel::with_defaults(player.clone());
        let mut facts = StaticGuildFacts::new();
        let mut registry = NpcGuildRegistry::new();
        registry.insert(NpcGuild::new(
            GuildId::from("guild_x"),
            "X",
            3,
            Specialization::Balanced,
            Vec::new(),
            Personality::new(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
        ));

        // Unknown player level falls back.
        assert_eq!(model.strength_of(&player, &registry, &facts), Decimal::from(100));
        facts.set_level(&player, 10);
        assert_eq!(model.strength_of(&player, &registry, &facts), Decimal::from(1000));
        assert_eq!(
            model.strength_of(&GuildId::from("guild_x"), &registry, &facts),
            Decimal::from(300)
        );
        assert_eq!(
            model.strength_of(&GuildId::from("stranger"), &registry, &facts),
            Decimal::from(100)
        );
    }
}
