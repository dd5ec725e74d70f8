//! Scripted player that acts between ticks.
//!
//! After each territory tick the autopilot reports settled battles, then
//! attacks the weakest reachable territory when no player battle is
//! pending, invests in its least-developed territory when the treasury
//! allows, and every few ticks approaches a random NPC guild with an
//! action suited to the current standing.

use dominion_core::engine::{Engine, TerritoryTickSummary};
use dominion_core::runner::TickCallback;
use dominion_types::{BattleSide, DiplomaticAction, RelationshipLevel};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

/// Territory ticks between diplomatic approaches.
const DIPLOMACY_EVERY: u64 = 3;

/// Tick callback playing the player guild.
pub struct Autopilot {
    rng: StdRng,
}

impl Autopilot {
    /// Create an autopilot with its own seeded random source.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn attack<R: Rng>(engine: &mut Engine<R>) {
        let player = engine.player().clone();
        if engine
            .active_battles()
            .iter()
            .any(|b| b.attacker() == &player)
        {
            return;
        }
        let weakest = engine
            .attack_targets()
            .into_iter()
            .filter_map(|id| {
                engine
                    .scheduler()
                    .territory(&id)
                    .map(|t| (t.defense_strength(), id))
            })
            .min();
        let Some((defense, target)) = weakest else {
            return;
        };
        match engine.start_battle(&target) {
            Ok(battle) => info!(%battle, territory = %target, %defense, "Autopilot attacking"),
            Err(e) => debug!(territory = %target, error = %e, "Autopilot attack refused"),
        }
    }

    fn invest<R: Rng>(engine: &mut Engine<R>) {
        let candidate = engine
            .player_territories()
            .into_iter()
            .filter(|t| engine.ledger().can_afford(&t.development_cost()))
            .min_by_key(|t| t.development_level())
            .map(|t| t.id().clone());
        if let Some(id) = candidate {
            match engine.develop_territory(&id) {
                Ok(level) => info!(territory = %id, level, "Autopilot developed territory"),
                Err(e) => debug!(territory = %id, error = %e, "Autopilot development refused"),
            }
        }

        // Shore up any territory currently under attack.
        let threatened = engine
            .player_territories()
            .into_iter()
            .filter(|t| {
                engine
                    .scheduler()
                    .battle_for(t.id())
                    .is_some_and(|b| b.attacker() != engine.player())
            })
            .filter(|t| engine.ledger().can_afford(&t.defense_upgrade_cost()))
            .map(|t| t.id().clone())
            .next();
        if let Some(id) = threatened {
            match engine.upgrade_territory_defense(&id) {
                Ok(level) => info!(territory = %id, level, "Autopilot raised defenses"),
                Err(e) => debug!(territory = %id, error = %e, "Autopilot defense refused"),
            }
        }
    }

    fn negotiate<R: Rng>(&mut self, engine: &mut Engine<R>) {
        let guilds = engine.registry().ids();
        if guilds.is_empty() {
            return;
        }
        let Some(target) = guilds.get(self.rng.random_range(0..guilds.len())).cloned() else {
            return;
        };
        let standing = engine.diplomacy().relationship(&target);
        let level = standing.map_or(RelationshipLevel::Neutral, |r| r.level());
        let allied =
            standing.is_some_and(|r| r.has_treaty(DiplomaticAction::MilitaryAlliance.name()));

        let action = match level {
            RelationshipLevel::Hostile if self.rng.random_bool(0.5) => DiplomaticAction::Raid,
            RelationshipLevel::Hostile
            | RelationshipLevel::Unfriendly
            | RelationshipLevel::Cold => DiplomaticAction::SendGift,
            RelationshipLevel::Neutral => {
                if self.rng.random_bool(0.5) {
                    DiplomaticAction::CulturalExchange
                } else {
                    DiplomaticAction::SendGift
                }
            }
            RelationshipLevel::Friendly => {
                if self.rng.random_bool(0.5) {
                    DiplomaticAction::JointTraining
                } else {
                    DiplomaticAction::ResourceTrade
                }
            }
            RelationshipLevel::Allied | RelationshipLevel::Brotherhood if !allied => {
                DiplomaticAction::MilitaryAlliance
            }
            RelationshipLevel::Allied | RelationshipLevel::Brotherhood => {
                DiplomaticAction::TechnologyExchange
            }
        };

        match engine.execute_diplomacy(&target, action) {
            Ok(outcome) => info!(
                guild = %target,
                action = action.name(),
                success = outcome.success,
                score = outcome.score,
                level = ?outcome.level,
                "Autopilot diplomacy"
            ),
            Err(e) => debug!(
                guild = %target,
                action = action.name(),
                error = %e,
                "Autopilot diplomacy refused"
            ),
        }
    }
}

impl<R: Rng> TickCallback<R> for Autopilot {
    fn on_territory_tick(&mut self, summary: &TerritoryTickSummary, engine: &mut Engine<R>) {
        let player = engine.player().clone();
        for report in &summary.battles {
            let won = match report.winner {
                BattleSide::Attacker => report.attacker == player,
                BattleSide::Defender => report.defender.as_ref() == Some(&player),
            };
            let involved = report.attacker == player || report.defender.as_ref() == Some(&player);
            if involved {
                info!(
                    territory = %report.territory_id,
                    won,
                    attack = %report.strengths.attack,
                    defense = %report.strengths.defense,
                    "Player battle settled"
                );
            }
        }

        Self::attack(engine);
        Self::invest(engine);
        if summary.tick.checked_rem(DIPLOMACY_EVERY) == Some(0) {
            self.negotiate(engine);
        }
    }
}
