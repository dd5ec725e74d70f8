//! Tunable parameters for diplomacy and strength evaluation.
//!
//! These mirror the `diplomacy` and `combat` sections of
//! `dominion-config.yaml`. The simulation core builds them from the loaded
//! configuration; tests use the defaults.

use chrono::TimeDelta;
use dominion_types::ResourceBundle;
use rust_decimal::Decimal;

/// Parameters for the diplomacy engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiplomacyRules {
    /// Minimum time between two actions toward the same guild (default: 1h).
    pub interaction_cooldown: TimeDelta,

    /// Idle time after which a relationship starts decaying (default: 7 days).
    pub decay_threshold: TimeDelta,

    /// Points moved toward zero per decay evaluation (default: 1).
    pub decay_amount: u32,

    /// Gift cost in gold per target guild level (default: 100).
    pub gift_gold_per_level: u32,

    /// Cost of a technology exchange (default: 50 mana stone).
    pub tech_exchange_cost: ResourceBundle,

    /// Research lab level needed for a technology exchange (default: 2).
    pub research_lab_level: u32,

    /// Training ground level needed for joint training (default: 1).
    pub training_ground_level: u32,

    /// What the player pays in a trade with a trade guild (default: 100 gold).
    pub trade_offer: ResourceBundle,

    /// What the player receives in that trade (default: 50 wood, 50 stone).
    pub trade_return: ResourceBundle,

    /// Reputation granted by a successful cultural exchange (default: 10).
    pub cultural_reputation: u32,

    /// Multiplier applied to a sabotaged guild's Power (default: 0.8).
    pub sabotage_power_factor: Decimal,
}

impl Default for DiplomacyRules {
    fn default() -> Self {
        Self {
            interaction_cooldown: TimeDelta::seconds(3600),
            decay_threshold: TimeDelta::days(7),
            decay_amount: 1,
            gift_gold_per_level: 100,
            tech_exchange_cost: ResourceBundle::new(0, 0, 0, 50),
            research_lab_level: 2,
            training_ground_level: 1,
            trade_offer: ResourceBundle::gold(100),
            trade_return: ResourceBundle::new(0, 50, 50, 0),
            cultural_reputation: 10,
            sabotage_power_factor: Decimal::new(8, 1),
        }
    }
}
