//! Configuration loading and typed config structures for the Dominion simulation.
//!
//! The canonical configuration lives in `dominion-config.yaml` at the project
//! root. This module defines strongly-typed structs that mirror the YAML
//! structure, a loader that reads and validates the file, and conversions
//! into the plain rule structs the domain crates consume.

use std::path::{Path, PathBuf};

use chrono::TimeDelta;
use dominion_guilds::{DiplomacyRules, StrengthModel};
use dominion_types::{GuildId, ResourceBundle};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

use crate::scheduler::ConquestRules;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "dominion-config.yaml";

/// Environment variable overriding the configuration file path.
pub const CONFIG_PATH_ENV: &str = "DOMINION_CONFIG";

/// Environment variable overriding `world.seed`.
pub const SEED_ENV: &str = "DOMINION_SEED";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value is out of its allowed range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `dominion-config.yaml`. Every field has a
/// default, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// Map, seed and player settings.
    #[serde(default)]
    pub world: WorldConfig,

    /// Timer intervals and battle preparation.
    #[serde(default)]
    pub timing: TimingConfig,

    /// Battle resolution and development constants.
    #[serde(default)]
    pub combat: CombatConfig,

    /// Diplomacy tunables.
    #[serde(default)]
    pub diplomacy: DiplomacyConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Run boundaries.
    #[serde(default)]
    pub simulation: SimulationBoundsConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `DOMINION_SEED` overrides `world.seed` when set to a valid integer.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// The configuration path: `DOMINION_CONFIG` if set, otherwise
    /// [`DEFAULT_CONFIG_PATH`].
    pub fn path_from_env() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
    }

    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(SEED_ENV) {
            match val.parse::<u64>() {
                Ok(seed) => self.world.seed = seed,
                Err(e) => warn!(value = %val, error = %e, "Ignoring invalid {SEED_ENV}"),
            }
        }
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| {
            Err(ConfigError::Invalid {
                reason: reason.to_owned(),
            })
        };
        if self.world.width <= 0 || self.world.height <= 0 {
            return invalid("world.width and world.height must be positive");
        }
        if self.world.village_fill_probability < Decimal::ZERO
            || self.world.village_fill_probability > Decimal::ONE
        {
            return invalid("world.village_fill_probability must be within 0..=1");
        }
        if self.timing.income_interval_secs == 0 || self.timing.decay_interval_secs == 0 {
            return invalid("timing intervals must be at least 1 second");
        }
        if self.timing.time_scale == 0 {
            return invalid("timing.time_scale must be at least 1");
        }
        if self.combat.defender_advantage < Decimal::ONE {
            return invalid("combat.defender_advantage must be at least 1");
        }
        Ok(())
    }

    /// Battle and development rules for the conquest scheduler.
    pub fn conquest_rules(&self) -> ConquestRules {
        ConquestRules {
            preparation: seconds(self.timing.battle_preparation_secs),
            ally_contribution: self.combat.ally_contribution,
            defender_advantage: self.combat.defender_advantage,
            development_growth: self.combat.development_growth,
        }
    }

    /// Strength model for the configured player guild.
    pub fn strength_model(&self) -> StrengthModel {
        StrengthModel::new(
            self.world.player_guild_id(),
            Decimal::from(self.combat.player_strength_per_level),
            Decimal::from(self.combat.fallback_strength),
        )
    }
}

/// Convert whole seconds to a [`TimeDelta`], saturating at its maximum.
fn seconds(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

/// World configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Random seed for reproducibility.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Map width in cells.
    #[serde(default = "default_width")]
    pub width: i32,

    /// Map height in cells.
    #[serde(default = "default_height")]
    pub height: i32,

    /// Chance that an empty cell receives a village.
    #[serde(default = "default_village_fill_probability")]
    pub village_fill_probability: Decimal,

    /// Id of the player guild.
    #[serde(default = "default_player_guild")]
    pub player_guild: String,

    /// Starting level of the player guild.
    #[serde(default = "default_player_level")]
    pub player_level: u32,

    /// Starting treasury of the player guild.
    #[serde(default = "default_starting_resources")]
    pub starting_resources: ResourceBundle,
}

impl WorldConfig {
    /// The player guild id.
    pub fn player_guild_id(&self) -> GuildId {
        GuildId::new(self.player_guild.clone())
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            width: default_width(),
            height: default_height(),
            village_fill_probability: default_village_fill_probability(),
            player_guild: default_player_guild(),
            player_level: default_player_level(),
            starting_resources: default_starting_resources(),
        }
    }
}

/// Timer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TimingConfig {
    /// Game seconds between a challenge and its resolution.
    #[serde(default = "default_battle_preparation_secs")]
    pub battle_preparation_secs: u64,

    /// Real seconds between territory ticks (income and battle resolution).
    #[serde(default = "default_income_interval_secs")]
    pub income_interval_secs: u64,

    /// Real seconds between relationship decay evaluations.
    #[serde(default = "default_decay_interval_secs")]
    pub decay_interval_secs: u64,

    /// Game seconds per real second.
    #[serde(default = "default_time_scale")]
    pub time_scale: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            battle_preparation_secs: default_battle_preparation_secs(),
            income_interval_secs: default_income_interval_secs(),
            decay_interval_secs: default_decay_interval_secs(),
            time_scale: default_time_scale(),
        }
    }
}

/// Battle resolution and development constants.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CombatConfig {
    /// Share of an ally's strength added to its side.
    #[serde(default = "default_ally_contribution")]
    pub ally_contribution: Decimal,

    /// Multiplier applied to the defending side's total.
    #[serde(default = "default_defender_advantage")]
    pub defender_advantage: Decimal,

    /// Production and bonus multiplier per development level.
    #[serde(default = "default_development_growth")]
    pub development_growth: Decimal,

    /// Player guild strength per guild level.
    #[serde(default = "default_strength_per_level")]
    pub player_strength_per_level: u32,

    /// Strength assumed for guilds with no known level or Power.
    #[serde(default = "default_fallback_strength")]
    pub fallback_strength: u32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            ally_contribution: default_ally_contribution(),
            defender_advantage: default_defender_advantage(),
            development_growth: default_development_growth(),
            player_strength_per_level: default_strength_per_level(),
            fallback_strength: default_fallback_strength(),
        }
    }
}

/// Diplomacy tunables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DiplomacyConfig {
    /// Minimum game seconds between two actions toward one guild.
    #[serde(default = "default_interaction_cooldown_secs")]
    pub interaction_cooldown_secs: u64,

    /// Idle game days before a relationship starts decaying.
    #[serde(default = "default_decay_threshold_days")]
    pub decay_threshold_days: u64,

    /// Points moved toward neutral per decay evaluation.
    #[serde(default = "default_decay_amount")]
    pub decay_amount: u32,

    /// Gift cost in gold per target guild level.
    #[serde(default = "default_gift_gold_per_level")]
    pub gift_gold_per_level: u32,

    /// Mana stone cost of a technology exchange.
    #[serde(default = "default_tech_exchange_mana")]
    pub tech_exchange_mana: u32,

    /// Research lab level needed for a technology exchange.
    #[serde(default = "default_research_lab_level")]
    pub research_lab_level: u32,

    /// Training ground level needed for joint training.
    #[serde(default = "default_training_ground_level")]
    pub training_ground_level: u32,

    /// Gold paid in a trade with a trade guild.
    #[serde(default = "default_trade_offer_gold")]
    pub trade_offer_gold: u32,

    /// Wood and stone (each) received in that trade.
    #[serde(default = "default_trade_return_each")]
    pub trade_return_each: u32,

    /// Reputation granted by a successful cultural exchange.
    #[serde(default = "default_cultural_reputation")]
    pub cultural_reputation: u32,

    /// Multiplier applied to a sabotaged guild's Power.
    #[serde(default = "default_sabotage_power_factor")]
    pub sabotage_power_factor: Decimal,
}

impl DiplomacyConfig {
    /// Rules for the diplomacy engine.
    pub fn to_rules(&self) -> DiplomacyRules {
        let days = i64::try_from(self.decay_threshold_days)
            .ok()
            .and_then(TimeDelta::try_days)
            .unwrap_or(TimeDelta::MAX);
        DiplomacyRules {
            interaction_cooldown: seconds(self.interaction_cooldown_secs),
            decay_threshold: days,
            decay_amount: self.decay_amount,
            gift_gold_per_level: self.gift_gold_per_level,
            tech_exchange_cost: ResourceBundle::new(0, 0, 0, self.tech_exchange_mana),
            research_lab_level: self.research_lab_level,
            training_ground_level: self.training_ground_level,
            trade_offer: ResourceBundle::gold(self.trade_offer_gold),
            trade_return: ResourceBundle::new(
                0,
                self.trade_return_each,
                self.trade_return_each,
                0,
            ),
            cultural_reputation: self.cultural_reputation,
            sabotage_power_factor: self.sabotage_power_factor,
        }
    }
}

impl Default for DiplomacyConfig {
    fn default() -> Self {
        Self {
            interaction_cooldown_secs: default_interaction_cooldown_secs(),
            decay_threshold_days: default_decay_threshold_days(),
            decay_amount: default_decay_amount(),
            gift_gold_per_level: default_gift_gold_per_level(),
            tech_exchange_mana: default_tech_exchange_mana(),
            research_lab_level: default_research_lab_level(),
            training_ground_level: default_training_ground_level(),
            trade_offer_gold: default_trade_offer_gold(),
            trade_return_each: default_trade_return_each(),
            cultural_reputation: default_cultural_reputation(),
            sabotage_power_factor: default_sabotage_power_factor(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error), used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Run boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationBoundsConfig {
    /// Stop after this many territory ticks (0 = unlimited).
    #[serde(default)]
    pub max_ticks: u64,

    /// Let the binary play the player guild automatically.
    #[serde(default = "default_true")]
    pub autopilot: bool,
}

impl Default for SimulationBoundsConfig {
    fn default() -> Self {
        Self {
            max_ticks: 0,
            autopilot: default_true(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (required by serde)
// ---------------------------------------------------------------------------

const fn default_seed() -> u64 {
    42
}

const fn default_width() -> i32 {
    dominion_world::DEFAULT_WIDTH
}

const fn default_height() -> i32 {
    dominion_world::DEFAULT_HEIGHT
}

fn default_village_fill_probability() -> Decimal {
    Decimal::new(3, 1)
}

fn default_player_guild() -> String {
    "player_guild".to_owned()
}

const fn default_player_level() -> u32 {
    10
}

const fn default_starting_resources() -> ResourceBundle {
    ResourceBundle::new(5000, 1000, 1000, 200)
}

const fn default_battle_preparation_secs() -> u64 {
    86_400
}

const fn default_income_interval_secs() -> u64 {
    300
}

const fn default_decay_interval_secs() -> u64 {
    60
}

const fn default_time_scale() -> u32 {
    1
}

fn default_ally_contribution() -> Decimal {
    Decimal::new(5, 1)
}

fn default_defender_advantage() -> Decimal {
    Decimal::new(12, 1)
}

fn default_development_growth() -> Decimal {
    Decimal::new(12, 1)
}

const fn default_strength_per_level() -> u32 {
    StrengthModel::DEFAULT_PER_LEVEL
}

const fn default_fallback_strength() -> u32 {
    StrengthModel::DEFAULT_FALLBACK
}

const fn default_interaction_cooldown_secs() -> u64 {
    3600
}

const fn default_decay_threshold_days() -> u64 {
    7
}

const fn default_decay_amount() -> u32 {
    1
}

const fn default_gift_gold_per_level() -> u32 {
    100
}

const fn default_tech_exchange_mana() -> u32 {
    50
}

const fn default_research_lab_level() -> u32 {
    2
}

const fn default_training_ground_level() -> u32 {
    1
}

const fn default_trade_offer_gold() -> u32 {
    100
}

const fn default_trade_return_each() -> u32 {
    50
}

const fn default_cultural_reputation() -> u32 {
    10
}

fn default_sabotage_power_factor() -> Decimal {
    Decimal::new(8, 1)
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.world.seed, 42);
        assert_eq!(config.world.width, 10);
        assert_eq!(config.timing.battle_preparation_secs, 86_400);
        assert_eq!(config.combat.defender_advantage, dec!(1.2));
        assert_eq!(config.diplomacy.to_rules(), DiplomacyRules::default());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
world:
  seed: 123
  width: 12
  height: 8
  village_fill_probability: "0.5"
  player_guild: "guild_hero"
  player_level: 4
  starting_resources:
    gold: 100
    wood: 0
    stone: 0
    mana_stone: 0

timing:
  battle_preparation_secs: 3600
  income_interval_secs: 10
  decay_interval_secs: 5
  time_scale: 60

combat:
  ally_contribution: "0.25"
  defender_advantage: "1.5"
  development_growth: "1.1"
  player_strength_per_level: 50
  fallback_strength: 10

diplomacy:
  interaction_cooldown_secs: 60
  decay_threshold_days: 3
  decay_amount: 5
  sabotage_power_factor: "0.5"

logging:
  level: "debug"
  json: true

simulation:
  max_ticks: 20
  autopilot: false
"#;

        let config = SimulationConfig::parse(yaml).unwrap();
        assert_eq!(config.world.width, 12);
        assert_eq!(config.world.player_guild_id(), GuildId::from("guild_hero"));
        assert_eq!(config.world.starting_resources, ResourceBundle::gold(100));
        assert_eq!(config.timing.time_scale, 60);
        assert_eq!(config.combat.ally_contribution, dec!(0.25));
        assert!(config.logging.json);
        assert_eq!(config.simulation.max_ticks, 20);
        assert!(!config.simulation.autopilot);

        let rules = config.conquest_rules();
        assert_eq!(rules.preparation, TimeDelta::hours(1));
        assert_eq!(rules.defender_advantage, dec!(1.5));

        let diplomacy = config.diplomacy.to_rules();
        assert_eq!(diplomacy.interaction_cooldown, TimeDelta::minutes(1));
        assert_eq!(diplomacy.decay_threshold, TimeDelta::days(3));
        assert_eq!(diplomacy.decay_amount, 5);
        // Unspecified fields keep their defaults.
        assert_eq!(diplomacy.gift_gold_per_level, 100);
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = SimulationConfig::parse("timing:\n  time_scale: 5\n").unwrap();
        assert_eq!(config.timing.time_scale, 5);
        assert_eq!(config.timing.income_interval_secs, 300);
        assert_eq!(config.world.player_level, 10);
    }

    #[test]
    fn parse_empty_yaml() {
        let config = SimulationConfig::parse("");
        assert!(config.is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let result = SimulationConfig::parse("timing:\n  time_scale: 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
        let result = SimulationConfig::parse("world:\n  village_fill_probability: \"1.5\"\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join(DEFAULT_CONFIG_PATH);
        if path.exists() {
            let config = SimulationConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
