//! Engine binary for the Dominion simulation.
//!
//! This is the main entry point that wires together the generated world,
//! the NPC roster, the player's collaborators and the real-time tick loop.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `dominion-config.yaml` (or `DOMINION_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Generate the world and seat the guilds
//! 4. Spawn the event listener
//! 5. Run the simulation loop until the tick limit or Ctrl-C
//! 6. Log the result and the final standings

mod autopilot;
mod error;

use chrono::Utc;
use dominion_core::config::{LoggingConfig, SimulationConfig};
use dominion_core::engine::{Collaborators, Engine};
use dominion_core::runner::{self, ChannelSink, NoOpCallback};
use dominion_types::ConquestEvent;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::autopilot::Autopilot;
use crate::error::EngineError;

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if configuration, world generation or the simulation
/// loop fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let (config, from_file) = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!("dominion-engine starting");
    if !from_file {
        info!("Config file not found, using defaults");
    }
    info!(
        seed = config.world.seed,
        width = config.world.width,
        height = config.world.height,
        player = config.world.player_guild,
        income_interval_secs = config.timing.income_interval_secs,
        time_scale = config.timing.time_scale,
        "Configuration loaded"
    );

    // 3. Generate the world.
    let (sink, events) = ChannelSink::channel();
    let collaborators = Collaborators::in_memory(
        &config.world.player_guild_id(),
        config.world.player_level,
        config.world.starting_resources,
        Box::new(sink),
    );
    let mut engine = Engine::from_config(
        &config,
        Utc::now(),
        collaborators,
        StdRng::seed_from_u64(config.world.seed),
    )
    .map_err(EngineError::from)?;
    info!(
        territories = engine.scheduler().graph().len(),
        guilds = engine.registry().len(),
        player_territories = engine.player_territories().len(),
        "World generated"
    );

    // 4. Spawn the event listener.
    let listener = tokio::spawn(log_events(events));

    // 5. Run the simulation.
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Ctrl-C handler unavailable, running until tick limit");
            std::future::pending::<()>().await;
        }
    };
    let result = if config.simulation.autopilot {
        let mut autopilot = Autopilot::new(config.world.seed.wrapping_add(1));
        runner::run_simulation(
            &mut engine,
            &config.timing,
            &config.simulation,
            &mut autopilot,
            shutdown,
        )
        .await
    } else {
        runner::run_simulation(
            &mut engine,
            &config.timing,
            &config.simulation,
            &mut NoOpCallback,
            shutdown,
        )
        .await
    }
    .map_err(EngineError::from)?;

    // 6. Log results.
    runner::log_simulation_end(&result);
    log_standings(&engine);

    // Dropping the engine closes the event channel.
    drop(engine);
    if let Err(e) = listener.await {
        warn!(error = %e, "Event listener failed");
    }

    info!(
        end_reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        "dominion-engine shutdown complete"
    );
    Ok(())
}

/// Load the simulation configuration.
///
/// Returns the configuration and whether it came from a file. A missing
/// file falls back to the defaults.
fn load_config() -> Result<(SimulationConfig, bool), EngineError> {
    let path = SimulationConfig::path_from_env();
    if path.exists() {
        Ok((SimulationConfig::from_file(&path)?, true))
    } else {
        Ok((SimulationConfig::parse("")?, false))
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Log every simulation event as JSON until the channel closes.
async fn log_events(mut events: UnboundedReceiver<ConquestEvent>) {
    let mut count: u64 = 0;
    while let Some(event) = events.recv().await {
        count = count.saturating_add(1);
        match serde_json::to_string(&event) {
            Ok(payload) => info!(event = event.label(), %payload, "Simulation event"),
            Err(e) => warn!(event = event.label(), error = %e, "Event not serializable"),
        }
    }
    info!(count, "Event stream closed");
}

fn log_standings<R: rand::Rng>(engine: &Engine<R>) {
    let balance = engine.ledger().balance();
    info!(
        territories = engine.player_territories().len(),
        gold = balance.gold,
        wood = balance.wood,
        stone = balance.stone,
        mana_stone = balance.mana_stone,
        allies = engine.allied_guilds().len(),
        enemies = engine.hostile_guilds().len(),
        battles_fought = engine.battle_history().len(),
        game_time = %engine.now(),
        "Player standings"
    );
    for guild in engine.registry().iter() {
        info!(
            guild = %guild.id(),
            name = guild.name(),
            territories = guild.territory_count(),
            power = guild.power(),
            standing = ?engine.diplomacy().relationship(guild.id()).map(|r| r.level()),
            "NPC standings"
        );
    }
}
