//! Real-time simulation loop.
//!
//! [`run_simulation`] drives the two periodic ticks on tokio timers:
//!
//! - **Territory tick** (every `income_interval_secs`): pay income, resolve
//!   due battles, then hand the summary to the [`TickCallback`].
//! - **Diplomacy tick** (every `decay_interval_secs`): decay idle
//!   relationships.
//!
//! Before every tick the game clock is advanced by the real time elapsed
//! since the previous tick multiplied by `time_scale`, so a 24 hour battle
//! preparation can play out in seconds. The loop stops after `max_ticks`
//! territory ticks (0 = unbounded) or when the shutdown future completes.
//!
//! [`ChannelSink`] forwards engine events onto a tokio channel so a separate
//! task can consume them.

use std::future::Future;

use chrono::TimeDelta;
use dominion_guilds::EventSink;
use dominion_types::ConquestEvent;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::clock::ClockError;
use crate::config::{SimulationBoundsConfig, TimingConfig};
use crate::engine::{DiplomacyTickSummary, Engine, TerritoryTickSummary};

/// Errors that can occur during the simulation run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The game clock rejected a step.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// Scaled elapsed time does not fit a game-time step.
    #[error("scaled step out of range: {real:?} x {scale}")]
    StepOutOfRange {
        /// Real time elapsed since the previous tick.
        real: Duration,
        /// The configured time scale.
        scale: u32,
    },
}

/// Why the simulation loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationEndReason {
    /// The configured number of territory ticks ran.
    MaxTicksReached,
    /// The shutdown signal fired.
    Shutdown,
}

/// Result of the simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    /// The reason the simulation ended.
    pub end_reason: SimulationEndReason,
    /// The last territory tick summary, if any tick completed.
    pub final_summary: Option<TerritoryTickSummary>,
    /// Territory ticks executed.
    pub total_ticks: u64,
    /// Diplomacy ticks executed.
    pub decay_ticks: u64,
}

/// Hook invoked after each tick.
///
/// The callback gets mutable access to the engine, so it can act on behalf
/// of the player between ticks.
pub trait TickCallback<R: Rng> {
    /// Called after a territory tick.
    fn on_territory_tick(&mut self, summary: &TerritoryTickSummary, engine: &mut Engine<R>);

    /// Called after a diplomacy tick.
    fn on_diplomacy_tick(&mut self, _summary: &DiplomacyTickSummary, _engine: &mut Engine<R>) {}
}

/// A no-op tick callback.
pub struct NoOpCallback;

impl<R: Rng> TickCallback<R> for NoOpCallback {
    fn on_territory_tick(&mut self, _summary: &TerritoryTickSummary, _engine: &mut Engine<R>) {}
}

// ---------------------------------------------------------------------------
// Event forwarding
// ---------------------------------------------------------------------------

/// Event sink that forwards onto an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ConquestEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver that drains it.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ConquestEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn publish(&mut self, event: ConquestEvent) {
        if let Err(e) = self.tx.send(event) {
            debug!(event = e.0.label(), "Event receiver dropped");
        }
    }
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

fn ticker(every_secs: u64) -> tokio::time::Interval {
    let period = Duration::from_secs(every_secs.max(1));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick one period from now rather than immediately.
    interval.reset();
    interval
}

/// Move game time forward by the real time since `last`, scaled.
fn sync_clock<R: Rng>(
    engine: &mut Engine<R>,
    last: &mut Instant,
    scale: u32,
) -> Result<(), RunnerError> {
    let now = Instant::now();
    let real = now.saturating_duration_since(*last);
    *last = now;
    let step = real
        .checked_mul(scale)
        .and_then(|scaled| TimeDelta::from_std(scaled).ok())
        .ok_or(RunnerError::StepOutOfRange { real, scale })?;
    engine.advance(step)?;
    Ok(())
}

/// Run the simulation loop until a termination condition is met.
///
/// # Errors
///
/// Returns [`RunnerError`] if the game clock cannot be advanced.
pub async fn run_simulation<R: Rng>(
    engine: &mut Engine<R>,
    timing: &TimingConfig,
    bounds: &SimulationBoundsConfig,
    callback: &mut dyn TickCallback<R>,
    shutdown: impl Future<Output = ()>,
) -> Result<SimulationResult, RunnerError> {
    let mut income = ticker(timing.income_interval_secs);
    let mut decay = ticker(timing.decay_interval_secs);
    let mut last = Instant::now();
    let mut last_summary: Option<TerritoryTickSummary> = None;
    let mut total_ticks: u64 = 0;
    let mut decay_ticks: u64 = 0;
    tokio::pin!(shutdown);

    info!(
        max_ticks = bounds.max_ticks,
        income_interval_secs = timing.income_interval_secs,
        decay_interval_secs = timing.decay_interval_secs,
        time_scale = timing.time_scale,
        "Simulation starting"
    );

    let end_reason = loop {
        tokio::select! {
            biased;

            () = &mut shutdown => {
                info!("Shutdown requested");
                break SimulationEndReason::Shutdown;
            }

            _ = income.tick() => {
                sync_clock(engine, &mut last, timing.time_scale)?;
                let summary = engine.territory_tick();
                total_ticks = total_ticks.saturating_add(1);
                callback.on_territory_tick(&summary, engine);
                last_summary = Some(summary);

                if bounds.max_ticks > 0 && total_ticks >= bounds.max_ticks {
                    info!(total_ticks, max_ticks = bounds.max_ticks, "Tick limit reached");
                    break SimulationEndReason::MaxTicksReached;
                }
            }

            _ = decay.tick() => {
                sync_clock(engine, &mut last, timing.time_scale)?;
                let summary = engine.diplomacy_tick();
                decay_ticks = decay_ticks.saturating_add(1);
                if summary.decayed > 0 {
                    debug!(decayed = summary.decayed, "Relationships decayed");
                }
                callback.on_diplomacy_tick(&summary, engine);
            }
        }
    };

    Ok(SimulationResult {
        end_reason,
        final_summary: last_summary,
        total_ticks,
        decay_ticks,
    })
}

/// Log the simulation end sequence.
pub fn log_simulation_end(result: &SimulationResult) {
    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        decay_ticks = result.decay_ticks,
        final_tick = result.final_summary.as_ref().map(|s| s.tick),
        "Simulation ended"
    );

    if let Some(ref summary) = result.final_summary {
        info!(
            tick = summary.tick,
            at = %summary.at,
            gold = summary.income.gold,
            battles = summary.battles.len(),
            "Final tick summary"
        );
    } else {
        warn!("Simulation ended with no ticks executed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use chrono::{DateTime, Utc};
    use dominion_guilds::NullSink;
    use dominion_types::GuildId;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::config::SimulationConfig;
    use crate::engine::Collaborators;

    fn engine_with(sink: Box<dyn EventSink>) -> Engine<SmallRng> {
        let config = SimulationConfig::default();
        let collaborators = Collaborators::in_memory(
            &config.world.player_guild_id(),
            config.world.player_level,
            config.world.starting_resources,
            sink,
        );
        Engine::from_config(
            &config,
            DateTime::<Utc>::UNIX_EPOCH,
            collaborators,
            SmallRng::seed_from_u64(42),
        )
        .unwrap()
    }

    fn timing(income: u64, decay: u64, scale: u32) -> TimingConfig {
        TimingConfig {
            battle_preparation_secs: 86_400,
            income_interval_secs: income,
            decay_interval_secs: decay,
            time_scale: scale,
        }
    }

    fn bounds(max_ticks: u64) -> SimulationBoundsConfig {
        SimulationBoundsConfig {
            max_ticks,
            autopilot: false,
        }
    }

    #[derive(Default)]
    struct Counting {
        territory: u64,
        diplomacy: u64,
    }

    impl TickCallback<SmallRng> for Counting {
        fn on_territory_tick(&mut self, summary: &TerritoryTickSummary, _: &mut Engine<SmallRng>) {
            self.territory += 1;
            assert_eq!(summary.tick, self.territory);
        }

        fn on_diplomacy_tick(&mut self, _: &DiplomacyTickSummary, _: &mut Engine<SmallRng>) {
            self.diplomacy += 1;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_by_max_ticks() {
        let mut engine = engine_with(Box::new(NullSink));
        let mut cb = Counting::default();

        let result = run_simulation(
            &mut engine,
            &timing(300, 60, 1),
            &bounds(3),
            &mut cb,
            std::future::pending(),
        )
        .await
        .unwrap();

        assert_eq!(result.end_reason, SimulationEndReason::MaxTicksReached);
        assert_eq!(result.total_ticks, 3);
        assert_eq!(cb.territory, 3);
        assert_eq!(result.final_summary.unwrap().tick, 3);
        assert_eq!(engine.territory_ticks(), 3);
        assert_eq!(engine.clock().elapsed(), TimeDelta::seconds(900));
        // Decay fires at 60..=840; the tick at 900 loses to the income branch.
        assert_eq!(result.decay_ticks, 14);
        assert_eq!(cb.diplomacy, 14);
    }

    #[tokio::test(start_paused = true)]
    async fn time_scale_accelerates_game_time() {
        let mut engine = engine_with(Box::new(NullSink));
        let result = run_simulation(
            &mut engine,
            &timing(10, 3600, 60),
            &bounds(2),
            &mut NoOpCallback,
            std::future::pending(),
        )
        .await
        .unwrap();

        assert_eq!(result.total_ticks, 2);
        assert_eq!(engine.clock().elapsed(), TimeDelta::seconds(1200));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_before_any_tick() {
        let mut engine = engine_with(Box::new(NullSink));
        let result = run_simulation(
            &mut engine,
            &timing(300, 60, 1),
            &bounds(0),
            &mut NoOpCallback,
            std::future::ready(()),
        )
        .await
        .unwrap();

        assert_eq!(result.end_reason, SimulationEndReason::Shutdown);
        assert_eq!(result.total_ticks, 0);
        assert!(result.final_summary.is_none());
        assert_eq!(engine.clock().elapsed(), TimeDelta::zero());
    }

    #[tokio::test(start_paused = true)]
    async fn battles_resolve_under_accelerated_time() {
        let (sink, mut rx) = ChannelSink::channel();
        let mut engine = engine_with(Box::new(sink));

        // Make sure the player borders someone.
        let player = engine.player().clone();
        let graph = engine.scheduler().graph();
        let frontier = graph
            .iter()
            .find(|t| {
                t.adjacent()
                    .iter()
                    .filter_map(|n| graph.get(n))
                    .any(|n| !n.is_owned_by(&player))
            })
            .map(|t| t.id().clone())
            .unwrap();
        engine.assign_territory(&frontier, &player).unwrap();
        while rx.try_recv().is_ok() {}

        let target = engine.attack_targets().into_iter().next().unwrap();
        engine.start_battle(&target).unwrap();

        // One game hour per real second, ticks every hour of real time.
        let result = run_simulation(
            &mut engine,
            &timing(3600, 3600, 24),
            &bounds(1),
            &mut NoOpCallback,
            std::future::pending(),
        )
        .await
        .unwrap();

        let summary = result.final_summary.unwrap();
        assert_eq!(summary.battles.len(), 1);
        assert!(engine.active_battles().is_empty());

        let mut labels = Vec::new();
        while let Ok(event) = rx.try_recv() {
            labels.push(event.label());
        }
        assert!(labels.contains(&"territory_battle_started"));
        assert!(labels.contains(&"territory_battle_ended"));
    }

    #[test]
    fn channel_sink_survives_dropped_receiver() {
        let (mut sink, rx) = ChannelSink::channel();
        drop(rx);
        sink.publish(ConquestEvent::WarDeclared {
            guild: GuildId::new("guild_iron_wolves"),
        });
    }
}
