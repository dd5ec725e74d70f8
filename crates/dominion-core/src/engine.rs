//! The simulation engine: single owner of all conquest and diplomacy state.
//!
//! [`Engine`] bundles the game clock, the [`ConquestScheduler`], the
//! [`DiplomacyEngine`], the NPC registry and the injected collaborators.
//! Every mutation goes through `&mut Engine`, which serializes the territory
//! tick, the diplomacy tick and explicit player actions without locks.
//!
//! The engine is generic over its random source so tests can seed it.

use chrono::{DateTime, TimeDelta, Utc};
use dominion_guilds::{
    ActionContext, ActionOutcome, BattleResolver, DiplomacyEngine, DiplomacyError, EventSink,
    GuildFacts, LevelSumResolver, NpcGuildRegistry, ResourceLedger, StaticGuildFacts, Treasury,
    standard_roster,
};
use dominion_types::{
    BattleId, BattleSide, DiplomaticAction, GridPos, GuildId, RelationshipLevel, ResourceBundle,
    TerritoryBattle, TerritoryBonus, TerritoryId, UnitRef,
};
use dominion_world::{Territory, WorldError, build_graph, standard_layout};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::clock::{ClockError, GameClock};
use crate::config::SimulationConfig;
use crate::scheduler::{BattleReport, ConquestContext, ConquestError, ConquestScheduler};

/// Systems the engine talks to but does not own.
pub struct Collaborators {
    /// The player's treasury.
    pub ledger: Box<dyn ResourceLedger>,
    /// Guild levels, units and buildings.
    pub facts: Box<dyn GuildFacts>,
    /// Unit combat for raids.
    pub resolver: Box<dyn BattleResolver>,
    /// Notification sink.
    pub sink: Box<dyn EventSink>,
}

impl Collaborators {
    /// In-memory collaborators for a player guild at `level` holding
    /// `treasury`.
    pub fn in_memory(
        player: &GuildId,
        level: u32,
        treasury: ResourceBundle,
        sink: Box<dyn EventSink>,
    ) -> Self {
        let mut facts = StaticGuildFacts::new();
        facts.set_level(player, level);
        Self {
            ledger: Box::new(Treasury::new(treasury)),
            facts: Box::new(facts),
            resolver: Box::new(LevelSumResolver),
            sink,
        }
    }
}

/// Result of one territory tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerritoryTickSummary {
    /// Territory tick number (1-based).
    pub tick: u64,
    /// Game time of the tick.
    pub at: DateTime<Utc>,
    /// Income credited to the player.
    pub income: ResourceBundle,
    /// Battles settled this tick.
    pub battles: Vec<BattleReport>,
}

/// Result of one diplomacy tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiplomacyTickSummary {
    /// Game time of the tick.
    pub at: DateTime<Utc>,
    /// Relationships that decayed.
    pub decayed: u32,
}

/// The whole simulation.
pub struct Engine<R: Rng> {
    clock: GameClock,
    scheduler: ConquestScheduler,
    diplomacy: DiplomacyEngine,
    registry: NpcGuildRegistry,
    collaborators: Collaborators,
    rng: R,
    territory_ticks: u64,
}

/// Borrow the pieces a conquest operation needs.
fn conquest_context<'a>(
    now: DateTime<Utc>,
    registry: &'a mut NpcGuildRegistry,
    diplomacy: &'a DiplomacyEngine,
    collaborators: &'a mut Collaborators,
) -> ConquestContext<'a> {
    ConquestContext {
        now,
        registry,
        relations: diplomacy.book(),
        facts: &*collaborators.facts,
        ledger: &mut *collaborators.ledger,
        sink: &mut *collaborators.sink,
    }
}

impl<R: Rng> Engine<R> {
    /// Assemble an engine from prepared parts.
    pub const fn new(
        clock: GameClock,
        scheduler: ConquestScheduler,
        diplomacy: DiplomacyEngine,
        registry: NpcGuildRegistry,
        collaborators: Collaborators,
        rng: R,
    ) -> Self {
        Self {
            clock,
            scheduler,
            diplomacy,
            registry,
            collaborators,
            rng,
            territory_ticks: 0,
        }
    }

    /// Generate a world from configuration.
    ///
    /// Builds the standard map with scattered villages, rolls the NPC
    /// roster, seats NPC guilds on capitals and cities, hands out half of
    /// the remaining territories, and grants the player one unclaimed
    /// territory.
    ///
    /// # Errors
    ///
    /// Returns a [`WorldError`] if the configured map cannot hold the
    /// standard layout.
    pub fn from_config(
        config: &SimulationConfig,
        start: DateTime<Utc>,
        collaborators: Collaborators,
        mut rng: R,
    ) -> Result<Self, WorldError> {
        let graph = build_graph(
            config.world.width,
            config.world.height,
            &standard_layout(),
            config.world.village_fill_probability,
            &mut rng,
        )?;
        let registry = standard_roster(&mut rng);
        let strength = config.strength_model();
        let scheduler = ConquestScheduler::new(graph, config.conquest_rules(), strength.clone());
        let diplomacy = DiplomacyEngine::new(config.diplomacy.to_rules(), strength);

        let mut engine = Self::new(
            GameClock::new(start),
            scheduler,
            diplomacy,
            registry,
            collaborators,
            rng,
        );
        engine.seed_ownership();
        Ok(engine)
    }

    fn seed_ownership(&mut self) {
        let now = self.clock.now();
        let mut ctx = conquest_context(
            now,
            &mut self.registry,
            &self.diplomacy,
            &mut self.collaborators,
        );
        self.scheduler
            .assign_initial_territories(&mut self.rng, &mut ctx);

        let unclaimed = self.scheduler.graph().unclaimed();
        if unclaimed.is_empty() {
            warn!("No unclaimed territory left for the player");
            return;
        }
        let pick = self.rng.random_range(0..unclaimed.len());
        if let Some(home) = unclaimed.get(pick) {
            let player = self.scheduler.player().clone();
            match self.scheduler.assign_territory(home, &player, &mut ctx) {
                Ok(_) => info!(territory = %home, player = %player, "Player home granted"),
                Err(e) => warn!(territory = %home, error = %e, "Player home not granted"),
            }
        }
    }

    // -------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------

    /// Current game time.
    pub const fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// The game clock.
    pub const fn clock(&self) -> &GameClock {
        &self.clock
    }

    /// The player guild.
    pub const fn player(&self) -> &GuildId {
        self.scheduler.player()
    }

    /// The conquest scheduler.
    pub const fn scheduler(&self) -> &ConquestScheduler {
        &self.scheduler
    }

    /// The diplomacy engine.
    pub const fn diplomacy(&self) -> &DiplomacyEngine {
        &self.diplomacy
    }

    /// NPC guilds.
    pub const fn registry(&self) -> &NpcGuildRegistry {
        &self.registry
    }

    /// The player's treasury.
    pub fn ledger(&self) -> &dyn ResourceLedger {
        &*self.collaborators.ledger
    }

    /// Guild facts.
    pub fn facts(&self) -> &dyn GuildFacts {
        &*self.collaborators.facts
    }

    /// Territory ticks run so far.
    pub const fn territory_ticks(&self) -> u64 {
        self.territory_ticks
    }

    /// Advance game time.
    ///
    /// # Errors
    ///
    /// Returns a [`ClockError`] for negative or overflowing steps.
    pub fn advance(&mut self, step: TimeDelta) -> Result<DateTime<Utc>, ClockError> {
        self.clock.advance(step)
    }

    // -------------------------------------------------------------------
    // Ticks
    // -------------------------------------------------------------------

    /// Pay territory income, then settle every due battle.
    pub fn territory_tick(&mut self) -> TerritoryTickSummary {
        self.territory_ticks = self.territory_ticks.saturating_add(1);
        let now = self.clock.now();
        let income = self
            .scheduler
            .pay_income(&mut *self.collaborators.ledger);
        let mut ctx = conquest_context(
            now,
            &mut self.registry,
            &self.diplomacy,
            &mut self.collaborators,
        );
        let battles = self.scheduler.resolve_due(&mut ctx);
        info!(
            tick = self.territory_ticks,
            gold = income.gold,
            battles = battles.len(),
            active = self.scheduler.active_battles().count(),
            "Territory tick complete"
        );
        TerritoryTickSummary {
            tick: self.territory_ticks,
            at: now,
            income,
            battles,
        }
    }

    /// Decay stale relationships toward neutral.
    pub fn diplomacy_tick(&mut self) -> DiplomacyTickSummary {
        let now = self.clock.now();
        let decayed = self
            .diplomacy
            .decay(now, &mut *self.collaborators.sink);
        DiplomacyTickSummary { at: now, decayed }
    }

    // -------------------------------------------------------------------
    // Conquest operations
    // -------------------------------------------------------------------

    /// Challenge a territory as the player.
    ///
    /// # Errors
    ///
    /// See [`ConquestScheduler::start_battle`].
    pub fn start_battle(&mut self, territory: &TerritoryId) -> Result<BattleId, ConquestError> {
        let player = self.player().clone();
        self.start_battle_as(territory, &player)
    }

    /// Challenge a territory on behalf of any guild.
    ///
    /// # Errors
    ///
    /// See [`ConquestScheduler::start_battle`].
    pub fn start_battle_as(
        &mut self,
        territory: &TerritoryId,
        attacker: &GuildId,
    ) -> Result<BattleId, ConquestError> {
        let mut ctx = conquest_context(
            self.clock.now(),
            &mut self.registry,
            &self.diplomacy,
            &mut self.collaborators,
        );
        self.scheduler.start_battle(territory, attacker, &mut ctx)
    }

    /// Add a guild to one side of an active battle.
    ///
    /// # Errors
    ///
    /// See [`ConquestScheduler::join_battle`].
    pub fn join_battle(
        &mut self,
        battle: BattleId,
        guild: &GuildId,
        side: BattleSide,
    ) -> Result<bool, ConquestError> {
        self.scheduler.join_battle(battle, guild, side)
    }

    /// Develop a player-owned territory.
    ///
    /// # Errors
    ///
    /// Fails with [`ConquestError::NotOwner`] for a territory the player
    /// does not hold. See [`ConquestScheduler::develop_territory`].
    pub fn develop_territory(&mut self, territory: &TerritoryId) -> Result<u32, ConquestError> {
        let mut ctx = conquest_context(
            self.clock.now(),
            &mut self.registry,
            &self.diplomacy,
            &mut self.collaborators,
        );
        self.scheduler.develop_territory(territory, &mut ctx)
    }

    /// Upgrade a player-owned territory's defense.
    ///
    /// # Errors
    ///
    /// Fails with [`ConquestError::NotOwner`] for a territory the player
    /// does not hold. See [`ConquestScheduler::upgrade_territory_defense`].
    pub fn upgrade_territory_defense(
        &mut self,
        territory: &TerritoryId,
    ) -> Result<u32, ConquestError> {
        self.scheduler
            .upgrade_territory_defense(territory, &mut *self.collaborators.ledger)
    }

    /// Give a territory to a guild directly.
    ///
    /// # Errors
    ///
    /// See [`ConquestScheduler::assign_territory`].
    pub fn assign_territory(
        &mut self,
        territory: &TerritoryId,
        guild: &GuildId,
    ) -> Result<Option<GuildId>, ConquestError> {
        let mut ctx = conquest_context(
            self.clock.now(),
            &mut self.registry,
            &self.diplomacy,
            &mut self.collaborators,
        );
        self.scheduler.assign_territory(territory, guild, &mut ctx)
    }

    /// Replace a territory's garrison.
    ///
    /// # Errors
    ///
    /// See [`ConquestScheduler::assign_defenders`].
    pub fn assign_defenders(
        &mut self,
        territory: &TerritoryId,
        defenders: Vec<UnitRef>,
    ) -> Result<Decimal, ConquestError> {
        self.scheduler.assign_defenders(territory, defenders)
    }

    // -------------------------------------------------------------------
    // Diplomacy operations
    // -------------------------------------------------------------------

    /// Attempt a diplomatic action as the player.
    ///
    /// # Errors
    ///
    /// See [`DiplomacyEngine::execute`].
    pub fn execute_diplomacy(
        &mut self,
        target: &GuildId,
        action: DiplomaticAction,
    ) -> Result<ActionOutcome, DiplomacyError> {
        let mut ctx = ActionContext {
            now: self.clock.now(),
            registry: &mut self.registry,
            ledger: &mut *self.collaborators.ledger,
            facts: &mut *self.collaborators.facts,
            resolver: &mut *self.collaborators.resolver,
            sink: &mut *self.collaborators.sink,
            rng: &mut self.rng,
        };
        self.diplomacy.execute(target, action, &mut ctx)
    }

    /// Shift the standing `from` holds toward `to` outside of any action.
    pub fn modify_relationship(
        &mut self,
        from: &GuildId,
        to: &GuildId,
        delta: i32,
    ) -> RelationshipLevel {
        self.diplomacy.modify_relationship(
            from,
            to,
            delta,
            self.clock.now(),
            &mut *self.collaborators.sink,
        )
    }

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    /// Guilds the player stands `Allied` or better with.
    pub fn allied_guilds(&self) -> Vec<GuildId> {
        self.diplomacy.allied_guilds()
    }

    /// Guilds the player stands `Hostile` with.
    pub fn hostile_guilds(&self) -> Vec<GuildId> {
        self.diplomacy.hostile_guilds()
    }

    /// Territories the player owns.
    pub fn player_territories(&self) -> Vec<&Territory> {
        self.scheduler.player_territories()
    }

    /// Territories a guild owns.
    pub fn guild_territories(&self, guild: &GuildId) -> Vec<&Territory> {
        self.scheduler.guild_territories(guild)
    }

    /// The territory at a grid cell.
    pub fn territory_at(&self, position: GridPos) -> Option<&Territory> {
        self.scheduler.territory_at(position)
    }

    /// Active battles.
    pub fn active_battles(&self) -> Vec<&TerritoryBattle> {
        self.scheduler.active_battles().collect()
    }

    /// Resolved battles.
    pub fn battle_history(&self) -> &[TerritoryBattle] {
        self.scheduler.history()
    }

    /// Total of one bonus kind across a guild's territories.
    pub fn bonus_total(&self, guild: &GuildId, kind: TerritoryBonus) -> Decimal {
        self.scheduler.bonus_total(guild, kind)
    }

    /// Territories the player could challenge right now.
    pub fn attack_targets(&self) -> Vec<TerritoryId> {
        let player = self.player();
        self.scheduler
            .graph()
            .iter()
            .filter(|t| !t.is_owned_by(player))
            .filter(|t| self.scheduler.battle_for(t.id()).is_none())
            .filter(|t| self.scheduler.graph().can_reach(player, t.id()))
            .map(|t| t.id().clone())
            .collect()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::arithmetic_side_effects,
    clippy::indexing_slicing
)]
mod tests {
    use dominion_guilds::EventLog;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    fn engine() -> Engine<SmallRng> {
        let config = SimulationConfig::default();
        let collaborators = Collaborators::in_memory(
            &config.world.player_guild_id(),
            config.world.player_level,
            config.world.starting_resources,
            Box::new(EventLog::new()),
        );
        Engine::from_config(
            &config,
            DateTime::<Utc>::UNIX_EPOCH,
            collaborators,
            SmallRng::seed_from_u64(42),
        )
        .unwrap()
    }

    #[test]
    fn generated_world_is_consistent() {
        let e = engine();
        assert_eq!(e.registry().len(), 5);
        assert_eq!(e.player_territories().len(), 1);
        assert!(e.scheduler().graph().ownership_consistent());
        for guild in e.registry().iter() {
            // Every NPC holds at least its seat, and its Power reflects it.
            let held = e.guild_territories(guild.id()).len();
            assert!(held >= 1);
            assert_eq!(guild.territory_count() as usize, held);
        }
    }

    #[test]
    fn territory_tick_pays_player_income() {
        let mut e = engine();
        let before = e.ledger().balance();
        let expected = e
            .player_territories()
            .iter()
            .fold(ResourceBundle::ZERO, |acc, t| acc.saturating_add(&t.income()));
        let summary = e.territory_tick();
        assert_eq!(summary.tick, 1);
        assert_eq!(summary.income, expected);
        assert_eq!(e.ledger().balance(), before.saturating_add(&expected));
        assert!(summary.battles.is_empty());
    }

    #[test]
    fn attack_targets_are_adjacent_and_foreign() {
        let e = engine();
        let player = e.player().clone();
        let home = e.player_territories()[0].id().clone();
        for target in e.attack_targets() {
            let t = e.scheduler().territory(&target).unwrap();
            assert!(!t.is_owned_by(&player));
            assert!(t.is_adjacent_to(&home));
        }
    }

    #[test]
    fn player_battle_resolves_after_preparation() {
        let mut e = engine();
        let Some(target) = e.attack_targets().into_iter().next() else {
            return;
        };
        let battle = e.start_battle(&target).unwrap();
        assert_eq!(e.active_battles().len(), 1);
        assert!(e.start_battle(&target).is_err());

        e.advance(TimeDelta::hours(24)).unwrap();
        let summary = e.territory_tick();
        assert_eq!(summary.battles.len(), 1);
        assert_eq!(summary.battles[0].battle_id, battle);
        assert!(e.active_battles().is_empty());
        assert_eq!(e.battle_history().len(), 1);
        assert!(e.scheduler().graph().ownership_consistent());
    }

    #[test]
    fn diplomacy_tick_reports_decay() {
        let mut e = engine();
        let target = e.registry().ids()[0].clone();
        let player = e.player().clone();
        e.modify_relationship(&player, &target, 100);
        assert_eq!(e.diplomacy_tick().decayed, 0);
        e.advance(TimeDelta::days(8)).unwrap();
        assert_eq!(e.diplomacy_tick().decayed, 1);
        assert_eq!(e.diplomacy().relationship(&target).unwrap().score(), 99);
    }
}
