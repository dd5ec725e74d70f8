//! Diplomatic actions between the player guild and NPC guilds.
//!
//! The [`DiplomacyEngine`] owns the [`RelationshipBook`] and executes the
//! eight [`DiplomaticAction`]s. An action runs in four phases:
//!
//! 1. Admission: the target must be an NPC guild and the pair must be out of
//!    its interaction cooldown.
//! 2. Preconditions and cost: standing, buildings and strength are checked,
//!    then the cost is paid. Any failure here is an `Err` with no side
//!    effects.
//! 3. Resolution: a per-10000 roll against a chance biased by the target's
//!    personality, except for trade-guild trades (guaranteed when
//!    affordable) and raids (settled by the battle resolver).
//! 4. Consequences: the score moves by the action's delta, the action is
//!    recorded (starting the cooldown), treaties and alliances are
//!    established, and notifications are published.
//!
//! # Invariants
//!
//! - Hostile actions always lower the score, success or not.
//! - Cooperative actions never lower the score on success.
//! - A relationship's level always matches its score.

use chrono::{DateTime, Utc};
use dominion_types::{
    BuildingKind, ConquestEvent, DiplomaticAction, GuildId, RelationshipLevel, ResourceBundle,
    Specialization, UnitClass,
};
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::{debug, info};

use crate::collaborators::{BattleOutcome, BattleResolver, GuildFacts, ResourceLedger};
use crate::config::DiplomacyRules;
use crate::error::DiplomacyError;
use crate::events::EventSink;
use crate::guild::NpcGuild;
use crate::raid::generate_raid_force;
use crate::registry::NpcGuildRegistry;
use crate::relationship::{GuildRelationship, RelationshipBook};
use crate::strength::StrengthModel;

/// Score change for an action, by outcome.
pub const fn score_delta(action: DiplomaticAction, success: bool) -> i32 {
    match (action, success) {
        (DiplomaticAction::SendGift, true) => 50,
        (DiplomaticAction::SendGift, false) => 10,
        (DiplomaticAction::TechnologyExchange, true) => 100,
        (DiplomaticAction::TechnologyExchange, false) => -20,
        (DiplomaticAction::JointTraining, true) => 75,
        (DiplomaticAction::ResourceTrade, true) => 30,
        (DiplomaticAction::MilitaryAlliance, true) => 200,
        (DiplomaticAction::MilitaryAlliance, false) => -50,
        (DiplomaticAction::CulturalExchange, true) => 60,
        (DiplomaticAction::Sabotage, true) => -200,
        (DiplomaticAction::Sabotage, false) => -100,
        (DiplomaticAction::Raid, true) => -500,
        (DiplomaticAction::Raid, false) => -300,
        (
            DiplomaticAction::JointTraining
            | DiplomaticAction::ResourceTrade
            | DiplomaticAction::CulturalExchange,
            false,
        ) => 0,
    }
}

/// Probability that `action` succeeds against `guild`.
///
/// Returns `None` for [`DiplomaticAction::Raid`], which is settled by
/// combat. For [`DiplomaticAction::ResourceTrade`] this is the chance used
/// when no guaranteed trade-guild exchange happens.
pub fn success_chance(action: DiplomaticAction, guild: &NpcGuild) -> Option<Decimal> {
    let p = guild.personality();
    let (trust, greed, aggression) = (p.trustworthiness(), p.greed(), p.aggressiveness());
    let tenth = |n: i64| Decimal::new(n, 1);
    // base + weight * trait
    let biased = |base: i64, weight: i64, value: Decimal| {
        tenth(base).saturating_add(tenth(weight).saturating_mul(value))
    };
    let spec = guild.specialization();

    let chance = match action {
        DiplomaticAction::SendGift => {
            biased(8, 2, trust).saturating_sub(tenth(1).saturating_mul(greed))
        }
        DiplomaticAction::TechnologyExchange => {
            let affinity = if matches!(spec, Specialization::Magic | Specialization::Balanced) {
                tenth(3)
            } else {
                Decimal::ZERO
            };
            biased(6, 1, trust).saturating_add(affinity)
        }
        DiplomaticAction::JointTraining => {
            let affinity = if spec == Specialization::Military {
                tenth(3)
            } else {
                Decimal::ZERO
            };
            biased(5, 1, trust).saturating_add(affinity)
        }
        DiplomaticAction::ResourceTrade => biased(4, 3, greed),
        DiplomaticAction::MilitaryAlliance => {
            biased(6, 3, trust).saturating_sub(tenth(2).saturating_mul(aggression))
        }
        DiplomaticAction::CulturalExchange => biased(7, 2, trust),
        DiplomaticAction::Sabotage => {
            let mut chance = tenth(3).saturating_sub(tenth(1).saturating_mul(trust));
            if guild.prefers(UnitClass::Assassin) {
                chance = chance.saturating_sub(tenth(2));
            }
            if spec == Specialization::Military {
                chance = chance.saturating_sub(tenth(2).saturating_mul(aggression));
            }
            chance
        }
        DiplomaticAction::Raid => return None,
    };
    Some(chance.clamp(Decimal::ZERO, Decimal::ONE))
}

/// Convert a chance into a threshold on a `0..10_000` roll.
fn threshold_per_10000(chance: Decimal) -> u32 {
    chance
        .clamp(Decimal::ZERO, Decimal::ONE)
        .saturating_mul(Decimal::from(10_000))
        .trunc()
        .to_u32()
        .unwrap_or(0)
}

/// Everything an action may touch besides the relationship book.
pub struct ActionContext<'a, R: Rng> {
    /// Current game time.
    pub now: DateTime<Utc>,
    /// NPC guilds (sabotage mutates the target's Power).
    pub registry: &'a mut NpcGuildRegistry,
    /// The player's treasury.
    pub ledger: &'a mut dyn ResourceLedger,
    /// Guild levels, units and buildings.
    pub facts: &'a mut dyn GuildFacts,
    /// Unit-level combat for raids.
    pub resolver: &'a mut dyn BattleResolver,
    /// Notification sink.
    pub sink: &'a mut dyn EventSink,
    /// Randomness for rolls and raid generation.
    pub rng: &'a mut R,
}

/// What happened when an action was attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    /// The target guild.
    pub target: GuildId,
    /// The action.
    pub action: DiplomaticAction,
    /// Whether the action succeeded.
    pub success: bool,
    /// Score change applied (before clamping).
    pub score_delta: i32,
    /// Score after the change.
    pub score: i32,
    /// Level after the change.
    pub level: RelationshipLevel,
    /// Whether the level crossed a threshold.
    pub level_changed: bool,
    /// Combat result, for raids.
    pub raid: Option<BattleOutcome>,
}

/// Executes diplomatic actions and owns all relationships.
#[derive(Debug, Clone)]
pub struct DiplomacyEngine {
    player: GuildId,
    rules: DiplomacyRules,
    strength: StrengthModel,
    book: RelationshipBook,
}

impl DiplomacyEngine {
    /// Create an engine with no relationships.
    pub fn new(rules: DiplomacyRules, strength: StrengthModel) -> Self {
        Self {
            player: strength.player().clone(),
            rules,
            strength,
            book: RelationshipBook::new(),
        }
    }

    /// The player guild.
    pub const fn player(&self) -> &GuildId {
        &self.player
    }

    /// Active rules.
    pub const fn rules(&self) -> &DiplomacyRules {
        &self.rules
    }

    /// All relationships.
    pub const fn book(&self) -> &RelationshipBook {
        &self.book
    }

    /// The player's relationship with `guild`, if one exists.
    pub fn relationship(&self, guild: &GuildId) -> Option<&GuildRelationship> {
        self.book.get(&self.player, guild)
    }

    /// Standing between any two guilds, checking `a`'s view first.
    pub fn level_between(&self, a: &GuildId, b: &GuildId) -> Option<RelationshipLevel> {
        self.book.level_between(a, b)
    }

    /// Guilds the player stands `Allied` or better with.
    pub fn allied_guilds(&self) -> Vec<GuildId> {
        self.book.allies_of(&self.player)
    }

    /// Guilds the player stands `Hostile` with.
    pub fn hostile_guilds(&self) -> Vec<GuildId> {
        self.book.enemies_of(&self.player)
    }

    /// Whether the player may act toward `guild` at `now`.
    ///
    /// A guild with no relationship yet is always available.
    pub fn can_interact(&self, guild: &GuildId, now: DateTime<Utc>) -> bool {
        self.relationship(guild)
            .is_none_or(|rel| !rel.in_cooldown(now, self.rules.interaction_cooldown))
    }

    /// Shift the standing `from` holds toward `to` outside of any action.
    ///
    /// Used for scripted setups and NPC-to-NPC standings. Does not start a
    /// cooldown. Publishes a level change only for the player's own
    /// relationships.
    pub fn modify_relationship(
        &mut self,
        from: &GuildId,
        to: &GuildId,
        delta: i32,
        now: DateTime<Utc>,
        sink: &mut dyn EventSink,
    ) -> RelationshipLevel {
        let rel = self.book.get_or_create(from, to, now);
        let changed = rel.modify(delta);
        let level = rel.level();
        if let Some(level) = changed {
            debug!(from = %from, to = %to, level = ?level, "Relationship level changed");
            if from == &self.player {
                sink.publish(ConquestEvent::RelationshipChanged {
                    guild: to.clone(),
                    level,
                });
            }
        }
        level
    }

    /// Attempt `action` against `target`.
    ///
    /// # Errors
    ///
    /// Returns a [`DiplomacyError`] if the action was rejected before any
    /// side effect. An attempted action that failed its roll is `Ok` with
    /// `success == false`.
    pub fn execute<R: Rng>(
        &mut self,
        target: &GuildId,
        action: DiplomaticAction,
        ctx: &mut ActionContext<'_, R>,
    ) -> Result<ActionOutcome, DiplomacyError> {
        let now = ctx.now;
        let guild = ctx
            .registry
            .get(target)
            .cloned()
            .ok_or_else(|| DiplomacyError::UnknownGuild(target.clone()))?;

        let existing = self.book.get(&self.player, target);
        if let Some(rel) = existing {
            if rel.in_cooldown(now, self.rules.interaction_cooldown) {
                return Err(DiplomacyError::Cooldown {
                    guild: target.clone(),
                    ready_at: rel.cooldown_ends(self.rules.interaction_cooldown),
                });
            }
        }
        let level = existing.map_or(RelationshipLevel::Neutral, GuildRelationship::level);

        self.check_preconditions(action, &guild, level, ctx)?;

        let mut raid = None;
        let success = match action {
            DiplomaticAction::SendGift => {
                let cost = ResourceBundle::gold(
                    self.rules.gift_gold_per_level.saturating_mul(guild.level()),
                );
                ctx.ledger.spend(&cost)?;
                self.roll(action, &guild, ctx)
            }
            DiplomaticAction::TechnologyExchange => {
                ctx.ledger.spend(&self.rules.tech_exchange_cost)?;
                self.roll(action, &guild, ctx)
            }
            DiplomaticAction::ResourceTrade => {
                let traded = guild.specialization() == Specialization::Trade
                    && ctx
                        .ledger
                        .exchange(&self.rules.trade_offer, &self.rules.trade_return)
                        .is_ok();
                traded || self.roll(action, &guild, ctx)
            }
            DiplomaticAction::Raid => {
                ctx.sink.publish(ConquestEvent::WarDeclared {
                    guild: target.clone(),
                });
                let attackers = ctx.facts.available_units(&self.player);
                let force = generate_raid_force(&guild, ctx.rng);
                let outcome = ctx.resolver.resolve(&attackers, &force.units());
                info!(
                    target = %target,
                    tier = ?force.tier,
                    attacker_rating = outcome.attacker_rating,
                    defender_rating = outcome.defender_rating,
                    won = outcome.attacker_won,
                    "Raid resolved"
                );
                raid = Some(outcome);
                outcome.attacker_won
            }
            DiplomaticAction::JointTraining
            | DiplomaticAction::MilitaryAlliance
            | DiplomaticAction::CulturalExchange
            | DiplomaticAction::Sabotage => self.roll(action, &guild, ctx),
        };

        if success {
            self.apply_success_effects(action, target, ctx);
        }

        let delta = score_delta(action, success);
        let rel = self.book.get_or_create(&self.player, target, now);
        let changed = rel.modify(delta);
        rel.record_action(action, now);
        let (score, new_level) = (rel.score(), rel.level());

        if success {
            let treaty = match action {
                DiplomaticAction::TechnologyExchange | DiplomaticAction::MilitaryAlliance => {
                    Some(action.name())
                }
                _ => None,
            };
            if let Some(name) = treaty {
                if rel.add_treaty(name) {
                    ctx.sink.publish(ConquestEvent::TreatyEstablished {
                        guild: target.clone(),
                        treaty: name.to_owned(),
                    });
                    if action == DiplomaticAction::MilitaryAlliance {
                        ctx.sink.publish(ConquestEvent::AllianceFormed {
                            guild_a: self.player.clone(),
                            guild_b: target.clone(),
                        });
                    }
                }
            }
        }

        if let Some(level) = changed {
            ctx.sink.publish(ConquestEvent::RelationshipChanged {
                guild: target.clone(),
                level,
            });
        }

        info!(
            target = %target,
            action = action.name(),
            success,
            delta,
            score,
            level = ?new_level,
            "Diplomatic action executed"
        );

        Ok(ActionOutcome {
            target: target.clone(),
            action,
            success,
            score_delta: delta,
            score,
            level: new_level,
            level_changed: changed.is_some(),
            raid,
        })
    }

    /// Decay every stale relationship one step toward neutral.
    ///
    /// A relationship is stale once the decay threshold has passed since its
    /// last interaction. Decay does not count as an interaction, so stale
    /// relationships keep decaying on every call until they reach zero.
    /// Returns the number of relationships that moved.
    pub fn decay(&mut self, now: DateTime<Utc>, sink: &mut dyn EventSink) -> u32 {
        let threshold = self.rules.decay_threshold;
        let amount = self.rules.decay_amount;
        let player = &self.player;
        let mut decayed: u32 = 0;

        for (from, rel) in self.book.iter_mut() {
            if rel.score() == 0 || !rel.is_stale(now, threshold) {
                continue;
            }
            let changed = rel.decay_toward_neutral(amount);
            decayed = decayed.saturating_add(1);
            if let Some(level) = changed {
                debug!(from = %from, to = %rel.target(), level = ?level, "Relationship decayed across level");
                if from == player {
                    sink.publish(ConquestEvent::RelationshipChanged {
                        guild: rel.target().clone(),
                        level,
                    });
                }
            }
        }

        if decayed > 0 {
            debug!(decayed, "Relationship decay applied");
        }
        decayed
    }

    // -------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------

    fn check_preconditions<R: Rng>(
        &self,
        action: DiplomaticAction,
        guild: &NpcGuild,
        level: RelationshipLevel,
        ctx: &ActionContext<'_, R>,
    ) -> Result<(), DiplomacyError> {
        let require_level = |required: RelationshipLevel| {
            if level < required {
                Err(DiplomacyError::RelationshipTooLow {
                    action,
                    guild: guild.id().clone(),
                    required,
                    actual: level,
                })
            } else {
                Ok(())
            }
        };
        let require_building = |building: BuildingKind, required: u32| {
            let actual = ctx.facts.building_level(&self.player, building);
            if actual < required {
                Err(DiplomacyError::MissingBuilding {
                    action,
                    building,
                    required,
                    actual,
                })
            } else {
                Ok(())
            }
        };

        match action {
            DiplomaticAction::TechnologyExchange => {
                require_level(RelationshipLevel::Friendly)?;
                require_building(BuildingKind::ResearchLab, self.rules.research_lab_level)
            }
            DiplomaticAction::JointTraining => {
                require_level(RelationshipLevel::Neutral)?;
                require_building(
                    BuildingKind::TrainingGround,
                    self.rules.training_ground_level,
                )
            }
            DiplomaticAction::MilitaryAlliance => {
                require_level(RelationshipLevel::Allied)?;
                let strength = self.strength.player_strength(&*ctx.facts);
                let required = Decimal::from(guild.power())
                    .checked_div(Decimal::TWO)
                    .unwrap_or(Decimal::ZERO);
                if strength < required {
                    return Err(DiplomacyError::InsufficientStrength { strength, required });
                }
                Ok(())
            }
            DiplomaticAction::SendGift
            | DiplomaticAction::ResourceTrade
            | DiplomaticAction::CulturalExchange
            | DiplomaticAction::Sabotage
            | DiplomaticAction::Raid => Ok(()),
        }
    }

    fn roll<R: Rng>(
        &self,
        action: DiplomaticAction,
        guild: &NpcGuild,
        ctx: &mut ActionContext<'_, R>,
    ) -> bool {
        let Some(chance) = success_chance(action, guild) else {
            return false;
        };
        let roll = ctx.rng.random_range(0..10_000_u32);
        let threshold = threshold_per_10000(chance);
        debug!(
            action = action.name(),
            guild = %guild.id(),
            roll,
            threshold,
            "Diplomacy roll"
        );
        roll < threshold
    }

    fn apply_success_effects<R: Rng>(
        &self,
        action: DiplomaticAction,
        target: &GuildId,
        ctx: &mut ActionContext<'_, R>,
    ) {
        match action {
            DiplomaticAction::CulturalExchange => {
                ctx.facts
                    .add_reputation(&self.player, self.rules.cultural_reputation);
            }
            DiplomaticAction::Sabotage => {
                if let Some(guild) = ctx.registry.get_mut(target) {
                    guild.weaken(self.rules.sabotage_power_factor);
                    info!(target = %target, power = guild.power(), "Sabotage weakened guild");
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use chrono::TimeDelta;
    use dominion_types::{Personality, UnitRef};
    use rand::rngs::SmallRng;
    use rand::{RngCore, SeedableRng};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::collaborators::{LevelSumResolver, StaticGuildFacts, Treasury};
    use crate::events::EventLog;

    const PLAYER: &str = "player_guild";

    struct World {
        registry: NpcGuildRegistry,
        treasury: Treasury,
        facts: StaticGuildFacts,
        resolver: LevelSumResolver,
        log: EventLog,
        rng: SmallRng,
    }

    impl World {
        fn new() -> Self {
            let mut registry = NpcGuildRegistry::new();
            registry.insert(npc(
                "guild_saints",
                Specialization::Balanced,
                vec![UnitClass::Knight, UnitClass::Priest],
                (dec!(0), dec!(1), dec!(0)),
                3,
            ));
            registry.insert(npc(
                "guild_merchants",
                Specialization::Trade,
                vec![UnitClass::Assassin, UnitClass::Sage],
                (dec!(0.3), dec!(0.8), dec!(0.8)),
                2,
            ));
            registry.insert(npc(
                "guild_shadows",
                Specialization::Military,
                vec![UnitClass::Assassin, UnitClass::Ranger],
                (dec!(1), dec!(1), dec!(0.7)),
                4,
            ));
            let mut facts = StaticGuildFacts::new();
            facts.set_level(&GuildId::from(PLAYER), 10);
            Self {
                registry,
                treasury: Treasury::new(ResourceBundle::new(10_000, 0, 0, 0)),
                facts,
                resolver: LevelSumResolver,
                log: EventLog::new(),
                rng: SmallRng::seed_from_u64(42),
            }
        }

        fn ctx(&mut self, now: DateTime<Utc>) -> ActionContext<'_, SmallRng> {
            ActionContext {
                now,
                registry: &mut self.registry,
                ledger: &mut self.treasury,
                facts: &mut self.facts,
                resolver: &mut self.resolver,
                sink: &mut self.log,
                rng: &mut self.rng,
            }
        }

        fn ctx_with<'a>(
            &'a mut self,
            now: DateTime<Utc>,
            rng: &'a mut FixedRng,
        ) -> ActionContext<'a, FixedRng> {
            ActionContext {
                now,
                registry: &mut self.registry,
                ledger: &mut self.treasury,
                facts: &mut self.facts,
                resolver: &mut self.resolver,
                sink: &mut self.log,
                rng,
            }
        }
    }

    /// Random source that repeats one word.
    ///
    /// `FixedRng::PASS` rolls 0 on every draw and `FixedRng::FAIL` rolls
    /// the top of every range.
    struct FixedRng(u32);

    impl FixedRng {
        const PASS: Self = Self(0);
        const FAIL: Self = Self(u32::MAX);
    }

    impl RngCore for FixedRng {
        fn next_u32(&mut self) -> u32 {
            self.0
        }

        fn next_u64(&mut self) -> u64 {
            (u64::from(self.0) << 32) | u64::from(self.0)
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            for chunk in dst.chunks_mut(4) {
                for (byte, word) in chunk.iter_mut().zip(self.0.to_le_bytes()) {
                    *byte = word;
                }
            }
        }
    }

    fn npc(
        id: &str,
        specialization: Specialization,
        classes: Vec<UnitClass>,
        (a, t, g): (Decimal, Decimal, Decimal),
        level: u32,
    ) -> NpcGuild {
        NpcGuild::new(
            GuildId::from(id),
            id,
            level,
            specialization,
            classes,
            Personality::new(a, t, g),
        )
    }

    fn engine() -> DiplomacyEngine {
        DiplomacyEngine::new(
            DiplomacyRules::default(),
            StrengthModel::with_defaults(GuildId::from(PLAYER)),
        )
    }

    fn epoch() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    // Scripted standings are set up before the cooldown window.
    fn setup_time() -> DateTime<Utc> {
        epoch() - TimeDelta::hours(2)
    }

    #[test]
    fn hostile_actions_always_cost_standing() {
        for success in [true, false] {
            assert!(score_delta(DiplomaticAction::Sabotage, success) < 0);
            assert!(score_delta(DiplomaticAction::Raid, success) < 0);
        }
        for action in DiplomaticAction::ALL.into_iter().filter(|a| !a.is_hostile()) {
            assert!(score_delta(action, true) > 0);
        }
    }

    #[test]
    fn chances_reflect_personality() {
        let w = World::new();
        let saints = w.registry.get(&GuildId::from("guild_saints")).unwrap();
        // 0.8 + 0.2 * 1.0 - 0.1 * 0.0
        assert_eq!(success_chance(DiplomaticAction::SendGift, saints), Some(dec!(1)));
        // Balanced guilds favor technology exchange: 0.6 + 0.3 + 0.1
        assert_eq!(
            success_chance(DiplomaticAction::TechnologyExchange, saints),
            Some(dec!(1))
        );
        let shadows = w.registry.get(&GuildId::from("guild_shadows")).unwrap();
        // Assassins and an aggressive military guild make sabotage impossible.
        assert_eq!(success_chance(DiplomaticAction::Sabotage, shadows), Some(dec!(0)));
        assert_eq!(success_chance(DiplomaticAction::Raid, shadows), None);
    }

    #[test]
    fn gift_spends_gold_and_improves_standing() {
        let mut w = World::new();
        let mut e = engine();
        let target = GuildId::from("guild_saints");
        let outcome = e
            .execute(&target, DiplomaticAction::SendGift, &mut w.ctx(epoch()))
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.score, 50);
        assert_eq!(w.treasury.balance().gold, 10_000 - 300);
        let rel = e.relationship(&target).unwrap();
        assert_eq!(rel.last_interaction(), epoch());
        assert!(rel.action_history().contains_key(&DiplomaticAction::SendGift));
    }

    #[test]
    fn cooldown_rejects_without_side_effects() {
        let mut w = World::new();
        let mut e = engine();
        let target = GuildId::from("guild_saints");
        e.execute(&target, DiplomaticAction::SendGift, &mut w.ctx(epoch()))
            .unwrap();
        let gold = w.treasury.balance().gold;

        let soon = epoch() + TimeDelta::minutes(30);
        let err = e
            .execute(&target, DiplomaticAction::SendGift, &mut w.ctx(soon))
            .unwrap_err();
        assert!(matches!(err, DiplomacyError::Cooldown { .. }));
        assert_eq!(w.treasury.balance().gold, gold);
        assert_eq!(e.relationship(&target).unwrap().score(), 50);
        assert!(!e.can_interact(&target, soon));
        assert!(e.can_interact(&target, epoch() + TimeDelta::hours(1)));
    }

    #[test]
    fn unaffordable_gift_is_rejected() {
        let mut w = World::new();
        w.treasury = Treasury::new(ResourceBundle::gold(10));
        let mut e = engine();
        let err = e
            .execute(
                &GuildId::from("guild_saints"),
                DiplomaticAction::SendGift,
                &mut w.ctx(epoch()),
            )
            .unwrap_err();
        assert!(matches!(err, DiplomacyError::Ledger(_)));
        assert!(e.relationship(&GuildId::from("guild_saints")).is_none());
    }

    #[test]
    fn technology_exchange_requires_friendship_and_lab() {
        let mut w = World::new();
        let mut e = engine();
        let player = GuildId::from(PLAYER);
        let target = GuildId::from("guild_saints");

        let err = e
            .execute(&target, DiplomaticAction::TechnologyExchange, &mut w.ctx(epoch()))
            .unwrap_err();
        assert!(matches!(err, DiplomacyError::RelationshipTooLow { .. }));

        e.modify_relationship(&player, &target, 300, setup_time(), &mut w.log);
        let err = e
            .execute(&target, DiplomaticAction::TechnologyExchange, &mut w.ctx(epoch()))
            .unwrap_err();
        assert!(matches!(err, DiplomacyError::MissingBuilding { .. }));

        w.facts.set_building(&player, BuildingKind::ResearchLab, 2);
        w.treasury.add(dominion_types::ResourceKind::ManaStone, 50);
        let outcome = e
            .execute(&target, DiplomaticAction::TechnologyExchange, &mut w.ctx(epoch()))
            .unwrap();
        assert!(outcome.success);
        assert_eq!(w.treasury.balance().mana_stone, 0);
        assert!(e.relationship(&target).unwrap().has_treaty("TechnologyExchange"));
        assert!(w.log.events().iter().any(|ev| matches!(
            ev,
            ConquestEvent::TreatyEstablished { treaty, .. } if treaty == "TechnologyExchange"
        )));
    }

    #[test]
    fn military_alliance_forms_alliance() {
        let mut w = World::new();
        let mut e = engine();
        let player = GuildId::from(PLAYER);
        let target = GuildId::from("guild_saints");
        e.modify_relationship(&player, &target, 600, setup_time(), &mut w.log);
        w.log.drain();

        // 0.6 + 0.3 * 1.0 - 0.2 * 0.0 = 0.9, and a zero roll clears it.
        let mut rng = FixedRng::PASS;
        let outcome = e
            .execute(
                &target,
                DiplomaticAction::MilitaryAlliance,
                &mut w.ctx_with(epoch(), &mut rng),
            )
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.score_delta, 200);
        assert_eq!(outcome.score, 800);
        assert_eq!(outcome.level, RelationshipLevel::Brotherhood);
        assert!(outcome.level_changed);

        let events = w.log.events();
        assert!(events.iter().any(|ev| matches!(
            ev,
            ConquestEvent::TreatyEstablished { guild, treaty }
                if guild == &target && treaty == DiplomaticAction::MilitaryAlliance.name()
        )));
        assert!(events.iter().any(|ev| matches!(
            ev,
            ConquestEvent::AllianceFormed { guild_a, guild_b }
                if guild_a == &player && guild_b == &target
        )));
        assert!(events.iter().any(|ev| matches!(
            ev,
            ConquestEvent::RelationshipChanged { guild, level: RelationshipLevel::Brotherhood }
                if guild == &target
        )));
        let rel = e.relationship(&target).unwrap();
        assert!(rel.has_treaty(DiplomaticAction::MilitaryAlliance.name()));
        assert_eq!(e.allied_guilds(), vec![target]);
    }

    #[test]
    fn failed_alliance_drops_standing_across_a_level() {
        let mut w = World::new();
        let mut e = engine();
        let player = GuildId::from(PLAYER);
        let target = GuildId::from("guild_saints");
        assert_eq!(
            e.modify_relationship(&player, &target, 520, setup_time(), &mut w.log),
            RelationshipLevel::Allied
        );
        w.log.drain();

        let mut rng = FixedRng::FAIL;
        let outcome = e
            .execute(
                &target,
                DiplomaticAction::MilitaryAlliance,
                &mut w.ctx_with(epoch(), &mut rng),
            )
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.score_delta, -50);
        assert_eq!(outcome.score, 470);
        assert_eq!(outcome.level, RelationshipLevel::Friendly);
        assert!(outcome.level_changed);

        assert_eq!(
            w.log.events(),
            [ConquestEvent::RelationshipChanged {
                guild: target.clone(),
                level: RelationshipLevel::Friendly,
            }]
            .as_slice()
        );
        let rel = e.relationship(&target).unwrap();
        assert!(!rel.has_treaty(DiplomaticAction::MilitaryAlliance.name()));
        assert_eq!(rel.last_interaction(), epoch());
        assert!(e.allied_guilds().is_empty());
    }

    #[test]
    fn failed_cooperative_roll_keeps_level_when_inside_band() {
        let mut w = World::new();
        let mut e = engine();
        let target = GuildId::from("guild_saints");
        e.modify_relationship(&GuildId::from(PLAYER), &target, 300, setup_time(), &mut w.log);
        w.log.drain();

        // Joint training: 0.5 + 0.1 * 1.0 = 0.6, missed by a top roll.
        let mut rng = FixedRng::FAIL;
        w.facts.set_building(&GuildId::from(PLAYER), BuildingKind::TrainingGround, 1);
        let outcome = e
            .execute(
                &target,
                DiplomaticAction::JointTraining,
                &mut w.ctx_with(epoch(), &mut rng),
            )
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.score_delta, 0);
        assert_eq!(outcome.score, 300);
        assert!(!outcome.level_changed);
        assert!(w.log.events().is_empty());
    }

    #[test]
    fn military_alliance_requires_strength() {
        let mut w = World::new();
        w.facts.set_level(&GuildId::from(PLAYER), 1);
        let mut e = engine();
        let target = GuildId::from("guild_shadows");
        e.modify_relationship(&GuildId::from(PLAYER), &target, 600, setup_time(), &mut w.log);
        // Player strength 100 < 400 / 2.
        let err = e
            .execute(&target, DiplomaticAction::MilitaryAlliance, &mut w.ctx(epoch()))
            .unwrap_err();
        assert!(matches!(err, DiplomacyError::InsufficientStrength { .. }));
    }

    #[test]
    fn trade_guild_trade_is_guaranteed_when_affordable() {
        let mut w = World::new();
        let mut e = engine();
        let outcome = e
            .execute(
                &GuildId::from("guild_merchants"),
                DiplomaticAction::ResourceTrade,
                &mut w.ctx(epoch()),
            )
            .unwrap();
        assert!(outcome.success);
        assert_eq!(w.treasury.balance(), ResourceBundle::new(9_900, 50, 50, 0));
    }

    #[test]
    fn failed_sabotage_still_costs_standing() {
        let mut w = World::new();
        let mut e = engine();
        let target = GuildId::from("guild_shadows");
        let power = w.registry.get(&target).unwrap().power();
        let outcome = e
            .execute(&target, DiplomaticAction::Sabotage, &mut w.ctx(epoch()))
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.score, -100);
        assert_eq!(w.registry.get(&target).unwrap().power(), power);
    }

    #[test]
    fn raid_declares_war_and_fights() {
        let mut w = World::new();
        let player = GuildId::from(PLAYER);
        w.facts.set_units(
            &player,
            (0..24)
                .map(|i| UnitRef::new(format!("hero{i}"), UnitClass::Warrior, 50))
                .collect(),
        );
        let mut e = engine();
        let target = GuildId::from("guild_shadows");
        let outcome = e
            .execute(&target, DiplomaticAction::Raid, &mut w.ctx(epoch()))
            .unwrap();
        assert!(outcome.success);
        assert!(outcome.raid.is_some_and(|r| r.attacker_won));
        assert_eq!(outcome.score, -500);
        assert_eq!(outcome.level, RelationshipLevel::Unfriendly);
        assert!(matches!(
            w.log.events().first(),
            Some(ConquestEvent::WarDeclared { guild }) if guild == &target
        ));
    }

    #[test]
    fn decay_moves_stale_relationships_toward_neutral() {
        let mut w = World::new();
        let mut e = engine();
        let player = GuildId::from(PLAYER);
        let target = GuildId::from("guild_saints");
        e.execute(&target, DiplomaticAction::SendGift, &mut w.ctx(epoch()))
            .unwrap();

        assert_eq!(e.decay(epoch() + TimeDelta::days(6), &mut w.log), 0);
        let day8 = epoch() + TimeDelta::days(8);
        assert_eq!(e.decay(day8, &mut w.log), 1);
        assert_eq!(e.relationship(&target).unwrap().score(), 49);
        assert_eq!(e.decay(day8, &mut w.log), 1);
        assert_eq!(e.relationship(&target).unwrap().score(), 48);

        // Hostile standings climb back toward zero.
        e.modify_relationship(&player, &target, -49, epoch(), &mut w.log);
        assert_eq!(e.relationship(&target).unwrap().score(), -1);
        assert_eq!(e.decay(day8, &mut w.log), 1);
        assert_eq!(e.relationship(&target).unwrap().score(), 0);
        assert_eq!(e.decay(day8, &mut w.log), 0);
    }
}
