//! Bilateral diplomatic standing between guilds.
//!
//! A [`GuildRelationship`] holds a score clamped to `-1000..=1000` and the
//! [`RelationshipLevel`] bucket it implies. The level is recomputed after
//! every score mutation and cannot be set on its own. Relationships are
//! stored per directed pair in a [`RelationshipBook`] and created lazily on
//! first interaction.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, TimeDelta, Utc};
use dominion_types::{DiplomaticAction, GuildId, RelationshipLevel};
use serde::{Deserialize, Serialize};

/// Lowest relationship score.
pub const MIN_SCORE: i32 = -1000;
/// Highest relationship score.
pub const MAX_SCORE: i32 = 1000;

/// Standing of one guild toward another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildRelationship {
    target: GuildId,
    score: i32,
    level: RelationshipLevel,
    last_interaction: DateTime<Utc>,
    treaties: BTreeSet<String>,
    action_history: BTreeMap<DiplomaticAction, DateTime<Utc>>,
}

impl GuildRelationship {
    /// A neutral relationship toward `target`, last touched at `now`.
    pub const fn new(target: GuildId, now: DateTime<Utc>) -> Self {
        Self {
            target,
            score: 0,
            level: RelationshipLevel::Neutral,
            last_interaction: now,
            treaties: BTreeSet::new(),
            action_history: BTreeMap::new(),
        }
    }

    /// The other party.
    pub const fn target(&self) -> &GuildId {
        &self.target
    }

    /// Current score in `-1000..=1000`.
    pub const fn score(&self) -> i32 {
        self.score
    }

    /// Current level; always the bucket of [`GuildRelationship::score`].
    pub const fn level(&self) -> RelationshipLevel {
        self.level
    }

    /// When the last diplomatic action happened.
    pub const fn last_interaction(&self) -> DateTime<Utc> {
        self.last_interaction
    }

    /// Names of treaties in force.
    pub const fn treaties(&self) -> &BTreeSet<String> {
        &self.treaties
    }

    /// Whether a treaty is in force.
    pub fn has_treaty(&self, name: &str) -> bool {
        self.treaties.contains(name)
    }

    /// First time each action was taken.
    pub const fn action_history(&self) -> &BTreeMap<DiplomaticAction, DateTime<Utc>> {
        &self.action_history
    }

    /// Add `delta` to the score, clamping, and recompute the level.
    ///
    /// Returns the new level if it changed.
    pub fn modify(&mut self, delta: i32) -> Option<RelationshipLevel> {
        self.score = self.score.saturating_add(delta).clamp(MIN_SCORE, MAX_SCORE);
        self.refresh_level()
    }

    /// Record a diplomatic action at `now`.
    ///
    /// Updates the last interaction time. The history keeps the first
    /// timestamp of each action.
    pub fn record_action(&mut self, action: DiplomaticAction, now: DateTime<Utc>) {
        self.last_interaction = now;
        self.action_history.entry(action).or_insert(now);
    }

    /// Add a treaty. Returns `false` if it was already in force.
    pub fn add_treaty(&mut self, name: impl Into<String>) -> bool {
        self.treaties.insert(name.into())
    }

    /// Whether `now` is still inside the interaction cooldown.
    pub fn in_cooldown(&self, now: DateTime<Utc>, cooldown: TimeDelta) -> bool {
        self.cooldown_ends(cooldown) > now
    }

    /// When the interaction cooldown ends.
    pub fn cooldown_ends(&self, cooldown: TimeDelta) -> DateTime<Utc> {
        self.last_interaction
            .checked_add_signed(cooldown)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Whether at least `threshold` has passed since the last interaction.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: TimeDelta) -> bool {
        now.signed_duration_since(self.last_interaction) >= threshold
    }

    /// Move the score `amount` points toward zero without crossing it.
    ///
    /// The last interaction time is left untouched, so a stale relationship
    /// keeps decaying on every evaluation. Returns the new level if it
    /// changed.
    pub fn decay_toward_neutral(&mut self, amount: u32) -> Option<RelationshipLevel> {
        let step = i32::try_from(amount).unwrap_or(i32::MAX);
        self.score = match self.score {
            s if s > 0 => s.saturating_sub(step).max(0),
            s if s < 0 => s.saturating_add(step).min(0),
            _ => 0,
        };
        self.refresh_level()
    }

    fn refresh_level(&mut self) -> Option<RelationshipLevel> {
        let level = RelationshipLevel::from_score(self.score);
        if level == self.level {
            None
        } else {
            self.level = level;
            Some(level)
        }
    }
}

// ---------------------------------------------------------------------------
// RelationshipBook
// ---------------------------------------------------------------------------

/// All relationships, keyed by directed `(from, to)` pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationshipBook {
    relations: BTreeMap<GuildId, BTreeMap<GuildId, GuildRelationship>>,
}

impl RelationshipBook {
    /// Create an empty book.
    pub const fn new() -> Self {
        Self {
            relations: BTreeMap::new(),
        }
    }

    /// The relationship `from` holds toward `to`.
    pub fn get(&self, from: &GuildId, to: &GuildId) -> Option<&GuildRelationship> {
        self.relations.get(from).and_then(|row| row.get(to))
    }

    /// The relationship `from` holds toward `to`, mutably.
    pub fn get_mut(&mut self, from: &GuildId, to: &GuildId) -> Option<&mut GuildRelationship> {
        self.relations.get_mut(from).and_then(|row| row.get_mut(to))
    }

    /// The relationship `from` holds toward `to`, created neutral at `now`
    /// if absent.
    pub fn get_or_create(
        &mut self,
        from: &GuildId,
        to: &GuildId,
        now: DateTime<Utc>,
    ) -> &mut GuildRelationship {
        self.relations
            .entry(from.clone())
            .or_default()
            .entry(to.clone())
            .or_insert_with(|| GuildRelationship::new(to.clone(), now))
    }

    /// Standing between two guilds in either direction.
    ///
    /// `a`'s view of `b` is preferred; `b`'s view of `a` is the fallback.
    pub fn level_between(&self, a: &GuildId, b: &GuildId) -> Option<RelationshipLevel> {
        self.get(a, b)
            .or_else(|| self.get(b, a))
            .map(GuildRelationship::level)
    }

    /// Every relationship `from` holds, in target order.
    pub fn relations_of(&self, from: &GuildId) -> impl Iterator<Item = &GuildRelationship> {
        self.relations.get(from).into_iter().flat_map(BTreeMap::values)
    }

    /// Every relationship in the book, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&GuildId, &mut GuildRelationship)> {
        self.relations
            .iter_mut()
            .flat_map(|(from, row)| row.values_mut().map(move |rel| (from, rel)))
    }

    /// Targets `from` stands at `Allied` or better with.
    pub fn allies_of(&self, from: &GuildId) -> Vec<GuildId> {
        self.relations_of(from)
            .filter(|r| r.level() >= RelationshipLevel::Allied)
            .map(|r| r.target().clone())
            .collect()
    }

    /// Targets `from` stands at `Hostile` with.
    pub fn enemies_of(&self, from: &GuildId) -> Vec<GuildId> {
        self.relations_of(from)
            .filter(|r| r.level() <= RelationshipLevel::Hostile)
            .map(|r| r.target().clone())
            .collect()
    }

    /// Total number of relationships.
    pub fn len(&self) -> usize {
        self.relations.values().map(BTreeMap::len).sum()
    }

    /// Whether the book is empty.
    pub fn is_empty(&self) -> bool {
        self.relations.values().all(BTreeMap::is_empty)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    fn epoch() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    fn rel() -> GuildRelationship {
        GuildRelationship::new(GuildId::from("guild_holy_order"), epoch())
    }

    #[test]
    fn score_is_clamped() {
        let mut r = rel();
        for _ in 0..10 {
            r.modify(500);
        }
        assert_eq!(r.score(), MAX_SCORE);
        assert_eq!(r.level(), RelationshipLevel::Brotherhood);
        r.modify(i32::MIN);
        assert_eq!(r.score(), MIN_SCORE);
        assert_eq!(r.level(), RelationshipLevel::Hostile);
    }

    #[test]
    fn modify_reports_only_level_crossings() {
        let mut r = rel();
        assert_eq!(r.modify(250), None);
        assert_eq!(r.modify(1), Some(RelationshipLevel::Friendly));
        assert_eq!(r.modify(-1), Some(RelationshipLevel::Neutral));
    }

    #[test]
    fn decay_never_overshoots_zero() {
        let mut r = rel();
        r.modify(3);
        assert_eq!(r.decay_toward_neutral(2), None);
        assert_eq!(r.score(), 1);
        r.decay_toward_neutral(5);
        assert_eq!(r.score(), 0);
        r.decay_toward_neutral(5);
        assert_eq!(r.score(), 0);

        r.modify(-250);
        assert_eq!(r.level(), RelationshipLevel::Cold);
        assert_eq!(r.decay_toward_neutral(1), Some(RelationshipLevel::Neutral));
        assert_eq!(r.score(), -249);
    }

    #[test]
    fn history_keeps_first_timestamp() {
        let mut r = rel();
        let later = epoch() + TimeDelta::days(1);
        r.record_action(DiplomaticAction::SendGift, epoch());
        r.record_action(DiplomaticAction::SendGift, later);
        assert_eq!(r.action_history()[&DiplomaticAction::SendGift], epoch());
        assert_eq!(r.last_interaction(), later);
    }

    #[test]
    fn cooldown_and_staleness() {
        let r = rel();
        let hour = TimeDelta::hours(1);
        assert!(r.in_cooldown(epoch() + TimeDelta::minutes(59), hour));
        assert!(!r.in_cooldown(epoch() + hour, hour));
        assert!(!r.is_stale(epoch() + TimeDelta::days(6), TimeDelta::days(7)));
        assert!(r.is_stale(epoch() + TimeDelta::days(8), TimeDelta::days(7)));
    }

    #[test]
    fn level_lookup_falls_back_to_reverse_direction() {
        let mut book = RelationshipBook::new();
        let player = GuildId::from("player_guild");
        let order = GuildId::from("guild_holy_order");
        book.get_or_create(&player, &order, epoch()).modify(600);
        assert_eq!(book.level_between(&order, &player), Some(RelationshipLevel::Allied));
        assert_eq!(book.level_between(&player, &order), Some(RelationshipLevel::Allied));
        assert_eq!(book.allies_of(&player), vec![order.clone()]);
        assert!(book.enemies_of(&player).is_empty());
        assert_eq!(book.level_between(&order, &GuildId::from("nobody")), None);
        assert_eq!(book.len(), 1);
    }
}
