//! Territory graph: territories as nodes, grid adjacency as undirected edges.
//!
//! Territories live in an arena (`Vec<Territory>`) addressed through an id
//! index and a cell index. A third index maps each owning guild to the set
//! of territories it holds, and is the only way ownership changes, so a
//! territory's owner always appears in that owner's set.
//!
//! Adjacency is derived from grid placement by [`TerritoryGraph::connect_adjacent`]
//! and is never authoritative: [`TerritoryGraph::restore`] recomputes it.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use dominion_types::{GridPos, GuildId, TerritoryBonus, TerritoryId};
use rust_decimal::Decimal;

use crate::error::WorldError;
use crate::territory::Territory;

/// All territories on a bounded grid plus their adjacency.
#[derive(Debug, Clone)]
pub struct TerritoryGraph {
    width: i32,
    height: i32,
    /// Arena of territories. Indices are stable; territories are never removed.
    territories: Vec<Territory>,
    /// Territory id -> arena index.
    index: BTreeMap<TerritoryId, usize>,
    /// Grid cell -> arena index.
    cells: BTreeMap<GridPos, usize>,
    /// Guild -> territories it owns.
    owners: BTreeMap<GuildId, BTreeSet<TerritoryId>>,
}

impl TerritoryGraph {
    /// Create an empty graph over a `width` x `height` grid.
    pub const fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            territories: Vec::new(),
            index: BTreeMap::new(),
            cells: BTreeMap::new(),
            owners: BTreeMap::new(),
        }
    }

    /// Rebuild a graph from previously saved territories.
    ///
    /// Indices and adjacency are recomputed; ownership is taken from each
    /// territory.
    ///
    /// # Errors
    ///
    /// Returns the first placement error, as for [`TerritoryGraph::insert`].
    pub fn restore(
        width: i32,
        height: i32,
        territories: Vec<Territory>,
    ) -> Result<Self, WorldError> {
        let mut graph = Self::new(width, height);
        for territory in territories {
            graph.insert(territory)?;
        }
        graph.connect_adjacent();
        Ok(graph)
    }

    /// Map width in cells.
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Map height in cells.
    pub const fn height(&self) -> i32 {
        self.height
    }

    /// Whether `position` lies on the map.
    pub const fn in_bounds(&self, position: GridPos) -> bool {
        position.x >= 0 && position.x < self.width && position.y >= 0 && position.y < self.height
    }

    // -------------------------------------------------------------------
    // Territory operations
    // -------------------------------------------------------------------

    /// Add a territory to the graph.
    ///
    /// Adjacency is not updated; call [`TerritoryGraph::connect_adjacent`]
    /// once all territories are placed.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::DuplicateTerritory`], [`WorldError::OutOfBounds`]
    /// or [`WorldError::CellOccupied`].
    pub fn insert(&mut self, territory: Territory) -> Result<(), WorldError> {
        let id = territory.id().clone();
        let position = territory.position();
        if self.index.contains_key(&id) {
            return Err(WorldError::DuplicateTerritory(id));
        }
        if !self.in_bounds(position) {
            return Err(WorldError::OutOfBounds {
                position,
                width: self.width,
                height: self.height,
            });
        }
        if let Some(existing) = self.territory_at(position) {
            return Err(WorldError::CellOccupied {
                position,
                existing: existing.id().clone(),
            });
        }

        let slot = self.territories.len();
        if let Some(owner) = territory.owner() {
            self.owners
                .entry(owner.clone())
                .or_default()
                .insert(id.clone());
        }
        self.territories.push(territory);
        self.index.insert(id, slot);
        self.cells.insert(position, slot);
        Ok(())
    }

    /// Get a territory by id.
    pub fn get(&self, id: &TerritoryId) -> Option<&Territory> {
        self.index.get(id).and_then(|&slot| self.territories.get(slot))
    }

    /// Get a territory mutably by id.
    ///
    /// Ownership cannot be changed through the returned reference; use
    /// [`TerritoryGraph::assign`].
    pub fn get_mut(&mut self, id: &TerritoryId) -> Option<&mut Territory> {
        let slot = *self.index.get(id)?;
        self.territories.get_mut(slot)
    }

    /// The territory occupying a grid cell, if any.
    pub fn territory_at(&self, position: GridPos) -> Option<&Territory> {
        self.cells
            .get(&position)
            .and_then(|&slot| self.territories.get(slot))
    }

    /// Whether the graph holds `id`.
    pub fn contains(&self, id: &TerritoryId) -> bool {
        self.index.contains_key(id)
    }

    /// Number of territories.
    pub fn len(&self) -> usize {
        self.territories.len()
    }

    /// Whether the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.territories.is_empty()
    }

    /// Iterate over all territories in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Territory> {
        self.territories.iter()
    }

    /// All territory ids in sorted order.
    pub fn ids(&self) -> Vec<TerritoryId> {
        self.index.keys().cloned().collect()
    }

    /// Ids of unclaimed territories in sorted order.
    pub fn unclaimed(&self) -> Vec<TerritoryId> {
        self.index
            .keys()
            .filter(|id| self.get(id).is_some_and(|t| t.owner().is_none()))
            .cloned()
            .collect()
    }

    // -------------------------------------------------------------------
    // Adjacency
    // -------------------------------------------------------------------

    /// Compute adjacency from grid placement.
    ///
    /// Every territory is linked to each of its four orthogonal neighbors
    /// that holds a territory. Links are written in both directions, so the
    /// relation is symmetric. Existing links are discarded first.
    pub fn connect_adjacent(&mut self) {
        for territory in &mut self.territories {
            territory.clear_links();
        }

        let mut edges: Vec<(usize, usize)> = Vec::new();
        for (slot, territory) in self.territories.iter().enumerate() {
            for neighbor in territory.position().orthogonal_neighbors() {
                if let Some(&other) = self.cells.get(&neighbor) {
                    edges.push((slot, other));
                }
            }
        }

        for (a, b) in edges {
            let (Some(id_a), Some(id_b)) = (
                self.territories.get(a).map(|t| t.id().clone()),
                self.territories.get(b).map(|t| t.id().clone()),
            ) else {
                continue;
            };
            if let Some(t) = self.territories.get_mut(a) {
                t.link(id_b);
            }
            if let Some(t) = self.territories.get_mut(b) {
                t.link(id_a);
            }
        }
    }

    /// Whether `guild` owns a territory directly adjacent to `target`.
    ///
    /// This is the admission rule for attacks: no multi-hop reachability.
    pub fn can_reach(&self, guild: &GuildId, target: &TerritoryId) -> bool {
        self.get(target).is_some_and(|t| {
            t.adjacent()
                .iter()
                .filter_map(|id| self.get(id))
                .any(|neighbor| neighbor.is_owned_by(guild))
        })
    }

    // -------------------------------------------------------------------
    // Ownership
    // -------------------------------------------------------------------

    /// Transfer a territory to `guild`, stamping the capture time.
    ///
    /// Returns the previous owner.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::TerritoryNotFound`] if `id` is unknown.
    pub fn assign(
        &mut self,
        id: &TerritoryId,
        guild: &GuildId,
        at: DateTime<Utc>,
    ) -> Result<Option<GuildId>, WorldError> {
        let territory = self
            .get_mut(id)
            .ok_or_else(|| WorldError::TerritoryNotFound(id.clone()))?;
        let previous = territory.owner().cloned();
        territory.set_owner(guild.clone(), at);

        if let Some(old) = &previous {
            if let Some(set) = self.owners.get_mut(old) {
                set.remove(id);
                if set.is_empty() {
                    self.owners.remove(old);
                }
            }
        }
        self.owners
            .entry(guild.clone())
            .or_default()
            .insert(id.clone());
        Ok(previous)
    }

    /// Ids of the territories `guild` owns.
    pub fn owned_by(&self, guild: &GuildId) -> BTreeSet<TerritoryId> {
        self.owners.get(guild).cloned().unwrap_or_default()
    }

    /// Number of territories `guild` owns.
    pub fn territory_count(&self, guild: &GuildId) -> u32 {
        self.owners
            .get(guild)
            .map_or(0, |set| u32::try_from(set.len()).unwrap_or(u32::MAX))
    }

    /// Every guild that owns at least one territory.
    pub fn owners(&self) -> impl Iterator<Item = &GuildId> {
        self.owners.keys()
    }

    /// Per-kind bonus totals across every territory `guild` owns.
    pub fn bonus_totals(&self, guild: &GuildId) -> BTreeMap<TerritoryBonus, Decimal> {
        let mut totals: BTreeMap<TerritoryBonus, Decimal> = BTreeMap::new();
        let Some(owned) = self.owners.get(guild) else {
            return totals;
        };
        for territory in owned.iter().filter_map(|id| self.get(id)) {
            for (&kind, &magnitude) in territory.bonuses() {
                let total = totals.entry(kind).or_insert(Decimal::ZERO);
                *total = total.saturating_add(magnitude);
            }
        }
        totals
    }

    /// Whether the owner index and every territory's owner agree.
    pub fn ownership_consistent(&self) -> bool {
        let forward = self.territories.iter().all(|t| {
            t.owner()
                .is_none_or(|owner| self.owners.get(owner).is_some_and(|s| s.contains(t.id())))
        });
        let backward = self.owners.iter().all(|(guild, set)| {
            set.iter()
                .all(|id| self.get(id).is_some_and(|t| t.is_owned_by(guild)))
        });
        forward && backward
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use chrono::TimeDelta;
    use dominion_types::TerritoryType;
    use rust_decimal_macros::dec;

    use super::*;

    fn place(graph: &mut TerritoryGraph, id: &str, kind: TerritoryType, x: i32, y: i32) {
        let t = Territory::new(TerritoryId::from(id), id, kind, GridPos::new(x, y));
        assert!(graph.insert(t).is_ok());
    }

    /// A plus-shaped cluster around (1,1) plus an isolated cell at (3,3).
    fn cluster() -> TerritoryGraph {
        let mut g = TerritoryGraph::new(4, 4);
        place(&mut g, "center", TerritoryType::Capital, 1, 1);
        place(&mut g, "east", TerritoryType::City, 2, 1);
        place(&mut g, "west", TerritoryType::Village, 0, 1);
        place(&mut g, "north", TerritoryType::Fortress, 1, 2);
        place(&mut g, "far", TerritoryType::Village, 3, 3);
        g.connect_adjacent();
        g
    }

    #[test]
    fn adjacency_is_symmetric_and_orthogonal() {
        let g = cluster();
        let center = g.get(&TerritoryId::from("center")).unwrap();
        assert_eq!(center.adjacent().len(), 3);
        for t in g.iter() {
            for other in t.adjacent() {
                assert!(g.get(other).unwrap().is_adjacent_to(t.id()));
            }
        }
        // Diagonal cells are not neighbors.
        let east = g.get(&TerritoryId::from("east")).unwrap();
        assert!(!east.is_adjacent_to(&TerritoryId::from("north")));
        assert!(g.get(&TerritoryId::from("far")).unwrap().adjacent().is_empty());
    }

    #[test]
    fn reach_requires_an_owned_neighbor() {
        let mut g = cluster();
        let guild = GuildId::from("player_guild");
        let now = DateTime::<Utc>::UNIX_EPOCH;
        assert!(!g.can_reach(&guild, &TerritoryId::from("center")));

        g.assign(&TerritoryId::from("east"), &guild, now).unwrap();
        assert!(g.can_reach(&guild, &TerritoryId::from("center")));
        // Two hops away.
        assert!(!g.can_reach(&guild, &TerritoryId::from("west")));
        assert!(!g.can_reach(&guild, &TerritoryId::from("far")));
        assert!(!g.can_reach(&guild, &TerritoryId::from("missing")));
    }

    #[test]
    fn assignment_keeps_owner_index_consistent() {
        let mut g = cluster();
        let a = GuildId::from("guild_a");
        let b = GuildId::from("guild_b");
        let center = TerritoryId::from("center");
        let now = DateTime::<Utc>::UNIX_EPOCH;

        assert_eq!(g.assign(&center, &a, now).unwrap(), None);
        assert_eq!(g.territory_count(&a), 1);
        let later = now + TimeDelta::hours(1);
        assert_eq!(g.assign(&center, &b, later).unwrap(), Some(a.clone()));
        assert_eq!(g.territory_count(&a), 0);
        assert_eq!(g.territory_count(&b), 1);
        assert_eq!(g.get(&center).unwrap().captured_at(), Some(later));
        assert!(g.ownership_consistent());
        assert_eq!(
            g.assign(&TerritoryId::from("missing"), &b, now),
            Err(WorldError::TerritoryNotFound(TerritoryId::from("missing")))
        );
    }

    #[test]
    fn insertion_rejects_collisions() {
        let mut g = cluster();
        let dup = Territory::new(
            TerritoryId::from("center"),
            "dup",
            TerritoryType::Village,
            GridPos::new(0, 0),
        );
        assert!(matches!(g.insert(dup), Err(WorldError::DuplicateTerritory(_))));
        let stacked = Territory::new(
            TerritoryId::from("stacked"),
            "stacked",
            TerritoryType::Village,
            GridPos::new(1, 1),
        );
        assert!(matches!(g.insert(stacked), Err(WorldError::CellOccupied { .. })));
        let outside = Territory::new(
            TerritoryId::from("outside"),
            "outside",
            TerritoryType::Village,
            GridPos::new(4, 0),
        );
        assert!(matches!(g.insert(outside), Err(WorldError::OutOfBounds { .. })));
    }

    #[test]
    fn bonus_totals_sum_owned_territories() {
        let mut g = cluster();
        let guild = GuildId::from("guild_a");
        let now = DateTime::<Utc>::UNIX_EPOCH;
        g.assign(&TerritoryId::from("center"), &guild, now).unwrap();
        g.assign(&TerritoryId::from("east"), &guild, now).unwrap();
        let totals = g.bonus_totals(&guild);
        assert_eq!(totals.get(&TerritoryBonus::GoldProduction), Some(&dec!(0.25)));
        assert_eq!(totals.get(&TerritoryBonus::RecruitmentBonus), Some(&dec!(0.25)));
        assert_eq!(totals.get(&TerritoryBonus::ResearchSpeed), Some(&dec!(0.10)));
        assert!(g.bonus_totals(&GuildId::from("nobody")).is_empty());
    }

    #[test]
    fn restore_recomputes_adjacency() {
        let mut g = cluster();
        let guild = GuildId::from("guild_a");
        g.assign(&TerritoryId::from("north"), &guild, DateTime::<Utc>::UNIX_EPOCH)
            .unwrap();
        let saved: Vec<Territory> = g
            .iter()
            .map(|t| serde_json::from_str(&serde_json::to_string(t).unwrap()).unwrap())
            .collect();
        assert!(saved.iter().all(|t| t.adjacent().is_empty()));

        let restored = TerritoryGraph::restore(4, 4, saved).unwrap();
        for t in g.iter() {
            assert_eq!(restored.get(t.id()).unwrap().adjacent(), t.adjacent());
        }
        assert_eq!(restored.territory_count(&guild), 1);
        assert!(restored.ownership_consistent());
    }
}
