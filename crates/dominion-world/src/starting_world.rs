//! World generation: the standard territory layout and scattered villages.
//!
//! The map is a fixed skeleton of named territories (one capital, four cities,
//! four fortresses, two strategic points, four resource sites) with villages
//! scattered randomly into the remaining empty cells.
//!
//! ```text
//!    y
//!    9  .  .  .  .  .  F  .  .  .  .
//!    8  .  .  .  .  .  C  .  .  .  .
//!    7  .  .  .  R  .  .  .  R  .  .
//!    6  .  .  .  .  .  .  S  .  .  .
//!    5  .  F  C  .  .  K  .  .  C  F
//!    4  .  .  .  .  S  .  .  .  .  .
//!    3  .  .  .  R  .  .  .  R  .  .
//!    2  .  .  .  .  .  C  .  .  .  .
//!    1  .  .  .  .  .  F  .  .  .  .
//!    0  .  .  .  .  .  .  .  .  .  .
//!       0  1  2  3  4  5  6  7  8  9  x
//! ```

use dominion_types::{GridPos, TerritoryId, TerritoryType};
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::debug;

use crate::error::WorldError;
use crate::territory::Territory;
use crate::territory_graph::TerritoryGraph;

/// Default map width.
pub const DEFAULT_WIDTH: i32 = 10;

/// Default map height.
pub const DEFAULT_HEIGHT: i32 = 10;

/// A named territory placed at a fixed cell before villages are scattered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerritorySeed {
    /// Territory id.
    pub id: TerritoryId,
    /// Display name.
    pub name: String,
    /// Territory type.
    pub territory_type: TerritoryType,
    /// Grid cell.
    pub position: GridPos,
}

impl TerritorySeed {
    fn new(id: &str, name: &str, territory_type: TerritoryType, x: i32, y: i32) -> Self {
        Self {
            id: TerritoryId::from(id),
            name: name.to_owned(),
            territory_type,
            position: GridPos::new(x, y),
        }
    }
}

/// The fifteen named territories of the standard map.
pub fn standard_layout() -> Vec<TerritorySeed> {
    use TerritoryType::{Capital, City, Fortress, Resource, Strategic};
    vec![
        TerritorySeed::new("territory_central_capital", "Central Capital", Capital, 5, 5),
        TerritorySeed::new("territory_north_city", "North City", City, 5, 8),
        TerritorySeed::new("territory_south_city", "South City", City, 5, 2),
        TerritorySeed::new("territory_east_city", "East City", City, 8, 5),
        TerritorySeed::new("territory_west_city", "West City", City, 2, 5),
        TerritorySeed::new("territory_north_fortress", "North Fortress", Fortress, 5, 9),
        TerritorySeed::new("territory_south_fortress", "South Fortress", Fortress, 5, 1),
        TerritorySeed::new("territory_east_fortress", "East Fortress", Fortress, 9, 5),
        TerritorySeed::new("territory_west_fortress", "West Fortress", Fortress, 1, 5),
        TerritorySeed::new("territory_crossroads", "Crossroads", Strategic, 4, 4),
        TerritorySeed::new("territory_bridge", "Great Bridge", Strategic, 6, 6),
        TerritorySeed::new("territory_gold_mine", "Gold Mine", Resource, 7, 7),
        TerritorySeed::new("territory_forest", "Great Forest", Resource, 3, 7),
        TerritorySeed::new("territory_quarry", "Quarry", Resource, 7, 3),
        TerritorySeed::new("territory_mana_spring", "Mana Spring", Resource, 3, 3),
    ]
}

/// Build the territory graph for a seed layout.
///
/// Seeds are placed at their fixed cells. Every remaining empty cell then
/// receives a village with probability `fill_probability` (clamped to
/// `0.0..=1.0`), scanned column by column. Finally adjacency is computed:
/// territories in orthogonally neighbouring cells are linked both ways.
///
/// Connectivity is not guaranteed. Seeds with no occupied neighbour cell
/// stay isolated, which is the norm at low fill probabilities. At `1.0`
/// every cell is occupied and the graph is connected. The result is
/// deterministic for a given seed list and RNG state.
///
/// # Errors
///
/// Returns a [`WorldError`] if two seeds collide or a seed lies off the map.
pub fn build_graph<R: Rng>(
    width: i32,
    height: i32,
    seeds: &[TerritorySeed],
    fill_probability: Decimal,
    rng: &mut R,
) -> Result<TerritoryGraph, WorldError> {
    let mut graph = TerritoryGraph::new(width, height);
    for seed in seeds {
        graph.insert(Territory::new(
            seed.id.clone(),
            seed.name.clone(),
            seed.territory_type,
            seed.position,
        ))?;
    }

    let threshold = per_ten_thousand(fill_probability);
    let mut villages: u32 = 0;
    for x in 0..width {
        for y in 0..height {
            let position = GridPos::new(x, y);
            if graph.territory_at(position).is_some() {
                continue;
            }
            if rng.random_range(0..10_000_u32) < threshold {
                graph.insert(Territory::new(
                    TerritoryId::new(format!("territory_village_{x}_{y}")),
                    format!("Village {x}-{y}"),
                    TerritoryType::Village,
                    position,
                ))?;
                villages = villages.saturating_add(1);
            }
        }
    }

    graph.connect_adjacent();
    debug!(
        territories = graph.len(),
        villages,
        width,
        height,
        "Territory graph built"
    );
    Ok(graph)
}

/// Convert a probability into a threshold on a `0..10_000` roll.
fn per_ten_thousand(probability: Decimal) -> u32 {
    probability
        .clamp(Decimal::ZERO, Decimal::ONE)
        .saturating_mul(Decimal::from(10_000))
        .trunc()
        .to_u32()
        .unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn layout_without_villages_holds_fifteen_territories() {
        let mut rng = SmallRng::seed_from_u64(42);
        let g = build_graph(10, 10, &standard_layout(), Decimal::ZERO, &mut rng).unwrap();
        assert_eq!(g.len(), 15);
        let capital = g.territory_at(GridPos::new(5, 5)).unwrap();
        assert_eq!(capital.territory_type(), TerritoryType::Capital);
        // Only the city/fortress pairs touch without villages.
        let north_city = g.get(&TerritoryId::from("territory_north_city")).unwrap();
        assert!(north_city.is_adjacent_to(&TerritoryId::from("territory_north_fortress")));
        assert!(capital.adjacent().is_empty());
    }

    #[test]
    fn full_fill_covers_every_cell() {
        let mut rng = SmallRng::seed_from_u64(42);
        let g = build_graph(10, 10, &standard_layout(), Decimal::ONE, &mut rng).unwrap();
        assert_eq!(g.len(), 100);
        assert!(g.get(&TerritoryId::from("territory_village_0_0")).is_some());
        // Interior cells have four neighbors.
        assert_eq!(g.territory_at(GridPos::new(5, 5)).unwrap().adjacent().len(), 4);
        // Corners have two.
        let corner = g.territory_at(GridPos::new(0, 0)).unwrap();
        assert_eq!(corner.adjacent().len(), 2);

        // Flooding from a corner reaches every territory.
        let mut seen = BTreeSet::from([corner.id().clone()]);
        let mut frontier = vec![corner.id().clone()];
        while let Some(id) = frontier.pop() {
            for next in g.get(&id).unwrap().adjacent() {
                if seen.insert(next.clone()) {
                    frontier.push(next.clone());
                }
            }
        }
        assert_eq!(seen.len(), g.len());
    }

    #[test]
    fn generation_is_deterministic_and_symmetric() {
        let build = |seed| {
            let mut rng = SmallRng::seed_from_u64(seed);
            build_graph(10, 10, &standard_layout(), dec!(0.3), &mut rng).unwrap()
        };
        for seed in 0..20 {
            let a = build(seed);
            let b = build(seed);
            assert_eq!(a.ids(), b.ids());
            for t in a.iter() {
                for other in t.adjacent() {
                    assert!(a.get(other).unwrap().is_adjacent_to(t.id()));
                }
            }
        }
    }

    #[test]
    fn colliding_seeds_are_rejected() {
        let mut seeds = standard_layout();
        seeds.push(TerritorySeed::new("dup", "Dup", TerritoryType::Village, 5, 5));
        let mut rng = SmallRng::seed_from_u64(42);
        assert!(matches!(
            build_graph(10, 10, &seeds, Decimal::ZERO, &mut rng),
            Err(WorldError::CellOccupied { .. })
        ));
    }
}
