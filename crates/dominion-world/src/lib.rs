//! Territories and the territory graph for the Dominion simulation.
//!
//! This crate models the conquerable map: territories as nodes carrying
//! ownership, economy and defense, undirected grid adjacency as edges, and
//! an owner index that keeps ownership bidirectionally consistent.
//!
//! # Modules
//!
//! - [`error`] -- Error types for graph operations.
//! - [`territory`] -- The [`Territory`] entity with development, defense and
//!   income rules.
//! - [`territory_graph`] -- The [`TerritoryGraph`] arena with cell, id and
//!   owner indices plus the attack reachability rule.
//! - [`starting_world`] -- The standard fifteen-territory layout and
//!   randomized village scattering.

pub mod error;
pub mod starting_world;
pub mod territory;
pub mod territory_graph;

// Re-export primary types at crate root.
pub use error::WorldError;
pub use starting_world::{DEFAULT_HEIGHT, DEFAULT_WIDTH, TerritorySeed, build_graph, standard_layout};
pub use territory::Territory;
pub use territory_graph::TerritoryGraph;
