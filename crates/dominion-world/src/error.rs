//! Error types for the `dominion-world` crate.
//!
//! All fallible operations in this crate return [`WorldError`] through the
//! standard [`Result`] type.

use dominion_types::{GridPos, TerritoryId};

/// Errors that can occur during territory-graph operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    /// A territory was not found in the graph.
    #[error("territory not found: {0}")]
    TerritoryNotFound(TerritoryId),

    /// A territory with the same id already exists.
    #[error("duplicate territory id: {0}")]
    DuplicateTerritory(TerritoryId),

    /// Another territory already occupies the grid cell.
    #[error("cell {position} already holds territory {existing}")]
    CellOccupied {
        /// The contested cell.
        position: GridPos,
        /// The territory already placed there.
        existing: TerritoryId,
    },

    /// The position lies outside the map bounds.
    #[error("position {position} is outside the {width}x{height} map")]
    OutOfBounds {
        /// The offending position.
        position: GridPos,
        /// Map width.
        width: i32,
        /// Map height.
        height: i32,
    },
}
