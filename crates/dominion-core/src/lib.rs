//! Conquest scheduling, simulation engine and runtime loop for Dominion.
//!
//! This crate ties the territory graph and the guild/diplomacy layer into a
//! running simulation: territory battles with alliance aggregation, income,
//! development, the two periodic ticks and the real-time loop that drives
//! them.
//!
//! # Modules
//!
//! - [`clock`] -- Monotonic game clock.
//! - [`config`] -- Configuration loading from `dominion-config.yaml` into
//!   strongly-typed structs.
//! - [`scheduler`] -- The [`ConquestScheduler`]: battles, ownership
//!   transfer, income and territory upgrades.
//! - [`engine`] -- The [`Engine`] that owns all state and exposes every
//!   operation.
//! - [`runner`] -- Timer-driven simulation loop and event forwarding.
//!
//! [`ConquestScheduler`]: scheduler::ConquestScheduler
//! [`Engine`]: engine::Engine

pub mod clock;
pub mod config;
pub mod engine;
pub mod runner;
pub mod scheduler;
