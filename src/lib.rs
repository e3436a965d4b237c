//! Multi-board power grid game server.
//!
//! Boards report production and consumption, the facilitator steps a
//! scenario through rounds, and each gameplay round is scored on how close
//! every board kept its grid to balance.

#[cfg(feature = "api")]
pub mod api;
pub mod auth;
/// Board registry, histories and liveness.
pub mod board;
pub mod cli;
pub mod config;
pub mod error;
/// Scenario engine, round resolution and scoring.
pub mod game;
pub mod group;
pub mod io;
pub mod protocol;
pub mod stats;
pub mod telemetry;
