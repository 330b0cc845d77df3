//! Pure settlement logic for Railtown.
//!
//! This crate holds everything about settlements that can be computed from
//! plain numbers: the tuning constants, the tourist capacity and growth
//! formulas, placement geometry and the tick cadences the engine runs on.
//! Nothing here owns state or touches the host world, so every function is
//! unit-testable on its own.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`cadence`] | Fixed tick-modulo schedules for periodic systems |
//! | [`capacity`] | Tourist capacity, spawn eligibility, growth accounting, boundary radius |
//! | [`config`] | Tunable constants, JSON loading and validation |
//! | [`geometry`] | Block positions, distances and bounding volumes |

pub mod cadence;
pub mod capacity;
pub mod config;
pub mod geometry;
