//! The inference engine for discrete Bayesian networks.
//!
//! This module provides:
//! - **errors**: Error types for factor algebra, model validation and queries
//! - **variable**: Variables, state labels and the name registry
//! - **factor**: Dense factor tables and their algebra
//! - **network**: Network builder and the frozen, validated network
//! - **evidence**: Observations resolved against a network at query time
//! - **planner**: Elimination-order heuristics
//! - **elimination**: The three-phase variable-elimination engine
//! - **posterior**: Query results and MAP assignments
//! - **batch**: Independent queries evaluated together

pub mod batch;
pub mod config;
pub mod elimination;
pub mod errors;
pub mod evidence;
pub mod factor;
pub mod network;
pub mod planner;
pub mod posterior;
mod validate;
pub mod variable;
