//! Rule evaluation engine.
//!
//! Turns stored rule configurations plus a pair of market snapshots into a
//! stream of [`AlertEvent`]s. Evaluation is synchronous and pure: the same
//! inputs always produce the same events, and nothing here performs I/O.

pub mod alert;
pub mod config;
pub mod engine;
pub mod error;
pub mod expr;
pub mod rules;

pub use alert::{AlertEvent, Severity};
pub use config::{RuleConfig, RuleKind};
pub use engine::RuleEngine;
pub use error::EngineError;
pub use rules::{Evaluate, Rule};
