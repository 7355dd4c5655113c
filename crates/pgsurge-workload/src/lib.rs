//! Workload abstraction for the pgsurge load generator.
//!
//! A [`Scenario`] turns a declared workload shape into two executable
//! operations (read, write) against a live connection. Built-in scenarios
//! cover common table layouts; the dynamic scenario introspects an
//! arbitrary user table and generates type-appropriate values for it.

pub mod builtin;
pub mod dynamic;
pub mod generator;
pub mod ids;
pub mod scenario;

pub use builtin::{ForeignKeyScenario, JsonbScenario, SimpleScenario, WideScenario};
pub use dynamic::{ColumnInfo, DynamicScenario};
pub use generator::{generate_value, SqlValue};
pub use ids::{IdSource, ReadKey, ID_CACHE_CAPACITY};
pub use scenario::{Scenario, ScenarioInfo, ScenarioRegistry};
