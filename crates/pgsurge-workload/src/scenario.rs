//! Scenario contract and registry.

use std::sync::Arc;

use async_trait::async_trait;
use pgsurge_core::SurgeResult;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnection;

use crate::builtin::{ForeignKeyScenario, JsonbScenario, SimpleScenario, WideScenario};
use crate::dynamic::DynamicScenario;

/// A declarative workload shape exposing read and write operations against
/// a specific table layout.
#[async_trait]
pub trait Scenario: Send + Sync {
    /// Unique identifier for this scenario.
    fn name(&self) -> String;

    /// Human-readable description.
    fn description(&self) -> String;

    /// Primary table this scenario targets.
    fn table_name(&self) -> String;

    /// One-time setup on a live connection (id-cache seeding, table
    /// introspection). Safe to call from every worker; repeated calls are
    /// cheap no-ops once setup has completed.
    async fn initialize(&self, conn: &mut PgConnection) -> SurgeResult<()>;

    /// Perform one read. When no key is known yet (empty table before any
    /// writes) this returns success without issuing a query; bootstrap must
    /// not manufacture an error rate.
    async fn execute_read(&self, conn: &mut PgConnection) -> SurgeResult<()>;

    /// Perform one write.
    async fn execute_write(&self, conn: &mut PgConnection) -> SurgeResult<()>;

    /// Metadata for API listings.
    fn info(&self) -> ScenarioInfo {
        ScenarioInfo {
            name: self.name(),
            description: self.description(),
            table_name: self.table_name(),
        }
    }
}

/// Scenario metadata for API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioInfo {
    pub name: String,
    pub description: String,
    pub table_name: String,
}

/// Holds the built-in scenarios and constructs dynamic ones.
pub struct ScenarioRegistry {
    scenarios: Vec<Arc<dyn Scenario>>,
}

impl ScenarioRegistry {
    /// Registry with all built-in scenarios, in listing order.
    pub fn new() -> Self {
        Self {
            scenarios: vec![
                Arc::new(SimpleScenario::new()),
                Arc::new(JsonbScenario::new()),
                Arc::new(WideScenario::new()),
                Arc::new(ForeignKeyScenario::new()),
            ],
        }
    }

    /// Look up a built-in scenario by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Scenario>> {
        self.scenarios.iter().find(|s| s.name() == name).cloned()
    }

    /// Look up a built-in scenario, falling back to the simple scenario for
    /// unknown names.
    pub fn get_or_simple(&self, name: &str) -> Arc<dyn Scenario> {
        self.get(name)
            .unwrap_or_else(|| Arc::clone(&self.scenarios[0]))
    }

    /// Metadata for all built-ins, in registration order.
    pub fn list(&self) -> Vec<ScenarioInfo> {
        self.scenarios.iter().map(|s| s.info()).collect()
    }

    /// Construct a fresh dynamic scenario for the given table (empty means
    /// auto-discover).
    pub fn create_dynamic(&self, table_name: &str) -> Arc<dyn Scenario> {
        Arc::new(DynamicScenario::new(table_name))
    }
}

impl Default for ScenarioRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_listing_order() {
        let registry = ScenarioRegistry::new();
        let names: Vec<String> = registry.list().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["simple", "jsonb", "wide", "fk"]);
    }

    #[test]
    fn test_lookup_and_fallback() {
        let registry = ScenarioRegistry::new();
        assert!(registry.get("jsonb").is_some());
        assert!(registry.get("nope").is_none());
        assert_eq!(registry.get_or_simple("nope").name(), "simple");
    }

    #[test]
    fn test_dynamic_construction() {
        let registry = ScenarioRegistry::new();
        let scenario = registry.create_dynamic("test.widgets");
        assert_eq!(scenario.name(), "custom:widgets");

        let auto = registry.create_dynamic("");
        assert_eq!(auto.name(), "custom:auto");
    }
}
