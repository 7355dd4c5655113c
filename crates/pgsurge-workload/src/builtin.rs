//! Statically shaped built-in scenarios.
//!
//! Each keeps its own id source: an initially empty cache, seeded on
//! initialize by reading up to 10,000 existing ids cast to text. When the
//! seed query fails (table absent, permission denied) the source falls back
//! to probing a fixed integer range.

use async_trait::async_trait;
use parking_lot::RwLock;
use rand::Rng;
use sqlx::postgres::PgConnection;
use sqlx::Row;

use pgsurge_core::SurgeResult;

use crate::generator;
use crate::ids::{IdSource, ReadKey};
use crate::scenario::Scenario;

/// Integer-range bound used when seeding fails.
const FALLBACK_MAX_ID: i64 = 100_000;

/// Seed the shared id cache from existing rows. The first worker to arrive
/// does the work; later workers see a non-empty cache (or the range
/// fallback) and return immediately.
async fn seed_ids(conn: &mut PgConnection, seed_sql: &str, source: &RwLock<IdSource>) {
    {
        let src = source.read();
        match &*src {
            IdSource::Cache { ids } if ids.is_empty() => {}
            _ => return,
        }
    }

    match sqlx::query(seed_sql).fetch_all(&mut *conn).await {
        Ok(rows) => {
            let mut seeded = Vec::with_capacity(rows.len());
            for row in rows {
                if let Ok(id) = row.try_get::<String, _>(0) {
                    seeded.push(id);
                }
            }
            let mut src = source.write();
            if let IdSource::Cache { ids } = &mut *src {
                if ids.is_empty() {
                    *ids = seeded;
                }
            }
        }
        Err(_) => {
            *source.write() = IdSource::Range {
                max_id: FALLBACK_MAX_ID,
            };
        }
    }
}

fn pick_key(source: &RwLock<IdSource>) -> Option<ReadKey> {
    source.read().pick()
}

fn record_id(source: &RwLock<IdSource>, id: String) {
    source.write().record(id);
}

/// Single table of users keyed by a serial id.
pub struct SimpleScenario {
    ids: RwLock<IdSource>,
}

impl SimpleScenario {
    pub fn new() -> Self {
        Self {
            ids: RwLock::new(IdSource::empty_cache()),
        }
    }
}

impl Default for SimpleScenario {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scenario for SimpleScenario {
    fn name(&self) -> String {
        "simple".to_string()
    }

    fn description(&self) -> String {
        "Simple users table (username, email)".to_string()
    }

    fn table_name(&self) -> String {
        "users".to_string()
    }

    async fn initialize(&self, conn: &mut PgConnection) -> SurgeResult<()> {
        seed_ids(conn, "SELECT id::text FROM users LIMIT 10000", &self.ids).await;
        Ok(())
    }

    async fn execute_read(&self, conn: &mut PgConnection) -> SurgeResult<()> {
        let Some(key) = pick_key(&self.ids) else {
            return Ok(());
        };

        key.bind(sqlx::query(
            "SELECT id::text, username, email, created_at FROM users WHERE id = $1",
        ))
        .fetch_one(&mut *conn)
        .await?;
        Ok(())
    }

    async fn execute_write(&self, conn: &mut PgConnection) -> SurgeResult<()> {
        let n: i64 = rand::thread_rng().gen_range(0..i64::MAX);
        let username = format!("user_{n}");
        let email = format!("user_{n}@example.com");

        let row =
            sqlx::query("INSERT INTO users (username, email) VALUES ($1, $2) RETURNING id::text")
                .bind(username)
                .bind(email)
                .fetch_one(&mut *conn)
                .await?;

        let new_id: String = row.try_get(0)?;
        record_id(&self.ids, new_id);
        Ok(())
    }
}

/// Table with a JSONB payload column.
pub struct JsonbScenario {
    ids: RwLock<IdSource>,
}

impl JsonbScenario {
    pub fn new() -> Self {
        Self {
            ids: RwLock::new(IdSource::empty_cache()),
        }
    }
}

impl Default for JsonbScenario {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scenario for JsonbScenario {
    fn name(&self) -> String {
        "jsonb".to_string()
    }

    fn description(&self) -> String {
        "Table with JSONB payload column".to_string()
    }

    fn table_name(&self) -> String {
        "jsonb_data".to_string()
    }

    async fn initialize(&self, conn: &mut PgConnection) -> SurgeResult<()> {
        seed_ids(conn, "SELECT id::text FROM jsonb_data LIMIT 10000", &self.ids).await;
        Ok(())
    }

    async fn execute_read(&self, conn: &mut PgConnection) -> SurgeResult<()> {
        let Some(key) = pick_key(&self.ids) else {
            return Ok(());
        };

        key.bind(sqlx::query(
            "SELECT id, payload, created_at FROM jsonb_data WHERE id = $1",
        ))
        .fetch_one(&mut *conn)
        .await?;
        Ok(())
    }

    async fn execute_write(&self, conn: &mut PgConnection) -> SurgeResult<()> {
        let payload = generator::json_payload();

        let row = sqlx::query("INSERT INTO jsonb_data (payload) VALUES ($1) RETURNING id::text")
            .bind(payload)
            .fetch_one(&mut *conn)
            .await?;

        let new_id: String = row.try_get(0)?;
        record_id(&self.ids, new_id);
        Ok(())
    }
}

/// Wide table with 20 text columns and 5 integer columns.
pub struct WideScenario {
    ids: RwLock<IdSource>,
}

const WIDE_SELECT_SQL: &str = "SELECT id, \
    col_01, col_02, col_03, col_04, col_05, \
    col_06, col_07, col_08, col_09, col_10, \
    col_11, col_12, col_13, col_14, col_15, \
    col_16, col_17, col_18, col_19, col_20, \
    int_01, int_02, int_03, int_04, int_05, \
    created_at FROM wide_data WHERE id = $1";

const WIDE_INSERT_SQL: &str = "INSERT INTO wide_data (\
    col_01, col_02, col_03, col_04, col_05, \
    col_06, col_07, col_08, col_09, col_10, \
    col_11, col_12, col_13, col_14, col_15, \
    col_16, col_17, col_18, col_19, col_20, \
    int_01, int_02, int_03, int_04, int_05\
    ) VALUES (\
    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, \
    $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, \
    $21, $22, $23, $24, $25) RETURNING id::text";

impl WideScenario {
    pub fn new() -> Self {
        Self {
            ids: RwLock::new(IdSource::empty_cache()),
        }
    }
}

impl Default for WideScenario {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scenario for WideScenario {
    fn name(&self) -> String {
        "wide".to_string()
    }

    fn description(&self) -> String {
        "Wide table with 20+ columns".to_string()
    }

    fn table_name(&self) -> String {
        "wide_data".to_string()
    }

    async fn initialize(&self, conn: &mut PgConnection) -> SurgeResult<()> {
        seed_ids(conn, "SELECT id::text FROM wide_data LIMIT 10000", &self.ids).await;
        Ok(())
    }

    async fn execute_read(&self, conn: &mut PgConnection) -> SurgeResult<()> {
        let Some(key) = pick_key(&self.ids) else {
            return Ok(());
        };

        key.bind(sqlx::query(WIDE_SELECT_SQL))
            .fetch_one(&mut *conn)
            .await?;
        Ok(())
    }

    async fn execute_write(&self, conn: &mut PgConnection) -> SurgeResult<()> {
        let mut query = sqlx::query(WIDE_INSERT_SQL);
        for _ in 0..20 {
            query = generator::generate_value("text", "col").bind(query);
        }
        {
            let mut rng = rand::thread_rng();
            for _ in 0..5 {
                query = query.bind(rng.gen_range(0..i32::MAX));
            }
        }

        let row = query.fetch_one(&mut *conn).await?;
        let new_id: String = row.try_get(0)?;
        record_id(&self.ids, new_id);
        Ok(())
    }
}

/// Items joined to categories through a foreign key.
pub struct ForeignKeyScenario {
    ids: RwLock<IdSource>,
    max_category_id: i64,
}

impl ForeignKeyScenario {
    pub fn new() -> Self {
        Self {
            ids: RwLock::new(IdSource::empty_cache()),
            max_category_id: 100,
        }
    }
}

impl Default for ForeignKeyScenario {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scenario for ForeignKeyScenario {
    fn name(&self) -> String {
        "fk".to_string()
    }

    fn description(&self) -> String {
        "Tables with foreign key lookup".to_string()
    }

    fn table_name(&self) -> String {
        "items".to_string()
    }

    async fn initialize(&self, conn: &mut PgConnection) -> SurgeResult<()> {
        seed_ids(conn, "SELECT id::text FROM items LIMIT 10000", &self.ids).await;
        Ok(())
    }

    async fn execute_read(&self, conn: &mut PgConnection) -> SurgeResult<()> {
        let Some(key) = pick_key(&self.ids) else {
            return Ok(());
        };

        key.bind(sqlx::query(
            "SELECT i.id::text, i.name, i.created_at, c.id::text, c.name \
             FROM items i \
             JOIN categories c ON i.category_id = c.id \
             WHERE i.id = $1",
        ))
        .fetch_one(&mut *conn)
        .await?;
        Ok(())
    }

    async fn execute_write(&self, conn: &mut PgConnection) -> SurgeResult<()> {
        let (category_id, name) = {
            let mut rng = rand::thread_rng();
            let category_id: i64 = rng.gen_range(1..=self.max_category_id);
            let name = format!("item_{}", rng.gen_range(0..i64::MAX));
            (category_id, name)
        };

        let row = sqlx::query(
            "INSERT INTO items (category_id, name) VALUES ($1, $2) RETURNING id::text",
        )
        .bind(category_id)
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;

        let new_id: String = row.try_get(0)?;
        record_id(&self.ids, new_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_metadata() {
        let simple = SimpleScenario::new();
        assert_eq!(simple.name(), "simple");
        assert_eq!(simple.table_name(), "users");

        let fk = ForeignKeyScenario::new();
        assert_eq!(fk.name(), "fk");
        assert_eq!(fk.table_name(), "items");

        let info = simple.info();
        assert_eq!(info.name, "simple");
        assert!(!info.description.is_empty());
    }

    #[test]
    fn test_id_state_starts_empty() {
        let wide = WideScenario::new();
        assert!(pick_key(&wide.ids).is_none());

        record_id(&wide.ids, "7".to_string());
        assert_eq!(pick_key(&wide.ids), Some(ReadKey::Text("7".to_string())));
    }
}
