//! Dynamic scenario: introspect an arbitrary table and load it.
//!
//! The first worker to touch the scenario discovers the table layout from
//! the information schema and the system catalog, builds the insert/select
//! statements, and chooses an id strategy from the primary key type. The
//! discovered profile is promoted once under a write lock (two-phase: look
//! under a read lock, discover with no lock held, install under the write
//! lock); every later use copies what it needs out under a read lock.

use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::postgres::PgConnection;
use sqlx::Row;

use pgsurge_core::{SurgeError, SurgeResult};

use crate::generator::generate_value;
use crate::ids::{IdSource, ID_CACHE_CAPACITY};
use crate::scenario::Scenario;

/// Metadata for one table column, in ordinal order as discovered.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub has_default: bool,
    /// Auto-generated columns (default expression calls a sequence).
    pub is_serial: bool,
}

/// Everything discovery yields for one table.
struct TableProfile {
    /// Columns inserts supply values for; serials are excluded.
    insert_columns: Vec<ColumnInfo>,
    insert_sql: Option<String>,
    select_sql: String,
    source: IdSource,
}

const AUTO_DISCOVER_TABLE_SQL: &str = "SELECT table_schema, table_name \
     FROM information_schema.tables \
     WHERE table_schema = 'public' AND table_type = 'BASE TABLE' \
     ORDER BY table_name LIMIT 1";

const COLUMNS_SQL: &str = "SELECT \
        c.column_name, \
        c.data_type, \
        c.is_nullable = 'YES' AS is_nullable, \
        c.column_default IS NOT NULL AS has_default, \
        COALESCE(c.column_default LIKE 'nextval%', false) AS is_serial \
     FROM information_schema.columns c \
     WHERE c.table_schema = $1 AND c.table_name = $2 \
     ORDER BY c.ordinal_position";

const PRIMARY_KEY_SQL: &str = "SELECT a.attname, format_type(a.atttypid, a.atttypmod) \
     FROM pg_index i \
     JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey) \
     WHERE i.indrelid = $1::regclass AND i.indisprimary \
     LIMIT 1";

/// Scenario that drives reads and writes against a user-chosen table.
pub struct DynamicScenario {
    schema: String,
    table: String,
    state: RwLock<Option<TableProfile>>,
}

impl DynamicScenario {
    /// `table_name` is `"schema.name"` or `"name"` (default schema
    /// `public`); empty means pick the first base table alphabetically.
    pub fn new(table_name: &str) -> Self {
        let (schema, table) = parse_table(table_name);
        Self {
            schema,
            table,
            state: RwLock::new(None),
        }
    }

    async fn ensure_initialized(&self, conn: &mut PgConnection) -> SurgeResult<()> {
        if self.state.read().is_some() {
            return Ok(());
        }

        let profile = discover(conn, &self.schema, &self.table).await?;

        let mut state = self.state.write();
        if state.is_none() {
            *state = Some(profile);
        }
        Ok(())
    }
}

#[async_trait]
impl Scenario for DynamicScenario {
    fn name(&self) -> String {
        if self.table.is_empty() {
            "custom:auto".to_string()
        } else {
            format!("custom:{}", self.table)
        }
    }

    fn description(&self) -> String {
        if self.table.is_empty() {
            "Custom table: <auto-discover>".to_string()
        } else {
            format!("Custom table: {}", self.table)
        }
    }

    fn table_name(&self) -> String {
        self.table.clone()
    }

    async fn initialize(&self, conn: &mut PgConnection) -> SurgeResult<()> {
        self.ensure_initialized(conn).await
    }

    async fn execute_read(&self, conn: &mut PgConnection) -> SurgeResult<()> {
        self.ensure_initialized(conn).await?;

        let (select_sql, key) = {
            let state = self.state.read();
            let profile = state
                .as_ref()
                .ok_or_else(|| SurgeError::scenario("dynamic scenario not initialized"))?;
            (profile.select_sql.clone(), profile.source.pick())
        };

        // No key means an empty table under the cache strategy; succeed
        // without a query so bootstrap does not manufacture errors.
        let Some(key) = key else {
            return Ok(());
        };

        key.bind(sqlx::query(&select_sql))
            .fetch_one(&mut *conn)
            .await?;
        Ok(())
    }

    async fn execute_write(&self, conn: &mut PgConnection) -> SurgeResult<()> {
        self.ensure_initialized(conn).await?;

        let (insert_sql, insert_columns) = {
            let state = self.state.read();
            let profile = state
                .as_ref()
                .ok_or_else(|| SurgeError::scenario("dynamic scenario not initialized"))?;
            (profile.insert_sql.clone(), profile.insert_columns.clone())
        };

        let Some(sql) = insert_sql else {
            return Err(SurgeError::scenario("no insertable columns"));
        };

        let mut query = sqlx::query(&sql);
        for col in &insert_columns {
            query = generate_value(&col.data_type, &col.name).bind(query);
        }

        let row = query.fetch_one(&mut *conn).await?;
        let new_id: String = row.try_get(0)?;

        if let Some(profile) = self.state.write().as_mut() {
            profile.source.record(new_id);
        }
        Ok(())
    }
}

/// Split `"schema.name"` into components; bare names land in `public`.
fn parse_table(table_name: &str) -> (String, String) {
    match table_name.split_once('.') {
        Some((schema, table)) => (schema.to_string(), table.to_string()),
        None => ("public".to_string(), table_name.to_string()),
    }
}

fn is_integer_pk(pk_type: &str) -> bool {
    let lower = pk_type.to_lowercase();
    (lower.contains("int") || lower.contains("serial")) && !lower.contains("uuid")
}

fn build_insert_sql(
    schema: &str,
    table: &str,
    insert_columns: &[ColumnInfo],
    primary_key: &str,
) -> Option<String> {
    if insert_columns.is_empty() {
        return None;
    }

    let names: Vec<&str> = insert_columns.iter().map(|c| c.name.as_str()).collect();
    let placeholders: Vec<String> = (1..=insert_columns.len()).map(|i| format!("${i}")).collect();

    Some(format!(
        "INSERT INTO {schema}.{table} ({}) VALUES ({}) RETURNING {primary_key}::text",
        names.join(", "),
        placeholders.join(", "),
    ))
}

fn build_select_sql(
    schema: &str,
    table: &str,
    columns: &[ColumnInfo],
    primary_key: &str,
) -> String {
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    format!(
        "SELECT {} FROM {schema}.{table} WHERE {primary_key} = $1",
        names.join(", "),
    )
}

/// Run the discovery steps, strictly ordered: resolve the table, load
/// columns, resolve the primary key, choose the id strategy, build
/// statements.
async fn discover(
    conn: &mut PgConnection,
    declared_schema: &str,
    declared_table: &str,
) -> SurgeResult<TableProfile> {
    let (schema, table) = if declared_table.is_empty() {
        let row = sqlx::query(AUTO_DISCOVER_TABLE_SQL)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| {
                SurgeError::introspection("no base tables found in schema public")
            })?;
        (row.try_get::<String, _>(0)?, row.try_get::<String, _>(1)?)
    } else {
        (declared_schema.to_string(), declared_table.to_string())
    };

    let rows = sqlx::query(COLUMNS_SQL)
        .bind(&schema)
        .bind(&table)
        .fetch_all(&mut *conn)
        .await?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in rows {
        columns.push(ColumnInfo {
            name: row.try_get(0)?,
            data_type: row.try_get(1)?,
            is_nullable: row.try_get(2)?,
            has_default: row.try_get(3)?,
            is_serial: row.try_get(4)?,
        });
    }

    if columns.is_empty() {
        return Err(SurgeError::introspection(format!(
            "table {schema}.{table} not found or has no columns"
        )));
    }

    let insert_columns: Vec<ColumnInfo> = columns
        .iter()
        .filter(|c| !c.is_serial)
        .cloned()
        .collect();

    let (primary_key, primary_key_type) = match sqlx::query(PRIMARY_KEY_SQL)
        .bind(format!("{schema}.{table}"))
        .fetch_optional(&mut *conn)
        .await
    {
        Ok(Some(row)) => (row.try_get::<String, _>(0)?, row.try_get::<String, _>(1)?),
        // No primary key (or unresolvable relation): fall back to the
        // first column.
        _ => (columns[0].name.clone(), columns[0].data_type.clone()),
    };

    let source = if is_integer_pk(&primary_key_type) {
        let max_id = sqlx::query(&format!(
            "SELECT MAX({primary_key}) FROM {schema}.{table}"
        ))
        .fetch_one(&mut *conn)
        .await
        .ok()
        .and_then(|row| row.try_get::<Option<i64>, _>(0).ok().flatten())
        .unwrap_or(1)
        .max(1);
        IdSource::Range { max_id }
    } else {
        let ids = match sqlx::query(&format!(
            "SELECT {primary_key}::text FROM {schema}.{table} LIMIT {ID_CACHE_CAPACITY}"
        ))
        .fetch_all(&mut *conn)
        .await
        {
            Ok(rows) => rows
                .into_iter()
                .filter_map(|row| row.try_get::<String, _>(0).ok())
                .collect(),
            Err(_) => Vec::new(),
        };
        IdSource::Cache { ids }
    };

    let insert_sql = build_insert_sql(&schema, &table, &insert_columns, &primary_key);
    let select_sql = build_select_sql(&schema, &table, &columns, &primary_key);

    Ok(TableProfile {
        insert_columns,
        insert_sql,
        select_sql,
        source,
    })
}
