//! Random value generation keyed on column type and name.
//!
//! Column name patterns are tried first so that an `email` column receives
//! something that looks like an email address rather than a generic string;
//! when no pattern matches, the declared type governs. Values come from
//! `rand` distributions plus small curated word tables.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::json;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::Postgres;
use uuid::Uuid;

/// A generated value ready to bind onto a parameterized query.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Bool(bool),
    Real(f32),
    Double(f64),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Json(serde_json::Value),
    Bytes(Vec<u8>),
}

impl SqlValue {
    /// Bind this value as the next positional parameter.
    pub fn bind(
        self,
        query: Query<'_, Postgres, PgArguments>,
    ) -> Query<'_, Postgres, PgArguments> {
        match self {
            SqlValue::Text(v) => query.bind(v),
            SqlValue::SmallInt(v) => query.bind(v),
            SqlValue::Int(v) => query.bind(v),
            SqlValue::BigInt(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Real(v) => query.bind(v),
            SqlValue::Double(v) => query.bind(v),
            SqlValue::Uuid(v) => query.bind(v),
            SqlValue::Timestamp(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::Json(v) => query.bind(v),
            SqlValue::Bytes(v) => query.bind(v),
        }
    }
}

/// Generate a random value appropriate for the given Postgres column.
///
/// Name patterns dominate (case-insensitive substring match); type decides
/// otherwise. Unknown types fall back to a short sentence.
pub fn generate_value(col_type: &str, col_name: &str) -> SqlValue {
    let col_type = col_type.to_lowercase();
    let col_name = col_name.to_lowercase();

    if col_name.contains("email") {
        return SqlValue::Text(fakes::email());
    }
    if col_name.contains("username") || col_name.contains("user_name") {
        return SqlValue::Text(fakes::username());
    }
    if col_name.contains("first_name") || col_name.contains("firstname") {
        return SqlValue::Text(fakes::first_name());
    }
    if col_name.contains("last_name") || col_name.contains("lastname") {
        return SqlValue::Text(fakes::last_name());
    }
    if col_name.contains("full_name") || col_name.contains("fullname") || col_name == "name" {
        return SqlValue::Text(fakes::full_name());
    }
    if col_name.contains("phone") || col_name.contains("cell") || col_name.contains("mobile") {
        return SqlValue::Text(fakes::phone());
    }
    if col_name.contains("city") {
        return SqlValue::Text(fakes::city());
    }
    if col_name.contains("country") {
        return SqlValue::Text(fakes::country());
    }
    if col_name.contains("state") || col_name.contains("province") {
        return SqlValue::Text(fakes::state());
    }
    if col_name.contains("zip") || col_name.contains("postal") {
        return SqlValue::Text(fakes::zip());
    }
    if col_name.contains("address") {
        return SqlValue::Text(fakes::street_address());
    }
    if col_name.contains("company") || col_name.contains("org") {
        return SqlValue::Text(fakes::company());
    }
    if col_name.contains("job") || col_name.contains("title") {
        return SqlValue::Text(fakes::job_title());
    }
    if col_name.contains("bio") || col_name.contains("description") {
        return SqlValue::Text(fakes::sentence(10));
    }
    if col_name.contains("url") || col_name.contains("link") || col_name.contains("website") {
        return SqlValue::Text(fakes::url());
    }
    if col_name.contains("ipv6") {
        return SqlValue::Text(fakes::ipv6());
    }
    if col_name.contains("ipv4") || col_name.contains("ip_address") {
        return SqlValue::Text(fakes::ipv4());
    }
    if col_name.contains("user_agent") {
        return SqlValue::Text(fakes::user_agent());
    }

    let mut rng = rand::thread_rng();
    match col_type.as_str() {
        t if t.starts_with("varchar") || t.starts_with("character varying") => {
            SqlValue::Text(fakes::sentence(5))
        }
        t if t == "text" || t.starts_with("char") => SqlValue::Text(fakes::sentence(5)),
        "integer" | "int" | "int4" => SqlValue::Int(rng.gen_range(0..1_000_000)),
        "bigint" | "int8" => SqlValue::BigInt(rng.gen_range(0..1_000_000_000)),
        "smallint" | "int2" => SqlValue::SmallInt(rng.gen_range(0..32_000)),
        "boolean" | "bool" => SqlValue::Bool(rng.gen()),
        "real" | "float4" => SqlValue::Real(rng.gen_range(0.0..1_000.0)),
        "double precision" | "float8" => SqlValue::Double(rng.gen_range(0.0..10_000.0)),
        t if t.starts_with("numeric") || t.starts_with("decimal") => {
            SqlValue::Double(rng.gen_range(0.0..10_000.0))
        }
        "uuid" => SqlValue::Uuid(Uuid::new_v4()),
        "timestamp" | "timestamp without time zone" | "timestamptz"
        | "timestamp with time zone" => SqlValue::Timestamp(fakes::datetime()),
        "date" => SqlValue::Date(fakes::datetime().date_naive()),
        "time" | "time without time zone" => {
            SqlValue::Text(fakes::datetime().format("%H:%M:%S").to_string())
        }
        "timetz" | "time with time zone" => {
            SqlValue::Text(fakes::datetime().format("%H:%M:%S+00:00").to_string())
        }
        "jsonb" | "json" => SqlValue::Json(json_payload()),
        "bytea" => SqlValue::Bytes(fakes::sentence(5).into_bytes()),
        t if t.starts_with("interval") => {
            SqlValue::Text(format!("{} hours", rng.gen_range(1..=24)))
        }
        _ => SqlValue::Text(fakes::sentence(5)),
    }
}

/// Small structured object used for json/jsonb columns.
pub fn json_payload() -> serde_json::Value {
    let mut rng = rand::thread_rng();
    json!({
        "id": Uuid::new_v4().to_string(),
        "timestamp": Utc::now().timestamp(),
        "name": fakes::full_name(),
        "active": rng.gen::<bool>(),
        "score": rng.gen_range(0.0..100.0),
        "tags": [fakes::word(), fakes::word()],
        "metadata": {
            "version": "1.0",
            "source": "generated",
            "job": fakes::job_title(),
        },
    })
}

/// Curated word tables and combinators for realistic-looking fakes.
mod fakes {
    use super::*;

    const FIRST_NAMES: &[&str] = &[
        "Ada", "Bruno", "Carmen", "Dmitri", "Elena", "Felix", "Greta", "Hugo", "Ines", "Jonas",
        "Klara", "Luis", "Mara", "Nikolai", "Olivia", "Pavel",
    ];

    const LAST_NAMES: &[&str] = &[
        "Almeida", "Berger", "Castillo", "Dvorak", "Eriksen", "Fischer", "Garcia", "Huang",
        "Ivanov", "Jansen", "Keller", "Lindgren", "Moreau", "Novak", "Okafor", "Petrov",
    ];

    const WORDS: &[&str] = &[
        "amber", "basalt", "cedar", "delta", "ember", "fjord", "granite", "harbor", "indigo",
        "juniper", "krypton", "lumen", "meadow", "nimbus", "onyx", "prairie", "quartz", "ridge",
        "summit", "tundra", "umber", "vertex", "willow", "zephyr",
    ];

    const DOMAINS: &[&str] = &[
        "example.com", "example.org", "example.net", "mail.test", "inbox.test",
    ];

    const CITIES: &[&str] = &[
        "Aurora", "Brighton", "Clearwater", "Dunmore", "Eastvale", "Fairview", "Greenfield",
        "Harborview", "Ironton", "Juniper Falls", "Kingsport", "Lakewood",
    ];

    const COUNTRIES: &[&str] = &[
        "Argentina", "Brazil", "Canada", "Denmark", "Estonia", "Finland", "Germany", "Hungary",
        "Ireland", "Japan", "Kenya", "Latvia",
    ];

    const STATES: &[&str] = &[
        "Arizona", "Colorado", "Georgia", "Kansas", "Montana", "Nevada", "Oregon", "Texas",
        "Utah", "Vermont",
    ];

    const STREETS: &[&str] = &[
        "Maple Street", "Oak Avenue", "Pine Road", "Cedar Lane", "Birch Boulevard",
        "Elm Court", "Willow Way", "Aspen Drive",
    ];

    const COMPANIES: &[&str] = &[
        "Acme Holdings", "Borealis Labs", "Cobalt Systems", "Driftwood Co", "Everline Group",
        "Foxglove Industries", "Gale & Sons", "Hollow Oak Trading",
    ];

    const JOB_TITLES: &[&str] = &[
        "Account Manager", "Backend Engineer", "Data Analyst", "Field Technician",
        "Logistics Coordinator", "Product Designer", "Quality Inspector", "Support Specialist",
    ];

    const USER_AGENTS: &[&str] = &[
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_2) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
        "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
        "Mozilla/5.0 (iPhone; CPU iPhone OS 17_2 like Mac OS X) AppleWebKit/605.1.15 Mobile/15E148",
    ];

    fn choose(table: &[&str]) -> String {
        table
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or_default()
            .to_string()
    }

    pub fn word() -> String {
        choose(WORDS)
    }

    pub fn sentence(words: usize) -> String {
        let mut rng = rand::thread_rng();
        let mut parts = Vec::with_capacity(words);
        for _ in 0..words {
            parts.push(*WORDS.choose(&mut rng).unwrap_or(&"quartz"));
        }
        let mut sentence = parts.join(" ");
        if let Some(first) = sentence.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        sentence.push('.');
        sentence
    }

    pub fn first_name() -> String {
        choose(FIRST_NAMES)
    }

    pub fn last_name() -> String {
        choose(LAST_NAMES)
    }

    pub fn full_name() -> String {
        format!("{} {}", first_name(), last_name())
    }

    pub fn username() -> String {
        let mut rng = rand::thread_rng();
        format!(
            "{}{}",
            first_name().to_lowercase(),
            rng.gen_range(1..10_000)
        )
    }

    pub fn email() -> String {
        format!("{}@{}", username(), choose(DOMAINS))
    }

    pub fn phone() -> String {
        let mut rng = rand::thread_rng();
        format!(
            "+1-{:03}-{:03}-{:04}",
            rng.gen_range(200..999),
            rng.gen_range(200..999),
            rng.gen_range(0..10_000)
        )
    }

    pub fn city() -> String {
        choose(CITIES)
    }

    pub fn country() -> String {
        choose(COUNTRIES)
    }

    pub fn state() -> String {
        choose(STATES)
    }

    pub fn zip() -> String {
        format!("{:05}", rand::thread_rng().gen_range(10_000..99_999))
    }

    pub fn street_address() -> String {
        format!(
            "{} {}",
            rand::thread_rng().gen_range(1..9_999),
            choose(STREETS)
        )
    }

    pub fn company() -> String {
        choose(COMPANIES)
    }

    pub fn job_title() -> String {
        choose(JOB_TITLES)
    }

    pub fn url() -> String {
        format!("https://www.{}.{}", word(), "example.com")
    }

    pub fn ipv4() -> String {
        let mut rng = rand::thread_rng();
        format!(
            "{}.{}.{}.{}",
            rng.gen_range(1..255),
            rng.gen_range(0..255),
            rng.gen_range(0..255),
            rng.gen_range(1..255)
        )
    }

    pub fn ipv6() -> String {
        let mut rng = rand::thread_rng();
        let mut groups = Vec::with_capacity(8);
        for _ in 0..8 {
            groups.push(format!("{:x}", rng.gen_range(0..0x1_0000)));
        }
        groups.join(":")
    }

    pub fn user_agent() -> String {
        choose(USER_AGENTS)
    }

    /// Random instant within roughly the last fifty years.
    pub fn datetime() -> DateTime<Utc> {
        let mut rng = rand::thread_rng();
        Utc::now()
            - ChronoDuration::days(rng.gen_range(0..18_250))
            - ChronoDuration::seconds(rng.gen_range(0..86_400))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_patterns_beat_types() {
        match generate_value("integer", "contact_email") {
            SqlValue::Text(v) => assert!(v.contains('@')),
            other => panic!("expected text email, got {other:?}"),
        }

        match generate_value("text", "username") {
            SqlValue::Text(v) => assert!(!v.contains(' ')),
            other => panic!("expected username, got {other:?}"),
        }
    }

    #[test]
    fn test_exact_name_column_gets_full_name() {
        match generate_value("text", "name") {
            SqlValue::Text(v) => assert!(v.contains(' ')),
            other => panic!("expected full name, got {other:?}"),
        }
    }

    #[test]
    fn test_integer_widths() {
        assert!(matches!(generate_value("int4", "counter"), SqlValue::Int(_)));
        assert!(matches!(
            generate_value("bigint", "counter"),
            SqlValue::BigInt(_)
        ));
        match generate_value("smallint", "counter") {
            SqlValue::SmallInt(v) => assert!((0..32_000).contains(&v)),
            other => panic!("expected smallint, got {other:?}"),
        }
    }

    #[test]
    fn test_type_fallbacks() {
        assert!(matches!(generate_value("uuid", "ref"), SqlValue::Uuid(_)));
        assert!(matches!(generate_value("boolean", "flag"), SqlValue::Bool(_)));
        assert!(matches!(generate_value("bytea", "blob"), SqlValue::Bytes(_)));
        assert!(matches!(generate_value("date", "born"), SqlValue::Date(_)));
        assert!(matches!(
            generate_value("timestamp with time zone", "seen_at"),
            SqlValue::Timestamp(_)
        ));
        match generate_value("double precision", "weight") {
            SqlValue::Double(v) => assert!((0.0..10_000.0).contains(&v)),
            other => panic!("expected double, got {other:?}"),
        }
    }

    #[test]
    fn test_interval_renders_hours() {
        match generate_value("interval", "lease") {
            SqlValue::Text(v) => assert!(v.ends_with(" hours")),
            other => panic!("expected interval text, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_is_sentence() {
        match generate_value("tsvector", "search") {
            SqlValue::Text(v) => assert!(v.ends_with('.')),
            other => panic!("expected sentence, got {other:?}"),
        }
    }

    #[test]
    fn test_json_payload_shape() {
        let payload = json_payload();
        assert!(payload.get("id").is_some());
        assert!(payload.get("timestamp").is_some());
        assert!(payload.get("name").is_some());
        assert!(payload.get("active").is_some());
        assert!(payload.get("score").is_some());
        assert_eq!(payload["tags"].as_array().map(Vec::len), Some(2));
        assert_eq!(payload["metadata"]["version"], "1.0");
    }

    #[test]
    fn test_jsonb_column_generates_json() {
        assert!(matches!(
            generate_value("jsonb", "payload"),
            SqlValue::Json(_)
        ));
    }
}
