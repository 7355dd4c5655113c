//! Id sources: how a scenario picks keys for reads.
//!
//! Two disjoint strategies. An integer range probes `[1, max_id]` and suits
//! dense serial keys; a sampled cache holds up to [`ID_CACHE_CAPACITY`]
//! observed keys as text and suits uuid, text, and sparse keys. Which one a
//! scenario uses is fixed when it initializes.

use rand::seq::SliceRandom;
use rand::Rng;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::Postgres;
use uuid::Uuid;

/// Upper bound on cached keys per scenario.
pub const ID_CACHE_CAPACITY: usize = 10_000;

/// Per-scenario source of read keys.
#[derive(Debug, Clone)]
pub enum IdSource {
    /// Dense integer keys in `[1, max_id]`, `max_id >= 1`.
    Range { max_id: i64 },
    /// Bounded sample of observed keys, stringified.
    Cache { ids: Vec<String> },
}

/// One key chosen for a read.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadKey {
    Int(i64),
    Text(String),
}

impl IdSource {
    /// A cache with nothing in it yet.
    pub fn empty_cache() -> Self {
        Self::Cache { ids: Vec::new() }
    }

    /// Pick a key for a read, or `None` when no key is known (empty cache).
    pub fn pick(&self) -> Option<ReadKey> {
        let mut rng = rand::thread_rng();
        match self {
            Self::Range { max_id } => Some(ReadKey::Int(rng.gen_range(1..=(*max_id).max(1)))),
            Self::Cache { ids } => ids.choose(&mut rng).cloned().map(ReadKey::Text),
        }
    }

    /// Record a freshly inserted key. Caches append until capacity and then
    /// replace a random slot, yielding a bounded random sample of recent
    /// keys over time; ranges ignore the observation.
    pub fn record(&mut self, id: String) {
        if let Self::Cache { ids } = self {
            if ids.len() < ID_CACHE_CAPACITY {
                ids.push(id);
            } else {
                let slot = rand::thread_rng().gen_range(0..ids.len());
                ids[slot] = id;
            }
        }
    }

    /// Number of cached keys (zero for ranges).
    pub fn cached_len(&self) -> usize {
        match self {
            Self::Range { .. } => 0,
            Self::Cache { ids } => ids.len(),
        }
    }
}

impl ReadKey {
    /// Bind this key as the next positional parameter.
    ///
    /// Cached keys travel as text; bind with the narrowest type the value
    /// parses as so the comparison matches the column's native type.
    pub fn bind(
        self,
        query: Query<'_, Postgres, PgArguments>,
    ) -> Query<'_, Postgres, PgArguments> {
        match self {
            Self::Int(v) => query.bind(v),
            Self::Text(s) => {
                if let Ok(parsed) = Uuid::parse_str(&s) {
                    query.bind(parsed)
                } else if let Ok(parsed) = s.parse::<i64>() {
                    query.bind(parsed)
                } else {
                    query.bind(s)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cache_yields_nothing() {
        let source = IdSource::empty_cache();
        assert!(source.pick().is_none());
        assert_eq!(source.cached_len(), 0);
    }

    #[test]
    fn test_range_pick_in_bounds() {
        let source = IdSource::Range { max_id: 100 };
        for _ in 0..1_000 {
            match source.pick() {
                Some(ReadKey::Int(v)) => assert!((1..=100).contains(&v)),
                other => panic!("expected integer key, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_cache_pick_returns_member() {
        let mut source = IdSource::empty_cache();
        source.record("a".to_string());
        source.record("b".to_string());

        match source.pick() {
            Some(ReadKey::Text(v)) => assert!(v == "a" || v == "b"),
            other => panic!("expected cached key, got {other:?}"),
        }
    }

    #[test]
    fn test_cache_replaces_at_capacity() {
        let mut source = IdSource::Cache {
            ids: (0..ID_CACHE_CAPACITY).map(|i| i.to_string()).collect(),
        };

        source.record("fresh".to_string());
        assert_eq!(source.cached_len(), ID_CACHE_CAPACITY);
    }

    #[test]
    fn test_range_ignores_records() {
        let mut source = IdSource::Range { max_id: 10 };
        source.record("42".to_string());
        assert_eq!(source.cached_len(), 0);
    }
}
