//! Query builder for history records.
//!
//! [`RecordQuery`] filters the `counts` table by a half-open local wall-time
//! range and paginates the result.
//!
//! # Example
//!
//! ```
//! use occupancy_store::{RecordQuery, Store};
//! use time::macros::datetime;
//!
//! let store = Store::open_in_memory()?;
//!
//! let query = RecordQuery::new()
//!     .since(datetime!(2026-02-10 00:00:00))
//!     .until(datetime!(2026-02-11 00:00:00))
//!     .limit(100);
//!
//! let records = store.query_records(&query)?;
//! assert!(records.is_empty());
//! # Ok::<(), occupancy_store::Error>(())
//! ```

use time::PrimitiveDateTime;

use occupancy_types::formats::format_wall_clock;

/// Fluent query builder for history records.
///
/// Results are ordered by timestamp ascending unless
/// [`newest_first`](Self::newest_first) is set.
#[derive(Debug, Default, Clone)]
pub struct RecordQuery {
    /// Include records at or after this wall time.
    pub since: Option<PrimitiveDateTime>,
    /// Include records strictly before this wall time.
    pub until: Option<PrimitiveDateTime>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Offset for pagination.
    pub offset: Option<u32>,
    /// Order by timestamp descending.
    pub newest_first: bool,
}

impl RecordQuery {
    /// Create a query over all records, oldest first.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records at or after `time`.
    pub fn since(mut self, time: PrimitiveDateTime) -> Self {
        self.since = Some(time);
        self
    }

    /// Records strictly before `time`.
    pub fn until(mut self, time: PrimitiveDateTime) -> Self {
        self.until = Some(time);
        self
    }

    /// Limit the number of results.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first N results.
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Order results newest first.
    pub fn newest_first(mut self) -> Self {
        self.newest_first = true;
        self
    }

    /// Build the SQL WHERE clause and parameters.
    pub(crate) fn build_where(&self) -> (String, Vec<String>) {
        let mut conditions = Vec::new();
        let mut params = Vec::new();

        if let Some(since) = self.since {
            conditions.push("timestamp >= ?");
            params.push(format_wall_clock(since));
        }

        if let Some(until) = self.until {
            conditions.push("timestamp < ?");
            params.push(format_wall_clock(until));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    /// Build the full SQL query.
    pub(crate) fn build_sql(&self) -> String {
        let (where_clause, _) = self.build_where();
        let order = if self.newest_first { "DESC" } else { "ASC" };

        let mut sql = format!(
            "SELECT id, timestamp, count_in, count_out, occupancy \
             FROM counts {} ORDER BY timestamp {}, id {}",
            where_clause, order, order
        );

        // SQLite only accepts OFFSET after LIMIT
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => {
                sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset))
            }
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", limit)),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset)),
            (None, None) => {}
        }

        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_record_query_new_is_oldest_first() {
        let query = RecordQuery::new();
        assert!(!query.newest_first);
        assert!(query.since.is_none());
        assert!(query.limit.is_none());
    }

    #[test]
    fn test_record_query_chaining() {
        let since = datetime!(2026-02-01 00:00:00);
        let until = datetime!(2026-03-01 00:00:00);

        let query = RecordQuery::new()
            .since(since)
            .until(until)
            .limit(10)
            .offset(5)
            .newest_first();

        assert_eq!(query.since, Some(since));
        assert_eq!(query.until, Some(until));
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.offset, Some(5));
        assert!(query.newest_first);
    }

    #[test]
    fn test_build_where_empty() {
        let (where_clause, params) = RecordQuery::new().build_where();
        assert_eq!(where_clause, "");
        assert!(params.is_empty());
    }

    #[test]
    fn test_build_where_is_half_open() {
        let query = RecordQuery::new()
            .since(datetime!(2026-02-10 00:00:00))
            .until(datetime!(2026-02-11 00:00:00));
        let (where_clause, params) = query.build_where();

        assert_eq!(where_clause, "WHERE timestamp >= ? AND timestamp < ?");
        assert_eq!(params, vec!["2026-02-10 00:00:00", "2026-02-11 00:00:00"]);
    }

    #[test]
    fn test_build_sql_basic() {
        let sql = RecordQuery::new().build_sql();
        assert!(sql.contains("FROM counts"));
        assert!(sql.contains("ORDER BY timestamp ASC"));
        assert!(!sql.contains("WHERE"));
        assert!(!sql.contains("LIMIT"));
    }

    #[test]
    fn test_build_sql_offset_without_limit() {
        let sql = RecordQuery::new().offset(25).build_sql();
        assert!(sql.contains("LIMIT -1 OFFSET 25"));
    }

    #[test]
    fn test_build_sql_newest_first_with_limit() {
        let sql = RecordQuery::new().newest_first().limit(1).build_sql();
        assert!(sql.contains("ORDER BY timestamp DESC"));
        assert!(sql.ends_with("LIMIT 1"));
    }
}
