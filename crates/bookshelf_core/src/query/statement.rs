//! Parameterized SQL statement assembly.
//!
//! # Invariants
//! - SQL text and bound arguments are only ever appended together, so the
//!   number of `?` placeholders equals `args.len()`.

use rusqlite::types::Value;

/// Id sets above this size are bound as a single JSON array instead of one
/// placeholder per id (SQLite caps bound variables per statement).
pub const MAX_EXPANDED_IDS: usize = 32_000;

/// SQL text with its positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
}

impl Statement {
    /// Statement without arguments.
    pub fn fixed(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
        }
    }

    pub fn placeholder_count(&self) -> usize {
        self.sql.matches('?').count()
    }
}

/// Append-only builder for [`Statement`].
#[derive(Debug, Default)]
pub struct StatementBuilder {
    sql: String,
    args: Vec<Value>,
}

impl StatementBuilder {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
        }
    }

    /// Appends SQL that carries no placeholders.
    pub fn push(&mut self, sql: &str) -> &mut Self {
        debug_assert!(!sql.contains('?'), "use push_bound for placeholders");
        self.sql.push_str(sql);
        self
    }

    /// Appends SQL containing exactly one `?` together with its argument.
    pub fn push_bound(&mut self, sql: &str, value: Value) -> &mut Self {
        debug_assert_eq!(sql.matches('?').count(), 1);
        self.sql.push_str(sql);
        self.args.push(value);
        self
    }

    /// Appends `<column> IN (...)` for `ids`.
    ///
    /// An empty set renders a predicate that matches nothing.
    pub fn push_id_filter(&mut self, column: &str, ids: &[i64]) -> &mut Self {
        if ids.is_empty() {
            return self.push("1 = 0");
        }

        if ids.len() > MAX_EXPANDED_IDS {
            let array = ids
                .iter()
                .map(i64::to_string)
                .collect::<Vec<_>>()
                .join(",");
            return self.push_bound(
                &format!("{column} IN (SELECT value FROM json_each(?))"),
                Value::Text(format!("[{array}]")),
            );
        }

        self.sql.push_str(column);
        self.sql.push_str(" IN (");
        for (index, id) in ids.iter().enumerate() {
            if index > 0 {
                self.sql.push_str(", ");
            }
            self.sql.push('?');
            self.args.push(Value::Integer(*id));
        }
        self.sql.push(')');
        self
    }

    pub fn build(self) -> Statement {
        Statement {
            sql: self.sql,
            args: self.args,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{StatementBuilder, MAX_EXPANDED_IDS};
    use rusqlite::types::Value;

    #[test]
    fn id_filter_keeps_placeholders_and_args_in_lock_step() {
        for size in 0..=64_i64 {
            let ids = (1..=size).map(|id| id * 7).collect::<Vec<_>>();
            let mut builder = StatementBuilder::new("SELECT 1 FROM books WHERE ");
            builder.push_id_filter("books.id", &ids);
            builder.push_bound(" LIMIT ?", Value::Integer(10));
            let statement = builder.build();

            assert_eq!(
                statement.placeholder_count(),
                statement.args.len(),
                "size {size}: {}",
                statement.sql
            );
            let expected = ids
                .iter()
                .map(|id| Value::Integer(*id))
                .chain(std::iter::once(Value::Integer(10)))
                .collect::<Vec<_>>();
            assert_eq!(statement.args, expected);
        }
    }

    #[test]
    fn empty_id_filter_matches_nothing() {
        let mut builder = StatementBuilder::new("SELECT 1 WHERE ");
        builder.push_id_filter("books.id", &[]);
        let statement = builder.build();
        assert_eq!(statement.sql, "SELECT 1 WHERE 1 = 0");
        assert!(statement.args.is_empty());
    }

    #[test]
    fn oversized_id_filter_binds_one_json_array() {
        let ids = (1..=(MAX_EXPANDED_IDS as i64 + 1)).collect::<Vec<_>>();
        let mut builder = StatementBuilder::new("SELECT 1 WHERE ");
        builder.push_id_filter("books.id", &ids);
        let statement = builder.build();
        assert_eq!(statement.placeholder_count(), 1);
        assert_eq!(statement.args.len(), 1);
        match &statement.args[0] {
            Value::Text(text) => {
                assert!(text.starts_with("[1,2,3,"));
                assert!(text.ends_with(&format!(",{}]", MAX_EXPANDED_IDS + 1)));
            }
            other => panic!("unexpected arg: {other:?}"),
        }
    }

    #[test]
    fn single_id_expands_to_single_placeholder() {
        let mut builder = StatementBuilder::new("WHERE ");
        builder.push_id_filter("books.id", &[42]);
        let statement = builder.build();
        assert_eq!(statement.sql, "WHERE books.id IN (?)");
        assert_eq!(statement.args, vec![Value::Integer(42)]);
    }
}
