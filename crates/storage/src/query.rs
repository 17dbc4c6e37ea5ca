//! A small parameterised SELECT builder for queries against tables whose names
//! and columns are only known at runtime.
//!
//! Values always travel as positional parameters (`?N`). The only text that is
//! spliced into SQL is identifiers, which are quoted, and integer id lists.

use std::fmt::Write;

use formstitch_core::FieldValue;
use formstitch_core::request::Direction;

/// Double-quotes an identifier, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `alias."column"`
pub fn qualified(table_alias: &str, column: &str) -> String {
    format!("{table_alias}.{}", quote_identifier(column))
}

/// Escapes `%`, `_` and the escape char itself for use with `LIKE ... ESCAPE '\'`.
pub fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    NotLike,
}

impl CompareOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Neq => "<>",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
        }
    }
}

/// A rendered boolean SQL fragment. Any parameters it references are already
/// bound on the [`QueryBuilder`] that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr(String);

impl Expr {
    pub fn raw(sql: impl Into<String>) -> Self {
        Expr(sql.into())
    }

    pub fn and(parts: Vec<Expr>) -> Self {
        Self::join(parts, " AND ", "1 = 1")
    }

    pub fn or(parts: Vec<Expr>) -> Self {
        Self::join(parts, " OR ", "0 = 1")
    }

    fn join(parts: Vec<Expr>, sep: &str, empty: &str) -> Self {
        match parts.len() {
            0 => Expr(empty.to_string()),
            1 => parts.into_iter().next().unwrap_or_else(|| Expr(empty.to_string())),
            _ => {
                let inner: Vec<String> = parts.into_iter().map(|e| e.0).collect();
                Expr(format!("({})", inner.join(sep)))
            }
        }
    }

    pub fn is_null(column: &str) -> Self {
        Expr(format!("{column} IS NULL"))
    }

    pub fn is_not_null(column: &str) -> Self {
        Expr(format!("{column} IS NOT NULL"))
    }

    /// Membership over integer ids, inlined. Safe because the values are `i64`.
    pub fn in_ids(column: &str, ids: &[i64]) -> Self {
        if ids.is_empty() {
            return Expr("0 = 1".to_string());
        }
        let list: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        Expr(format!("{column} IN ({})", list.join(", ")))
    }

    pub fn as_sql(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum JoinKind {
    Inner,
    Left,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Join {
    kind: JoinKind,
    table: String,
    alias: String,
    on: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryBuilder {
    select: Vec<String>,
    from: Option<(String, String)>,
    joins: Vec<Join>,
    wheres: Vec<Expr>,
    group_by: Vec<String>,
    order_by: Vec<String>,
    limit: Option<u32>,
    offset: u32,
    params: Vec<FieldValue>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select<S: Into<String>>(&mut self, columns: impl IntoIterator<Item = S>) -> &mut Self {
        self.select = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn add_select(&mut self, column: impl Into<String>) -> &mut Self {
        self.select.push(column.into());
        self
    }

    pub fn from(&mut self, table: &str, alias: &str) -> &mut Self {
        self.from = Some((table.to_string(), alias.to_string()));
        self
    }

    pub fn inner_join(&mut self, table: &str, alias: &str, on: &str) -> &mut Self {
        self.push_join(JoinKind::Inner, table, alias, on)
    }

    pub fn left_join(&mut self, table: &str, alias: &str, on: &str) -> &mut Self {
        self.push_join(JoinKind::Left, table, alias, on)
    }

    fn push_join(&mut self, kind: JoinKind, table: &str, alias: &str, on: &str) -> &mut Self {
        self.joins.push(Join {
            kind,
            table: table.to_string(),
            alias: alias.to_string(),
            on: on.to_string(),
        });
        self
    }

    pub fn and_where(&mut self, expr: Expr) -> &mut Self {
        self.wheres.push(expr);
        self
    }

    pub fn group_by(&mut self, column: &str) -> &mut Self {
        self.group_by.push(column.to_string());
        self
    }

    pub fn order_by(&mut self, column: &str, direction: Direction) -> &mut Self {
        self.order_by.push(format!("{column} {}", direction.as_sql()));
        self
    }

    pub fn set_max_results(&mut self, limit: Option<u32>) -> &mut Self {
        self.limit = limit;
        self
    }

    pub fn set_first_result(&mut self, offset: u32) -> &mut Self {
        self.offset = offset;
        self
    }

    /// Binds a value and returns its placeholder.
    pub fn bind(&mut self, value: impl Into<FieldValue>) -> String {
        self.params.push(value.into());
        format!("?{}", self.params.len())
    }

    pub fn compare(&mut self, column: &str, op: CompareOp, value: impl Into<FieldValue>) -> Expr {
        let placeholder = self.bind(value);
        match op {
            CompareOp::Like | CompareOp::NotLike => {
                Expr(format!("{column} {} {placeholder} ESCAPE '\\'", op.as_sql()))
            }
            _ => Expr(format!("{column} {} {placeholder}", op.as_sql())),
        }
    }

    /// `column IN (?, ?, ...)` with every member bound. An empty list matches nothing.
    pub fn in_list(&mut self, column: &str, values: Vec<FieldValue>) -> Expr {
        if values.is_empty() {
            return Expr("0 = 1".to_string());
        }
        let placeholders: Vec<String> = values.into_iter().map(|v| self.bind(v)).collect();
        Expr(format!("{column} IN ({})", placeholders.join(", ")))
    }

    /// `column NOT IN (...)`. An empty list excludes nothing.
    pub fn not_in_list(&mut self, column: &str, values: Vec<FieldValue>) -> Expr {
        if values.is_empty() {
            return Expr("1 = 1".to_string());
        }
        let placeholders: Vec<String> = values.into_iter().map(|v| self.bind(v)).collect();
        Expr(format!("{column} NOT IN ({})", placeholders.join(", ")))
    }

    pub fn params(&self) -> &[FieldValue] {
        &self.params
    }

    pub fn to_sql(&self) -> String {
        let mut sql = String::from("SELECT ");
        if self.select.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.select.join(", "));
        }
        if let Some((table, alias)) = &self.from {
            let _ = write!(sql, " FROM {} {alias}", quote_identifier(table));
        }
        for join in &self.joins {
            let kind = match join.kind {
                JoinKind::Inner => "INNER JOIN",
                JoinKind::Left => "LEFT JOIN",
            };
            let _ = write!(
                sql,
                " {kind} {} {} ON {}",
                quote_identifier(&join.table),
                join.alias,
                join.on
            );
        }
        if !self.wheres.is_empty() {
            let parts: Vec<&str> = self.wheres.iter().map(|e| e.as_sql()).collect();
            let _ = write!(sql, " WHERE {}", parts.join(" AND "));
        }
        if !self.group_by.is_empty() {
            let _ = write!(sql, " GROUP BY {}", self.group_by.join(", "));
        }
        if !self.order_by.is_empty() {
            let _ = write!(sql, " ORDER BY {}", self.order_by.join(", "));
        }
        match (self.limit, self.offset) {
            (Some(limit), 0) => {
                let _ = write!(sql, " LIMIT {limit}");
            }
            (Some(limit), offset) => {
                let _ = write!(sql, " LIMIT {limit} OFFSET {offset}");
            }
            (None, 0) => {}
            // SQLite needs a LIMIT before OFFSET.
            (None, offset) => {
                let _ = write!(sql, " LIMIT -1 OFFSET {offset}");
            }
        }
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting() {
        assert_eq!(quote_identifier("color"), "\"color\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
        assert_eq!(qualified("r", "size"), "r.\"size\"");
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn values_are_bound_not_inlined() {
        let mut q = QueryBuilder::new();
        q.select(["r.submission_id"]).from("form_results_1_contact", "r");
        let e = q.compare("r.\"color\"", CompareOp::Eq, "red'; --");
        q.and_where(e);
        let sql = q.to_sql();
        assert_eq!(
            sql,
            "SELECT r.submission_id FROM \"form_results_1_contact\" r WHERE r.\"color\" = ?1"
        );
        assert_eq!(q.params(), &[FieldValue::from("red'; --")]);
    }

    #[test]
    fn joins_grouping_and_paging_render_in_order() {
        let mut q = QueryBuilder::new();
        q.select(["f.id", "COUNT(fs.id) AS cnt"])
            .from("form_submissions", "fs")
            .left_join("forms", "f", "f.id = fs.form_id")
            .group_by("f.id")
            .order_by("cnt", Direction::Desc)
            .set_max_results(Some(2))
            .set_first_result(4);
        assert_eq!(
            q.to_sql(),
            "SELECT f.id, COUNT(fs.id) AS cnt FROM \"form_submissions\" fs \
             LEFT JOIN \"forms\" f ON f.id = fs.form_id GROUP BY f.id \
             ORDER BY cnt DESC LIMIT 2 OFFSET 4"
        );
    }

    #[test]
    fn offset_without_limit() {
        let mut q = QueryBuilder::new();
        q.from("t", "t").set_first_result(5);
        assert_eq!(q.to_sql(), "SELECT * FROM \"t\" t LIMIT -1 OFFSET 5");
    }

    #[test]
    fn membership_lists() {
        let mut q = QueryBuilder::new();
        let e = q.in_list("r.\"size\"", vec!["S".into(), "M".into()]);
        assert_eq!(e.as_sql(), "r.\"size\" IN (?1, ?2)");
        assert_eq!(q.in_list("x", vec![]).as_sql(), "0 = 1");
        assert_eq!(q.not_in_list("x", vec![]).as_sql(), "1 = 1");
        assert_eq!(Expr::in_ids("s.id", &[3, 1, 2]).as_sql(), "s.id IN (3, 1, 2)");
        assert_eq!(Expr::in_ids("s.id", &[]).as_sql(), "0 = 1");
    }

    #[test]
    fn like_carries_escape_clause() {
        let mut q = QueryBuilder::new();
        let e = q.compare("f.name", CompareOp::Like, "%a%");
        assert_eq!(e.as_sql(), "f.name LIKE ?1 ESCAPE '\\'");
    }

    #[test]
    fn boolean_combinators() {
        let e = Expr::and(vec![Expr::raw("a = 1"), Expr::raw("b = 2")]);
        assert_eq!(e.as_sql(), "(a = 1 AND b = 2)");
        let e = Expr::or(vec![Expr::raw("a = 1")]);
        assert_eq!(e.as_sql(), "a = 1");
        assert_eq!(Expr::or(vec![]).as_sql(), "0 = 1");
    }
}
