use sea_orm::sea_query::{Alias, Cond, Condition, Expr, Query, SimpleExpr, UpdateStatement};
use sea_orm::{ConnectionTrait, DbBackend, DbErr, Statement, Value};

/// Builds one `UPDATE` that applies a different value per key tuple.
///
/// ```text
/// UPDATE t SET col = CASE WHEN k1 = ? AND k2 = ? THEN <expr> ... ELSE col END
/// WHERE (k1 = ? AND k2 = ?) OR ...
/// ```
///
/// Rows whose key matches no entry keep their current value.
#[derive(Debug, Clone)]
pub struct CaseUpdate {
    table: String,
    key_columns: Vec<String>,
    rows: Vec<CaseRow>,
    filter: Option<Condition>,
}

#[derive(Debug, Clone)]
struct CaseRow {
    key: Vec<Value>,
    assignments: Vec<(String, SimpleExpr)>,
}

impl CaseUpdate {
    pub fn new(table: impl Into<String>, key_columns: &[&str]) -> Self {
        Self {
            table: table.into(),
            key_columns: key_columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
            filter: None,
        }
    }

    /// Sets `column` to `value` on the row identified by `key`.
    ///
    /// A second assignment of the same column for the same key replaces the first.
    pub fn set<V>(mut self, key: Vec<Value>, column: &str, value: V) -> Self
    where
        V: Into<SimpleExpr>,
    {
        self.push(key, column, value.into());
        self
    }

    /// Non-consuming form of [`CaseUpdate::set`] for loops.
    pub fn push(&mut self, key: Vec<Value>, column: &str, value: SimpleExpr) {
        debug_assert_eq!(key.len(), self.key_columns.len(), "key arity mismatch");
        let row = match self.rows.iter().position(|r| r.key == key) {
            Some(idx) => &mut self.rows[idx],
            None => {
                self.rows.push(CaseRow {
                    key,
                    assignments: Vec::new(),
                });
                let last = self.rows.len() - 1;
                &mut self.rows[last]
            }
        };
        match row.assignments.iter_mut().find(|(c, _)| c == column) {
            Some(existing) => existing.1 = value,
            None => row.assignments.push((column.to_string(), value)),
        }
    }

    /// Extra condition every updated row must also satisfy.
    pub fn filter(mut self, condition: Condition) -> Self {
        self.filter = Some(condition);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    fn key_condition(&self, key: &[Value]) -> Condition {
        self.key_columns
            .iter()
            .zip(key.iter())
            .fold(Cond::all(), |cond, (column, value)| {
                cond.add(Expr::col(Alias::new(column.as_str())).eq(value.clone()))
            })
    }

    fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for row in &self.rows {
            for (column, _) in &row.assignments {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }
        columns
    }

    /// The statement as a sea-query AST. `None` when there is nothing to update.
    pub fn statement(&self) -> Option<UpdateStatement> {
        if self.rows.is_empty() {
            return None;
        }

        let mut update = Query::update();
        update.table(Alias::new(self.table.as_str()));

        for column in self.columns() {
            let mut case: Option<sea_orm::sea_query::CaseStatement> = None;
            for row in &self.rows {
                let Some((_, value)) = row.assignments.iter().find(|(c, _)| *c == column) else {
                    continue;
                };
                let when = self.key_condition(&row.key);
                case = Some(match case {
                    None => Expr::case(when, value.clone()),
                    Some(stmt) => stmt.case(when, value.clone()),
                });
            }
            if let Some(case) = case {
                let fallback = Expr::col(Alias::new(column.as_str()));
                update.value(
                    Alias::new(column.as_str()),
                    Into::<SimpleExpr>::into(case.finally(fallback)),
                );
            }
        }

        let any_key = self
            .rows
            .iter()
            .fold(Cond::any(), |cond, row| cond.add(self.key_condition(&row.key)));
        let mut condition = Cond::all().add(any_key);
        if let Some(filter) = &self.filter {
            condition = condition.add(filter.clone());
        }
        update.cond_where(condition);

        Some(update)
    }

    pub fn build(&self, backend: DbBackend) -> Option<Statement> {
        self.statement().map(|stmt| backend.build(&stmt))
    }

    /// Executes the update and returns the number of rows it touched.
    pub async fn exec<C>(&self, conn: &C) -> Result<u64, DbErr>
    where
        C: ConnectionTrait,
    {
        match self.build(conn.get_database_backend()) {
            Some(stmt) => Ok(conn.execute(stmt).await?.rows_affected()),
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary_update() -> CaseUpdate {
        CaseUpdate::new("stock_summary", &["warehouse", "item"])
            .set(
                vec!["WH1".into(), "ITEM-1".into()],
                "received",
                Expr::col(Alias::new("received")).sub(4),
            )
            .set(
                vec!["WH2".into(), "ITEM-1".into()],
                "consumed",
                Expr::col(Alias::new("consumed")).sub(2),
            )
    }

    #[test]
    fn renders_one_case_per_column() {
        let stmt = summary_update().build(DbBackend::Sqlite).unwrap();

        assert!(stmt.sql.starts_with(r#"UPDATE "stock_summary" SET"#));
        assert_eq!(stmt.sql.matches("CASE WHEN").count(), 2);
        assert!(stmt.sql.contains(r#"ELSE "received" END"#));
        assert!(stmt.sql.contains(r#"ELSE "consumed" END"#));
        assert!(stmt.sql.contains(" WHERE "));
    }

    #[test]
    fn later_assignment_for_same_key_wins() {
        let update = CaseUpdate::new("movement_log", &["id"])
            .set(vec![1i64.into()], "cancelled", Expr::value(false))
            .set(vec![1i64.into()], "cancelled", Expr::value(true));

        assert_eq!(update.len(), 1);
        let stmt = update.build(DbBackend::Sqlite).unwrap();
        assert_eq!(stmt.sql.matches("WHEN").count(), 1);
    }

    #[test]
    fn filter_is_applied_alongside_keys() {
        let stmt = CaseUpdate::new("purchase_order_lines", &["doc_no", "line_no"])
            .set(vec!["PO-1".into(), 1i32.into()], "success", Expr::value(true))
            .filter(Cond::all().add(Expr::col(Alias::new("cancelled")).eq(false)))
            .build(DbBackend::Sqlite)
            .unwrap();

        let where_clause = stmt.sql.split(" WHERE ").nth(1).unwrap();
        assert!(where_clause.contains(r#""cancelled""#));
        assert!(where_clause.contains(r#""doc_no""#));
    }

    #[test]
    fn empty_update_builds_nothing() {
        let update = CaseUpdate::new("stock_summary", &["id"]);
        assert!(update.is_empty());
        assert!(update.build(DbBackend::Postgres).is_none());
    }
}
