//! Parameterized query builder over one index table.
//!
//! Every predicate value is sent as a bound parameter. Identifiers (table and
//! column names) cannot be bound, so they are validated and quoted at
//! execution time; comparison operators come from a fixed whitelist.
//!
//! A builder is cheap and single-use: build one per request and do not share
//! it between threads.

use chrono::NaiveDate;
use rusqlite::params_from_iter;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

use super::value::{normalize_list_item, IndexRow, IndexValue};
use crate::config::IndexConfig;
use crate::db::{quote_identifier, Database};
use crate::{Result, SiteIndexError};

/// Whitelisted comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
        }
    }
}

impl FromStr for Operator {
    type Err = SiteIndexError;

    fn from_str(op: &str) -> Result<Self> {
        match op.trim() {
            "=" => Ok(Operator::Eq),
            "!=" => Ok(Operator::NotEq),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Gte),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Lte),
            other => Err(SiteIndexError::invalid_argument(format!(
                "Unsupported operator {:?}; expected one of =, !=, >, >=, <, <=",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = SiteIndexError;

    fn from_str(direction: &str) -> Result<Self> {
        match direction.trim().to_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(SiteIndexError::invalid_argument(format!(
                "Unsupported sort direction {:?}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
enum Predicate {
    Compare {
        column: String,
        op: Operator,
        value: IndexValue,
    },
    /// Whole-segment match of any value inside a delimited column.
    ContainsAny { column: String, values: Vec<String> },
    True { column: String },
    NotEmpty { column: String },
}

impl Predicate {
    fn to_sql(&self, params: &mut Vec<IndexValue>) -> Result<String> {
        match self {
            Predicate::Compare { column, op, value } => {
                params.push(value.clone());
                Ok(format!("{} {} ?", quote_identifier(column)?, op.as_sql()))
            }
            Predicate::ContainsAny { column, values } => {
                let column = quote_identifier(column)?;
                let delimiter = IndexConfig::LIST_DELIMITER;
                let clauses: Vec<String> = values
                    .iter()
                    .map(|value| {
                        params.push(IndexValue::Text(format!(
                            "{delimiter}{value}{delimiter}"
                        )));
                        format!(
                            "instr('{delimiter}' || {column} || '{delimiter}', ?) > 0"
                        )
                    })
                    .collect();
                Ok(format!("({})", clauses.join(" OR ")))
            }
            Predicate::True { column } => Ok(format!("{} = 1", quote_identifier(column)?)),
            Predicate::NotEmpty { column } => {
                let column = quote_identifier(column)?;
                Ok(format!("({column} IS NOT NULL AND {column} != '')"))
            }
        }
    }
}

/// Chainable query over one index table.
#[derive(Clone)]
pub struct IndexQuery {
    db: Database,
    table: String,
    predicates: Vec<Predicate>,
    order: Vec<(String, SortDirection)>,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl IndexQuery {
    pub fn new(db: Database, table: impl Into<String>) -> Self {
        Self {
            db,
            table: table.into(),
            predicates: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Exact match.
    pub fn where_eq(self, column: &str, value: impl Into<IndexValue>) -> Self {
        self.where_cmp(column, Operator::Eq, value)
    }

    /// Comparison with a typed operator.
    pub fn where_cmp(mut self, column: &str, op: Operator, value: impl Into<IndexValue>) -> Self {
        self.predicates.push(Predicate::Compare {
            column: column.to_string(),
            op,
            value: value.into(),
        });
        self
    }

    /// Comparison with an operator given as text.
    ///
    /// Fails with `InvalidArgument` unless `op` is one of
    /// `=`, `!=`, `>`, `>=`, `<`, `<=`.
    pub fn where_op(self, column: &str, op: &str, value: impl Into<IndexValue>) -> Result<Self> {
        let op: Operator = op.parse()?;
        Ok(self.where_cmp(column, op, value))
    }

    /// Match rows whose delimited `column` holds `value` as a whole segment.
    /// `Bot` does not match a stored `Botany`.
    pub fn where_contains(self, column: &str, value: &str) -> Self {
        self.where_contains_any(column, &[value])
    }

    /// Match rows whose delimited `column` holds any of `values`. Blank values
    /// are ignored; with nothing left this adds no filter.
    pub fn where_contains_any<S: AsRef<str>>(mut self, column: &str, values: &[S]) -> Self {
        let values: Vec<String> = values
            .iter()
            .map(|v| normalize_list_item(v.as_ref()))
            .filter(|v| !v.is_empty())
            .collect();
        if !values.is_empty() {
            self.predicates.push(Predicate::ContainsAny {
                column: column.to_string(),
                values,
            });
        }
        self
    }

    /// Dates from `from` to `to`, both inclusive.
    pub fn where_date_between(self, column: &str, from: NaiveDate, to: NaiveDate) -> Self {
        self.where_cmp(column, Operator::Gte, iso_date(from))
            .where_cmp(column, Operator::Lte, iso_date(to))
    }

    pub fn where_date_on_or_after(self, column: &str, date: NaiveDate) -> Self {
        self.where_cmp(column, Operator::Gte, iso_date(date))
    }

    /// Dates strictly before `date`.
    pub fn where_date_before(self, column: &str, date: NaiveDate) -> Self {
        self.where_cmp(column, Operator::Lt, iso_date(date))
    }

    /// Boolean column stored as 1.
    pub fn where_true(mut self, column: &str) -> Self {
        self.predicates.push(Predicate::True {
            column: column.to_string(),
        });
        self
    }

    /// Exclude NULL and empty strings.
    pub fn where_not_empty(mut self, column: &str) -> Self {
        self.predicates.push(Predicate::NotEmpty {
            column: column.to_string(),
        });
        self
    }

    /// Add a sort key. Keys apply in call order.
    pub fn order_by(mut self, column: &str, direction: SortDirection) -> Self {
        self.order.push((column.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    fn where_clause(&self, params: &mut Vec<IndexValue>) -> Result<String> {
        if self.predicates.is_empty() {
            return Ok(String::new());
        }
        let parts = self
            .predicates
            .iter()
            .map(|p| p.to_sql(params))
            .collect::<Result<Vec<_>>>()?;
        Ok(format!(" WHERE {}", parts.join(" AND ")))
    }

    fn select_sql(&self, projection: &str, limit: Option<usize>) -> Result<(String, Vec<IndexValue>)> {
        let mut params = Vec::new();
        let mut sql = format!(
            "SELECT {} FROM {}{}",
            projection,
            quote_identifier(&self.table)?,
            self.where_clause(&mut params)?
        );

        if !self.order.is_empty() {
            let keys = self
                .order
                .iter()
                .map(|(column, dir)| -> Result<String> {
                    Ok(format!("{} {}", quote_identifier(column)?, dir.as_sql()))
                })
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(&format!(" ORDER BY {}", keys.join(", ")));
        }

        match (limit, self.offset) {
            (Some(limit), offset) => {
                sql.push_str(" LIMIT ?");
                params.push(IndexValue::Integer(limit as i64));
                if let Some(offset) = offset {
                    sql.push_str(" OFFSET ?");
                    params.push(IndexValue::Integer(offset as i64));
                }
            }
            (None, Some(offset)) => {
                sql.push_str(" LIMIT -1 OFFSET ?");
                params.push(IndexValue::Integer(offset as i64));
            }
            (None, None) => {}
        }

        Ok((sql, params))
    }

    /// SQL text and bound parameters of [`IndexQuery::get`].
    pub fn to_sql(&self) -> Result<(String, Vec<IndexValue>)> {
        self.select_sql("*", self.limit)
    }

    fn fetch(&self, sql: &str, params: &[IndexValue]) -> Result<Vec<IndexRow>> {
        debug!("Index query: {} ({} params)", sql, params.len());
        let conn = self.db.lock_conn()?;
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut results = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = IndexRow::new();
            for (idx, name) in columns.iter().enumerate() {
                record.set(name.clone(), IndexValue::from_value_ref(row.get_ref(idx)?));
            }
            results.push(record);
        }
        Ok(results)
    }

    /// All matching rows, honouring order, limit and offset.
    pub fn get(&self) -> Result<Vec<IndexRow>> {
        let (sql, params) = self.to_sql()?;
        self.fetch(&sql, &params)
    }

    /// First matching row.
    pub fn first(&self) -> Result<Option<IndexRow>> {
        let (sql, params) = self.select_sql("*", Some(1))?;
        Ok(self.fetch(&sql, &params)?.into_iter().next())
    }

    /// Primary keys of matching rows, honouring order, limit and offset.
    pub fn get_page_ids(&self) -> Result<Vec<String>> {
        let projection = quote_identifier(IndexConfig::PRIMARY_KEY)?;
        let (sql, params) = self.select_sql(&projection, self.limit)?;

        let conn = self.db.lock_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| row.get::<_, String>(0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    /// Number of matching rows. Ignores order, limit and offset.
    pub fn count(&self) -> Result<usize> {
        let mut params = Vec::new();
        let sql = format!(
            "SELECT COUNT(*) FROM {}{}",
            quote_identifier(&self.table)?,
            self.where_clause(&mut params)?
        );

        let conn = self.db.lock_conn()?;
        let count: i64 = conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
