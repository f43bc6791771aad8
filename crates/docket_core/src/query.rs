//! Full-scan filter queries.
//!
//! A query walks every key of the primary index and keeps the documents for
//! which every filter holds. Secondary indexes are never consulted.
//!
//! ```rust,no_run
//! use docket_core::{Database, Operator};
//!
//! let db = Database::open("shop_db".as_ref())?;
//! let products = db.table("products")?;
//!
//! let cheap_laptops = products
//!     .query()
//!     .filter("category", Operator::Eq, "laptops")
//!     .filter_str("price", "<", 1000)?
//!     .execute();
//! # Ok::<(), docket_core::CoreError>(())
//! ```

use crate::error::{CoreError, CoreResult};
use crate::notify::QueryKind;
use crate::table::Table;
use docket_codec::{Document, Value};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

/// Filter operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    Ge,
    /// `<=`
    Le,
    /// `in`: the filter value is an array holding the field value.
    In,
    /// `contains`: the field is text holding the value as a substring, an
    /// array holding the value, or a map with the value as a key.
    Contains,
}

impl Operator {
    /// Every operator, in token order.
    pub const ALL: [Operator; 8] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Gt,
        Operator::Lt,
        Operator::Ge,
        Operator::Le,
        Operator::In,
        Operator::Contains,
    ];

    /// The token this operator parses from.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::In => "in",
            Operator::Contains => "contains",
        }
    }

    /// Applies the operator to a present field value.
    #[must_use]
    pub fn test(self, field: &Value, operand: &Value) -> bool {
        match self {
            Operator::Eq => field.native_eq(operand),
            Operator::Ne => !field.native_eq(operand),
            Operator::Gt => field.compare(operand) == Some(Ordering::Greater),
            Operator::Lt => field.compare(operand) == Some(Ordering::Less),
            Operator::Ge => matches!(field.compare(operand), Some(Ordering::Greater | Ordering::Equal)),
            Operator::Le => matches!(field.compare(operand), Some(Ordering::Less | Ordering::Equal)),
            Operator::In => operand
                .as_array()
                .is_some_and(|items| items.iter().any(|item| item.native_eq(field))),
            Operator::Contains => match field {
                Value::Text(text) => operand.as_text().is_some_and(|needle| text.contains(needle)),
                Value::Array(items) => items.iter().any(|item| item.native_eq(operand)),
                Value::Map(doc) => operand.as_text().is_some_and(|key| doc.contains_key(key)),
                _ => false,
            },
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Operator {
    type Err = CoreError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        Operator::ALL
            .into_iter()
            .find(|op| op.token() == token)
            .ok_or_else(|| CoreError::UnsupportedOperator {
                token: token.to_string(),
            })
    }
}

/// One `(field, operator, value)` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Document field the condition reads.
    pub field: String,
    /// Comparison.
    pub op: Operator,
    /// Right-hand operand.
    pub value: Value,
}

impl Filter {
    /// Creates a filter.
    pub fn new(field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Returns true if `doc` has the field and the operator holds.
    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        doc.get(&self.field)
            .is_some_and(|field| self.op.test(field, &self.value))
    }
}

/// A query over one table, built by [`Table::query`].
#[derive(Debug)]
pub struct Query<'a> {
    table: &'a Table,
    filters: Vec<Filter>,
}

impl<'a> Query<'a> {
    pub(crate) fn new(table: &'a Table) -> Self {
        Self {
            table,
            filters: Vec::new(),
        }
    }

    /// Adds a condition. All conditions must hold.
    #[must_use]
    pub fn filter(mut self, field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::new(field, op, value));
        self
    }

    /// Adds a condition given as an operator token such as `">="`.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedOperator` for an unknown token.
    pub fn filter_str(self, field: impl Into<String>, token: &str, value: impl Into<Value>) -> CoreResult<Self> {
        let op = token.parse()?;
        Ok(self.filter(field, op, value))
    }

    /// Conditions added so far.
    #[must_use]
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Scans the table and returns matching documents in key order.
    #[must_use]
    pub fn execute(&self) -> Vec<Document> {
        let started = Instant::now();
        let matches: Vec<Document> = self
            .table
            .live_documents()
            .into_iter()
            .filter(|doc| self.filters.iter().all(|f| f.matches(doc)))
            .collect();
        self.table.report(QueryKind::Scan, started);
        matches
    }

    /// Number of matching documents.
    #[must_use]
    pub fn count(&self) -> usize {
        self.execute().len()
    }
}
