//! Conflict-resolving upserts.
//!
//! An [`Upsert`] inserts one row and, if a row with the same scoped natural
//! key already exists, resolves to that row instead. The conflict target is
//! taken from a [`Scope`], the same value the schema used to build the
//! partial unique index, so SQLite always finds a matching index.

use provgraph_core::Id;
use rusqlite::{Connection, OptionalExtension as _, types::Value};

use crate::{Error, Result, keys::Scope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
  /// Overwrite the existing row with the new values.
  Merge,
  /// Keep the existing row untouched; first writer wins.
  Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
  /// A new row was inserted.
  Inserted(Id),
  /// An existing row was found and left unchanged.
  Existing(Id),
  /// Written under [`ConflictPolicy::Merge`]; either inserted or updated.
  Merged(Id),
}

impl Upserted {
  pub fn id(self) -> Id {
    match self {
      Upserted::Inserted(id) | Upserted::Existing(id) | Upserted::Merged(id) => id,
    }
  }
}

#[derive(Debug)]
pub struct Upsert {
  scope:  Scope,
  policy: ConflictPolicy,
  values: Vec<(&'static str, Value)>,
}

impl Upsert {
  pub fn new(scope: Scope, policy: ConflictPolicy) -> Self {
    Self { scope, policy, values: Vec::new() }
  }

  pub fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
    self.values.push((column, value.into()));
    self
  }

  pub fn text(self, column: &'static str, value: impl Into<String>) -> Self {
    self.set(column, Value::Text(value.into()))
  }

  /// Populate the scope's arm column.
  pub fn arm(self, id: Id) -> Self {
    match self.scope.arm_column() {
      Some(column) => self.set(column, id.0),
      None => self,
    }
  }

  fn value(&self, column: &str) -> Option<&Value> {
    self.values.iter().find(|(c, _)| *c == column).map(|(_, v)| v)
  }

  fn insert_sql(&self) -> String {
    let table = self.scope.table();
    let columns: Vec<&str> = self.values.iter().map(|(c, _)| *c).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();

    let mut sql = format!(
      "INSERT INTO {table} ({}) VALUES ({}) ON CONFLICT ({})",
      columns.join(", "),
      placeholders.join(", "),
      self.scope.conflict_columns().join(", "),
    );
    if let Some(predicate) = self.scope.predicate() {
      sql.push_str(" WHERE ");
      sql.push_str(&predicate);
    }
    match self.policy {
      ConflictPolicy::Merge => {
        let assignments: Vec<String> =
          columns.iter().map(|c| format!("{c} = excluded.{c}")).collect();
        sql.push_str(" DO UPDATE SET ");
        sql.push_str(&assignments.join(", "));
      }
      ConflictPolicy::Ignore => sql.push_str(" DO NOTHING"),
    }
    sql.push_str(" RETURNING id");
    sql
  }

  /// Look the row up by its full scoped key.
  fn find_existing(&self, conn: &Connection) -> Result<Option<Id>> {
    let columns = self.scope.conflict_columns();
    let mut params = Vec::with_capacity(columns.len());
    let mut clauses = Vec::with_capacity(columns.len() + 1);
    for (i, column) in columns.iter().enumerate() {
      clauses.push(format!("{column} = ?{}", i + 1));
      params.push(self.value(column).cloned().unwrap_or(Value::Null));
    }
    clauses.extend(self.scope.predicate());

    let sql = format!(
      "SELECT id FROM {} WHERE {}",
      self.scope.table(),
      clauses.join(" AND ")
    );
    Ok(
      conn
        .query_row(&sql, rusqlite::params_from_iter(params), |row| row.get(0))
        .optional()?
        .map(Id),
    )
  }

  pub fn execute(self, conn: &Connection) -> Result<Upserted> {
    let table = self.scope.table();
    if let Some(missing) =
      self.scope.conflict_columns().into_iter().find(|c| self.value(c).is_none())
    {
      return Err(Error::corrupt(table, format!("upsert is missing key column {missing}")));
    }

    let sql = self.insert_sql();
    let returned: Option<i64> = conn
      .prepare_cached(&sql)?
      .query_row(
        rusqlite::params_from_iter(self.values.iter().map(|(_, v)| v)),
        |row| row.get(0),
      )
      .optional()?;

    let outcome = match (self.policy, returned) {
      (ConflictPolicy::Merge, Some(id)) => Upserted::Merged(Id(id)),
      (ConflictPolicy::Ignore, Some(id)) => Upserted::Inserted(Id(id)),
      // DO NOTHING returns no row on conflict; read the winner explicitly.
      (_, None) => match self.find_existing(conn)? {
        Some(id) => Upserted::Existing(id),
        None => {
          return Err(Error::corrupt(
            table,
            "conflict reported but no row matches the scoped key",
          ));
        }
      },
    };

    tracing::debug!(table, arm = ?self.scope.arm_column(), ?outcome, "upsert");
    Ok(outcome)
  }
}
