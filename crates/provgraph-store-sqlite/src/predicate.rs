//! Composable row predicates.
//!
//! A [`Predicate`] describes which rows of one table match, possibly by
//! looking through foreign keys and join tables at related rows. It is a
//! plain value: building one runs no SQL. [`Select`] renders it to a
//! parameterised `SELECT id` statement with each traversal compiled to a
//! correlated `EXISTS` sub-query.

use provgraph_core::Id;
use rusqlite::{Connection, types::Value};

use crate::Result;

/// How a nested predicate reaches the related table.
#[derive(Debug, Clone, Copy)]
pub enum Link {
  /// Follow a foreign key on this row: `remote.id = local.column`.
  Parent { table: &'static str, column: &'static str },
  /// Through a join table: `join.owner = local.id AND remote.id = join.member`.
  Through {
    join:   &'static str,
    owner:  &'static str,
    member: &'static str,
    table:  &'static str,
  },
}

#[derive(Debug, Clone, Default)]
pub enum Predicate {
  #[default]
  True,
  Eq(&'static str, Value),
  /// The column, wrapped in `&` delimiters, contains the given fragment.
  ListContains(&'static str, String),
  /// Some related row matches the nested predicate.
  Exists(Link, Box<Predicate>),
  And(Vec<Predicate>),
  Or(Vec<Predicate>),
}

impl Predicate {
  pub fn eq(column: &'static str, value: impl Into<Value>) -> Self {
    Predicate::Eq(column, value.into())
  }

  pub fn text(column: &'static str, value: &str) -> Self {
    Predicate::Eq(column, Value::Text(value.to_owned()))
  }

  pub fn id(id: Id) -> Self { Predicate::eq("id", id.0) }

  pub fn exists(link: Link, inner: Predicate) -> Self {
    Predicate::Exists(link, Box::new(inner))
  }

  pub fn is_true(&self) -> bool { matches!(self, Predicate::True) }

  /// Conjunction, dropping trivially true terms.
  pub fn all(terms: impl IntoIterator<Item = Predicate>) -> Self {
    let mut terms: Vec<Predicate> = terms.into_iter().filter(|p| !p.is_true()).collect();
    match terms.len() {
      0 => Predicate::True,
      1 => terms.remove(0),
      _ => Predicate::And(terms),
    }
  }
}

/// Collects conjuncts for one table while a filter is being compiled.
#[derive(Default)]
pub struct Terms(Vec<Predicate>);

impl Terms {
  pub fn push(&mut self, p: Predicate) -> &mut Self {
    self.0.push(p);
    self
  }

  pub fn text(&mut self, column: &'static str, value: Option<&String>) -> &mut Self {
    if let Some(value) = value {
      self.0.push(Predicate::text(column, value));
    }
    self
  }

  pub fn id(&mut self, id: Option<Id>) -> &mut Self {
    if let Some(id) = id {
      self.0.push(Predicate::id(id));
    }
    self
  }

  /// Add `EXISTS` over `link`, unless the nested predicate matches anything.
  pub fn exists(&mut self, link: Link, inner: Predicate) -> &mut Self {
    if !inner.is_true() {
      self.0.push(Predicate::exists(link, inner));
    }
    self
  }

  pub fn build(self) -> Predicate { Predicate::all(self.0) }
}

// ─── Rendering ───────────────────────────────────────────────────────────────

/// A rendered `SELECT <alias>.id` over one table.
#[derive(Debug)]
pub struct Select {
  pub sql:    String,
  pub params: Vec<Value>,
}

impl Select {
  pub fn ids(table: &'static str, predicate: &Predicate, limit: usize) -> Self {
    let mut render = Render::default();
    let alias = render.alias();
    let clause = render.clause(&alias, predicate);
    Self {
      sql:    format!(
        "SELECT {alias}.id FROM {table} {alias} WHERE {clause} ORDER BY {alias}.id LIMIT {limit}"
      ),
      params: render.params,
    }
  }

  pub fn fetch(&self, conn: &Connection) -> Result<Vec<Id>> {
    let mut stmt = conn.prepare(&self.sql)?;
    let ids = stmt
      .query_map(rusqlite::params_from_iter(&self.params), |row| row.get(0).map(Id))?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
  }
}

#[derive(Default)]
struct Render {
  params:  Vec<Value>,
  aliases: usize,
}

impl Render {
  fn alias(&mut self) -> String {
    let alias = format!("t{}", self.aliases);
    self.aliases += 1;
    alias
  }

  fn clause(&mut self, alias: &str, predicate: &Predicate) -> String {
    match predicate {
      Predicate::True => "1".into(),
      Predicate::Eq(column, value) => {
        self.params.push(value.clone());
        format!("{alias}.{column} = ?")
      }
      Predicate::ListContains(column, needle) => {
        self.params.push(Value::Text(needle.clone()));
        format!("instr('&' || {alias}.{column} || '&', ?) > 0")
      }
      Predicate::And(terms) => self.join(alias, terms, " AND ", "1"),
      Predicate::Or(terms) => self.join(alias, terms, " OR ", "0"),
      Predicate::Exists(Link::Parent { table, column }, inner) => {
        let remote = self.alias();
        let inner = self.clause(&remote, inner);
        format!(
          "EXISTS (SELECT 1 FROM {table} {remote} WHERE {remote}.id = {alias}.{column} AND {inner})"
        )
      }
      Predicate::Exists(Link::Through { join, owner, member, table }, inner) => {
        let via = self.alias();
        let remote = self.alias();
        let inner = self.clause(&remote, inner);
        format!(
          "EXISTS (SELECT 1 FROM {join} {via} JOIN {table} {remote} ON {remote}.id = {via}.{member} \
           WHERE {via}.{owner} = {alias}.id AND {inner})"
        )
      }
    }
  }

  fn join(&mut self, alias: &str, terms: &[Predicate], op: &str, empty: &str) -> String {
    if terms.is_empty() {
      return empty.into();
    }
    let parts: Vec<String> = terms.iter().map(|t| self.clause(alias, t)).collect();
    format!("({})", parts.join(op))
  }
}
