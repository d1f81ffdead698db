use chrono::NaiveDate;
use sqlx::{Postgres, QueryBuilder};
use tracing::debug;

/// How a filter field is compared against its column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Equal,
    Like,
    ILike,
    /// `YYYY-MM-DD`, parsed before binding; unparsable input is skipped.
    Date,
    /// Bound as text and cast to a date by the database.
    DateString,
    /// Comma separated list.
    In,
    /// Ignored here; the repository applies it.
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Text(String),
    Int(i64),
    Bool(bool),
}

impl FilterValue {
    fn as_text(&self) -> String {
        match self {
            FilterValue::Text(s) => s.clone(),
            FilterValue::Int(i) => i.to_string(),
            FilterValue::Bool(b) => b.to_string(),
        }
    }
}

pub struct FilterField<F> {
    pub column: &'static str,
    pub mode: MatchMode,
    pub value: fn(&F) -> Option<FilterValue>,
}

pub struct FilterGroup<F: 'static> {
    pub name: &'static str,
    pub fields: &'static [FilterField<F>],
}

/// Filter structs describe their columns in a static table instead of being
/// inspected at runtime.
pub trait Filterable: Sized + 'static {
    fn groups() -> &'static [FilterGroup<Self>];
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Equal { column: String, value: FilterValue },
    Like { column: String, pattern: String, case_insensitive: bool },
    DateEquals { column: String, date: NaiveDate },
    DateTextEquals { column: String, value: String },
    In { column: String, values: Vec<String> },
}

/// One predicate per present field with a recognised mode, in declaration order.
pub fn predicates<F: Filterable>(filter: &F, table: Option<&str>) -> Vec<Predicate> {
    let mut out = Vec::new();
    for group in F::groups() {
        for field in group.fields {
            let Some(value) = (field.value)(filter) else {
                continue;
            };
            let column = match table {
                Some(table) => format!("{}.{}", table, field.column),
                None => field.column.to_string(),
            };

            let predicate = match field.mode {
                MatchMode::Equal => Predicate::Equal { column, value },
                MatchMode::Like | MatchMode::ILike => Predicate::Like {
                    column,
                    pattern: format!("%{}%", value.as_text()),
                    case_insensitive: field.mode == MatchMode::ILike,
                },
                MatchMode::Date => match NaiveDate::parse_from_str(&value.as_text(), "%Y-%m-%d") {
                    Ok(date) => Predicate::DateEquals { column, date },
                    Err(_) => {
                        debug!(group = group.name, column = field.column, "skipping unparsable date filter");
                        continue;
                    }
                },
                MatchMode::DateString => Predicate::DateTextEquals {
                    column,
                    value: value.as_text(),
                },
                MatchMode::In => {
                    let values: Vec<String> = value
                        .as_text()
                        .split(',')
                        .map(str::trim)
                        .filter(|v| !v.is_empty())
                        .map(str::to_string)
                        .collect();
                    if values.is_empty() {
                        continue;
                    }
                    Predicate::In { column, values }
                }
                MatchMode::Custom => continue,
            };
            out.push(predicate);
        }
    }
    out
}

/// SQL under construction with ANDed conditions and positional binds.
pub struct FilteredQuery<'q> {
    builder: QueryBuilder<'q, Postgres>,
    has_conditions: bool,
}

impl<'q> FilteredQuery<'q> {
    pub fn new(base_sql: &str) -> Self {
        Self {
            builder: QueryBuilder::new(base_sql),
            has_conditions: false,
        }
    }

    pub fn apply<F: Filterable>(&mut self, filter: &F) -> &mut Self {
        for predicate in predicates(filter, None) {
            self.push_predicate(predicate);
        }
        self
    }

    pub fn apply_qualified<F: Filterable>(&mut self, filter: &F, table: &str) -> &mut Self {
        for predicate in predicates(filter, Some(table)) {
            self.push_predicate(predicate);
        }
        self
    }

    /// Opens a new conjunct and hands back the builder to write it.
    pub fn and_where(&mut self) -> &mut QueryBuilder<'q, Postgres> {
        self.builder.push(if self.has_conditions { " AND " } else { " WHERE " });
        self.has_conditions = true;
        &mut self.builder
    }

    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.builder.push(sql);
        self
    }

    pub fn builder(&mut self) -> &mut QueryBuilder<'q, Postgres> {
        &mut self.builder
    }

    pub fn sql(&self) -> &str {
        self.builder.sql()
    }

    fn push_predicate(&mut self, predicate: Predicate) {
        let b = self.and_where();
        match predicate {
            Predicate::Equal { column, value } => {
                b.push(column).push(" = ");
                match value {
                    FilterValue::Text(s) => b.push_bind(s),
                    FilterValue::Int(i) => b.push_bind(i),
                    FilterValue::Bool(v) => b.push_bind(v),
                };
            }
            Predicate::Like {
                column,
                pattern,
                case_insensitive,
            } => {
                b.push(column).push(if case_insensitive { " ILIKE " } else { " LIKE " }).push_bind(pattern);
            }
            Predicate::DateEquals { column, date } => {
                b.push("DATE(").push(column).push(") = ").push_bind(date);
            }
            Predicate::DateTextEquals { column, value } => {
                b.push("DATE(").push(column).push(") = CAST(").push_bind(value).push(" AS DATE)");
            }
            Predicate::In { column, values } => {
                b.push("CAST(").push(column).push(" AS TEXT) IN (");
                let mut list = b.separated(", ");
                for value in values {
                    list.push_bind(value);
                }
                list.push_unseparated(")");
            }
        }
    }
}
