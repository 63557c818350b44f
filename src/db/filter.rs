//! # Filter Expressions
//!
//! Typed, conjunctive `WHERE` predicates for the listing queries.
//!
//! Columns come from a closed enumeration and values are always emitted as
//! numbered placeholders, so request data never reaches the SQL text.

use std::fmt;

/// Columns that may appear in a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Grade,
    Lesson,
    Username,
    ClassName,
    LessonFrom,
    LessonTo,
}

impl Column {
    pub fn as_str(&self) -> &'static str {
        match self {
            Column::Grade => "grade",
            Column::Lesson => "lesson",
            Column::Username => "username",
            Column::ClassName => "class_name",
            Column::LessonFrom => "lesson_from",
            Column::LessonTo => "lesson_to",
        }
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// Equals
    Eq,
    /// Greater than or equal
    Gte,
    /// Less than or equal
    Lte,
}

impl FilterOperator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::Gte => ">=",
            FilterOperator::Lte => "<=",
        }
    }
}

/// A value bound to a placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Text(String),
    Int(i64),
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Text(s) => write!(f, "{}", s),
            SqlValue::Int(i) => write!(f, "{}", i),
        }
    }
}

/// A single `column <op> $n` predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterExpr {
    pub column: Column,
    pub operator: FilterOperator,
    pub value: SqlValue,
}

impl FilterExpr {
    pub fn new(column: Column, operator: FilterOperator, value: SqlValue) -> Self {
        Self {
            column,
            operator,
            value,
        }
    }

    /// Create an equality filter on a text column
    pub fn eq_text(column: Column, value: impl Into<String>) -> Self {
        Self::new(column, FilterOperator::Eq, SqlValue::Text(value.into()))
    }

    /// Create a lower bound on an integer column
    pub fn gte(column: Column, value: i64) -> Self {
        Self::new(column, FilterOperator::Gte, SqlValue::Int(value))
    }

    /// Create an upper bound on an integer column
    pub fn lte(column: Column, value: i64) -> Self {
        Self::new(column, FilterOperator::Lte, SqlValue::Int(value))
    }
}

/// A set of filters combined with AND logic
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    filters: Vec<FilterExpr>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, filter: FilterExpr) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add the filter only when a value is present
    pub fn and_some<T>(self, value: Option<T>, build: impl FnOnce(T) -> FilterExpr) -> Self {
        match value {
            Some(v) => self.and(build(v)),
            None => self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Render ` WHERE a = $n AND b >= $n+1 ...`, numbering from `first`
    ///
    /// Returns an empty string when there are no filters.
    pub fn where_clause(&self, first: usize) -> String {
        if self.filters.is_empty() {
            return String::new();
        }
        let predicates: Vec<String> = self
            .filters
            .iter()
            .enumerate()
            .map(|(i, f)| {
                format!(
                    "{} {} ${}",
                    f.column.as_str(),
                    f.operator.as_sql(),
                    first + i
                )
            })
            .collect();
        format!(" WHERE {}", predicates.join(" AND "))
    }

    /// Bound values, in placeholder order
    pub fn values(&self) -> impl Iterator<Item = &SqlValue> {
        self.filters.iter().map(|f| &f.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_set_renders_nothing() {
        let filters = FilterSet::new();
        assert!(filters.is_empty());
        assert_eq!(filters.where_clause(1), "");
    }

    #[test]
    fn test_conjunction_numbering() {
        let filters = FilterSet::new()
            .and(FilterExpr::eq_text(Column::Grade, "7"))
            .and(FilterExpr::gte(Column::Lesson, 2))
            .and(FilterExpr::lte(Column::Lesson, 5));

        assert_eq!(
            filters.where_clause(1),
            " WHERE grade = $1 AND lesson >= $2 AND lesson <= $3"
        );
        assert_eq!(
            filters.where_clause(3),
            " WHERE grade = $3 AND lesson >= $4 AND lesson <= $5"
        );

        let values: Vec<_> = filters.values().cloned().collect();
        assert_eq!(
            values,
            vec![
                SqlValue::Text("7".to_string()),
                SqlValue::Int(2),
                SqlValue::Int(5)
            ]
        );
    }

    #[test]
    fn test_values_never_reach_sql_text() {
        let hostile = "x'; DROP TABLE results; --";
        let filters = FilterSet::new().and(FilterExpr::eq_text(Column::Username, hostile));

        let sql = filters.where_clause(1);
        assert_eq!(sql, " WHERE username = $1");
        assert!(!sql.contains("DROP"));
        assert_eq!(
            filters.values().next(),
            Some(&SqlValue::Text(hostile.to_string()))
        );
    }

    #[test]
    fn test_and_some_skips_absent_values() {
        let filters = FilterSet::new()
            .and_some(None::<String>, |g| FilterExpr::eq_text(Column::Grade, g))
            .and_some(Some(3), |n| FilterExpr::gte(Column::Lesson, n));

        assert_eq!(filters.len(), 1);
        assert_eq!(filters.where_clause(1), " WHERE lesson >= $1");
    }
}
