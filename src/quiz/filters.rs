//! Typed filters for the listing endpoints.

use crate::db::filter::{Column, FilterExpr, FilterSet};

/// Narrow the question list by classification tag and lesson range
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionFilter {
    pub grade: Option<String>,
    pub lesson_from: Option<i64>,
    pub lesson_to: Option<i64>,
}

impl QuestionFilter {
    pub fn filter_set(&self) -> FilterSet {
        FilterSet::new()
            .and_some(self.grade.clone(), |g| FilterExpr::eq_text(Column::Grade, g))
            .and_some(self.lesson_from, |n| FilterExpr::gte(Column::Lesson, n))
            .and_some(self.lesson_to, |n| FilterExpr::lte(Column::Lesson, n))
    }
}

/// Narrow history and leaderboard reads
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultFilter {
    pub username: Option<String>,
    pub class_name: Option<String>,
}

impl ResultFilter {
    pub fn filter_set(&self) -> FilterSet {
        FilterSet::new()
            .and_some(self.username.clone(), |u| {
                FilterExpr::eq_text(Column::Username, u)
            })
            .and_some(self.class_name.clone(), |c| {
                FilterExpr::eq_text(Column::ClassName, c)
            })
    }
}

/// Select the results that feed the statistics endpoint
///
/// A result matches the lesson range when its own range lies inside it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatisticsFilter {
    pub class_name: Option<String>,
    pub lesson_from: Option<i64>,
    pub lesson_to: Option<i64>,
}

impl StatisticsFilter {
    pub fn filter_set(&self) -> FilterSet {
        FilterSet::new()
            .and_some(self.class_name.clone(), |c| {
                FilterExpr::eq_text(Column::ClassName, c)
            })
            .and_some(self.lesson_from, |n| FilterExpr::gte(Column::LessonFrom, n))
            .and_some(self.lesson_to, |n| FilterExpr::lte(Column::LessonTo, n))
    }
}
