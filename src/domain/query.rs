//! Question search, filtering and ordering. Pure functions over loaded rows.

use super::entities::Question;
use serde::Deserialize;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Newest first.
    #[default]
    Recent,
    /// Highest net score first, ties broken by recency.
    Popular,
    /// Only questions without answers, newest first.
    Unanswered,
}

#[derive(Debug, Clone, Default)]
pub struct QuestionQuery {
    pub search: Option<String>,
    pub subject: Option<String>,
    pub tags: Vec<String>,
    pub sort: SortOrder,
}

impl QuestionQuery {
    /// Does `q` pass every filter of this query?
    pub fn matches(&self, q: &Question) -> bool {
        if self.sort == SortOrder::Unanswered && q.answer_count > 0 {
            return false;
        }

        if let Some(subject) = non_blank(&self.subject) {
            if !q.subject.eq_ignore_ascii_case(subject) {
                return false;
            }
        }

        let has_all_tags = self.tags.iter().all(|wanted| {
            q.tags
                .iter()
                .any(|t| t.to_lowercase() == wanted.trim().to_lowercase())
        });
        if !has_all_tags {
            return false;
        }

        match non_blank(&self.search) {
            Some(needle) => {
                let needle = needle.to_lowercase();
                q.title.to_lowercase().contains(&needle)
                    || q.content.to_lowercase().contains(&needle)
                    || q.tags.iter().any(|t| t.to_lowercase().contains(&needle))
            }
            None => true,
        }
    }

    /// Filter and order `questions` according to this query.
    pub fn apply(&self, questions: Vec<Question>) -> Vec<Question> {
        let mut out: Vec<Question> = questions.into_iter().filter(|q| self.matches(q)).collect();
        out.sort_by(|a, b| self.compare(a, b));
        out
    }

    fn compare(&self, a: &Question, b: &Question) -> Ordering {
        let recent = b.created_at.cmp(&a.created_at);
        match self.sort {
            SortOrder::Recent | SortOrder::Unanswered => recent,
            SortOrder::Popular => b.score().cmp(&a.score()).then(recent),
        }
    }
}

fn non_blank(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Trim tags, drop empties and case-insensitive duplicates (first spelling wins).
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() {
            continue;
        }
        if out.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            continue;
        }
        out.push(tag.to_string());
    }
    out
}
