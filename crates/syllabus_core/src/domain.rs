//! crates/syllabus_core/src/domain.rs
//!
//! Defines the core data structures for the application.
//! Records are created by the store and never mutated afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// Title used when the first chapter has no usable title.
pub const UNTITLED_SYLLABUS: &str = "Untitled Syllabus";

/// The authenticated principal supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

/// Raw course material exactly as the user submitted it.
#[derive(Debug, Clone, PartialEq)]
pub struct SyllabusSubmission {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub raw_content: String,
    pub created_at: DateTime<Utc>,
}

/// One entry of a breakdown's outline.
///
/// Everything besides `title` is produced by the structuring service and kept
/// verbatim in `content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    #[serde(default)]
    pub title: String,
    #[serde(flatten)]
    pub content: serde_json::Map<String, serde_json::Value>,
}

impl Chapter {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: serde_json::Map::new(),
        }
    }
}

/// A persisted structured outline generated from a syllabus submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Breakdown {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub source_content: String,
    pub chapters: Vec<Chapter>,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// The insert document for a breakdown. The store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBreakdown {
    pub owner_id: Uuid,
    pub source_content: String,
    pub chapters: Vec<Chapter>,
    pub title: String,
}

impl NewBreakdown {
    pub fn new(owner_id: Uuid, source_content: impl Into<String>, chapters: Vec<Chapter>) -> Self {
        let title = derive_title(&chapters);
        Self {
            owner_id,
            source_content: source_content.into(),
            chapters,
            title,
        }
    }
}

/// The two independently loaded collections of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Submissions,
    Breakdowns,
}

impl Collection {
    pub fn name(self) -> &'static str {
        match self {
            Collection::Submissions => "syllabuses",
            Collection::Breakdowns => "syllabusBreakdowns",
        }
    }
}

/// Common view over store-created records, used for scoping and ordering.
pub trait Stamped {
    fn id(&self) -> Uuid;
    fn owner_id(&self) -> Uuid;
    fn created_at(&self) -> DateTime<Utc>;
}

impl Stamped for Breakdown {
    fn id(&self) -> Uuid {
        self.id
    }
    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Stamped for SyllabusSubmission {
    fn id(&self) -> Uuid {
        self.id
    }
    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Newest first; equal timestamps fall back to ascending id.
pub fn newest_first<T: Stamped>(a: &T, b: &T) -> Ordering {
    b.created_at()
        .cmp(&a.created_at())
        .then_with(|| a.id().cmp(&b.id()))
}

/// Derives a breakdown title from its chapters.
///
/// Uses the first chapter's trimmed title, or [`UNTITLED_SYLLABUS`] when there
/// is no first chapter or its title is blank.
pub fn derive_title(chapters: &[Chapter]) -> String {
    chapters
        .first()
        .map(|chapter| chapter.title.trim())
        .filter(|title| !title.is_empty())
        .unwrap_or(UNTITLED_SYLLABUS)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn breakdown_at(id: u128, secs: i64) -> Breakdown {
        Breakdown {
            id: Uuid::from_u128(id),
            owner_id: Uuid::from_u128(99),
            source_content: String::new(),
            chapters: vec![Chapter::titled("x")],
            title: "x".to_string(),
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn title_comes_from_first_chapter() {
        let chapters = vec![Chapter::titled("Week 1: Intro"), Chapter::titled("Week 2: Algebra")];
        assert_eq!(derive_title(&chapters), "Week 1: Intro");
    }

    #[test]
    fn title_falls_back_when_missing_or_blank() {
        assert_eq!(derive_title(&[]), UNTITLED_SYLLABUS);
        assert_eq!(derive_title(&[Chapter::titled("   ")]), UNTITLED_SYLLABUS);
    }

    #[test]
    fn ordering_is_newest_first_with_id_tiebreak() {
        let mut items = vec![
            breakdown_at(3, 10),
            breakdown_at(1, 20),
            breakdown_at(2, 10),
        ];
        items.sort_by(newest_first);
        let ids: Vec<u128> = items.iter().map(|b| b.id.as_u128()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn chapter_keeps_unknown_fields() {
        let raw = serde_json::json!({"title": "Sets", "topics": ["union", "intersection"]});
        let chapter: Chapter = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(chapter.title, "Sets");
        assert!(chapter.content.contains_key("topics"));
        assert_eq!(serde_json::to_value(&chapter).unwrap(), raw);
    }
}
