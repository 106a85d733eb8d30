use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::page::{PageRef, PageType, Segment};
use super::recipe::RecipeDraft;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    Queued,
    ReviewGrouping,
    NeedsReview,
    NeedsTaxonomy,
    Approved,
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordStatus::Queued => write!(f, "QUEUED"),
            RecordStatus::ReviewGrouping => write!(f, "REVIEW_GROUPING"),
            RecordStatus::NeedsReview => write!(f, "NEEDS_REVIEW"),
            RecordStatus::NeedsTaxonomy => write!(f, "NEEDS_TAXONOMY"),
            RecordStatus::Approved => write!(f, "APPROVED"),
        }
    }
}

/// One page's worth of input to a classification run. A segmented text page
/// contributes one input page per segment; other pages contribute exactly
/// one with no `relevant_segment`. Transient: consumed by a single workflow
/// run and recorded on the owning record only as `PageRef`s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputPage {
    pub page_id: String,
    pub page_number: u32,
    pub page_type: PageType,
    #[serde(default)]
    pub ocr_ref: Option<String>,
    #[serde(default)]
    pub relevant_segment: Option<Segment>,
    #[serde(default)]
    pub segmentation_done: bool,
}

impl InputPage {
    pub fn to_ref(&self) -> PageRef {
        PageRef {
            id: self.page_id.clone(),
            page_number: Some(self.page_number),
        }
    }
}

/// Persisted tracking unit for one classification workflow instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationRecord {
    pub id: String,
    pub book_scan_id: String,
    pub status: RecordStatus,
    pub text_pages: Vec<PageRef>,
    pub image_pages: Vec<PageRef>,
    pub recipe_id: Option<String>,
    pub title: Option<String>,
    pub thumbnail_path: Option<String>,
    pub draft: Option<RecipeDraft>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClassificationRecord {
    pub fn new(book_scan_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            book_scan_id: book_scan_id.to_string(),
            status: RecordStatus::Queued,
            text_pages: Vec::new(),
            image_pages: Vec::new(),
            recipe_id: None,
            title: None,
            thumbnail_path: None,
            draft: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Ids of every page this record has consumed, text and image alike.
    pub fn consumed_page_ids(&self) -> impl Iterator<Item = &str> {
        self.text_pages
            .iter()
            .chain(self.image_pages.iter())
            .map(|p| p.id.as_str())
    }
}

/// Patch applied by `RecordRepository::update`. `None` fields are left
/// as-is; `error_message` uses a double option so it can be cleared.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordUpdate {
    pub id: String,
    pub status: Option<RecordStatus>,
    pub text_pages: Option<Vec<PageRef>>,
    pub image_pages: Option<Vec<PageRef>>,
    pub recipe_id: Option<String>,
    pub title: Option<String>,
    pub thumbnail_path: Option<String>,
    pub draft: Option<RecipeDraft>,
    pub error_message: Option<Option<String>>,
}

impl RecordUpdate {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }

    pub fn with_status(id: &str, status: RecordStatus) -> Self {
        Self {
            id: id.to_string(),
            status: Some(status),
            ..Default::default()
        }
    }
}
