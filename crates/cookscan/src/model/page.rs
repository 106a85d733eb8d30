use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved segment title meaning "this content continues the prior group".
pub const CONTINUATION_TITLE: &str = "previous_page";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageStatus {
    Queued,
    OcrDone,
    NeedsReview,
    Approved,
    Failed,
}

impl std::fmt::Display for PageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageStatus::Queued => write!(f, "QUEUED"),
            PageStatus::OcrDone => write!(f, "OCR_DONE"),
            PageStatus::NeedsReview => write!(f, "NEEDS_REVIEW"),
            PageStatus::Approved => write!(f, "APPROVED"),
            PageStatus::Failed => write!(f, "FAILED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    Text,
    Image,
}

/// Result of one OCR extraction, persisted as JSON in blob storage.
/// Blocks stay loosely typed: their shape belongs to the OCR collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrResult {
    pub page_id: String,
    pub full_text: String,
    pub blocks: Vec<Value>,
}

/// A point in the source page's pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: i64,
    pub y: i64,
}

/// One detected zone on a page. Bounding boxes are polygons in the source
/// page's pixel space; `ocr_block_indices` point into the page's OCR blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub id: u32,
    pub title: String,
    pub bounding_boxes: Vec<Vec<PixelPoint>>,
    pub ocr_block_indices: Vec<usize>,
}

impl Segment {
    /// True when the segment's title marks it as a continuation of the
    /// previous group.
    pub fn is_continuation(&self) -> bool {
        self.title.trim() == CONTINUATION_TITLE
    }
}

/// Output of the segmentation collaborator and of human zone review.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SegmentationOutcome {
    pub segmentation_done: bool,
    pub segments: Vec<Segment>,
}

/// A single uploaded page image and its pipeline state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannedPage {
    pub id: String,
    pub book_scan_id: String,
    pub page_number: u32,
    pub filename: String,
    pub scanned_at: DateTime<Utc>,
    pub ocr_ref: Option<String>,
    pub page_type: Option<PageType>,
    pub segments: Vec<Segment>,
    pub segmentation_done: bool,
    pub status: PageStatus,
}

impl ScannedPage {
    pub fn new(book_scan_id: &str, page_number: u32, filename: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            book_scan_id: book_scan_id.to_string(),
            page_number,
            filename: filename.to_string(),
            scanned_at: Utc::now(),
            ocr_ref: None,
            page_type: None,
            segments: Vec::new(),
            segmentation_done: false,
            status: PageStatus::Queued,
        }
    }
}

/// Patch applied by `PageRepository::update`. `None` fields are left as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageUpdate {
    pub id: String,
    pub ocr_ref: Option<String>,
    pub page_type: Option<PageType>,
    pub segments: Option<Vec<Segment>>,
    pub segmentation_done: Option<bool>,
    pub status: Option<PageStatus>,
}

impl PageUpdate {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }
}

/// Lightweight page reference used in approval payloads and consumed-page
/// lists on classification records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRef {
    pub id: String,
    #[serde(default)]
    pub page_number: Option<u32>,
}
