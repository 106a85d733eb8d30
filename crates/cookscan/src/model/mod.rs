//! Domain types shared across queues, workers, and workflows.

pub mod approval;
pub mod page;
pub mod recipe;
pub mod record;

pub use approval::{
    ApprovalBody, GroupApproval, RecipeApproval, SegmentationApproval, TaxonomyApproval,
};
pub use page::{
    OcrResult, PageRef, PageStatus, PageType, PageUpdate, PixelPoint, ScannedPage, Segment,
    SegmentationOutcome, CONTINUATION_TITLE,
};
pub use recipe::{BookScan, Ingredient, Recipe, RecipeDraft, TaxonomyChoice};
pub use record::{ClassificationRecord, InputPage, RecordStatus, RecordUpdate};
