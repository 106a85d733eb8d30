//! Collaborator contracts consumed by workers and workflow steps.
//!
//! Everything the pipeline does not own — OCR, segmentation, the LLM
//! classification call, validation, thumbnailing, blob storage, and the
//! domain repositories — is reached through these traits so callers can
//! wire real services, stubs, or remote clients interchangeably.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::CollaboratorError;
use crate::model::{
    BookScan, ClassificationRecord, OcrResult, PageUpdate, Recipe, RecipeDraft, RecordUpdate,
    ScannedPage, SegmentationOutcome,
};

type Result<T> = std::result::Result<T, CollaboratorError>;

/// Which storage area a file lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    Scanner,
    Recipe,
}

impl ImageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageKind::Scanner => "scanner",
            ImageKind::Recipe => "recipe",
        }
    }
}

#[async_trait]
pub trait OcrService: Send + Sync {
    async fn extract(&self, image_path: &Path, page_id: &str) -> Result<OcrResult>;
}

/// Decides whether a scanned page is text-bearing or a pure photograph.
pub trait TextOrImageService: Send + Sync {
    fn is_text_page(&self, image_path: &Path) -> bool;
}

#[async_trait]
pub trait SegmentationService: Send + Sync {
    async fn segment(&self, ocr: &OcrResult) -> Result<SegmentationOutcome>;
}

#[async_trait]
pub trait ClassificationService: Send + Sync {
    /// Turns OCR blocks plus concatenated text into a loosely typed recipe
    /// candidate. The shape is the collaborator's business until validation.
    async fn classify(&self, blocks: &[Value], text: &str) -> Result<Value>;
}

#[async_trait]
pub trait ValidationService: Send + Sync {
    async fn validate(&self, candidate: &Value, thumbnail: Option<&str>) -> Result<RecipeDraft>;
}

#[async_trait]
pub trait ThumbnailService: Send + Sync {
    async fn generate(&self, src_path: &Path) -> Result<Vec<u8>>;
}

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Indexes a recipe for retrieval; returns the number of chunks written.
    async fn index(&self, recipe_id: &str, owner_id: &str, reindex: bool) -> Result<usize>;
}

/// Named blob/image storage.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn image_path(&self, image_id: &str, kind: ImageKind) -> Result<PathBuf>;
    async fn save_image_bytes(&self, bytes: &[u8], filename: &str, kind: ImageKind)
        -> Result<String>;
    /// Copies an image from scanner storage into recipe storage.
    async fn copy_to_recipe(&self, filename: &str) -> Result<String>;
    async fn rename(&self, from: &str, to: &str, kind: ImageKind) -> Result<String>;
    async fn delete(&self, filename: &str, kind: ImageKind) -> Result<()>;
    /// Persists an OCR result as JSON keyed by its page id; returns the ref.
    async fn write_ocr(&self, result: &OcrResult) -> Result<String>;
    async fn read_ocr(&self, page_id: &str) -> Result<OcrResult>;
}

#[async_trait]
pub trait PageRepository: Send + Sync {
    async fn find(&self, id: &str) -> Result<Option<ScannedPage>>;
    async fn find_owned(&self, id: &str, owner_id: &str) -> Result<Option<ScannedPage>>;
    async fn update(&self, update: PageUpdate) -> Result<ScannedPage>;
}

#[async_trait]
pub trait RecordRepository: Send + Sync {
    async fn create(
        &self,
        book_scan_id: &str,
        owner_id: Option<&str>,
    ) -> Result<ClassificationRecord>;
    async fn find(&self, id: &str, owner_id: Option<&str>) -> Result<Option<ClassificationRecord>>;
    async fn list_by_book(
        &self,
        book_scan_id: &str,
        owner_id: Option<&str>,
    ) -> Result<Vec<ClassificationRecord>>;
    async fn update(
        &self,
        update: RecordUpdate,
        owner_id: Option<&str>,
    ) -> Result<ClassificationRecord>;
    async fn delete(&self, id: &str, owner_id: Option<&str>) -> Result<()>;
}

#[async_trait]
pub trait RecipeRepository: Send + Sync {
    async fn add(&self, draft: &RecipeDraft, owner_id: &str) -> Result<Recipe>;
}

#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn find_owned(&self, id: &str, owner_id: &str) -> Result<Option<BookScan>>;
}
