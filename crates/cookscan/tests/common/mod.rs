//! Shared harness for pipeline integration tests: stub collaborators plus
//! in-memory repositories wired into a full `Runtime`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use cookscan::broadcast::StatusEvent;
use cookscan::error::CollaboratorError;
use cookscan::model::{
    BookScan, OcrResult, PageType, RecipeDraft, ScannedPage, Segment, SegmentationOutcome,
};
use cookscan::ports::{
    ClassificationService, EmbeddingService, ImageKind, OcrService, SegmentationService, Storage,
    TextOrImageService, ThumbnailService, ValidationService,
};
use cookscan::repos::{
    MemoryBookRepository, MemoryPageRepository, MemoryRecipeRepository, MemoryRecordRepository,
};
use cookscan::workflow::MemoryCheckpointStore;
use cookscan::{Config, Runtime, RuntimeServices};

type Result<T> = std::result::Result<T, CollaboratorError>;

/// OCR stub: hands back a canned result per page id.
#[derive(Default)]
pub struct StubOcr {
    pub texts: Mutex<HashMap<String, String>>,
}

impl StubOcr {
    pub fn with_text(&self, page_id: &str, text: &str) {
        self.texts
            .lock()
            .unwrap()
            .insert(page_id.to_string(), text.to_string());
    }
}

#[async_trait]
impl OcrService for StubOcr {
    async fn extract(&self, _image_path: &Path, page_id: &str) -> Result<OcrResult> {
        let text = self
            .texts
            .lock()
            .unwrap()
            .get(page_id)
            .cloned()
            .unwrap_or_else(|| format!("text of {page_id}"));
        Ok(OcrResult {
            page_id: page_id.to_string(),
            full_text: text.clone(),
            blocks: vec![json!({"text": text, "index": 0})],
        })
    }
}

/// Treats any path containing one of the registered image ids as a photo.
#[derive(Default)]
pub struct StubPageKind {
    pub image_ids: Mutex<Vec<String>>,
}

impl StubPageKind {
    pub fn mark_image(&self, page_id: &str) {
        self.image_ids.lock().unwrap().push(page_id.to_string());
    }
}

impl TextOrImageService for StubPageKind {
    fn is_text_page(&self, image_path: &Path) -> bool {
        let path = image_path.to_string_lossy();
        !self
            .image_ids
            .lock()
            .unwrap()
            .iter()
            .any(|id| path.contains(id.as_str()))
    }
}

#[derive(Default)]
pub struct StubSegmentation {
    pub outcome: Mutex<SegmentationOutcome>,
}

impl StubSegmentation {
    pub fn propose(&self, segments: Vec<Segment>, done: bool) {
        *self.outcome.lock().unwrap() = SegmentationOutcome {
            segmentation_done: done,
            segments,
        };
    }
}

#[async_trait]
impl SegmentationService for StubSegmentation {
    async fn segment(&self, _ocr: &OcrResult) -> Result<SegmentationOutcome> {
        Ok(self.outcome.lock().unwrap().clone())
    }
}

/// Classification stub: returns a candidate built from the text it saw and
/// remembers every call for assertions.
#[derive(Default)]
pub struct StubClassification {
    pub seen_text: Mutex<Vec<String>>,
}

#[async_trait]
impl ClassificationService for StubClassification {
    async fn classify(&self, blocks: &[Value], text: &str) -> Result<Value> {
        self.seen_text.lock().unwrap().push(text.to_string());
        Ok(json!({
            "title": "Apple Pie",
            "instructions": ["mix", "bake"],
            "block_count": blocks.len(),
        }))
    }
}

/// Validation stub: deserializes the candidate into a draft and stamps the
/// thumbnail as the recipe image.
#[derive(Default)]
pub struct StubValidation;

#[async_trait]
impl ValidationService for StubValidation {
    async fn validate(&self, candidate: &Value, thumbnail: Option<&str>) -> Result<RecipeDraft> {
        let mut draft: RecipeDraft = serde_json::from_value(candidate.clone())
            .map_err(|e| CollaboratorError::Validation(e.to_string()))?;
        if draft.title.is_empty() {
            return Err(CollaboratorError::Validation("missing title".to_string()));
        }
        if draft.image_url.is_none() {
            draft.image_url = thumbnail.map(str::to_string);
        }
        Ok(draft)
    }
}

#[derive(Default)]
pub struct StubThumbnail;

#[async_trait]
impl ThumbnailService for StubThumbnail {
    async fn generate(&self, _src_path: &Path) -> Result<Vec<u8>> {
        Ok(vec![0xFF, 0xD8, 0xFF])
    }
}

#[derive(Default)]
pub struct StubEmbedding {
    pub indexed: Mutex<Vec<String>>,
}

#[async_trait]
impl EmbeddingService for StubEmbedding {
    async fn index(&self, recipe_id: &str, _owner_id: &str, _reindex: bool) -> Result<usize> {
        self.indexed.lock().unwrap().push(recipe_id.to_string());
        Ok(3)
    }
}

/// In-memory blob storage keyed by filename.
#[derive(Default)]
pub struct StubStorage {
    pub files: Mutex<HashMap<String, Vec<u8>>>,
    pub ocr: Mutex<HashMap<String, OcrResult>>,
    pub copied_to_recipe: Mutex<Vec<String>>,
}

impl StubStorage {
    pub fn seed_ocr(&self, result: OcrResult) {
        self.ocr
            .lock()
            .unwrap()
            .insert(result.page_id.clone(), result);
    }
}

#[async_trait]
impl Storage for StubStorage {
    async fn image_path(&self, image_id: &str, kind: ImageKind) -> Result<PathBuf> {
        Ok(PathBuf::from(format!("/{}/{image_id}.jpg", kind.as_str())))
    }

    async fn save_image_bytes(
        &self,
        bytes: &[u8],
        filename: &str,
        _kind: ImageKind,
    ) -> Result<String> {
        self.files
            .lock()
            .unwrap()
            .insert(filename.to_string(), bytes.to_vec());
        Ok(filename.to_string())
    }

    async fn copy_to_recipe(&self, filename: &str) -> Result<String> {
        self.copied_to_recipe
            .lock()
            .unwrap()
            .push(filename.to_string());
        Ok(filename.to_string())
    }

    async fn rename(&self, from: &str, to: &str, _kind: ImageKind) -> Result<String> {
        let mut files = self.files.lock().unwrap();
        if let Some(bytes) = files.remove(from) {
            files.insert(to.to_string(), bytes);
        }
        Ok(to.to_string())
    }

    async fn delete(&self, filename: &str, _kind: ImageKind) -> Result<()> {
        self.files.lock().unwrap().remove(filename);
        Ok(())
    }

    async fn write_ocr(&self, result: &OcrResult) -> Result<String> {
        let page_id = result.page_id.clone();
        self.ocr
            .lock()
            .unwrap()
            .insert(page_id.clone(), result.clone());
        Ok(format!("{page_id}.json"))
    }

    async fn read_ocr(&self, page_id: &str) -> Result<OcrResult> {
        self.ocr
            .lock()
            .unwrap()
            .get(page_id)
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound(format!("ocr result for {page_id}")))
    }
}

/// A fully wired pipeline over stubs and in-memory repositories.
pub struct TestHarness {
    pub runtime: Runtime,
    pub ocr: Arc<StubOcr>,
    pub page_kind: Arc<StubPageKind>,
    pub segmentation: Arc<StubSegmentation>,
    pub classification: Arc<StubClassification>,
    pub embeddings: Arc<StubEmbedding>,
    pub storage: Arc<StubStorage>,
    pub pages: Arc<MemoryPageRepository>,
    pub records: Arc<MemoryRecordRepository>,
    pub recipes: Arc<MemoryRecipeRepository>,
    pub books: Arc<MemoryBookRepository>,
}

impl TestHarness {
    pub fn start() -> Self {
        let ocr = Arc::new(StubOcr::default());
        let page_kind = Arc::new(StubPageKind::default());
        let segmentation = Arc::new(StubSegmentation::default());
        let classification = Arc::new(StubClassification::default());
        let embeddings = Arc::new(StubEmbedding::default());
        let storage = Arc::new(StubStorage::default());
        let pages = Arc::new(MemoryPageRepository::new());
        let records = Arc::new(MemoryRecordRepository::new());
        let recipes = Arc::new(MemoryRecipeRepository::new());
        let books = Arc::new(MemoryBookRepository::new());

        let services = RuntimeServices {
            ocr: Arc::clone(&ocr) as _,
            page_kind: Arc::clone(&page_kind) as _,
            segmentation: Arc::clone(&segmentation) as _,
            classification: Arc::clone(&classification) as _,
            validation: Arc::new(StubValidation) as _,
            thumbnails: Arc::new(StubThumbnail) as _,
            embeddings: Arc::clone(&embeddings) as _,
            storage: Arc::clone(&storage) as _,
            pages: Arc::clone(&pages) as _,
            records: Arc::clone(&records) as _,
            recipes: Arc::clone(&recipes) as _,
            books: Arc::clone(&books) as _,
        };

        let runtime = Runtime::start(
            Config::default(),
            services,
            Arc::new(MemoryCheckpointStore::new()),
        );

        Self {
            runtime,
            ocr,
            page_kind,
            segmentation,
            classification,
            embeddings,
            storage,
            pages,
            records,
            recipes,
            books,
        }
    }

    /// Seeds a book scan and its owner.
    pub fn seed_book(&self, book_id: &str, title: &str, owner_id: &str) {
        self.books.insert(BookScan {
            id: book_id.to_string(),
            owner_id: owner_id.to_string(),
            title: title.to_string(),
        });
    }

    /// Seeds a page with an inferred type; text pages get an OCR result in
    /// storage as well.
    pub fn seed_page(
        &self,
        book_id: &str,
        owner_id: &str,
        id: &str,
        number: u32,
        page_type: PageType,
    ) -> ScannedPage {
        let mut page = ScannedPage::new(book_id, number, &format!("{id}.jpg"));
        page.id = id.to_string();
        page.page_type = Some(page_type);
        if page_type == PageType::Text {
            page.ocr_ref = Some(format!("{id}.json"));
            self.storage.seed_ocr(OcrResult {
                page_id: id.to_string(),
                full_text: format!("text of {id}"),
                blocks: vec![json!({"text": format!("text of {id}"), "index": 0})],
            });
        }
        self.pages.insert(page.clone(), owner_id);
        page
    }
}

/// Waits for the next status event matching `predicate`, skipping others.
pub async fn wait_for_event<F>(
    rx: &mut broadcast::Receiver<StatusEvent>,
    predicate: F,
) -> StatusEvent
where
    F: Fn(&StatusEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.expect("status channel closed");
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for status event")
}

pub fn segment(id: u32, title: &str) -> Segment {
    Segment {
        id,
        title: title.to_string(),
        bounding_boxes: vec![],
        ocr_block_indices: vec![],
    }
}
