//! In-memory repositories behind the repository ports.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::CollaboratorError;
use crate::model::{
    BookScan, ClassificationRecord, PageUpdate, Recipe, RecipeDraft, RecordUpdate, ScannedPage,
};
use crate::ports::{BookRepository, PageRepository, RecipeRepository, RecordRepository};

type Result<T> = std::result::Result<T, CollaboratorError>;

/// Pages keyed by id, with owner tracked per book scan.
#[derive(Default)]
pub struct MemoryPageRepository {
    pages: RwLock<HashMap<String, ScannedPage>>,
    /// book scan id -> owner id
    owners: RwLock<HashMap<String, String>>,
}

impl MemoryPageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, page: ScannedPage, owner_id: &str) {
        self.owners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(page.book_scan_id.clone(), owner_id.to_string());
        self.pages
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(page.id.clone(), page);
    }

    fn owner_of(&self, book_scan_id: &str) -> Option<String> {
        self.owners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(book_scan_id)
            .cloned()
    }
}

#[async_trait]
impl PageRepository for MemoryPageRepository {
    async fn find(&self, id: &str) -> Result<Option<ScannedPage>> {
        Ok(self
            .pages
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned())
    }

    async fn find_owned(&self, id: &str, owner_id: &str) -> Result<Option<ScannedPage>> {
        let Some(page) = self.find(id).await? else {
            return Ok(None);
        };
        if self.owner_of(&page.book_scan_id).as_deref() != Some(owner_id) {
            return Ok(None);
        }
        Ok(Some(page))
    }

    async fn update(&self, update: PageUpdate) -> Result<ScannedPage> {
        let mut pages = self.pages.write().unwrap_or_else(|e| e.into_inner());
        let page = pages
            .get_mut(&update.id)
            .ok_or_else(|| CollaboratorError::NotFound(format!("page {}", update.id)))?;

        if let Some(ocr_ref) = update.ocr_ref {
            page.ocr_ref = Some(ocr_ref);
        }
        if let Some(page_type) = update.page_type {
            page.page_type = Some(page_type);
        }
        if let Some(segments) = update.segments {
            page.segments = segments;
        }
        if let Some(done) = update.segmentation_done {
            page.segmentation_done = done;
        }
        if let Some(status) = update.status {
            page.status = status;
        }
        Ok(page.clone())
    }
}

#[derive(Default)]
pub struct MemoryRecordRepository {
    records: RwLock<HashMap<String, ClassificationRecord>>,
    owners: RwLock<HashMap<String, String>>,
}

impl MemoryRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn owned(&self, record: &ClassificationRecord, owner_id: Option<&str>) -> bool {
        match owner_id {
            None => true,
            Some(owner) => {
                self.owners
                    .read()
                    .unwrap_or_else(|e| e.into_inner())
                    .get(&record.id)
                    .map(String::as_str)
                    == Some(owner)
            }
        }
    }
}

#[async_trait]
impl RecordRepository for MemoryRecordRepository {
    async fn create(
        &self,
        book_scan_id: &str,
        owner_id: Option<&str>,
    ) -> Result<ClassificationRecord> {
        let record = ClassificationRecord::new(book_scan_id);
        if let Some(owner) = owner_id {
            self.owners
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .insert(record.id.clone(), owner.to_string());
        }
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn find(&self, id: &str, owner_id: Option<&str>) -> Result<Option<ClassificationRecord>> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(records
            .get(id)
            .filter(|r| self.owned(r, owner_id))
            .cloned())
    }

    async fn list_by_book(
        &self,
        book_scan_id: &str,
        owner_id: Option<&str>,
    ) -> Result<Vec<ClassificationRecord>> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(records
            .values()
            .filter(|r| r.book_scan_id == book_scan_id && self.owned(r, owner_id))
            .cloned()
            .collect())
    }

    async fn update(
        &self,
        update: RecordUpdate,
        owner_id: Option<&str>,
    ) -> Result<ClassificationRecord> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let record = records
            .get_mut(&update.id)
            .ok_or_else(|| CollaboratorError::NotFound(format!("record {}", update.id)))?;
        if !self.owned(record, owner_id) {
            return Err(CollaboratorError::NotFound(format!("record {}", update.id)));
        }

        if let Some(status) = update.status {
            record.status = status;
        }
        if let Some(text_pages) = update.text_pages {
            record.text_pages = text_pages;
        }
        if let Some(image_pages) = update.image_pages {
            record.image_pages = image_pages;
        }
        if let Some(recipe_id) = update.recipe_id {
            record.recipe_id = Some(recipe_id);
        }
        if let Some(title) = update.title {
            record.title = Some(title);
        }
        if let Some(thumbnail_path) = update.thumbnail_path {
            record.thumbnail_path = Some(thumbnail_path);
        }
        if let Some(draft) = update.draft {
            record.draft = Some(draft);
        }
        if let Some(error_message) = update.error_message {
            record.error_message = error_message;
        }
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn delete(&self, id: &str, owner_id: Option<&str>) -> Result<()> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        match records.get(id) {
            Some(record) if self.owned(record, owner_id) => {
                records.remove(id);
                self.owners
                    .write()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(id);
                Ok(())
            }
            _ => Err(CollaboratorError::NotFound(format!("record {id}"))),
        }
    }
}

#[derive(Default)]
pub struct MemoryRecipeRepository {
    recipes: RwLock<HashMap<String, Recipe>>,
}

impl MemoryRecipeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Recipe> {
        self.recipes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RecipeRepository for MemoryRecipeRepository {
    async fn add(&self, draft: &RecipeDraft, owner_id: &str) -> Result<Recipe> {
        let recipe = Recipe {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            draft: draft.clone(),
        };
        self.recipes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(recipe.id.clone(), recipe.clone());
        Ok(recipe)
    }
}

#[derive(Default)]
pub struct MemoryBookRepository {
    books: RwLock<HashMap<String, BookScan>>,
}

impl MemoryBookRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, book: BookScan) {
        self.books
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(book.id.clone(), book);
    }
}

#[async_trait]
impl BookRepository for MemoryBookRepository {
    async fn find_owned(&self, id: &str, owner_id: &str) -> Result<Option<BookScan>> {
        Ok(self
            .books
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .filter(|b| b.owner_id == owner_id)
            .cloned())
    }
}
