use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::broadcast::StatusBroadcaster;
use crate::model::{InputPage, RecipeDraft, TaxonomyChoice};
use crate::ports::{
    BookRepository, ClassificationService, PageRepository, RecipeRepository, RecordRepository,
    Storage, ThumbnailService, ValidationService,
};
use crate::workflow::engine::GraphState;

/// Full state of one classification run, checkpointed on every suspend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationState {
    pub record_id: String,
    pub book_scan_id: String,
    pub input_pages: Vec<InputPage>,
    /// Raw candidate from the classification collaborator.
    pub candidate: Option<Value>,
    pub thumbnail_path: Option<String>,
    /// Whether the most recent validation pass was the first one.
    pub first_pass_validation: bool,
    /// The recipe as last validated or edited. `None` after a rejection.
    pub recipe: Option<RecipeDraft>,
    pub taxonomy: Option<TaxonomyChoice>,
}

impl ClassificationState {
    pub fn new(record_id: &str, book_scan_id: &str, input_pages: Vec<InputPage>) -> Self {
        Self {
            record_id: record_id.to_string(),
            book_scan_id: book_scan_id.to_string(),
            input_pages,
            candidate: None,
            thumbnail_path: None,
            first_pass_validation: false,
            recipe: None,
            taxonomy: None,
        }
    }
}

/// Patch returned by classification steps. `None` leaves a field alone;
/// the double options can set nullable fields back to `None`.
#[derive(Debug, Default)]
pub struct ClassificationPatch {
    pub input_pages: Option<Vec<InputPage>>,
    pub candidate: Option<Value>,
    pub thumbnail_path: Option<Option<String>>,
    pub first_pass_validation: Option<bool>,
    pub recipe: Option<Option<RecipeDraft>>,
    pub taxonomy: Option<TaxonomyChoice>,
}

impl ClassificationPatch {
    pub fn clear_recipe() -> Self {
        Self {
            recipe: Some(None),
            ..Default::default()
        }
    }
}

impl GraphState for ClassificationState {
    type Patch = ClassificationPatch;

    fn apply(&mut self, patch: ClassificationPatch) {
        if let Some(input_pages) = patch.input_pages {
            self.input_pages = input_pages;
        }
        if let Some(candidate) = patch.candidate {
            self.candidate = Some(candidate);
        }
        if let Some(thumbnail_path) = patch.thumbnail_path {
            self.thumbnail_path = thumbnail_path;
        }
        if let Some(first_pass) = patch.first_pass_validation {
            self.first_pass_validation = first_pass;
        }
        if let Some(recipe) = patch.recipe {
            self.recipe = recipe;
        }
        if let Some(taxonomy) = patch.taxonomy {
            self.taxonomy = Some(taxonomy);
        }
    }
}

/// Read-only collaborator handles a step may use, scoped to the owner who
/// started or resumed the run.
pub struct ClassificationContext {
    pub owner_id: String,
    pub classification: Arc<dyn ClassificationService>,
    pub validation: Arc<dyn ValidationService>,
    pub thumbnails: Arc<dyn ThumbnailService>,
    pub storage: Arc<dyn Storage>,
    pub pages: Arc<dyn PageRepository>,
    pub records: Arc<dyn RecordRepository>,
    pub recipes: Arc<dyn RecipeRepository>,
    pub books: Arc<dyn BookRepository>,
    pub status: StatusBroadcaster,
}
