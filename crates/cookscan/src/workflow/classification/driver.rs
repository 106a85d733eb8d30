//! Starts and resumes classification runs and keeps the record in sync
//! with where the graph is parked.

use std::sync::Arc;

use tracing::{error, info, warn};

use super::graph::{classification_graph, NAMESPACE};
use super::state::{ClassificationContext, ClassificationState};
use crate::broadcast::{StatusBroadcaster, StatusEvent};
use crate::error::WorkflowError;
use crate::model::{
    ApprovalBody, ClassificationRecord, InputPage, PageType, RecordStatus, RecordUpdate,
};
use crate::ports::{
    BookRepository, ClassificationService, PageRepository, RecipeRepository, RecordRepository,
    Storage, ThumbnailService, ValidationService,
};
use crate::workflow::checkpoint::CheckpointStore;
use crate::workflow::coordinator::ResumeCoordinator;
use crate::workflow::engine::{GraphRunner, RunOutcome};

/// Owner-independent collaborator handles for classification runs.
#[derive(Clone)]
pub struct ClassificationServices {
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

pub struct ClassificationDriver {
    services: ClassificationServices,
    runner: GraphRunner<ClassificationState, ClassificationContext>,
    coordinator: Arc<ResumeCoordinator>,
}

impl ClassificationDriver {
    pub fn new(
        services: ClassificationServices,
        checkpoints: Arc<dyn CheckpointStore>,
        coordinator: Arc<ResumeCoordinator>,
    ) -> Self {
        Self {
            services,
            runner: GraphRunner::new(classification_graph(), NAMESPACE, checkpoints),
            coordinator,
        }
    }

    fn context(&self, owner_id: &str) -> Arc<ClassificationContext> {
        Arc::new(ClassificationContext {
            owner_id: owner_id.to_string(),
            classification: Arc::clone(&self.services.classification),
            validation: Arc::clone(&self.services.validation),
            thumbnails: Arc::clone(&self.services.thumbnails),
            storage: Arc::clone(&self.services.storage),
            pages: Arc::clone(&self.services.pages),
            records: Arc::clone(&self.services.records),
            recipes: Arc::clone(&self.services.recipes),
            books: Arc::clone(&self.services.books),
            status: self.services.status.clone(),
        })
    }

    /// Creates a record for one page group and starts its run. The graph
    /// suspends immediately for grouping review; the updated record is
    /// returned so callers can hand its id to the reviewer.
    pub async fn run(
        &self,
        book_scan_id: &str,
        input_pages: Vec<InputPage>,
        owner_id: &str,
    ) -> Result<ClassificationRecord, WorkflowError> {
        let record = self
            .services
            .records
            .create(book_scan_id, Some(owner_id))
            .await?;
        let _guard = self.coordinator.acquire(&record.id).await;

        info!("starting classification run for record {}", record.id);

        let state = ClassificationState::new(&record.id, book_scan_id, input_pages.clone());
        let outcome = self
            .runner
            .run(state, self.context(owner_id), &record.id)
            .await;

        match outcome {
            Ok(RunOutcome::Suspended { .. }) => {
                let (text_pages, image_pages): (Vec<_>, Vec<_>) = input_pages
                    .iter()
                    .partition(|p| p.page_type == PageType::Text);
                let mut update = RecordUpdate::with_status(&record.id, RecordStatus::ReviewGrouping);
                update.text_pages = Some(text_pages.iter().map(|p| p.to_ref()).collect());
                update.image_pages = Some(image_pages.iter().map(|p| p.to_ref()).collect());

                let updated = self.services.records.update(update, Some(owner_id)).await?;
                self.services
                    .status
                    .publish(StatusEvent::record(&record.id, RecordStatus::ReviewGrouping));
                Ok(updated)
            }
            Ok(RunOutcome::Complete(_)) => {
                self.coordinator.evict(&record.id);
                info!("record {} completed without review", record.id);
                Ok(record)
            }
            Err(e) => {
                self.coordinator.evict(&record.id);
                self.note_failure(&record.id, owner_id, &e).await;
                Err(e)
            }
        }
    }

    /// Resumes a suspended run with a reviewer decision. Calls for the same
    /// record are serialized; the payload variant must match the suspend
    /// point currently persisted for the record.
    pub async fn resume(
        &self,
        record_id: &str,
        body: ApprovalBody,
        owner_id: &str,
    ) -> Result<RunOutcome<ClassificationState>, WorkflowError> {
        let _guard = self.coordinator.acquire(record_id).await;

        info!("resuming record {} ({} phase)", record_id, body.phase());

        let payload = serde_json::to_value(&body)?;
        let outcome = self
            .runner
            .resume(self.context(owner_id), record_id, payload)
            .await;

        match &outcome {
            Ok(RunOutcome::Suspended { step, state, .. }) => {
                self.record_suspension(record_id, owner_id, step, state)
                    .await?;
            }
            Ok(RunOutcome::Complete(state)) => {
                self.coordinator.evict(record_id);
                if state.recipe.is_none() {
                    info!("record {record_id} ended after rejection, nothing persisted");
                } else {
                    info!("finished pipeline for record {record_id}");
                }
            }
            Err(e) => {
                self.note_failure(record_id, owner_id, e).await;
            }
        }

        outcome
    }

    async fn record_suspension(
        &self,
        record_id: &str,
        owner_id: &str,
        step: &str,
        state: &ClassificationState,
    ) -> Result<(), WorkflowError> {
        let status = match step {
            "interrupt_classification" => RecordStatus::NeedsReview,
            "interrupt_taxonomy" => RecordStatus::NeedsTaxonomy,
            other => {
                warn!("record {record_id} suspended at unexpected step '{other}'");
                return Ok(());
            }
        };

        let mut update = RecordUpdate::with_status(record_id, status);
        update.title = state.recipe.as_ref().map(|r| r.title.clone());
        update.draft = state.recipe.clone();
        if status == RecordStatus::NeedsReview {
            update.thumbnail_path = state.thumbnail_path.clone();
        }

        self.services.records.update(update, Some(owner_id)).await?;
        self.services
            .status
            .publish(StatusEvent::record(record_id, status));
        Ok(())
    }

    /// Surfaces a step failure on the record so the reviewer sees it; the
    /// last checkpoint stays intact and the instance remains resumable.
    async fn note_failure(&self, record_id: &str, owner_id: &str, error: &WorkflowError) {
        error!("classification run for {record_id} failed: {error}");
        let mut update = RecordUpdate::new(record_id);
        update.error_message = Some(Some(error.to_string()));
        if let Err(e) = self.services.records.update(update, Some(owner_id)).await {
            error!("could not record failure on {record_id}: {e}");
        }
    }
}
