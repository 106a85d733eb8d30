//! Explicitly constructed runtime: queues, workers, drivers, and the
//! public entry points. Nothing here is global; callers build one
//! `Runtime` at startup and pass handles around.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::error;

use crate::broadcast::{StatusBroadcaster, StatusEvent};
use crate::config::Config;
use crate::error::{WorkerError, WorkflowError};
use crate::model::{
    ApprovalBody, ClassificationRecord, InputPage, ScannedPage, SegmentationApproval,
};
use crate::ports::{
    BookRepository, ClassificationService, EmbeddingService, OcrService, PageRepository,
    RecipeRepository, RecordRepository, SegmentationService, Storage, TextOrImageService,
    ThumbnailService, ValidationService,
};
use crate::queue::{work_queue, ClassificationJob, EmbeddingJob, QueueSender};
use crate::worker::{
    ClassificationHandler, EmbeddingHandler, OcrHandler, SegmentationHandler, Worker,
};
use crate::workflow::classification::{
    ClassificationDriver, ClassificationServices, ClassificationState,
};
use crate::workflow::segmentation::{SegmentationDriver, SegmentationServices, SegmentationState};
use crate::workflow::{CheckpointStore, ResumeCoordinator, RunOutcome};

/// All collaborator handles the pipeline consumes.
#[derive(Clone)]
pub struct RuntimeServices {
    pub ocr: Arc<dyn OcrService>,
    pub page_kind: Arc<dyn TextOrImageService>,
    pub segmentation: Arc<dyn SegmentationService>,
    pub classification: Arc<dyn ClassificationService>,
    pub validation: Arc<dyn ValidationService>,
    pub thumbnails: Arc<dyn ThumbnailService>,
    pub embeddings: Arc<dyn EmbeddingService>,
    pub storage: Arc<dyn Storage>,
    pub pages: Arc<dyn PageRepository>,
    pub records: Arc<dyn RecordRepository>,
    pub recipes: Arc<dyn RecipeRepository>,
    pub books: Arc<dyn BookRepository>,
}

pub struct Runtime {
    ocr_queue: QueueSender<ScannedPage>,
    segmentation_queue: QueueSender<ScannedPage>,
    classification_queue: QueueSender<ClassificationJob>,
    embedding_queue: QueueSender<EmbeddingJob>,
    classification_driver: Arc<ClassificationDriver>,
    segmentation_driver: Arc<SegmentationDriver>,
    status: StatusBroadcaster,
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl Runtime {
    /// Builds the queues and drivers and spawns the four stage workers.
    /// Must be called from within a tokio runtime.
    pub fn start(
        config: Config,
        services: RuntimeServices,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        let status = StatusBroadcaster::new(config.broadcast_capacity);
        let coordinator = Arc::new(ResumeCoordinator::new());
        let heartbeat = config.heartbeat_interval();

        let (ocr_tx, ocr_rx) = work_queue::<ScannedPage>();
        let (seg_tx, seg_rx) = work_queue::<ScannedPage>();
        let (cls_tx, cls_rx) = work_queue::<ClassificationJob>();
        let (emb_tx, emb_rx) = work_queue::<EmbeddingJob>();

        let segmentation_driver = Arc::new(SegmentationDriver::new(
            SegmentationServices {
                segmentation: Arc::clone(&services.segmentation),
                pages: Arc::clone(&services.pages),
                storage: Arc::clone(&services.storage),
                status: status.clone(),
            },
            Arc::clone(&checkpoints),
            Arc::clone(&coordinator),
        ));

        let classification_driver = Arc::new(ClassificationDriver::new(
            ClassificationServices {
                classification: Arc::clone(&services.classification),
                validation: Arc::clone(&services.validation),
                thumbnails: Arc::clone(&services.thumbnails),
                storage: Arc::clone(&services.storage),
                pages: Arc::clone(&services.pages),
                records: Arc::clone(&services.records),
                recipes: Arc::clone(&services.recipes),
                books: Arc::clone(&services.books),
                status: status.clone(),
            },
            checkpoints,
            coordinator,
        ));

        let (shutdown, shutdown_rx) = watch::channel(false);

        let ocr_worker = Worker::new(
            Arc::new(OcrHandler {
                ocr: Arc::clone(&services.ocr),
                page_kind: Arc::clone(&services.page_kind),
                storage: Arc::clone(&services.storage),
                pages: Arc::clone(&services.pages),
                status: status.clone(),
                segmentation_queue: seg_tx.clone(),
            }),
            ocr_rx,
            shutdown_rx.clone(),
            heartbeat,
        );
        let seg_worker = Worker::new(
            Arc::new(SegmentationHandler {
                driver: Arc::clone(&segmentation_driver),
            }),
            seg_rx,
            shutdown_rx.clone(),
            heartbeat,
        );
        let cls_worker = Worker::new(
            Arc::new(ClassificationHandler {
                records: Arc::clone(&services.records),
                driver: Arc::clone(&classification_driver),
            }),
            cls_rx,
            shutdown_rx.clone(),
            heartbeat,
        );
        let emb_worker = Worker::new(
            Arc::new(EmbeddingHandler {
                embeddings: Arc::clone(&services.embeddings),
            }),
            emb_rx,
            shutdown_rx,
            heartbeat,
        );

        let workers = vec![
            tokio::spawn(ocr_worker.run()),
            tokio::spawn(seg_worker.run()),
            tokio::spawn(cls_worker.run()),
            tokio::spawn(emb_worker.run()),
        ];

        Self {
            ocr_queue: ocr_tx,
            segmentation_queue: seg_tx,
            classification_queue: cls_tx,
            embedding_queue: emb_tx,
            classification_driver,
            segmentation_driver,
            status,
            shutdown,
            workers,
        }
    }

    pub fn enqueue_ocr(&self, page: ScannedPage) -> Result<(), WorkerError> {
        self.ocr_queue.enqueue(page)
    }

    pub fn enqueue_segmentation(&self, page: ScannedPage) -> Result<(), WorkerError> {
        self.segmentation_queue.enqueue(page)
    }

    pub fn enqueue_classification(&self, job: ClassificationJob) -> Result<(), WorkerError> {
        self.classification_queue.enqueue(job)
    }

    pub fn enqueue_embedding(&self, job: EmbeddingJob) -> Result<(), WorkerError> {
        self.embedding_queue.enqueue(job)
    }

    /// Queues a grouping pass over a book scan's pages. The consumed-pages
    /// query runs when the worker picks the job up, not at enqueue time, so
    /// concurrent triggers on one book can select overlapping pages.
    pub fn dispatch_book(
        &self,
        pages: Vec<ScannedPage>,
        owner_id: &str,
    ) -> Result<(), WorkerError> {
        self.enqueue_classification(ClassificationJob {
            pages,
            owner_id: owner_id.to_string(),
        })
    }

    /// Starts one classification instance for an explicit page group.
    pub async fn run_classification(
        &self,
        book_scan_id: &str,
        input_pages: Vec<InputPage>,
        owner_id: &str,
    ) -> Result<ClassificationRecord, WorkflowError> {
        self.classification_driver
            .run(book_scan_id, input_pages, owner_id)
            .await
    }

    /// Resumes a suspended classification instance with a reviewer
    /// decision. The payload variant must match the record's current
    /// suspend point.
    pub async fn resume_classification(
        &self,
        record_id: &str,
        body: ApprovalBody,
        owner_id: &str,
    ) -> Result<RunOutcome<ClassificationState>, WorkflowError> {
        self.classification_driver
            .resume(record_id, body, owner_id)
            .await
    }

    /// Resumes the zone-approval suspend point of a page's segmentation.
    pub async fn resume_segmentation(
        &self,
        page_id: &str,
        approval: SegmentationApproval,
    ) -> Result<RunOutcome<SegmentationState>, WorkflowError> {
        self.segmentation_driver.resume(page_id, approval).await
    }

    /// Live feed of page/record status transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.status.subscribe()
    }

    /// Asks every worker to stop; they finish the item in hand first.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Waits for all workers to exit. Call `shutdown` first.
    pub async fn wait(self) {
        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.await {
                error!("worker {i} panicked: {e}");
            }
        }
    }
}
