//! Segmentation workflow: propose zones, wait for zone approval, persist.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::broadcast::{StatusBroadcaster, StatusEvent};
use crate::error::WorkflowError;
use crate::model::{OcrResult, PageStatus, PageUpdate, SegmentationApproval, SegmentationOutcome};
use crate::ports::{PageRepository, SegmentationService, Storage};
use crate::workflow::checkpoint::CheckpointStore;
use crate::workflow::coordinator::ResumeCoordinator;
use crate::workflow::engine::{Graph, GraphBuilder, GraphRunner, GraphState, RunOutcome, StepOutcome};

pub const NAMESPACE: &str = "segmentation";

/// Full state of one segmentation run, keyed by the page id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationState {
    pub page_id: String,
    pub ocr: OcrResult,
    pub outcome: Option<SegmentationOutcome>,
}

#[derive(Debug, Default)]
pub struct SegmentationPatch {
    pub outcome: Option<SegmentationOutcome>,
}

impl GraphState for SegmentationState {
    type Patch = SegmentationPatch;

    fn apply(&mut self, patch: SegmentationPatch) {
        if let Some(outcome) = patch.outcome {
            self.outcome = Some(outcome);
        }
    }
}

pub struct SegmentationContext {
    pub segmentation: Arc<dyn SegmentationService>,
    pub pages: Arc<dyn PageRepository>,
    pub status: StatusBroadcaster,
}

async fn start_segmentation(
    state: SegmentationState,
    ctx: Arc<SegmentationContext>,
    _resume: Option<Value>,
) -> Result<StepOutcome<SegmentationState>, WorkflowError> {
    let outcome = ctx.segmentation.segment(&state.ocr).await?;
    Ok(StepOutcome::Advance(SegmentationPatch {
        outcome: Some(outcome),
    }))
}

/// The single suspend point: the reviewer edits or confirms the proposed
/// zones before they are persisted.
async fn await_zone_approval(
    state: SegmentationState,
    _ctx: Arc<SegmentationContext>,
    resume: Option<Value>,
) -> Result<StepOutcome<SegmentationState>, WorkflowError> {
    let Some(payload) = resume else {
        return Ok(StepOutcome::Suspend(json!({
            "awaiting": "zone_approval",
            "page_id": state.page_id,
        })));
    };

    let approval: SegmentationApproval = serde_json::from_value(payload)
        .map_err(|e| WorkflowError::PayloadMismatch(e.to_string()))?;

    if !approval.approved {
        info!("zones rejected for page {}", state.page_id);
        return Ok(StepOutcome::Halt(SegmentationPatch::default()));
    }

    let outcome = approval.segmentation.or_else(|| state.outcome.clone());
    Ok(StepOutcome::Advance(SegmentationPatch { outcome }))
}

async fn approve_segmentation(
    state: SegmentationState,
    ctx: Arc<SegmentationContext>,
    _resume: Option<Value>,
) -> Result<StepOutcome<SegmentationState>, WorkflowError> {
    let Some(outcome) = state.outcome.clone() else {
        return Err(WorkflowError::MissingState {
            step: "approve_segmentation",
            what: "a segmentation outcome",
        });
    };

    let mut update = PageUpdate::new(&state.page_id);
    update.segments = Some(outcome.segments);
    update.segmentation_done = Some(outcome.segmentation_done);
    update.status = Some(PageStatus::Approved);
    ctx.pages.update(update).await?;

    ctx.status
        .publish(StatusEvent::page(&state.page_id, PageStatus::Approved));
    info!("approved segmentation for page {}", state.page_id);

    Ok(StepOutcome::Advance(SegmentationPatch::default()))
}

pub fn segmentation_graph() -> Graph<SegmentationState, SegmentationContext> {
    GraphBuilder::new("start_segmentation")
        .step("start_segmentation", |s, c, r| {
            Box::pin(start_segmentation(s, c, r))
        })
        .step("await_zone_approval", |s, c, r| {
            Box::pin(await_zone_approval(s, c, r))
        })
        .step("approve_segmentation", |s, c, r| {
            Box::pin(approve_segmentation(s, c, r))
        })
        .edge("start_segmentation", "await_zone_approval")
        .edge("await_zone_approval", "approve_segmentation")
        .terminal("approve_segmentation")
        .build()
}

/// Owner-independent handles for segmentation runs.
#[derive(Clone)]
pub struct SegmentationServices {
    pub segmentation: Arc<dyn SegmentationService>,
    pub pages: Arc<dyn PageRepository>,
    pub storage: Arc<dyn Storage>,
    pub status: StatusBroadcaster,
}

pub struct SegmentationDriver {
    services: SegmentationServices,
    runner: GraphRunner<SegmentationState, SegmentationContext>,
    coordinator: Arc<ResumeCoordinator>,
}

impl SegmentationDriver {
    pub fn new(
        services: SegmentationServices,
        checkpoints: Arc<dyn CheckpointStore>,
        coordinator: Arc<ResumeCoordinator>,
    ) -> Self {
        Self {
            services,
            runner: GraphRunner::new(segmentation_graph(), NAMESPACE, checkpoints),
            coordinator,
        }
    }

    fn context(&self) -> Arc<SegmentationContext> {
        Arc::new(SegmentationContext {
            segmentation: Arc::clone(&self.services.segmentation),
            pages: Arc::clone(&self.services.pages),
            status: self.services.status.clone(),
        })
    }

    /// Runs the graph for one page. Every page suspends once for zone
    /// approval; the preliminary zones are persisted so the reviewer can
    /// load them.
    pub async fn run(&self, page_id: &str) -> Result<(), WorkflowError> {
        let _guard = self.coordinator.acquire(page_id).await;

        let ocr = self.services.storage.read_ocr(page_id).await?;
        let state = SegmentationState {
            page_id: page_id.to_string(),
            ocr,
            outcome: None,
        };

        match self.runner.run(state, self.context(), page_id).await? {
            RunOutcome::Suspended { state, .. } => {
                let outcome = state.outcome.unwrap_or_default();
                let mut update = PageUpdate::new(page_id);
                update.segments = Some(outcome.segments);
                update.segmentation_done = Some(outcome.segmentation_done);
                update.status = Some(PageStatus::NeedsReview);
                self.services.pages.update(update).await?;

                self.services
                    .status
                    .publish(StatusEvent::page(page_id, PageStatus::NeedsReview));
                info!("awaiting zone approval for page {page_id}");
            }
            RunOutcome::Complete(_) => {
                self.coordinator.evict(page_id);
                info!("finished segmentation for page {page_id}");
            }
        }
        Ok(())
    }

    /// Resumes the zone-approval suspend point with the reviewer decision.
    pub async fn resume(
        &self,
        page_id: &str,
        approval: SegmentationApproval,
    ) -> Result<RunOutcome<SegmentationState>, WorkflowError> {
        let _guard = self.coordinator.acquire(page_id).await;

        let payload = serde_json::to_value(&approval)?;
        let outcome = self.runner.resume(self.context(), page_id, payload).await;

        match &outcome {
            Ok(RunOutcome::Complete(_)) => {
                self.coordinator.evict(page_id);
            }
            Ok(RunOutcome::Suspended { step, .. }) => {
                info!("page {page_id} suspended again at '{step}'");
            }
            Err(e) => {
                error!("segmentation resume for {page_id} failed: {e}");
            }
        }

        outcome
    }
}
