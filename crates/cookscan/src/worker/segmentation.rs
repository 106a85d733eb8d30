//! Segmentation stage: run the segmentation graph for each text page.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::JobHandler;
use crate::error::WorkerError;
use crate::model::ScannedPage;
use crate::workflow::segmentation::SegmentationDriver;

pub struct SegmentationHandler {
    pub driver: Arc<SegmentationDriver>,
}

#[async_trait]
impl JobHandler<ScannedPage> for SegmentationHandler {
    fn name(&self) -> &'static str {
        "SegmentationWorker"
    }

    async fn handle(&self, page: ScannedPage) -> Result<(), WorkerError> {
        info!("segmenting page {}", page.id);
        self.driver.run(&page.id).await?;
        Ok(())
    }
}
