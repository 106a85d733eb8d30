//! OCR stage: extract text from text pages, wave image pages through.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::JobHandler;
use crate::broadcast::{StatusBroadcaster, StatusEvent};
use crate::error::WorkerError;
use crate::model::{PageStatus, PageType, PageUpdate, ScannedPage};
use crate::ports::{ImageKind, OcrService, PageRepository, Storage, TextOrImageService};
use crate::queue::QueueSender;

pub struct OcrHandler {
    pub ocr: Arc<dyn OcrService>,
    pub page_kind: Arc<dyn TextOrImageService>,
    pub storage: Arc<dyn Storage>,
    pub pages: Arc<dyn PageRepository>,
    pub status: StatusBroadcaster,
    /// Text pages are handed to segmentation; image pages wait for
    /// classification directly.
    pub segmentation_queue: QueueSender<ScannedPage>,
}

#[async_trait]
impl JobHandler<ScannedPage> for OcrHandler {
    fn name(&self) -> &'static str {
        "OcrWorker"
    }

    async fn handle(&self, page: ScannedPage) -> Result<(), WorkerError> {
        let page_id = page.id.clone();
        info!("processing page {page_id}");

        let image_path = self.storage.image_path(&page_id, ImageKind::Scanner).await?;
        debug!("image path: {}", image_path.display());

        let is_text = self.page_kind.is_text_page(&image_path);
        info!("page {page_id} is text page: {is_text}");

        let mut update = PageUpdate::new(&page_id);
        let status;
        if is_text {
            let result = self.ocr.extract(&image_path, &page_id).await?;
            let ocr_ref = self.storage.write_ocr(&result).await?;

            status = PageStatus::OcrDone;
            update.ocr_ref = Some(ocr_ref);
            update.page_type = Some(PageType::Text);
            update.status = Some(status);
        } else {
            status = PageStatus::Approved;
            update.page_type = Some(PageType::Image);
            update.status = Some(status);
        }

        let updated = self.pages.update(update).await?;
        self.status.publish(StatusEvent::page(&page_id, status));

        if updated.page_type == Some(PageType::Text) {
            self.segmentation_queue.enqueue(updated)?;
        }

        info!("finished OCR for {page_id}");
        Ok(())
    }
}
