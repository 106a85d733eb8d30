//! Classification stage: group a book scan's pages and start one workflow
//! run per group.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::JobHandler;
use crate::error::WorkerError;
use crate::grouping::{group_pages, infer_motif};
use crate::ports::RecordRepository;
use crate::queue::ClassificationJob;
use crate::workflow::classification::ClassificationDriver;

pub struct ClassificationHandler {
    pub records: Arc<dyn RecordRepository>,
    pub driver: Arc<ClassificationDriver>,
}

impl ClassificationHandler {
    /// Ids of pages already consumed by any record of this book scan.
    /// Recomputed fresh on every dispatch; only deleting a record frees
    /// its pages again.
    async fn used_pages(
        &self,
        book_scan_id: &str,
        owner_id: &str,
    ) -> Result<HashSet<String>, WorkerError> {
        let records = self
            .records
            .list_by_book(book_scan_id, Some(owner_id))
            .await?;
        Ok(records
            .iter()
            .flat_map(|r| r.consumed_page_ids().map(str::to_string))
            .collect())
    }
}

#[async_trait]
impl JobHandler<ClassificationJob> for ClassificationHandler {
    fn name(&self) -> &'static str {
        "ClassificationWorker"
    }

    async fn handle(&self, job: ClassificationJob) -> Result<(), WorkerError> {
        let Some(first) = job.pages.first() else {
            info!("no pages provided, nothing to do");
            return Ok(());
        };
        let book_scan_id = first.book_scan_id.clone();

        let used = self.used_pages(&book_scan_id, &job.owner_id).await?;
        let motif = infer_motif(&job.pages);
        info!(
            "processing {} pages of book {book_scan_id} with motif {motif:?}",
            job.pages.len()
        );

        let groups = group_pages(&job.pages, motif, &used);
        if groups.is_empty() {
            info!("no new groups to classify");
            return Ok(());
        }
        info!("prepared {} group(s) for classification", groups.len());

        for group in groups {
            self.driver
                .run(&book_scan_id, group, &job.owner_id)
                .await?;
        }
        Ok(())
    }
}
