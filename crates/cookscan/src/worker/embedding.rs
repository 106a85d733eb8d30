//! Embedding stage: index approved recipes for retrieval.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::JobHandler;
use crate::error::WorkerError;
use crate::ports::EmbeddingService;
use crate::queue::EmbeddingJob;

pub struct EmbeddingHandler {
    pub embeddings: Arc<dyn EmbeddingService>,
}

#[async_trait]
impl JobHandler<EmbeddingJob> for EmbeddingHandler {
    fn name(&self) -> &'static str {
        "EmbeddingWorker"
    }

    async fn handle(&self, job: EmbeddingJob) -> Result<(), WorkerError> {
        let chunks = self
            .embeddings
            .index(&job.recipe_id, &job.owner_id, job.reindex)
            .await?;
        info!("indexed {chunks} chunks for recipe {}", job.recipe_id);
        Ok(())
    }
}
