use anyhow::Result;
use extract::Pipeline;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::job::{JobOutcome, JobStatus, WorkItem};
use crate::metrics::WorkerMetrics;
use crate::queue::{Delivery, JobQueue};

/// What happened to a single delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Malformed payload; rejected without requeue and no outcome published.
    Rejected,
    Completed,
    Failed,
}

/// Consumes work items one at a time and publishes one outcome per valid item.
pub struct JobProcessor<Q> {
    pipeline: Pipeline,
    queue: Q,
    metrics: Arc<WorkerMetrics>,
}

impl<Q: JobQueue> JobProcessor<Q> {
    pub fn new(pipeline: Pipeline, queue: Q) -> Self {
        Self {
            pipeline,
            queue,
            metrics: WorkerMetrics::new(),
        }
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    pub fn metrics(&self) -> Arc<WorkerMetrics> {
        self.metrics.clone()
    }

    /// Handles deliveries until the queue is exhausted. Returns how many were taken.
    pub async fn run(&self) -> Result<usize> {
        let mut handled = 0;
        while let Some(delivery) = self.queue.next_delivery().await? {
            self.handle(delivery).await?;
            handled += 1;
        }
        Ok(handled)
    }

    pub async fn handle(&self, delivery: Delivery) -> Result<Disposition> {
        self.metrics.record_received();

        let item = match WorkItem::parse(&delivery.payload) {
            Ok(item) => item,
            Err(e) => {
                error!(tag = delivery.tag, error = %e, "Rejecting delivery");
                self.metrics.record_rejected();
                self.queue.reject(delivery.tag).await?;
                return Ok(Disposition::Rejected);
            }
        };

        info!(job_id = %item.job_id, status = ?JobStatus::Received, "Job received");
        let start = Instant::now();
        info!(
            job_id = %item.job_id,
            status = ?JobStatus::Processing,
            chars = item.scene_text.chars().count(),
            "Processing scene"
        );

        let (outcome, disposition) = match self.pipeline.process_scene(&item.scene_text).await {
            Ok(result) => {
                let elapsed = start.elapsed();
                self.metrics.record_completed(
                    elapsed,
                    result.metadata.final_entity_count,
                    result.metadata.relationship_count,
                );
                info!(
                    job_id = %item.job_id,
                    status = ?JobStatus::Completed,
                    entities = result.metadata.final_entity_count,
                    relationships = result.metadata.relationship_count,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Job completed"
                );
                (
                    JobOutcome::completed(item.job_id.clone(), result, elapsed),
                    Disposition::Completed,
                )
            }
            Err(e) => {
                let elapsed = start.elapsed();
                self.metrics.record_failed(elapsed);
                error!(job_id = %item.job_id, status = ?JobStatus::Failed, error = %e, "Job failed");
                (
                    JobOutcome::failed(item.job_id.clone(), e.to_string(), elapsed),
                    Disposition::Failed,
                )
            }
        };

        // The delivery is acknowledged even when the outcome is lost.
        if let Err(e) = self.queue.publish(&outcome).await {
            self.metrics.record_publish_failure();
            warn!(job_id = %item.job_id, error = %e, "Failed to publish outcome");
        }
        self.queue.ack(delivery.tag).await?;

        Ok(disposition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{JsonLinesQueue, MemoryQueue};
    use extract::testing::{ScriptedCompletion, ScriptedRecognizer, span};
    use extract::{Capabilities, PipelineConfig};

    fn pipeline(recognizer: ScriptedRecognizer) -> Pipeline {
        let completion = ScriptedCompletion::new()
            .when("Entity A:", r#"{"reasoning": "none", "relationships": []}"#)
            .otherwise(r#"{"description": "A detective.", "role": "protagonist"}"#);
        let capabilities = Capabilities::new(recognizer, completion);
        Pipeline::new(&capabilities, PipelineConfig::default())
    }

    fn processor(recognizer: ScriptedRecognizer) -> JobProcessor<MemoryQueue> {
        JobProcessor::new(pipeline(recognizer), MemoryQueue::new())
    }

    #[tokio::test]
    async fn test_malformed_payload_rejected_without_outcome() {
        let processor = processor(ScriptedRecognizer::new(vec![]));
        let tag = processor.queue().push(r#"{"job_id": "j1"}"#).await;

        let delivery = processor.queue().next_delivery().await.unwrap().unwrap();
        let disposition = processor.handle(delivery).await.unwrap();

        assert_eq!(disposition, Disposition::Rejected);
        assert_eq!(processor.queue().rejected().await, vec![tag]);
        assert!(processor.queue().acked().await.is_empty());
        assert!(processor.queue().published().await.is_empty());
        assert_eq!(processor.metrics().snapshot().rejected, 1);
    }

    #[tokio::test]
    async fn test_successful_job_published_and_acked() {
        let processor = processor(ScriptedRecognizer::new(vec![span("Marcus Chen", "PERSON")]));
        let tag = processor
            .queue()
            .push(r#"{"job_id": "j1", "scene_text": "Marcus Chen waited."}"#)
            .await;

        let delivery = processor.queue().next_delivery().await.unwrap().unwrap();
        assert_eq!(processor.handle(delivery).await.unwrap(), Disposition::Completed);

        let published = processor.queue().published().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0]["job_id"], "j1");
        assert_eq!(published[0]["status"], "completed");
        assert!(published[0]["error"].is_null());
        assert_eq!(published[0]["result"]["entities"][0]["name"], "Marcus Chen");
        assert_eq!(
            published[0]["result"]["entities"][0]["attributes"]["role"],
            "protagonist"
        );
        assert!(published[0]["processing_time"].as_str().unwrap().ends_with('s'));
        assert_eq!(processor.queue().acked().await, vec![tag]);
    }

    #[tokio::test]
    async fn test_recognition_failure_publishes_failed_outcome() {
        let processor = processor(ScriptedRecognizer::failing("ner service down"));
        let tag = processor
            .queue()
            .push(r#"{"job_id": "j2", "scene_text": "Anything."}"#)
            .await;

        let delivery = processor.queue().next_delivery().await.unwrap().unwrap();
        assert_eq!(processor.handle(delivery).await.unwrap(), Disposition::Failed);

        let published = processor.queue().published().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0]["status"], "failed");
        assert!(published[0]["result"].is_null());
        assert!(published[0]["error"].as_str().unwrap().contains("ner service down"));
        assert_eq!(processor.queue().acked().await, vec![tag]);
        assert!(processor.queue().rejected().await.is_empty());
    }

    #[tokio::test]
    async fn test_publish_failure_still_acks() {
        let processor = processor(ScriptedRecognizer::new(vec![]));
        processor.queue().fail_publishes(true);
        let tag = processor
            .queue()
            .push(r#"{"job_id": "j3", "scene_text": ""}"#)
            .await;

        let delivery = processor.queue().next_delivery().await.unwrap().unwrap();
        assert_eq!(processor.handle(delivery).await.unwrap(), Disposition::Completed);

        assert_eq!(processor.queue().acked().await, vec![tag]);
        assert_eq!(processor.metrics().snapshot().publish_failures, 1);
    }

    #[tokio::test]
    async fn test_run_drains_queue_in_order() {
        let processor = processor(ScriptedRecognizer::new(vec![]));
        let first = processor
            .queue()
            .push(r#"{"job_id": "a", "scene_text": "one"}"#)
            .await;
        let bad = processor.queue().push("not json").await;
        let third = processor
            .queue()
            .push(r#"{"job_id": "c", "scene_text": "three", "user_id": "u1"}"#)
            .await;

        assert_eq!(processor.run().await.unwrap(), 3);

        let ids: Vec<_> = processor
            .queue()
            .published()
            .await
            .iter()
            .map(|outcome| outcome["job_id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(processor.queue().acked().await, vec![first, third]);
        assert_eq!(processor.queue().rejected().await, vec![bad]);

        let snapshot = processor.metrics().snapshot();
        assert_eq!((snapshot.received, snapshot.completed, snapshot.rejected), (3, 2, 1));
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_rejected_and_next_job_runs() {
        let input: &[u8] = b"\xff\xfe not utf8\n{\"job_id\": \"j4\", \"scene_text\": \"Marcus Chen waited.\"}\n";
        let queue = JsonLinesQueue::new("in", "out", input, Vec::new());
        let processor = JobProcessor::new(
            pipeline(ScriptedRecognizer::new(vec![span("Marcus Chen", "PERSON")])),
            queue,
        );

        assert_eq!(processor.run().await.unwrap(), 2);

        let snapshot = processor.metrics().snapshot();
        assert_eq!(snapshot.received, 2);
        assert_eq!(snapshot.rejected, 1);
        assert_eq!(snapshot.completed, 1);
        assert_eq!(snapshot.failed, 0);
    }
}
