use tracing::{debug, info, warn};

use crate::codec::Codec;
use crate::core::{
    BatchSummary, CancelFlag, CompressionJob, JobCategory, JobId, JobOutcome, JobReport, JobRequest,
};
use crate::messaging::MessageSender;
use crate::processing::JobExecutor;
use crate::utils::extract_filename;

/// Runs the items of a batch one after another on the calling thread.
pub struct BatchRunner<'a, C: Codec> {
    executor: &'a JobExecutor<C>,
    messages: &'a MessageSender,
}

impl<'a, C: Codec> BatchRunner<'a, C> {
    pub fn new(executor: &'a JobExecutor<C>, messages: &'a MessageSender) -> Self {
        Self { executor, messages }
    }

    /// Processes `requests` strictly in order.
    ///
    /// `cancel` is checked before each item; an item that has started always
    /// runs to completion. Items are validated here, so a bad path fails only
    /// its own item. `on_item` sees the running totals after every item.
    pub fn run(
        &self,
        batch_id: JobId,
        requests: Vec<JobRequest>,
        cancel: &CancelFlag,
        mut on_item: impl FnMut(&BatchSummary, &JobReport),
    ) -> BatchSummary {
        let settings = self.executor.settings();
        let mut summary = BatchSummary::new(batch_id, requests.len());
        info!("Processing batch {} of {} files", batch_id, summary.total);

        for request in requests {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                info!(
                    "Batch {} cancelled after {} of {} files",
                    batch_id, summary.finished_count(), summary.total
                );
                break;
            }

            let input = request.input.clone();
            let request = JobRequest { category: JobCategory::BatchItem, ..request };
            let (job_id, outcome) = match CompressionJob::from_request(request, settings) {
                Ok(job) => (job.id, self.executor.run(&job, None, self.messages)),
                Err(err) => (JobId::next(), JobOutcome::Failed(err.into())),
            };

            match &outcome {
                JobOutcome::Completed(output) => {
                    summary.processed_count += 1;
                    debug!("Batch item {} done: {} bytes", extract_filename(&input), output.output_size);
                }
                JobOutcome::Failed(err) => {
                    summary.failed_count += 1;
                    let name = extract_filename(&input);
                    warn!("Batch item {} failed: {}", name, err);
                    if summary.failed_sample.len() < settings.failure_sample_size {
                        summary.failed_sample.push(name);
                    } else {
                        summary.failed_remainder += 1;
                    }
                }
                JobOutcome::Cancelled => summary.cancelled = true,
            }

            let report = JobReport {
                job_id,
                category: JobCategory::BatchItem,
                input,
                outcome,
                stale: false,
            };
            on_item(&summary, &report);
            summary.reports.push(report);
            if summary.cancelled {
                break;
            }
        }

        if summary.failed_count > 0 {
            warn!("Batch {} finished: {}", batch_id, summary.summary_message());
        } else {
            info!("Batch {} finished: {}", batch_id, summary.summary_message());
        }
        summary
    }
}
