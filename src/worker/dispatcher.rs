//! Runs compression jobs off the caller's thread.
//!
//! Single and preview jobs are exclusive per category: submitting a new one
//! does not stop the job already running, but that job's report comes back
//! tagged `stale`. Batches run their items in order on one worker. Every
//! outcome is published through the message channel and the observable
//! store; callers also get it back through the [`JobHandle`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use parking_lot::Mutex;
use serde_json::json;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::codec::Codec;
use crate::core::{
    BatchSummary, CancelFlag, CompressionJob, CompressionSettings, JobCategory, JobId, JobOutcome,
    JobReport, JobRequest, ProgressType, ProgressUpdate,
};
use crate::messaging::MessageSender;
use crate::processing::{BatchRunner, JobExecutor};
use crate::state::ObservableStore;
use crate::utils::{CompressResult, ValidationError, extract_filename};
use crate::worker::JobHandle;

pub struct Dispatcher<C: Codec> {
    inner: Arc<Inner<C>>,
}

impl<C: Codec> Clone for Dispatcher<C> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

struct Inner<C: Codec> {
    executor: JobExecutor<C>,
    messages: MessageSender,
    store: ObservableStore,
    runtime: Handle,
    /// Latest submission per category, indexed by `category_slot`
    generations: [AtomicU64; 3],
    active: AtomicUsize,
    /// Serializes active-count changes with the matching `busy` write
    busy_lock: Mutex<()>,
}

fn category_slot(category: JobCategory) -> usize {
    match category {
        JobCategory::Single => 0,
        JobCategory::Preview => 1,
        JobCategory::BatchItem => 2,
    }
}

impl<C: Codec> Dispatcher<C> {
    /// Builds a dispatcher around its collaborators.
    ///
    /// Workers are spawned as blocking tasks on `runtime`.
    pub fn new(
        codec: Arc<C>,
        settings: CompressionSettings,
        messages: MessageSender,
        store: ObservableStore,
        runtime: Handle,
    ) -> Result<Self, ValidationError> {
        settings.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                executor: JobExecutor::new(codec, settings),
                messages,
                store,
                runtime,
                generations: Default::default(),
                active: AtomicUsize::new(0),
                busy_lock: Mutex::new(()),
            }),
        })
    }

    pub fn settings(&self) -> &CompressionSettings {
        self.inner.executor.settings()
    }

    /// Jobs and batches currently running.
    pub fn active_jobs(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Validates and starts a single or preview job.
    ///
    /// Validation errors come back here, before any worker is involved.
    pub fn submit(&self, request: JobRequest) -> CompressResult<JobHandle<JobReport>> {
        if request.category == JobCategory::BatchItem {
            return Err(ValidationError::job("Batch items must be submitted as part of a batch").into());
        }
        let job = CompressionJob::from_request(request, self.settings())?;

        let generation = self.inner.generations[category_slot(job.category)].fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancelFlag::new();
        let id = job.id;
        info!("Submitting {:?} job {} for {}", job.category, id, job.input.display());

        let active = ActiveGuard::enter(self.inner.clone());
        let flag = cancel.clone();
        let task = self.inner.runtime.spawn_blocking(move || {
            let active = active;
            active.inner.run_job(job, generation, &flag)
        });
        Ok(JobHandle::new(id, cancel, task))
    }

    /// Starts a batch. Items are validated one by one as they come up, so a
    /// bad item fails alone instead of rejecting the batch.
    pub fn submit_batch(&self, requests: Vec<JobRequest>) -> CompressResult<JobHandle<BatchSummary>> {
        if requests.is_empty() {
            return Err(ValidationError::job("Batch contains no files").into());
        }

        let batch_id = JobId::next();
        let cancel = CancelFlag::new();
        info!("Submitting batch {} with {} files", batch_id, requests.len());

        let active = ActiveGuard::enter(self.inner.clone());
        let flag = cancel.clone();
        let task = self.inner.runtime.spawn_blocking(move || {
            let active = active;
            active.inner.run_batch(batch_id, requests, &flag)
        });
        Ok(JobHandle::new(batch_id, cancel, task))
    }
}

/// Marks the dispatcher busy from submission until the worker is done.
struct ActiveGuard<C: Codec> {
    inner: Arc<Inner<C>>,
}

impl<C: Codec> ActiveGuard<C> {
    fn enter(inner: Arc<Inner<C>>) -> Self {
        {
            let _lock = inner.busy_lock.lock();
            if inner.active.fetch_add(1, Ordering::SeqCst) == 0 {
                inner.store.set_busy(true);
            }
        }
        Self { inner }
    }
}

impl<C: Codec> Drop for ActiveGuard<C> {
    fn drop(&mut self) {
        let _lock = self.inner.busy_lock.lock();
        if self.inner.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.store.set_busy(false);
        }
    }
}

impl<C: Codec> Inner<C> {
    fn is_current(&self, category: JobCategory, generation: u64) -> bool {
        self.generations[category_slot(category)].load(Ordering::SeqCst) == generation
    }

    fn run_job(&self, job: CompressionJob, generation: u64, cancel: &CancelFlag) -> JobReport {
        let name = extract_filename(&job.input);

        if job.category == JobCategory::Single {
            self.store.clear_error();
            self.store.reset_progress();
            self.store.set_status_message(format!("Compressing {name}"));
        }
        self.messages.progress(
            ProgressUpdate::new(ProgressType::Start, 0, 1, format!("Compressing {name}")).with_job(job.id),
        );

        let outcome = self.executor.run(&job, Some(cancel), &self.messages);
        let stale = !self.is_current(job.category, generation);
        let report = JobReport {
            job_id: job.id,
            category: job.category,
            input: job.input,
            outcome,
            stale,
        };
        self.publish(&report, &name);
        report
    }

    fn publish(&self, report: &JobReport, name: &str) {
        if report.stale {
            debug!("{} finished after a newer {:?} job was submitted", report.job_id, report.category);
            self.messages.log(format!("{name}: result superseded by a newer request"));
            self.messages.progress(
                ProgressUpdate::new(ProgressType::Complete, 1, 1, format!("{name} superseded"))
                    .with_job(report.job_id)
                    .with_metadata(json!({ "stale": true })),
            );
            return;
        }

        let preview = report.category == JobCategory::Preview;
        match &report.outcome {
            JobOutcome::Completed(output) => {
                let summary = format!(
                    "{name}: {} -> {} bytes ({:.1}% saved, quality {})",
                    output.original_size, output.output_size, output.compression_ratio, output.quality
                );
                info!("{}", summary);
                self.messages.log(summary);
                let metadata = serde_json::to_value(output).unwrap_or_default();
                self.messages.progress(
                    ProgressUpdate::new(ProgressType::Complete, 1, 1, format!("{name} done"))
                        .with_job(report.job_id)
                        .with_metadata(metadata),
                );
                if !preview {
                    self.store.set_progress(1.0);
                    self.store.set_status_message(format!("Compressed {name}"));
                }
            }
            JobOutcome::Failed(err) => {
                let text = format!("{name}: {err}");
                self.messages.log_error(text.clone());
                self.messages.progress(
                    ProgressUpdate::new(ProgressType::Error, 1, 1, format!("{name} failed"))
                        .with_job(report.job_id)
                        .with_error(err.to_string()),
                );
                if !preview {
                    self.messages.show_error("Compression failed", text.clone());
                    self.store.set_error_message(text);
                    self.store.set_status_message(format!("Failed to compress {name}"));
                }
            }
            JobOutcome::Cancelled => {
                self.messages.log(format!("{name}: cancelled"));
                self.messages.progress(
                    ProgressUpdate::new(ProgressType::Cancelled, 0, 1, format!("{name} cancelled"))
                        .with_job(report.job_id),
                );
                if !preview {
                    self.store.set_status_message("Cancelled");
                }
            }
        }
    }

    fn run_batch(&self, batch_id: JobId, requests: Vec<JobRequest>, cancel: &CancelFlag) -> BatchSummary {
        let total = requests.len();

        self.store.clear_error();
        self.store.reset_progress();
        self.store.set_status_message(format!("Compressing {total} files"));
        self.messages.progress(
            ProgressUpdate::new(ProgressType::Start, 0, total, format!("Compressing {total} files")).with_job(batch_id),
        );

        let runner = BatchRunner::new(&self.executor, &self.messages);
        let summary = runner.run(batch_id, requests, cancel, |totals, report| {
            let done = totals.finished_count();
            self.store.set_progress(done as f64 / total as f64);
            let name = extract_filename(&report.input);
            let mut update = ProgressUpdate::new(ProgressType::Progress, done, total, name).with_job(report.job_id);
            if let Some(err) = report.error() {
                update = update.with_error(err.to_string());
            }
            self.messages.progress(update);
        });

        let message = summary.summary_message();
        let progress_type = if summary.cancelled {
            ProgressType::Cancelled
        } else if summary.failed_count > 0 {
            ProgressType::Error
        } else {
            ProgressType::Complete
        };
        self.messages.progress(
            ProgressUpdate::new(progress_type, summary.finished_count(), total, message.clone())
                .with_job(batch_id)
                .with_metadata(json!({
                    "processed": summary.processed_count,
                    "failed": summary.failed_count,
                    "failedSample": summary.failed_sample,
                    "failedRemainder": summary.failed_remainder,
                })),
        );

        if summary.failed_count > 0 {
            warn!("{}", message);
            self.messages.show_error("Some files could not be compressed", message.clone());
            self.store.set_error_message(message.clone());
        } else {
            self.messages.log(message.clone());
        }
        self.store.set_status_message(message);
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::testing::{GatedCodec, ScriptedCodec};
    use crate::messaging::{Message, MessageChannel, MessageReceiver};
    use crate::utils::{CodecError, CompressError, PathError};
    use std::fs;
    use std::path::{Path, PathBuf};

    fn dispatcher<C: Codec>(codec: Arc<C>) -> (Dispatcher<C>, MessageReceiver, ObservableStore) {
        let (tx, rx) = MessageChannel::new();
        let store = ObservableStore::new();
        let dispatcher =
            Dispatcher::new(codec, CompressionSettings::default(), tx, store.clone(), Handle::current()).unwrap();
        (dispatcher, rx, store)
    }

    fn source(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"pixels").unwrap();
        path
    }

    #[tokio::test]
    async fn unbudgeted_single_job_calls_codec_once() {
        let dir = tempfile::tempdir().unwrap();
        let codec = Arc::new(ScriptedCodec::linear(1_000, 10));
        let (dispatcher, rx, store) = dispatcher(codec.clone());

        let handle = dispatcher
            .submit(JobRequest::new(source(dir.path(), "a.png")).output(dir.path().join("out/a.png")))
            .unwrap();
        let report = handle.wait().await.unwrap();

        assert!(report.is_success());
        assert!(!report.stale);
        assert_eq!(codec.calls(), 1);
        assert!(!store.is_busy());
        assert_eq!(store.progress(), 1.0);
        assert_eq!(store.error_message(), None);
        assert_eq!(dispatcher.active_jobs(), 0);

        let messages = rx.drain(usize::MAX);
        assert!(messages.iter().any(|m| matches!(m, Message::Progress(p) if p.progress_type == ProgressType::Complete)));
    }

    #[tokio::test]
    async fn older_job_of_same_category_is_tagged_stale() {
        let dir = tempfile::tempdir().unwrap();
        let codec = Arc::new(GatedCodec::new(ScriptedCodec::linear(0, 10)));
        let (dispatcher, _rx, store) = dispatcher(codec.clone());
        let input = source(dir.path(), "photo.jpg");

        let first = dispatcher.submit(JobRequest::new(&input).category(JobCategory::Preview)).unwrap();
        codec.wait_entered(1);
        let second = dispatcher.submit(JobRequest::new(&input).category(JobCategory::Preview)).unwrap();
        let single = dispatcher
            .submit(JobRequest::new(&input).output(dir.path().join("single.jpg")))
            .unwrap();
        codec.wait_entered(3);
        assert!(store.is_busy());
        codec.open();

        let first = first.wait().await.unwrap();
        let second = second.wait().await.unwrap();
        let single = single.wait().await.unwrap();
        assert!(first.stale);
        assert!(first.is_success());
        assert!(!second.stale);
        assert!(!single.stale);
        assert!(second.output().unwrap().encoded.is_some());
        assert!(!store.is_busy());
    }

    #[tokio::test]
    async fn stale_failure_leaves_the_store_alone() {
        let dir = tempfile::tempdir().unwrap();
        let codec = Arc::new(GatedCodec::new(ScriptedCodec::new(|q| {
            if q == 20 { Err(CodecError::encode("corrupt stream")) } else { Ok(1_000) }
        })));
        let (dispatcher, _rx, store) = dispatcher(codec.clone());
        let input = source(dir.path(), "photo.jpg");

        let older = dispatcher
            .submit(JobRequest::new(&input).output(dir.path().join("older.jpg")).quality(20))
            .unwrap();
        codec.wait_entered(1);
        let newer = dispatcher
            .submit(JobRequest::new(&input).output(dir.path().join("newer.jpg")).quality(80))
            .unwrap();
        codec.wait_entered(2);
        codec.open();

        let older = older.wait().await.unwrap();
        let newer = newer.wait().await.unwrap();
        assert!(older.stale);
        assert!(older.is_failure());
        assert!(newer.is_success());
        assert_eq!(store.error_message(), None);
        assert_eq!(store.status_message(), "Compressed photo.jpg");
    }

    #[tokio::test]
    async fn busy_is_set_as_soon_as_submit_returns() {
        let dir = tempfile::tempdir().unwrap();
        let codec = Arc::new(GatedCodec::new(ScriptedCodec::linear(0, 10)));
        let (dispatcher, _rx, store) = dispatcher(codec.clone());

        let handle = dispatcher
            .submit(JobRequest::new(source(dir.path(), "a.jpg")).output(dir.path().join("out/a.jpg")))
            .unwrap();
        assert!(store.is_busy());
        assert_eq!(dispatcher.active_jobs(), 1);

        codec.open();
        handle.wait().await.unwrap();
        assert!(!store.is_busy());
        assert_eq!(dispatcher.active_jobs(), 0);
    }

    #[tokio::test]
    async fn cancelled_batch_stops_before_the_next_item() {
        let dir = tempfile::tempdir().unwrap();
        let codec = Arc::new(GatedCodec::new(ScriptedCodec::linear(0, 10)));
        let (dispatcher, _rx, store) = dispatcher(codec.clone());
        let requests = ["1.jpg", "2.jpg", "3.jpg"]
            .iter()
            .map(|name| JobRequest::new(source(dir.path(), name)).output(dir.path().join("out").join(name)))
            .collect();

        let handle = dispatcher.submit_batch(requests).unwrap();
        codec.wait_entered(1);
        handle.cancel();
        codec.open();

        let summary = handle.wait().await.unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.processed_count, 1);
        assert_eq!(summary.failed_count, 0);
        assert_eq!(summary.reports.len(), 1);
        assert_eq!(codec.calls(), 1);
        assert!(store.status_message().starts_with("Cancelled after 1 of 3"));
    }

    #[tokio::test]
    async fn batch_failures_reach_the_store_and_channel() {
        let dir = tempfile::tempdir().unwrap();
        let (dispatcher, rx, store) = dispatcher(Arc::new(ScriptedCodec::linear(0, 10)));
        let requests = vec![
            JobRequest::new(source(dir.path(), "ok.jpg")).output(dir.path().join("out/ok.jpg")),
            JobRequest::new(dir.path().join("gone.jpg")).output(dir.path().join("out/gone.jpg")),
        ];

        let summary = dispatcher.submit_batch(requests).unwrap().wait().await.unwrap();
        assert_eq!((summary.processed_count, summary.failed_count), (1, 1));
        assert_eq!(store.progress(), 1.0);
        assert_eq!(store.error_message().as_deref(), Some("1 files processed, 1 failed; failing: gone.jpg"));

        let messages = rx.drain(usize::MAX);
        let items = messages
            .iter()
            .filter(|m| matches!(m, Message::Progress(p) if p.progress_type == ProgressType::Progress))
            .count();
        assert_eq!(items, 2);
        assert!(messages.iter().any(|m| matches!(m, Message::ShowError { .. })));
    }

    #[tokio::test]
    async fn invalid_submissions_are_rejected_synchronously() {
        let dir = tempfile::tempdir().unwrap();
        let codec = Arc::new(ScriptedCodec::linear(0, 10));
        let (dispatcher, _rx, _store) = dispatcher(codec.clone());

        let missing = dispatcher.submit(JobRequest::new(dir.path().join("nope.jpg")).output(dir.path().join("o.jpg")));
        assert!(matches!(missing, Err(CompressError::Validation(_))));

        let no_output = dispatcher.submit(JobRequest::new(source(dir.path(), "a.jpg")));
        assert!(matches!(no_output, Err(CompressError::Validation(_))));

        let item = dispatcher.submit(JobRequest::new(source(dir.path(), "b.jpg")).category(JobCategory::BatchItem));
        assert!(matches!(item, Err(CompressError::Validation(_))));

        let input = source(dir.path(), "c.jpg");
        let taken = source(dir.path(), "taken.jpg");
        let exists = dispatcher.submit(JobRequest::new(&input).output(&taken).target_bytes(500));
        assert!(matches!(
            exists,
            Err(CompressError::Validation(ValidationError::Path(PathError::AlreadyExists(ref p)))) if *p == taken
        ));

        assert!(matches!(dispatcher.submit_batch(Vec::new()), Err(CompressError::Validation(_))));
        assert_eq!(codec.calls(), 0);
        assert_eq!(dispatcher.active_jobs(), 0);
    }

    #[tokio::test]
    async fn invalid_settings_refuse_construction() {
        let (tx, _rx) = MessageChannel::new();
        let settings = CompressionSettings { quality_min: 90, quality_max: 10, ..Default::default() };
        let result = Dispatcher::new(
            Arc::new(ScriptedCodec::linear(0, 1)),
            settings,
            tx,
            ObservableStore::new(),
            Handle::current(),
        );
        assert!(result.is_err());
    }
}
