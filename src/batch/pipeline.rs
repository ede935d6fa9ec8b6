//! Sequential, failure-tolerant batch rendering
//!
//! The pipeline owns the task queue. `run` walks it in FIFO order, one render
//! at a time on the blocking pool, and publishes a fresh [`BatchSnapshot`]
//! after every state transition. A failing image only fails its own task.
//! A render that outlives the item timeout is awaited before the next one
//! starts, so the blocking pool never holds more than one batch render.

use super::config::PipelineConfig;
use super::stats::BatchStats;
use super::task::{ImageSource, ProcessedImage, Task, TaskId, TaskStatus, TaskSummary};
use super::writer::Writer;
use crate::handles::HandleRegistry;
use crate::watermark::{
    RasterProvider, RenderError, RenderedImage, SurfaceProvider, WatermarkRenderer, WatermarkSpec,
};
use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type RenderJob = JoinHandle<Result<RenderedImage, RenderError>>;

/// Whole-value view of the queue, replaced on every transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSnapshot {
    pub stats: BatchStats,
    pub tasks: Arc<[TaskSummary]>,
}

impl Default for BatchSnapshot {
    fn default() -> Self {
        Self {
            stats: BatchStats::default(),
            tasks: Arc::from(Vec::new()),
        }
    }
}

/// `{name, status, output}` tuple for one task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutput {
    pub name: String,
    pub status: TaskStatus,
    pub output: Option<Bytes>,
}

/// Completed output under its aggregate name (`marked_<name>`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedOutput {
    pub name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

/// Result of one `run`
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub stats: BatchStats,
    pub outputs: Vec<TaskOutput>,
    pub elapsed: Duration,
}

/// Batch of images rendered with the current watermark spec.
pub struct BatchPipeline<P: SurfaceProvider = RasterProvider> {
    renderer: Arc<WatermarkRenderer<P>>,
    registry: HandleRegistry,
    spec: watch::Receiver<Arc<WatermarkSpec>>,
    config: PipelineConfig,
    writer: Option<Arc<dyn Writer>>,
    tasks: Vec<Task>,
    next_id: u64,
    snapshots: watch::Sender<BatchSnapshot>,
    // Timed-out render still running on the blocking pool
    straggler: Option<RenderJob>,
}

impl<P: SurfaceProvider> BatchPipeline<P> {
    pub fn new(
        renderer: Arc<WatermarkRenderer<P>>,
        registry: HandleRegistry,
        spec: watch::Receiver<Arc<WatermarkSpec>>,
        config: PipelineConfig,
    ) -> Self {
        let (snapshots, _receiver) = watch::channel(BatchSnapshot::default());
        Self {
            renderer,
            registry,
            spec,
            config,
            writer: None,
            tasks: Vec::new(),
            next_id: 0,
            snapshots,
            straggler: None,
        }
    }

    /// Write every completed output through `writer` during `run`.
    pub fn with_writer(mut self, writer: Arc<dyn Writer>) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn set_writer(&mut self, writer: Option<Arc<dyn Writer>>) {
        self.writer = writer;
    }

    pub fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Queue sources as Pending tasks. Non-image MIME types are skipped.
    pub fn enqueue(&mut self, sources: impl IntoIterator<Item = ImageSource>) -> Vec<TaskId> {
        let mut ids = Vec::new();
        for source in sources {
            if !source.is_image() {
                warn!(
                    name = %source.name,
                    mime_type = %source.mime_type,
                    "skipping non-image source"
                );
                continue;
            }

            self.next_id += 1;
            let id = TaskId(self.next_id);
            debug!(task_id = %id, name = %source.name, bytes = source.bytes.len(), "task queued");
            self.tasks.push(Task::new(id, source, &self.registry));
            ids.push(id);
        }

        self.publish();
        ids
    }

    /// Render every task with the current spec.
    ///
    /// All tasks are reset to Pending first, so a re-run recomputes every
    /// output. The spec is read again before each task; edits made while a
    /// run is in progress apply to the tasks that have not started yet.
    pub async fn run(&mut self) -> BatchReport {
        let started = Instant::now();
        for task in &mut self.tasks {
            task.reset();
        }
        self.publish();
        info!(total = self.tasks.len(), "batch run started");

        for index in 0..self.tasks.len() {
            self.process(index).await;
        }
        self.settle_straggler().await;

        let report = BatchReport {
            stats: self.stats(),
            outputs: self.outputs(),
            elapsed: started.elapsed(),
        };
        info!(
            total = report.stats.total,
            completed = report.stats.completed,
            failed = report.stats.failed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "batch run finished"
        );
        report
    }

    async fn process(&mut self, index: usize) {
        let (id, name, source, mime_type) = {
            let task = &mut self.tasks[index];
            task.start();
            (
                task.id(),
                task.name().to_string(),
                task.source().clone(),
                task.mime_type().to_string(),
            )
        };
        self.publish();

        self.settle_straggler().await;
        let spec = Arc::clone(&self.spec.borrow());
        let started = Instant::now();
        let result = self.render(source, mime_type, spec).await;

        match result {
            Ok(rendered) => {
                debug!(
                    task_id = %id,
                    name = %name,
                    bytes = rendered.data.len(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    "task completed"
                );
                let output = ProcessedImage::from(rendered);
                let bytes = output.bytes.clone();
                self.tasks[index].complete(output);
                self.publish();
                self.write_back(index, &name, &bytes).await;
            }
            Err(error) => {
                warn!(
                    task_id = %id,
                    name = %name,
                    kind = error.kind(),
                    error = %error,
                    "task failed"
                );
                self.tasks[index].fail(error);
            }
        }
        self.publish();
    }

    async fn render(
        &mut self,
        source: Bytes,
        mime_type: String,
        spec: Arc<WatermarkSpec>,
    ) -> Result<RenderedImage, RenderError> {
        let renderer = Arc::clone(&self.renderer);
        let mut job: RenderJob =
            tokio::task::spawn_blocking(move || renderer.render(&source, &mime_type, &spec));

        let joined = match self.config.item_timeout() {
            Some(timeout) => match tokio::time::timeout(timeout, &mut job).await {
                Ok(joined) => joined,
                // The blocking render cannot be interrupted; keep it so the
                // next task waits for it
                Err(_) => {
                    self.straggler = Some(job);
                    return Err(RenderError::Timeout {
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
            },
            None => job.await,
        };

        joined.map_err(|e| RenderError::surface_unavailable(format!("render worker failed: {}", e)))?
    }

    /// Wait for a timed-out render to finish and drop its result.
    async fn settle_straggler(&mut self) {
        if let Some(job) = self.straggler.take() {
            let started = Instant::now();
            let outcome = job.await;
            debug!(
                waited_ms = started.elapsed().as_millis() as u64,
                finished = matches!(outcome, Ok(Ok(_))),
                "timed-out render settled"
            );
        }
    }

    async fn write_back(&mut self, index: usize, name: &str, bytes: &[u8]) {
        let Some(writer) = self.writer.clone() else {
            return;
        };

        let output_name = self.config.output_name(name);
        if let Err(e) = writer.write(&output_name, bytes).await {
            warn!(
                task_id = %self.tasks[index].id(),
                name = %output_name,
                error = %e,
                "write-back failed"
            );
            self.tasks[index].set_write_error(e.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn tasks(&self) -> Vec<TaskSummary> {
        self.tasks.iter().map(Task::summary).collect()
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id() == id)
    }

    /// First task in the queue, the one a preview shows by default
    pub fn focused(&self) -> Option<&Task> {
        self.tasks.first()
    }

    pub fn stats(&self) -> BatchStats {
        BatchStats::from_statuses(self.tasks.iter().map(Task::status))
    }

    pub fn snapshot(&self) -> BatchSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BatchSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn outputs(&self) -> Vec<TaskOutput> {
        self.tasks
            .iter()
            .map(|task| TaskOutput {
                name: task.name().to_string(),
                status: task.status(),
                output: task.output().map(|output| output.bytes.clone()),
            })
            .collect()
    }

    /// Completed outputs under their aggregate names, in queue order
    pub fn completed_outputs(&self) -> Vec<NamedOutput> {
        self.tasks
            .iter()
            .filter_map(|task| {
                task.output().map(|output| NamedOutput {
                    name: self.config.output_name(task.name()),
                    mime_type: output.mime_type.clone(),
                    bytes: output.bytes.clone(),
                })
            })
            .collect()
    }

    /// Drop every task and release its display handle.
    pub fn clear_all(&mut self) {
        let count = self.tasks.len();
        for task in self.tasks.drain(..) {
            task.release();
        }
        info!(cleared = count, "queue cleared");
        self.publish();
    }

    fn publish(&self) {
        let tasks: Arc<[TaskSummary]> = self.tasks.iter().map(Task::summary).collect();
        self.snapshots.send_replace(BatchSnapshot {
            stats: self.stats(),
            tasks,
        });
    }
}
