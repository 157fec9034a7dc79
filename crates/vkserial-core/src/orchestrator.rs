//! Sequential download queue
//!
//! Tasks run one after another. Each task either starts a fresh transfer
//! or resumes one whose marker is still on disk. A failing task is logged
//! and recorded in the [`RunReport`]; the queue always runs to the end.

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::transfer::{TransferEngine, TransferEvent, TransferRequest};
use crate::types::{DownloadTask, RunReport};

/// Tuning for the download queue
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Byte ranges fetched concurrently per file (default: 4)
    pub chunk_count: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { chunk_count: 4 }
    }
}

/// Receives transfer events for display
///
/// `label` is the file name of the task the event belongs to.
pub trait ProgressSink {
    fn on_event(&self, label: &str, event: &TransferEvent);
}

/// Reports start and end of each transfer through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_event(&self, label: &str, event: &TransferEvent) {
        match event {
            TransferEvent::Started {
                total,
                resumed_bytes,
            } => match total {
                Some(total) => info!(
                    "Downloading {} ({} of {} bytes present)",
                    label, resumed_bytes, total
                ),
                None => info!("Downloading {} (size unknown)", label),
            },
            TransferEvent::Progress { .. } => {}
            TransferEvent::Finished { bytes } => info!("Finished {} ({} bytes)", label, bytes),
            TransferEvent::Failed { message } => warn!("Transfer of {} failed: {}", label, message),
        }
    }
}

/// Runs download tasks in order through a [`TransferEngine`]
pub struct DownloadOrchestrator<E> {
    engine: E,
    sink: Box<dyn ProgressSink + Send + Sync>,
    config: OrchestratorConfig,
}

impl<E: TransferEngine> DownloadOrchestrator<E> {
    /// Create an orchestrator that logs progress
    pub fn new(engine: E) -> Self {
        Self::with_config(engine, OrchestratorConfig::default())
    }

    pub fn with_config(engine: E, config: OrchestratorConfig) -> Self {
        Self {
            engine,
            sink: Box::new(LogProgress),
            config,
        }
    }

    /// Replace the progress sink
    pub fn with_sink(mut self, sink: impl ProgressSink + Send + Sync + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Process `tasks` strictly in order
    ///
    /// Never fails as a whole: unresolved tasks are skipped, failed ones are
    /// reported, and the next task starts only after the current one ends.
    pub async fn run(&self, tasks: &[DownloadTask]) -> RunReport {
        let mut report = RunReport::default();

        for task in tasks {
            let Some(url) = task.url.as_deref() else {
                warn!(
                    "Unable to resolve video url for Episode {:02}. Skipping \"{}\"",
                    task.episode_number, task.file_name
                );
                report.skipped.push(task.episode_number);
                continue;
            };

            match self.download(task, url).await {
                Ok(()) => report.downloaded.push(task.episode_number),
                Err(message) => {
                    error!(
                        "Failed to download Episode {:02} ({}): {}",
                        task.episode_number, task.file_name, message
                    );
                    report.failed.push((task.episode_number, message));
                }
            }
        }

        info!(
            "Queue finished: {} downloaded, {} skipped, {} failed",
            report.downloaded.len(),
            report.skipped.len(),
            report.failed.len()
        );
        report
    }

    async fn download(&self, task: &DownloadTask, url: &str) -> Result<(), String> {
        tokio::fs::create_dir_all(task.directory())
            .await
            .map_err(|e| format!("cannot create {}: {}", task.directory().display(), e))?;

        let request = TransferRequest {
            url: url.to_string(),
            target: task.target_path(),
            chunk_count: self.config.chunk_count.max(1),
        };
        let marker = self.engine.marker_path(&request.target);
        let resume = tokio::fs::try_exists(&marker).await.unwrap_or(false);
        if resume {
            info!("Resuming {}", task.file_name);
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let engine = &self.engine;
        let request = &request;

        // The sender is moved in and dropped when the transfer ends, which
        // closes the channel and ends the forwarding loop.
        let transfer = async move {
            if resume {
                engine.resume(request, &tx).await
            } else {
                engine.start(request, &tx).await
            }
        };
        let forward = async {
            while let Some(event) = rx.recv().await {
                self.sink.on_event(&task.file_name, &event);
            }
        };

        let (result, ()) = tokio::join!(transfer, forward);
        result.map(|_| ()).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, SeriesError};
    use crate::transfer::{EventSender, TransferStats};
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records calls and writes a small file instead of fetching
    #[derive(Default)]
    struct SpyEngine {
        calls: Mutex<Vec<(&'static str, String)>>,
        fail_for: Option<String>,
    }

    impl SpyEngine {
        fn calls(&self) -> Vec<(&'static str, String)> {
            self.calls.lock().unwrap().clone()
        }

        async fn transfer(
            &self,
            kind: &'static str,
            request: &TransferRequest,
            events: &EventSender,
        ) -> Result<TransferStats> {
            self.calls.lock().unwrap().push((kind, request.url.clone()));
            if self.fail_for.as_deref() == Some(request.url.as_str()) {
                return Err(SeriesError::Transfer("boom".to_string()));
            }
            events
                .send(TransferEvent::Finished { bytes: 3 })
                .unwrap();
            tokio::fs::write(&request.target, b"mp4").await?;
            Ok(TransferStats {
                bytes: 3,
                resumed: kind == "resume",
            })
        }
    }

    impl TransferEngine for SpyEngine {
        async fn start(&self, request: &TransferRequest, events: &EventSender) -> Result<TransferStats> {
            self.transfer("start", request, events).await
        }

        async fn resume(&self, request: &TransferRequest, events: &EventSender) -> Result<TransferStats> {
            self.transfer("resume", request, events).await
        }
    }

    #[derive(Default)]
    struct CountingSink(Mutex<Vec<String>>);

    impl ProgressSink for std::sync::Arc<CountingSink> {
        fn on_event(&self, label: &str, _event: &TransferEvent) {
            self.0.lock().unwrap().push(label.to_string());
        }
    }

    fn task(dir: &TempDir, episode: u32, url: Option<&str>) -> DownloadTask {
        DownloadTask {
            episode_number: episode,
            url: url.map(str::to_string),
            file_name: format!("Demo - s01e{:02}.mp4", episode),
            target_directory: dir.path().join("Demo").join("Season 01"),
        }
    }

    #[tokio::test]
    async fn test_skips_unresolved_without_touching_disk() {
        let dir = TempDir::new().unwrap();
        let orchestrator = DownloadOrchestrator::new(SpyEngine::default());

        let report = orchestrator.run(&[task(&dir, 1, None)]).await;

        assert_eq!(report.skipped, vec![1]);
        assert!(report.downloaded.is_empty());
        assert!(orchestrator.engine().calls().is_empty());
        assert!(!dir.path().join("Demo").exists());
    }

    #[tokio::test]
    async fn test_runs_in_order_and_creates_directories() {
        let dir = TempDir::new().unwrap();
        let orchestrator = DownloadOrchestrator::new(SpyEngine::default());
        let tasks = vec![
            task(&dir, 1, Some("https://cdn/1")),
            task(&dir, 2, None),
            task(&dir, 3, Some("https://cdn/3")),
        ];

        let report = orchestrator.run(&tasks).await;

        assert_eq!(report.downloaded, vec![1, 3]);
        assert_eq!(report.skipped, vec![2]);
        assert!(report.is_complete());
        assert_eq!(
            orchestrator.engine().calls(),
            vec![
                ("start", "https://cdn/1".to_string()),
                ("start", "https://cdn/3".to_string()),
            ]
        );
        assert!(tasks[0].target_path().exists());
        assert!(tasks[2].target_path().exists());
    }

    #[tokio::test]
    async fn test_marker_selects_resume() {
        let dir = TempDir::new().unwrap();
        let orchestrator = DownloadOrchestrator::new(SpyEngine::default());
        let resumable = task(&dir, 4, Some("https://cdn/4"));
        std::fs::create_dir_all(resumable.directory()).unwrap();
        let marker: PathBuf = orchestrator.engine().marker_path(&resumable.target_path());
        std::fs::write(&marker, "{}").unwrap();

        orchestrator
            .run(&[resumable, task(&dir, 5, Some("https://cdn/5"))])
            .await;

        assert_eq!(
            orchestrator.engine().calls(),
            vec![
                ("resume", "https://cdn/4".to_string()),
                ("start", "https://cdn/5".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_queue() {
        let dir = TempDir::new().unwrap();
        let engine = SpyEngine {
            fail_for: Some("https://cdn/1".to_string()),
            ..SpyEngine::default()
        };
        let orchestrator = DownloadOrchestrator::new(engine);

        let report = orchestrator
            .run(&[
                task(&dir, 1, Some("https://cdn/1")),
                task(&dir, 2, Some("https://cdn/2")),
            ])
            .await;

        assert_eq!(report.downloaded, vec![2]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, 1);
        assert!(report.failed[0].1.contains("boom"));
    }

    #[tokio::test]
    async fn test_events_reach_sink() {
        let dir = TempDir::new().unwrap();
        let sink = std::sync::Arc::new(CountingSink::default());
        let orchestrator = DownloadOrchestrator::new(SpyEngine::default()).with_sink(sink.clone());

        orchestrator.run(&[task(&dir, 7, Some("https://cdn/7"))]).await;

        assert_eq!(*sink.0.lock().unwrap(), vec!["Demo - s01e07.mp4".to_string()]);
    }
}
