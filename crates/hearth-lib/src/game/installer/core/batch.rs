use crate::error::DownloadError;
use crate::game::installer::core::downloader::{
    build_client, download_to_path, DownloaderOptions, Expectation,
};
use crate::game::installer::core::mirror::{candidate_urls, rank_mirrors, Mirror};
use crate::game::installer::types::{CancelToken, ProgressReporter, SilentProgressReporter};
use crate::utils::hash::file_matches;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One artifact to fetch. Mirror URLs are derived from `url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub name: String,
    /// Origin URL
    pub url: String,
    pub path: PathBuf,
    pub sha1: Option<String>,
    pub size: Option<u64>,
}

impl DownloadTask {
    pub fn new(name: impl Into<String>, url: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            path: path.into(),
            sha1: None,
            size: None,
        }
    }

    pub fn with_sha1(mut self, sha1: impl Into<String>) -> Self {
        self.sha1 = Some(sha1.into());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}

#[derive(Debug)]
pub enum TaskOutcome {
    /// Fetched and verified; `source` is the URL that served it
    Completed { source: String },
    /// Already present and valid on disk
    Skipped,
    Failed(DownloadError),
    Cancelled,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Completed { .. } | TaskOutcome::Skipped)
    }
}

#[derive(Debug)]
pub struct TaskReport {
    pub task: DownloadTask,
    pub outcome: TaskOutcome,
}

/// Per-task results of a batch, in completion order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub tasks: Vec<TaskReport>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.tasks.iter().all(|t| t.outcome.is_success())
    }

    /// Tasks that still need attention
    pub fn failed(&self) -> impl Iterator<Item = &TaskReport> {
        self.tasks.iter().filter(|t| !t.outcome.is_success())
    }

    pub fn completed_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.outcome.is_success()).count()
    }
}

pub struct BatchDownloader {
    client: Client,
    options: DownloaderOptions,
    mirrors: Vec<Mirror>,
    reporter: Arc<dyn ProgressReporter>,
}

impl BatchDownloader {
    pub fn new(options: DownloaderOptions, mirrors: Vec<Mirror>) -> Result<Self, DownloadError> {
        let client = build_client(&options)?;
        Ok(Self::with_client(client, options, mirrors))
    }

    pub fn with_client(client: Client, options: DownloaderOptions, mirrors: Vec<Mirror>) -> Self {
        Self {
            client,
            options,
            mirrors,
            reporter: Arc::new(SilentProgressReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub async fn download_all(&self, tasks: Vec<DownloadTask>, cancel: &CancelToken) -> BatchReport {
        // Deduplicate tasks by path to avoid concurrent writes to the same file
        let mut unique_tasks = Vec::new();
        let mut seen_paths = std::collections::HashSet::new();
        for task in tasks {
            if seen_paths.insert(task.path.clone()) {
                unique_tasks.push(task);
            }
        }

        let total = unique_tasks.len();
        if total == 0 {
            return BatchReport::default();
        }

        let mirrors = Arc::new(rank_mirrors(&self.mirrors, self.options.mirror_selection).await);
        log::info!(
            "Downloading {} artifacts with {} workers across {} mirror(s)",
            total,
            self.options.concurrency,
            mirrors.len()
        );

        let finished = Arc::new(AtomicUsize::new(0));
        self.reporter.tasks(0, total);

        let reports = stream::iter(unique_tasks)
            .map(|task| {
                let mirrors = mirrors.clone();
                let finished = finished.clone();
                async move {
                    let outcome = self.download_one(&task, &mirrors, cancel).await;
                    let count = finished.fetch_add(1, Ordering::SeqCst) + 1;
                    self.reporter.tasks(count, total);
                    if count % 10 == 0 || count == total {
                        log::info!("Batch download progress: {}/{}", count, total);
                    }
                    TaskReport { task, outcome }
                }
            })
            .buffer_unordered(self.options.concurrency.max(1))
            .collect::<Vec<_>>()
            .await;

        BatchReport { tasks: reports }
    }

    async fn download_one(&self, task: &DownloadTask, mirrors: &[Mirror], cancel: &CancelToken) -> TaskOutcome {
        if cancel.is_cancelled() {
            return TaskOutcome::Cancelled;
        }

        let expected_sha1 = if self.options.check_hash {
            task.sha1.as_deref()
        } else {
            None
        };

        if task.path.exists() {
            if self.is_present(task, expected_sha1) {
                log::debug!("File exists and is valid, skipping: {:?}", task.path);
                return TaskOutcome::Skipped;
            }
            log::info!("Existing file failed verification, re-downloading: {:?}", task.path);
            if let Err(source) = tokio::fs::remove_file(&task.path).await {
                return TaskOutcome::Failed(DownloadError::Io {
                    path: task.path.clone(),
                    source,
                });
            }
        }

        let sources = candidate_urls(&task.url, mirrors);
        let expect = Expectation {
            sha1: expected_sha1,
            size: task.size,
        };

        for url in &sources {
            if cancel.is_cancelled() {
                return TaskOutcome::Cancelled;
            }

            log::debug!("Downloading {} from {}", task.name, url);
            match download_to_path(&self.client, url, &task.path, expect, cancel, &*self.reporter).await {
                Ok(()) => {
                    return TaskOutcome::Completed {
                        source: url.clone(),
                    }
                }
                Err(DownloadError::Cancelled) => return TaskOutcome::Cancelled,
                Err(e) => {
                    log::warn!("Failed to download {} from {}: {}", task.name, url, e);
                }
            }
        }

        log::error!("All {} sources failed for {}", sources.len(), task.name);
        TaskOutcome::Failed(DownloadError::Exhausted {
            name: task.name.clone(),
            attempts: sources.len(),
        })
    }

    fn is_present(&self, task: &DownloadTask, expected_sha1: Option<&str>) -> bool {
        if expected_sha1.is_some() {
            return file_matches(&task.path, expected_sha1);
        }
        match (task.size, std::fs::metadata(&task.path)) {
            (Some(size), Ok(meta)) => meta.len() == size,
            (None, Ok(meta)) => meta.is_file(),
            (_, Err(_)) => false,
        }
    }
}
