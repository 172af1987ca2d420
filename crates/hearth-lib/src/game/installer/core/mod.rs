pub mod batch;
pub mod downloader;
pub mod mirror;

pub use batch::{BatchDownloader, BatchReport, DownloadTask, TaskOutcome, TaskReport};
pub use mirror::{Mirror, MirrorSelection};
