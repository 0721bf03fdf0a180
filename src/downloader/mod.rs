// Downloader module - resolve, select, fetch and mux, one video at a time

pub mod backends;
pub mod errors;
pub mod extractors;
pub mod fetcher;
pub mod format_selector;
pub mod models;
pub mod muxer;
pub mod orchestrator;
pub mod tools;
pub mod traits;
pub mod utils;

pub use errors::{DownloadError, ResolutionReason};
pub use models::{
    DownloadJob, NetworkConfig, OutputKind, PlaylistFailure, ResolvedVideo, RunSummary,
    StreamDescriptor, VideoOutcome, VideoState,
};
pub use orchestrator::BatchDownloader;
pub use traits::{MediaMuxer, StreamResolver, StreamTransport};
