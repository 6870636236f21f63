//! Repository ingestion
//!
//! Turns a repository [`Reference`] into a [`Snapshot`] (summary, tree and
//! concatenated content) while avoiding redundant clones, and answers file,
//! search and diff requests against it. [`RepositoryIngestor`] is the entry
//! point; the other modules are its stages.

pub mod cache;
pub mod error;
pub mod extractor;
pub mod local_repository;
pub mod pipeline;
pub mod reference;
pub mod remote;
pub mod repository_manager;
pub mod snapshot;
pub mod strategy;

pub use cache::{CacheEntry, FileSnapshotStore, MemorySnapshotStore, SnapshotCache, SnapshotStore};
pub use error::{IngestError, IngestResult};
pub use local_repository::LocalRepository;
pub use pipeline::RepositoryIngestor;
pub use reference::{GitProvider, GithubRepo, Reference};
pub use remote::{GithubApiClient, MetadataSource, RemoteRepositoryApi};
pub use repository_manager::WorkingCopyManager;
pub use snapshot::{ContextLine, FileContent, RepositoryMetadata, SearchResult, Snapshot, Summary};
