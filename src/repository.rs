use async_trait::async_trait;
use thiserror::Error;

mod mem;
pub use mem::MemRepository;

pub type RecordId = u64;

/// Something a [`Repository`] can keep.
///
/// `version` is bumped by every successful update and is what concurrent
/// writers are checked against.
pub trait Record: Clone + Send + Sync + 'static {
    /// None until the record was created
    fn id(&self) -> Option<RecordId>;
    fn set_id(&mut self, id: RecordId);
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
}

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum RepoError {
    #[error("record {0} not found")]
    NotFound(RecordId),

    /// Somebody else updated the record after it was read
    #[error("record {id} was changed concurrently (have version {expected}, stored {found})")]
    Conflict { id: RecordId, expected: u64, found: u64 },

    #[error("record has no id")]
    MissingId,

    #[error("storage: {0}")]
    Storage(String),
}

pub type Filter<R> = dyn Fn(&R) -> bool + Send + Sync;

/// Storage of one kind of records
#[async_trait]
pub trait Repository<R: Record>: Send + Sync {
    async fn get(&self, id: RecordId) -> Result<R, RepoError>;

    /// Records `filter` accepts, ordered by id
    async fn search(&self, filter: &Filter<R>) -> Result<Vec<R>, RepoError>;

    /// Stores a new record, returns it with its id and version 0
    async fn create(&self, record: R) -> Result<R, RepoError>;

    /// Replaces the stored record if it still has the version `record` has.
    ///
    /// Returns the record with the bumped version, or `Conflict` if somebody
    /// was quicker
    async fn update(&self, record: R) -> Result<R, RepoError>;
}
