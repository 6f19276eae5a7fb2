use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::repository::{Filter, Record, RecordId, RepoError, Repository};

/// Records in a map, for tests and single-process deployments
pub struct MemRepository<R> {
    inner: Arc<RwLock<Inner<R>>>,
}

struct Inner<R> {
    records: BTreeMap<RecordId, R>,
    last_id: RecordId,
}

impl<R> Clone for MemRepository<R> {
    fn clone(&self) -> Self {
        MemRepository { inner: self.inner.clone() }
    }
}

impl<R> Default for MemRepository<R> {
    fn default() -> Self {
        MemRepository {
            inner: Arc::new(RwLock::new(Inner { records: BTreeMap::new(), last_id: 0 })),
        }
    }
}

impl<R: Record> MemRepository<R> {
    pub fn new() -> Self {
        MemRepository::default()
    }

    /// Repository that already holds `records`, they get fresh ids
    pub fn seeded(records: Vec<R>) -> Result<Self, RepoError> {
        let repo = MemRepository::new();
        {
            let mut inner = repo.inner.write().map_err(lock_err)?;
            for r in records {
                inner.insert_new(r);
            }
        }
        Ok(repo)
    }
}

impl<R: Record> Inner<R> {
    fn insert_new(&mut self, mut record: R) -> R {
        self.last_id += 1;
        record.set_id(self.last_id);
        record.set_version(0);
        self.records.insert(self.last_id, record.clone());
        record
    }
}

fn lock_err<E: std::fmt::Debug>(e: E) -> RepoError {
    RepoError::Storage(format!("lock: {e:?}"))
}

#[async_trait]
impl<R: Record> Repository<R> for MemRepository<R> {
    async fn get(&self, id: RecordId) -> Result<R, RepoError> {
        let inner = self.inner.read().map_err(lock_err)?;
        inner.records.get(&id).cloned().ok_or(RepoError::NotFound(id))
    }

    async fn search(&self, filter: &Filter<R>) -> Result<Vec<R>, RepoError> {
        let inner = self.inner.read().map_err(lock_err)?;
        Ok(inner.records.values()
            .filter(|r| filter(r))
            .cloned()
            .collect())
    }

    async fn create(&self, record: R) -> Result<R, RepoError> {
        let mut inner = self.inner.write().map_err(lock_err)?;
        let record = inner.insert_new(record);
        log::debug!("created record {:?}", record.id());
        Ok(record)
    }

    async fn update(&self, mut record: R) -> Result<R, RepoError> {
        let id = record.id().ok_or(RepoError::MissingId)?;
        let mut inner = self.inner.write().map_err(lock_err)?;
        let stored = inner.records.get_mut(&id).ok_or(RepoError::NotFound(id))?;
        if stored.version() != record.version() {
            return Err(RepoError::Conflict {
                id,
                expected: record.version(),
                found: stored.version(),
            })
        }
        record.set_version(record.version() + 1);
        *stored = record.clone();
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Note {
        id: Option<RecordId>,
        version: u64,
        text: String,
    }

    impl Record for Note {
        fn id(&self) -> Option<RecordId> { self.id }
        fn set_id(&mut self, id: RecordId) { self.id = Some(id) }
        fn version(&self) -> u64 { self.version }
        fn set_version(&mut self, version: u64) { self.version = version }
    }

    fn note(text: &str) -> Note {
        Note { id: None, version: 7, text: text.to_string() }
    }

    #[tokio::test]
    async fn test_create_get_search() {
        let repo = MemRepository::new();
        let a = repo.create(note("a")).await.unwrap();
        let b = repo.create(note("b")).await.unwrap();
        assert_eq!(Some(1), a.id);
        assert_eq!(Some(2), b.id);
        assert_eq!(0, a.version);

        assert_eq!(b, repo.get(2).await.unwrap());
        assert_eq!(Err(RepoError::NotFound(3)), repo.get(3).await);

        let found = repo.search(&|n: &Note| n.text != "a").await.unwrap();
        assert_eq!(vec![b], found);
    }

    #[tokio::test]
    async fn test_update_checks_version() {
        let repo = MemRepository::seeded(vec![note("a")]).unwrap();
        let first = repo.get(1).await.unwrap();
        let second = first.clone();

        let updated = repo.update(Note { text: "first".into(), ..first }).await.unwrap();
        assert_eq!(1, updated.version);

        assert_eq!(Err(RepoError::Conflict { id: 1, expected: 0, found: 1 }),
                   repo.update(Note { text: "second".into(), ..second }).await);
        assert_eq!("first", repo.get(1).await.unwrap().text);

        assert_eq!(Err(RepoError::MissingId), repo.update(note("x")).await);
        assert_eq!(Err(RepoError::NotFound(9)),
                   repo.update(Note { id: Some(9), ..note("x") }).await);
    }
}
