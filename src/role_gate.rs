use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::RoleLookupError;
use crate::role::Role;

/// Telegram user id of whoever sent the update
pub type SubjectId = u64;

/// Role some lookup gave us at some point
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoleAssertion {
    pub subject: SubjectId,
    pub role: Role,
    pub resolved_at: Instant,
}

/// Where roles come from
#[async_trait]
pub trait RoleLookup: Send + Sync {
    async fn lookup_role(&self, subject: SubjectId) -> Result<Role, RoleLookupError>;
}

/// Decides who may enter a flow.
///
/// Roles are cached for `ttl`. On top of that the same question asked again
/// within `recheck` gets the previous answer, which absorbs double taps.
/// Lookup failures deny access and are never cached.
pub struct RoleGate {
    lookup: Arc<dyn RoleLookup>,
    ttl: Duration,
    recheck: Duration,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    assertions: HashMap<SubjectId, RoleAssertion>,
    recent: HashMap<(SubjectId, Vec<Role>), (bool, Instant)>,
}

/// Above this many remembered answers the stale ones are dropped
const RECENT_SOFT_LIMIT: usize = 1024;

impl RoleGate {
    pub fn new(lookup: Arc<dyn RoleLookup>, ttl: Duration, recheck: Duration) -> RoleGate {
        RoleGate { lookup, ttl, recheck, inner: Mutex::new(Inner::default()) }
    }

    fn inner(&self) -> Result<MutexGuard<'_, Inner>, String> {
        self.inner.lock().map_err(|e| format!("lock: {e:?}"))
    }

    /// True if the subject's role is one of `required`.
    ///
    /// Empty `required` lets everybody in without a lookup
    pub async fn authorize(&self, subject: SubjectId, required: &BTreeSet<Role>) -> bool {
        if required.is_empty() {
            return true
        }

        let key = (subject, required.iter().copied().collect::<Vec<Role>>());
        match self.recent_answer(&key) {
            Ok(Some(answer)) => {
                log::debug!("authorize {subject}: recent answer {answer}");
                return answer
            },
            Ok(None) => (),
            Err(e) => {
                log::warn!("authorize {subject}: {e}");
                return false
            },
        }

        let role = match self.role_of(subject).await {
            Ok(role) => role,
            Err(e) => {
                log::warn!("authorize {subject}: denied, {e}");
                return false
            },
        };

        let answer = required.contains(&role);
        log::info!("authorize {subject} as {}: {answer}", role.id());
        if let Err(e) = self.remember_answer(key, answer) {
            log::warn!("authorize {subject}: {e}");
        }
        answer
    }

    /// Cached role, or a fresh lookup if the cached one is too old
    pub async fn role_of(&self, subject: SubjectId) -> Result<Role, RoleLookupError> {
        let now = Instant::now();
        {
            let inner = self.inner().map_err(RoleLookupError::Backend)?;
            if let Some(a) = inner.assertions.get(&subject) {
                if now.duration_since(a.resolved_at) < self.ttl {
                    return Ok(a.role)
                }
            }
        }

        log::debug!("-> lookup_role {subject}");
        let role = self.lookup.lookup_role(subject).await?;

        let mut inner = self.inner().map_err(RoleLookupError::Backend)?;
        inner.assertions.insert(subject, RoleAssertion {
            subject,
            role,
            resolved_at: Instant::now(),
        });
        Ok(role)
    }

    /// Forgets what we know about the subject, e.g. after a role change
    pub fn forget(&self, subject: SubjectId) -> Result<(), String> {
        let mut inner = self.inner()?;
        inner.assertions.remove(&subject);
        inner.recent.retain(|(s, _), _| *s != subject);
        Ok(())
    }

    fn recent_answer(&self, key: &(SubjectId, Vec<Role>)) -> Result<Option<bool>, String> {
        let inner = self.inner()?;
        Ok(inner.recent.get(key)
            .filter(|(_, at)| at.elapsed() < self.recheck)
            .map(|(answer, _)| *answer))
    }

    fn remember_answer(&self, key: (SubjectId, Vec<Role>), answer: bool) -> Result<(), String> {
        let mut inner = self.inner()?;
        if inner.recent.len() > RECENT_SOFT_LIMIT {
            let recheck = self.recheck;
            inner.recent.retain(|_, (_, at)| at.elapsed() < recheck);
        }
        inner.recent.insert(key, (answer, Instant::now()));
        Ok(())
    }
}

/// Roles from a fixed map, e.g. the `staff` section of the config
pub struct StaffDirectory {
    staff: HashMap<SubjectId, Role>,
    /// Role of everybody not in `staff`, None makes them unknown
    fallback: Option<Role>,
}

impl StaffDirectory {
    /// Everybody who isn't staff is a client
    pub fn new(staff: HashMap<SubjectId, Role>) -> StaffDirectory {
        StaffDirectory { staff, fallback: Some(Role::Client) }
    }

    /// Subjects not in `staff` fail with `NotFound`
    pub fn strict(staff: HashMap<SubjectId, Role>) -> StaffDirectory {
        StaffDirectory { staff, fallback: None }
    }
}

#[async_trait]
impl RoleLookup for StaffDirectory {
    async fn lookup_role(&self, subject: SubjectId) -> Result<Role, RoleLookupError> {
        self.staff.get(&subject).copied()
            .or(self.fallback)
            .ok_or(RoleLookupError::NotFound(subject))
    }
}
