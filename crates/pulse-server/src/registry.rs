//! In-memory registry of analysis sessions

use crate::error::{Result, ServiceError};
use crate::session::{Session, SessionId, SubjectParameters};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

/// Every live session, keyed by id
///
/// The lock guards map access only. Callers get clones, and mutations run
/// synchronously inside [`SessionRegistry::update`], so the lock is never held
/// across an await point.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new `PENDING` session for `subject`
    pub fn create(&self, subject: SubjectParameters) -> Result<SessionId> {
        let session = Session::new(subject);
        let id = session.id;
        self.sessions
            .write()
            .map_err(|e| ServiceError::poisoned("session registry", e))?
            .insert(id, session);
        Ok(id)
    }

    /// Snapshot of a session
    pub fn get(&self, id: SessionId) -> Result<Session> {
        self.sessions
            .read()
            .map_err(|e| ServiceError::poisoned("session registry", e))?
            .get(&id)
            .cloned()
            .ok_or(ServiceError::NotFound(id))
    }

    /// Apply `mutation` to a session under the write lock
    ///
    /// Returns the mutation's result along with the updated snapshot.
    pub fn update<F, R>(&self, id: SessionId, mutation: F) -> Result<(R, Session)>
    where
        F: FnOnce(&mut Session) -> Result<R>,
    {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|e| ServiceError::poisoned("session registry", e))?;
        let session = sessions.get_mut(&id).ok_or(ServiceError::NotFound(id))?;
        let value = mutation(session)?;
        Ok((value, session.clone()))
    }

    /// Atomically move a session from `PENDING` to `RUNNING`
    ///
    /// Fails with `InvalidTransition` when another runner already claimed it.
    pub fn claim(&self, id: SessionId) -> Result<Session> {
        self.update(id, Session::start).map(|((), session)| session)
    }

    /// Drop a session, returning it if it existed
    pub fn remove(&self, id: SessionId) -> Result<Option<Session>> {
        Ok(self
            .sessions
            .write()
            .map_err(|e| ServiceError::poisoned("session registry", e))?
            .remove(&id))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self
            .sessions
            .read()
            .map_err(|e| ServiceError::poisoned("session registry", e))?
            .len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|n| n == 0)
    }

    /// Ids of sessions that finished more than `age` ago
    pub fn terminal_older_than(&self, age: Duration) -> Result<Vec<SessionId>> {
        let age = chrono::Duration::from_std(age)
            .map_err(|e| ServiceError::Validation(format!("retention age out of range: {e}")))?;
        let cutoff = Utc::now() - age;

        Ok(self
            .sessions
            .read()
            .map_err(|e| ServiceError::poisoned("session registry", e))?
            .values()
            .filter(|session| session.finished_before(cutoff))
            .map(|session| session.id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Stage;
    use crate::session::SessionStatus;
    use crate::session::test_support::subject;
    use std::sync::Arc;

    #[test]
    fn test_create_and_get() {
        let registry = SessionRegistry::new();
        let id = registry.create(subject("AAPL")).unwrap();

        let session = registry.get(id).unwrap();
        assert_eq!(session.id, id);
        assert_eq!(session.status, SessionStatus::Pending);
        assert_eq!(session.subject.symbol, "AAPL");
        assert_eq!(registry.len().unwrap(), 1);
    }

    #[test]
    fn test_unknown_id() {
        let registry = SessionRegistry::new();
        let id = SessionId::new();
        assert!(matches!(registry.get(id), Err(ServiceError::NotFound(got)) if got == id));
        assert!(registry.claim(id).is_err());
        assert!(registry.remove(id).unwrap().is_none());
    }

    #[test]
    fn test_claim_only_once() {
        let registry = SessionRegistry::new();
        let id = registry.create(subject("AAPL")).unwrap();

        let claimed = registry.claim(id).unwrap();
        assert_eq!(claimed.status, SessionStatus::Running);
        assert!(matches!(
            registry.claim(id),
            Err(ServiceError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_concurrent_claims_have_one_winner() {
        let registry = Arc::new(SessionRegistry::new());
        let id = registry.create(subject("AAPL")).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.claim(id).is_ok())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_failed_mutation_leaves_session_untouched() {
        let registry = SessionRegistry::new();
        let id = registry.create(subject("AAPL")).unwrap();

        let result = registry.update(id, |s| s.advance(50, "too early"));
        assert!(result.is_err());

        let session = registry.get(id).unwrap();
        assert_eq!(session.progress, 0);
        assert_eq!(session.status, SessionStatus::Pending);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let registry = SessionRegistry::new();
        let a = registry.create(subject("AAPL")).unwrap();
        let b = registry.create(subject("MSFT")).unwrap();
        assert_ne!(a, b);

        registry.claim(a).unwrap();
        registry.update(a, |s| s.advance(40, "Analyzing patterns")).unwrap();

        let untouched = registry.get(b).unwrap();
        assert_eq!(untouched.progress, 0);
        assert_eq!(untouched.status, SessionStatus::Pending);
    }

    #[test]
    fn test_terminal_older_than() {
        let registry = SessionRegistry::new();
        let done = registry.create(subject("AAPL")).unwrap();
        let running = registry.create(subject("MSFT")).unwrap();

        registry.claim(done).unwrap();
        registry.update(done, |s| s.fail(Stage::Fetch, "boom")).unwrap();
        registry.claim(running).unwrap();
        std::thread::sleep(Duration::from_millis(5));

        assert!(registry.terminal_older_than(Duration::from_secs(3600)).unwrap().is_empty());
        assert_eq!(registry.terminal_older_than(Duration::ZERO).unwrap(), vec![done]);

        registry.remove(done).unwrap();
        assert_eq!(registry.len().unwrap(), 1);
    }
}
