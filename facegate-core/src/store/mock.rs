//! In-memory session store for testing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::watch;

use super::{SessionStore, VerifiedSubject};
use crate::credentials::{BearerToken, NewPassword, Subject};
use crate::error::{FacegateError, Result};

/// A password reset the mock was asked to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetRecord {
    pub subject: Subject,
    pub new_password: String,
}

#[derive(Debug)]
pub struct MockSessionStore {
    issued: Mutex<Vec<Subject>>,
    resets: Mutex<Vec<ResetRecord>>,
    failing: AtomicBool,
    hanging: AtomicBool,
    started: watch::Sender<usize>,
}

impl Default for MockSessionStore {
    fn default() -> Self {
        Self {
            issued: Mutex::new(Vec::new()),
            resets: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            hanging: AtomicBool::new(false),
            started: watch::Sender::new(0),
        }
    }
}

impl MockSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later call block forever without applying anything.
    pub fn hang(&self) -> &Self {
        self.hanging.store(true, Ordering::SeqCst);
        self
    }

    /// Calls received so far, including ones still blocked.
    pub fn started(&self) -> usize {
        *self.started.borrow()
    }

    /// Resolve once at least `n` calls have reached the store.
    pub async fn wait_for_started(&self, n: usize) {
        let mut rx = self.started.subscribe();
        let _ = rx.wait_for(|started| *started >= n).await;
    }

    /// A store that refuses every request.
    pub fn failing() -> Self {
        let store = Self::default();
        store.failing.store(true, Ordering::SeqCst);
        store
    }

    /// Subjects that received a credential, in order.
    pub fn issued(&self) -> Vec<Subject> {
        self.issued.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn resets(&self) -> Vec<ResetRecord> {
        self.resets.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Total side effects applied.
    pub fn calls(&self) -> usize {
        self.issued().len() + self.resets().len()
    }

    async fn enter(&self) -> Result<()> {
        self.started.send_modify(|started| *started += 1);
        if self.hanging.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            Err(FacegateError::Store("mock store refused the request".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SessionStore for MockSessionStore {
    async fn issue_credential(&self, verified: &VerifiedSubject) -> Result<BearerToken> {
        self.enter().await?;
        let mut issued = self
            .issued
            .lock()
            .map_err(|_| FacegateError::Store("mock store poisoned".into()))?;
        issued.push(verified.subject.clone());
        Ok(BearerToken::new(format!("mock-token-{}", issued.len())))
    }

    async fn reset_password(
        &self,
        verified: &VerifiedSubject,
        new_password: &NewPassword,
    ) -> Result<()> {
        self.enter().await?;
        self.resets
            .lock()
            .map_err(|_| FacegateError::Store("mock store poisoned".into()))?
            .push(ResetRecord {
                subject: verified.subject.clone(),
                new_password: new_password.expose().to_string(),
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn verified() -> VerifiedSubject {
        VerifiedSubject {
            subject: Subject::parse("grace@example.org").unwrap(),
            session_id: Uuid::new_v4(),
            verified_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_issues_numbered_tokens() {
        let store = MockSessionStore::new();
        let first = store.issue_credential(&verified()).await.unwrap();
        let second = store.issue_credential(&verified()).await.unwrap();
        assert_eq!(first.expose(), "mock-token-1");
        assert_eq!(second.expose(), "mock-token-2");
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test]
    async fn test_records_reset_password() {
        let store = MockSessionStore::new();
        let password = NewPassword::new("brandnew99").unwrap();
        store.reset_password(&verified(), &password).await.unwrap();
        assert_eq!(store.resets()[0].new_password, "brandnew99");
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_store_blocks_until_dropped() {
        let store = MockSessionStore::new();
        store.hang();
        let verified = verified();
        let call = store.issue_credential(&verified);
        let outcome = tokio::time::timeout(std::time::Duration::from_secs(60), call).await;
        assert!(outcome.is_err());
        assert_eq!(store.started(), 1);
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_failing_store_records_nothing() {
        let store = MockSessionStore::failing();
        assert!(store.issue_credential(&verified()).await.is_err());
        assert_eq!(store.calls(), 0);
    }
}
