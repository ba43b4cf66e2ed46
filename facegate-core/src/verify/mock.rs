//! Mock verification service for testing.
//!
//! Replies come from a script, then from a fallback once the script is
//! exhausted. A scripted reply can be immediate, deferred until the test
//! sends it, or never arrive at all.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::{oneshot, watch};

use super::{Endpoint, VerificationRequest, VerificationResponse, VerificationService};
use crate::credentials::Subject;
use crate::error::{FacegateError, Result};

/// Verdict a [`MockVerifier`] hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    Match,
    NoMatch,
    /// The service answers `success: false` with this message.
    Rejected(String),
    /// The call fails as if the service were unreachable.
    Unreachable(String),
}

impl MockReply {
    fn into_result(self) -> Result<VerificationResponse> {
        match self {
            Self::Match => Ok(VerificationResponse::matched()),
            Self::NoMatch => Ok(VerificationResponse::no_match()),
            Self::Rejected(message) => Ok(VerificationResponse::rejected(message)),
            Self::Unreachable(message) => Err(FacegateError::Transport(message)),
        }
    }
}

enum Scripted {
    Now(MockReply),
    Deferred(oneshot::Receiver<MockReply>),
    Hang,
}

/// What the mock saw for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub endpoint: Endpoint,
    pub subject: Subject,
    pub new_password: Option<String>,
    pub image_len: usize,
}

pub struct MockVerifier {
    script: Mutex<VecDeque<Scripted>>,
    fallback: MockReply,
    requests: Mutex<Vec<RecordedRequest>>,
    calls: watch::Sender<usize>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockVerifier {
    /// Answers `NoMatch` unless scripted otherwise.
    pub fn new() -> Self {
        Self::with_fallback(MockReply::NoMatch)
    }

    pub fn with_fallback(fallback: MockReply) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            requests: Mutex::new(Vec::new()),
            calls: watch::Sender::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// `misses` no-matches, then matches forever.
    pub fn matching_after(misses: usize) -> Self {
        let verifier = Self::with_fallback(MockReply::Match);
        for _ in 0..misses {
            verifier.push(MockReply::NoMatch);
        }
        verifier
    }

    pub fn push(&self, reply: MockReply) -> &Self {
        self.script().push_back(Scripted::Now(reply));
        self
    }

    /// Queue a reply that arrives only when the returned sender is used.
    /// Dropping the sender turns the reply into a transport failure.
    pub fn defer(&self) -> oneshot::Sender<MockReply> {
        let (tx, rx) = oneshot::channel();
        self.script().push_back(Scripted::Deferred(rx));
        tx
    }

    /// Queue a call that never completes.
    pub fn hang(&self) -> &Self {
        self.script().push_back(Scripted::Hang);
        self
    }

    pub fn calls(&self) -> usize {
        *self.calls.borrow()
    }

    /// Resolve once at least `n` calls have started.
    pub async fn wait_for_calls(&self, n: usize) {
        let mut rx = self.calls.subscribe();
        let _ = rx.wait_for(|calls| *calls >= n).await;
    }

    /// Calls started but not yet finished or dropped.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously running calls ever observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn script(&self) -> std::sync::MutexGuard<'_, VecDeque<Scripted>> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MockVerifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight counter even when the call is cancelled.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl VerificationService for MockVerifier {
    async fn verify(
        &self,
        endpoint: Endpoint,
        request: &VerificationRequest,
    ) -> Result<VerificationResponse> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                endpoint,
                subject: request.subject.clone(),
                new_password: request.new_password.as_ref().map(|p| p.expose().to_string()),
                image_len: request.image.len(),
            });
        }
        let next = self.script().pop_front();
        self.calls.send_modify(|calls| *calls += 1);

        match next {
            Some(Scripted::Now(reply)) => reply.into_result(),
            Some(Scripted::Deferred(rx)) => match rx.await {
                Ok(reply) => reply.into_result(),
                Err(_) => Err(FacegateError::Transport("deferred reply dropped".into())),
            },
            Some(Scripted::Hang) => std::future::pending().await,
            None => self.fallback.clone().into_result(),
        }
    }
}
