//! Transient user-facing notices
//!
//! Every recoverable failure ends up here. A notice replaces whatever was shown
//! before it and clears itself after the configured TTL unless a newer notice
//! has taken its place.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;

use crate::error::{Error, ErrorKind};

/// Default time a notice stays visible
pub const DEFAULT_NOTICE_TTL: Duration = Duration::from_secs(5);

/// A transient message for the rendering surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Failure category
    pub kind: ErrorKind,
    /// Human-readable message
    pub message: String,
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Publishes self-clearing notices
#[derive(Debug, Clone)]
pub struct Notices {
    tx: Arc<watch::Sender<Option<Notice>>>,
    serial: Arc<AtomicU64>,
    ttl: Duration,
}

impl Default for Notices {
    fn default() -> Self {
        Self::new(DEFAULT_NOTICE_TTL)
    }
}

impl Notices {
    /// Create a notice board whose notices clear after `ttl`
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            tx: Arc::new(tx),
            serial: Arc::new(AtomicU64::new(0)),
            ttl,
        }
    }

    /// Show a notice, replacing the current one
    ///
    /// Must be called from within a Tokio runtime; the expiry runs as a task.
    pub fn post(&self, kind: ErrorKind, message: impl Into<String>) {
        let notice = Notice {
            kind,
            message: message.into(),
        };
        tracing::debug!(kind = %notice.kind, message = %notice.message, "notice posted");

        let serial = self.serial.fetch_add(1, Ordering::SeqCst) + 1;
        self.tx.send_replace(Some(notice));

        let tx = Arc::clone(&self.tx);
        let current = Arc::clone(&self.serial);
        let ttl = self.ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if current.load(Ordering::SeqCst) == serial {
                tx.send_replace(None);
            }
        });
    }

    /// Show `error` if it belongs to the user-facing taxonomy
    ///
    /// Errors outside the taxonomy are logged and not shown.
    pub fn post_error(&self, error: &Error) {
        match error.kind() {
            Some(kind) => self.post(kind, error.to_string()),
            None => tracing::warn!(error = %error, "unclassified error not surfaced"),
        }
    }

    /// Remove the current notice immediately
    pub fn clear(&self) {
        self.serial.fetch_add(1, Ordering::SeqCst);
        self.tx.send_replace(None);
    }

    /// Currently visible notice
    #[must_use]
    pub fn current(&self) -> Option<Notice> {
        self.tx.borrow().clone()
    }

    /// Watch notices as they appear and clear
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Notice>> {
        self.tx.subscribe()
    }

    /// Configured lifetime of a notice
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn notice_clears_after_ttl() {
        let notices = Notices::new(Duration::from_secs(5));
        notices.post(ErrorKind::NetworkFailure, "offline");
        assert_eq!(notices.current().unwrap().message, "offline");

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(notices.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn newer_notice_survives_older_expiry() {
        let notices = Notices::new(Duration::from_secs(5));
        notices.post(ErrorKind::NetworkFailure, "first");
        tokio::time::sleep(Duration::from_secs(3)).await;
        notices.post(ErrorKind::BackendError, "second");

        // First notice's timer fires here and must not clear the second
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(notices.current().unwrap().message, "second");

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(notices.current().is_none());
    }

    #[tokio::test]
    async fn unclassified_errors_are_not_shown() {
        let notices = Notices::default();
        notices.post_error(&Error::Config("nope".to_string()));
        assert!(notices.current().is_none());
    }
}
