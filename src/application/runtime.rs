use crate::application::feedback::{FeedbackKind, FeedbackPort, NoopFeedback};
use crate::application::outcome::Outcome;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tracing::{debug, error, warn};

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

pub fn system_clock() -> NowProvider {
    Arc::new(Utc::now)
}

/// Logs every outcome and forwards it to the feedback port. Clones share the
/// consecutive persistence failure count, which only an applied mutation
/// resets.
#[derive(Clone)]
pub struct Reporter {
    feedback: Arc<dyn FeedbackPort>,
    consecutive_failures: Arc<AtomicU32>,
    notice_threshold: u32,
}

impl Reporter {
    pub fn new(feedback: Arc<dyn FeedbackPort>, notice_threshold: u32) -> Self {
        Self {
            feedback,
            consecutive_failures: Arc::new(AtomicU32::new(0)),
            notice_threshold: notice_threshold.max(1),
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    pub fn report<T>(&self, operation: &'static str, outcome: &Outcome<T>) {
        match outcome {
            Outcome::Applied(_) => {
                self.consecutive_failures.store(0, Ordering::SeqCst);
                debug!(operation, "operation applied");
                self.feedback.notify(FeedbackKind::Success);
            }
            Outcome::Rejected(rejection) => {
                warn!(operation, reason = %rejection, "operation rejected");
                self.feedback.notify(FeedbackKind::Rejected);
            }
            Outcome::PersistenceFailed(failure) => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                error!(operation, error = %failure, consecutive_failures = failures, "persistence failed");
                self.feedback.notify(FeedbackKind::PersistenceFailed);
                if failures == self.notice_threshold {
                    self.feedback.notify(FeedbackKind::PersistenceNotice);
                }
            }
        }
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(Arc::new(NoopFeedback), 3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::feedback::RecordingFeedback;
    use crate::application::outcome::Rejection;
    use crate::infrastructure::error::InfraError;

    fn failure() -> Outcome<()> {
        Outcome::PersistenceFailed(InfraError::Unavailable("disk gone".to_string()))
    }

    #[test]
    fn ids_are_unique_and_prefixed() {
        let first = next_id("blk");
        let second = next_id("blk");
        assert!(first.starts_with("blk-"));
        assert_ne!(first, second);
    }

    #[test]
    fn notice_is_raised_once_when_the_streak_hits_the_threshold() {
        let feedback = Arc::new(RecordingFeedback::default());
        let reporter = Reporter::new(feedback.clone(), 2);

        reporter.report("save", &failure());
        assert_eq!(feedback.count(FeedbackKind::PersistenceNotice), 0);
        reporter.report("save", &failure());
        reporter.report("save", &failure());
        assert_eq!(feedback.count(FeedbackKind::PersistenceNotice), 1);
        assert_eq!(reporter.consecutive_failures(), 3);

        reporter.report("save", &Outcome::Applied(()));
        assert_eq!(reporter.consecutive_failures(), 0);
    }

    #[test]
    fn rejections_do_not_touch_the_failure_streak() {
        let feedback = Arc::new(RecordingFeedback::default());
        let reporter = Reporter::new(feedback.clone(), 3);
        reporter.report("save", &failure());
        reporter.report("move", &Outcome::<()>::Rejected(Rejection::EmptyName));
        assert_eq!(reporter.consecutive_failures(), 1);
        assert_eq!(
            feedback.events(),
            vec![FeedbackKind::PersistenceFailed, FeedbackKind::Rejected]
        );
    }

    #[test]
    fn clones_share_the_streak() {
        let reporter = Reporter::default();
        let clone = reporter.clone();
        clone.report("save", &failure());
        assert_eq!(reporter.consecutive_failures(), 1);
    }
}
