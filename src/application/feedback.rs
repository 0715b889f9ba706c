use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackKind {
    Success,
    Rejected,
    PersistenceFailed,
    PersistenceNotice,
}

pub trait FeedbackPort: Send + Sync {
    fn notify(&self, kind: FeedbackKind);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopFeedback;

impl FeedbackPort for NoopFeedback {
    fn notify(&self, _kind: FeedbackKind) {}
}

#[derive(Debug, Default)]
pub struct RecordingFeedback {
    events: Mutex<Vec<FeedbackKind>>,
}

impl RecordingFeedback {
    pub fn events(&self) -> Vec<FeedbackKind> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, kind: FeedbackKind) -> usize {
        self.events().into_iter().filter(|event| *event == kind).count()
    }
}

impl FeedbackPort for RecordingFeedback {
    fn notify(&self, kind: FeedbackKind) {
        if let Ok(mut events) = self.events.lock() {
            events.push(kind);
        }
    }
}
