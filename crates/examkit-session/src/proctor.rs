//! Proctoring signal monitor.
//!
//! Observes client-side environment signals during an attempt and reports
//! them as a side channel. The monitor never adjusts scoring and never
//! terminates an exam; the count is surfaced to the grading view for the
//! instructor to weigh.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use examkit_core::traits::{ActivityKind, ActivitySink, Severity};

/// A raw client-side environment signal, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum ClientSignal {
    /// The exam tab or window lost visibility.
    VisibilityHidden,
    /// A copy gesture was intercepted.
    Copy,
    /// A paste gesture was intercepted.
    Paste,
    /// A context-menu (right-click) gesture was intercepted.
    ContextMenu,
    /// A key press, with modifier state.
    KeyPress { key: String, ctrl: bool, shift: bool },
}

/// Classify a raw signal into a reportable activity kind.
///
/// Returns `None` for ordinary input that is not suspicious. The key
/// combinations match the devtools/print shortcuts the exam page blocks:
/// F12, Ctrl+Shift+I/J/C, Ctrl+U, and Ctrl+P.
pub fn classify(signal: &ClientSignal) -> Option<ActivityKind> {
    match signal {
        ClientSignal::VisibilityHidden => Some(ActivityKind::TabSwitch),
        ClientSignal::Copy => Some(ActivityKind::CopyAttempt),
        ClientSignal::Paste => Some(ActivityKind::PasteAttempt),
        ClientSignal::ContextMenu => Some(ActivityKind::RightClickAttempt),
        ClientSignal::KeyPress { key, ctrl, shift } => {
            let key = key.to_uppercase();
            let devtools = key == "F12"
                || (*ctrl && *shift && matches!(key.as_str(), "I" | "J" | "C"))
                || (*ctrl && key == "U")
                || (*ctrl && key == "P");
            devtools.then_some(ActivityKind::DevtoolsAttempt)
        }
    }
}

/// One classified, timestamped proctoring event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub attempt_id: Uuid,
    pub kind: ActivityKind,
    pub severity: Severity,
    pub occurred_at: DateTime<Utc>,
}

/// Watches one attempt for suspicious activity.
///
/// `observe` must run inside a Tokio runtime: reporting is spawned
/// fire-and-forget so it can never block or fail the exam-taking flow.
pub struct ProctorMonitor {
    attempt_id: Uuid,
    sink: Arc<dyn ActivitySink>,
    observed: Arc<AtomicU32>,
}

impl ProctorMonitor {
    pub fn new(attempt_id: Uuid, sink: Arc<dyn ActivitySink>) -> Self {
        Self {
            attempt_id,
            sink,
            observed: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Feed one raw signal through classification.
    ///
    /// A suspicious signal increments the local counter and is reported to
    /// the sink in the background; if the sink is unavailable the event is
    /// dropped with a diagnostic log only.
    pub fn observe(&self, signal: ClientSignal) -> Option<ActivityEvent> {
        let kind = classify(&signal)?;
        self.observed.fetch_add(1, Ordering::Relaxed);

        let event = ActivityEvent {
            attempt_id: self.attempt_id,
            kind,
            severity: Severity::default(),
            occurred_at: Utc::now(),
        };
        tracing::debug!(attempt_id = %event.attempt_id, kind = %event.kind, "suspicious activity observed");

        let sink = Arc::clone(&self.sink);
        let (attempt_id, severity) = (event.attempt_id, event.severity);
        tokio::spawn(async move {
            if let Err(e) = sink
                .report_suspicious_activity(attempt_id, kind, severity)
                .await
            {
                tracing::warn!(%attempt_id, kind = %kind, "dropping activity report: {e:#}");
            }
        });

        Some(event)
    }

    /// How many suspicious signals this monitor has observed locally.
    pub fn suspicious_count(&self) -> u32 {
        self.observed.load(Ordering::Relaxed)
    }
}
