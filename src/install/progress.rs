//! Install progress events
//!
//! Progress is published on a broadcast channel. Listeners may attach and
//! detach at any time; a listener that subscribes late misses earlier events.
//! Within one run events are strictly ordered by stage and the reported
//! percentage never decreases.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Event name used when forwarding progress to the collaborator
pub const PROGRESS_EVENT: &str = "version_install_progress";

/// Default broadcast buffer per listener
pub const DEFAULT_PROGRESS_CAPACITY: usize = 128;

/// Overall progress at which each stage starts
pub const DOWNLOAD_SPAN: u8 = 90;
pub const VERIFYING_PROGRESS: u8 = 92;
pub const INSTALLING_PROGRESS: u8 = 96;
pub const DONE_PROGRESS: u8 = 100;

/// Install pipeline stages, in emission order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallStage {
    Resolving,
    Downloading,
    Verifying,
    Installing,
    Done,
    Error,
}

impl InstallStage {
    /// Whether no further events follow this stage
    pub fn is_terminal(&self) -> bool {
        matches!(self, InstallStage::Done | InstallStage::Error)
    }
}

/// A single progress event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallProgress {
    pub stage: InstallStage,
    /// Overall progress (0-100)
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl InstallProgress {
    pub fn new(stage: InstallStage, progress: u8) -> Self {
        Self {
            stage,
            progress: progress.min(DONE_PROGRESS),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Map received bytes onto the overall progress span of the download stage
pub fn download_percentage(received: u64, total: Option<u64>) -> u8 {
    match total {
        Some(total) if total > 0 => {
            ((received as f64 / total as f64) * DOWNLOAD_SPAN as f64).min(DOWNLOAD_SPAN as f64) as u8
        }
        // Unknown size: one point per MiB, capped below the span
        _ => ((received / (1024 * 1024)).min(DOWNLOAD_SPAN as u64 - 1)) as u8,
    }
}

/// Fire-and-forget publisher of install progress
#[derive(Clone)]
pub struct ProgressBroadcaster {
    sender: broadcast::Sender<InstallProgress>,
}

impl ProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Attach a new listener; it only sees events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<InstallProgress> {
        self.sender.subscribe()
    }

    /// Number of currently attached listeners
    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publish an event; having no listeners is not an error
    pub fn emit(&self, event: InstallProgress) {
        tracing::debug!(stage = ?event.stage, progress = event.progress, "Install progress");
        let _ = self.sender.send(event);
    }
}

impl Default for ProgressBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRESS_CAPACITY)
    }
}

/// Per-run reporter enforcing stage order and monotonic progress
pub(crate) struct ProgressReporter<'a> {
    broadcaster: &'a ProgressBroadcaster,
    stage: Option<InstallStage>,
    progress: u8,
}

impl<'a> ProgressReporter<'a> {
    pub(crate) fn new(broadcaster: &'a ProgressBroadcaster) -> Self {
        Self {
            broadcaster,
            stage: None,
            progress: 0,
        }
    }

    /// Enter a new stage
    pub(crate) fn stage(&mut self, stage: InstallStage, progress: u8, message: Option<String>) {
        debug_assert!(self.stage.map_or(true, |s| s < stage), "stage regression");
        self.stage = Some(stage);
        self.progress = self.progress.max(progress);

        let mut event = InstallProgress::new(stage, self.progress);
        event.message = message;
        self.broadcaster.emit(event);
    }

    /// Report bytes received; emits only when the percentage advances
    pub(crate) fn downloaded(&mut self, received: u64, total: Option<u64>) {
        let pct = download_percentage(received, total);
        if pct > self.progress {
            self.progress = pct;
            self.broadcaster
                .emit(InstallProgress::new(InstallStage::Downloading, pct));
        }
    }

    /// Terminate the run with an error event
    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        self.stage = Some(InstallStage::Error);
        self.broadcaster.emit(
            InstallProgress::new(InstallStage::Error, self.progress).with_message(message),
        );
    }
}
