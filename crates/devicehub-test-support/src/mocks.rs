//! Scripted [`IngestClient`] for driving relay loops without a network.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use devicehub_config::DeviceConfig;
use devicehub_transport::{Delivery, IngestClient, ScanSubmission};
use tokio_util::sync::CancellationToken;

/// One scripted answer to `send_scan`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendStep {
    /// Answer with the given delivery.
    Reply(Delivery),
    /// Block until the caller cancels, then answer `Cancelled`.
    Hang,
}

#[derive(Debug, Default)]
struct Script {
    sends: VecDeque<SendStep>,
    configs: VecDeque<Option<DeviceConfig>>,
    submissions: Vec<ScanSubmission>,
    config_requests: Vec<String>,
}

/// Fake ingestion client answering from queued scripts.
///
/// When a script runs dry, `send_scan` accepts and `get_config` returns `None`.
#[derive(Debug, Default)]
pub struct ScriptedIngest {
    script: Mutex<Script>,
}

impl ScriptedIngest {
    /// Client that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue answers for upcoming `send_scan` calls.
    #[must_use]
    pub fn with_sends(self, steps: impl IntoIterator<Item = SendStep>) -> Self {
        self.lock().sends.extend(steps);
        self
    }

    /// Queue answers for upcoming `get_config` calls.
    #[must_use]
    pub fn with_configs(self, configs: impl IntoIterator<Item = Option<DeviceConfig>>) -> Self {
        self.lock().configs.extend(configs);
        self
    }

    /// Queue one more `send_scan` answer.
    pub fn push_send(&self, step: SendStep) {
        self.lock().sends.push_back(step);
    }

    /// Submissions received so far, in call order.
    #[must_use]
    pub fn submissions(&self) -> Vec<ScanSubmission> {
        self.lock().submissions.clone()
    }

    /// Event ids received so far, in call order.
    #[must_use]
    pub fn sent_ids(&self) -> Vec<String> {
        self.lock()
            .submissions
            .iter()
            .map(|submission| submission.event_id.clone())
            .collect()
    }

    /// Number of `get_config` calls so far.
    #[must_use]
    pub fn config_requests(&self) -> usize {
        self.lock().config_requests.len()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Rejection used by scripts standing in for an outage.
#[must_use]
pub fn rejected(reason: &str) -> SendStep {
    SendStep::Reply(Delivery::Rejected(reason.to_string()))
}

#[async_trait]
impl IngestClient for ScriptedIngest {
    async fn send_scan(&self, submission: &ScanSubmission, cancel: &CancellationToken) -> Delivery {
        let step = {
            let mut script = self.lock();
            script.submissions.push(submission.clone());
            script
                .sends
                .pop_front()
                .unwrap_or(SendStep::Reply(Delivery::Accepted))
        };
        match step {
            SendStep::Reply(delivery) => delivery,
            SendStep::Hang => {
                cancel.cancelled().await;
                Delivery::Cancelled
            }
        }
    }

    async fn get_config(&self, device_id: &str, _cancel: &CancellationToken) -> Option<DeviceConfig> {
        let mut script = self.lock();
        script.config_requests.push(device_id.to_string());
        script.configs.pop_front().flatten()
    }
}
