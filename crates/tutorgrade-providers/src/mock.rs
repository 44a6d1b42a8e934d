//! Mock backend for offline use and tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use tutorgrade_core::error::ProviderError;
use tutorgrade_core::traits::GradingClient;

/// A scripted backend that never touches the network.
///
/// Replies are chosen in this order: the next queued reply, the first rule
/// whose key occurs in the user turn, then the default reply. With none of
/// those available the call fails with `EmptyResponse`.
pub struct MockClient {
    name: String,
    /// Map of prompt substring → reply.
    rules: BTreeMap<String, String>,
    queue: Mutex<VecDeque<String>>,
    default_reply: Option<String>,
    call_count: AtomicU32,
    last_prompt: Mutex<Option<(String, String)>>,
}

impl MockClient {
    pub fn new(
        rules: BTreeMap<String, String>,
        sequence: Vec<String>,
        default_reply: Option<String>,
    ) -> Self {
        Self {
            name: "mock".to_string(),
            rules,
            queue: Mutex::new(sequence.into()),
            default_reply,
            call_count: AtomicU32::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    /// A mock that always returns the same reply.
    pub fn with_fixed_reply(reply: &str) -> Self {
        Self::new(BTreeMap::new(), Vec::new(), Some(reply.to_string()))
    }

    /// A mock that returns the given replies in order, then fails.
    pub fn with_sequence<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            BTreeMap::new(),
            replies.into_iter().map(Into::into).collect(),
            None,
        )
    }

    /// Rename the backend as it reports itself.
    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// The last (system, user) pair received.
    pub fn last_prompt(&self) -> Option<(String, String)> {
        self.last_prompt
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl GradingClient for MockClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn chat(&self, system: &str, user: &str) -> anyhow::Result<String> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self
            .last_prompt
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) =
            Some((system.to_string(), user.to_string()));

        let queued = self
            .queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();
        if let Some(reply) = queued {
            return Ok(reply);
        }

        let matched = self
            .rules
            .iter()
            .find(|(key, _)| user.contains(key.as_str()))
            .map(|(_, reply)| reply.clone());

        matched
            .or_else(|| self.default_reply.clone())
            .ok_or_else(|| ProviderError::EmptyResponse.into())
    }
}
