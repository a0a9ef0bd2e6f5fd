//! In-memory chat platform for driving the pipeline end to end

use async_trait::async_trait;
use channel_dl::{Error, Message, Messenger, Notice, Result, SentMessage};
use std::sync::Mutex;

/// A notice the pipeline posted or edited
#[derive(Clone, Debug)]
pub struct Posted {
    /// Channel it went to
    pub channel_id: String,
    /// What was shown
    pub notice: Notice,
    /// User mentioned alongside it
    pub mention: Option<String>,
    /// True when this replaced an earlier notice
    pub edit: bool,
}

/// Scripted messenger: serves a fixed channel history and records every notice
#[derive(Default)]
pub struct ScriptedMessenger {
    history: Vec<Message>,
    bot_id: Option<String>,
    fail_history_after: Option<usize>,
    history_calls: Mutex<usize>,
    posted: Mutex<Vec<Posted>>,
}

impl ScriptedMessenger {
    /// Messenger whose channel history is `history` (newest first)
    pub fn new(history: Vec<Message>) -> Self {
        Self {
            history,
            ..Default::default()
        }
    }

    /// Report `id` as the bot's own user id
    pub fn with_bot_id(mut self, id: &str) -> Self {
        self.bot_id = Some(id.to_string());
        self
    }

    /// Fail every history request after the first `pages`
    pub fn failing_history_after(mut self, pages: usize) -> Self {
        self.fail_history_after = Some(pages);
        self
    }

    /// Everything posted so far, in order
    pub fn posted(&self) -> Vec<Posted> {
        self.posted.lock().unwrap().clone()
    }

    /// Posted notices with the given title
    pub fn titled(&self, title: &str) -> Vec<Posted> {
        self.posted()
            .into_iter()
            .filter(|p| p.notice.title == title)
            .collect()
    }

    /// Number of history pages requested
    pub fn history_calls(&self) -> usize {
        *self.history_calls.lock().unwrap()
    }
}

#[async_trait]
impl Messenger for ScriptedMessenger {
    async fn send_notice(
        &self,
        channel_id: &str,
        notice: &Notice,
        mention_user_id: Option<&str>,
    ) -> Result<SentMessage> {
        let mut posted = self.posted.lock().unwrap();
        posted.push(Posted {
            channel_id: channel_id.to_string(),
            notice: notice.clone(),
            mention: mention_user_id.map(str::to_string),
            edit: false,
        });
        Ok(SentMessage {
            id: format!("sent-{}", posted.len()),
            channel_id: channel_id.to_string(),
        })
    }

    async fn edit_notice(&self, message: &SentMessage, notice: &Notice) -> Result<SentMessage> {
        self.posted.lock().unwrap().push(Posted {
            channel_id: message.channel_id.clone(),
            notice: notice.clone(),
            mention: None,
            edit: true,
        });
        Ok(message.clone())
    }

    async fn channel_messages(
        &self,
        _channel_id: &str,
        limit: usize,
        before: Option<&str>,
    ) -> Result<Vec<Message>> {
        let mut calls = self.history_calls.lock().unwrap();
        *calls += 1;
        if self.fail_history_after.is_some_and(|pages| *calls > pages) {
            return Err(Error::Messaging("rate limited".to_string()));
        }

        let start = before
            .and_then(|id| self.history.iter().position(|m| m.id == id))
            .map_or(0, |index| index + 1);
        Ok(self.history.iter().skip(start).take(limit).cloned().collect())
    }

    fn current_user_id(&self) -> Option<String> {
        self.bot_id.clone()
    }
}
