//! 脚本化 Mock LLM 客户端（用于测试，无需 API）
//!
//! 按入队顺序依次吐出预置回复，可精确驱动 Router 决策序列与 Worker 工具调用，
//! 使协调循环在本地可确定性复现。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::Message;
use crate::llm::LlmClient;

/// 脚本化客户端：每次 complete 弹出一条预置回复；脚本耗尽返回 Err
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedLlmClient {
    pub fn new(replies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
        }
    }

    pub fn push(&self, reply: impl Into<String>) {
        self.replies.lock().unwrap().push_back(reply.into());
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, _messages: &[Message]) -> Result<String, String> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| "Scripted replies exhausted".to_string())
    }
}
