//! LLM 客户端抽象
//!
//! Router 与 Worker 的推理步骤都经由 LlmClient：输入有序消息，输出自由文本
//! （结构化输出由调用方以 JSON 协议约定并在解码边界校验）。

use async_trait::async_trait;

use crate::core::Message;

/// LLM 客户端 trait：非流式完成
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
