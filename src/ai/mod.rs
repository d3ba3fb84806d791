// AI 模块
// LLM、图片和嵌入调用，提示词构建以及文档分块

pub mod chunker;
pub mod client;
pub mod prompts;

#[cfg(test)]
mod tests;

pub use chunker::*;
pub use client::*;
