// AI 客户端模块
// OpenAI 兼容接口的 LLM、图片和嵌入调用

use crate::ai::prompts::extract_json;
use crate::config::AiConfig;
use crate::errors::VoxdError;
use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// AI 客户端特征
#[async_trait]
pub trait AiClient: Send + Sync {
    /// 生成文本
    async fn generate_text(&self, system: &str, prompt: &str) -> Result<String, VoxdError>;

    /// 以 JSON 模式生成结构化对象
    async fn generate_json(&self, system: &str, prompt: &str) -> Result<Value, VoxdError>;

    /// 生成图片，返回 PNG 字节
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, VoxdError>;

    /// 生成嵌入向量
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, VoxdError>;

    /// 提供方名称，用于日志
    fn provider(&self) -> &'static str;
}

/// AI 客户端管理器
///
/// 所有调用都经过 `with_retry`：单次调用受超时限制，失败后线性退避重试。
#[derive(Clone)]
pub struct AiClientManager {
    config: Arc<AiConfig>,
    client: Arc<dyn AiClient>,
}

impl AiClientManager {
    /// 根据配置创建客户端
    pub fn new(config: AiConfig) -> Result<Self, VoxdError> {
        let config = Arc::new(config);

        let client: Arc<dyn AiClient> = match config.provider.as_str() {
            "openai" => Arc::new(OpenAiClient::new(config.clone())?),
            _ => Arc::new(MockAiClient::new()),
        };

        info!(provider = %client.provider(), model = %config.chat_model, "AI 客户端管理器初始化完成");

        Ok(Self { config, client })
    }

    /// 使用指定客户端创建（测试中注入 Mock）
    pub fn with_client(config: AiConfig, client: Arc<dyn AiClient>) -> Self {
        Self {
            config: Arc::new(config),
            client,
        }
    }

    pub fn client(&self) -> Arc<dyn AiClient> {
        self.client.clone()
    }

    pub fn config(&self) -> Arc<AiConfig> {
        self.config.clone()
    }

    /// 执行带重试的操作
    pub async fn with_retry<F, Fut, T>(&self, operation: F) -> Result<T, VoxdError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, VoxdError>>,
    {
        let attempts = self.config.retry_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match timeout(Duration::from_secs(self.config.timeout), operation()).await {
                Ok(Ok(result)) => {
                    if attempt > 1 {
                        info!("操作在第 {} 次尝试后成功", attempt);
                    }
                    return Ok(result);
                }
                Ok(Err(e)) => {
                    warn!("第 {} 次尝试失败: {}", attempt, e);
                    // 参数错误重试也不会成功
                    let retryable = !e.is_client_error();
                    last_error = Some(e);
                    if !retryable {
                        break;
                    }
                }
                Err(_) => {
                    warn!("第 {} 次尝试超时", attempt);
                    last_error = Some(VoxdError::timeout(format!(
                        "AI 操作超时 ({}s)",
                        self.config.timeout
                    )));
                }
            }

            if attempt < attempts {
                tokio::time::sleep(Duration::from_millis(1000 * attempt as u64)).await;
            }
        }

        Err(last_error.unwrap_or_else(|| VoxdError::ai_service("所有重试尝试都失败了")))
    }

    pub async fn generate_text(&self, system: &str, prompt: &str) -> Result<String, VoxdError> {
        self.with_retry(|| self.client.generate_text(system, prompt)).await
    }

    pub async fn generate_json(&self, system: &str, prompt: &str) -> Result<Value, VoxdError> {
        self.with_retry(|| self.client.generate_json(system, prompt)).await
    }

    pub async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, VoxdError> {
        self.with_retry(|| self.client.generate_image(prompt)).await
    }

    pub async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, VoxdError> {
        self.with_retry(|| self.client.generate_embedding(text)).await
    }
}

/// OpenAI 兼容客户端
pub struct OpenAiClient {
    config: Arc<AiConfig>,
    http_client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: Arc<AiConfig>) -> Result<Self, VoxdError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .map_err(|e| VoxdError::configuration(format!("无效的 API 密钥: {}", e)))?,
        );

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .default_headers(headers)
            .build()
            .map_err(|e| VoxdError::ai_service(format!("创建 HTTP 客户端失败: {}", e)))?;

        Ok(Self { config, http_client })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post(&self, path: &str, body: Value, model: &str) -> Result<Value, VoxdError> {
        let response = self
            .http_client
            .post(self.endpoint(path))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let payload: Value = response.json().await.unwrap_or(Value::Null);

        if !status.is_success() {
            let message = payload["error"]["message"]
                .as_str()
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(VoxdError::ai_service_with_model(message, model));
        }

        Ok(payload)
    }

    async fn chat(&self, system: &str, prompt: &str, json_mode: bool) -> Result<String, VoxdError> {
        let mut body = json!({
            "model": self.config.chat_model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": prompt}
            ],
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature
        });
        if json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }

        let payload = self.post("chat/completions", body, &self.config.chat_model).await?;

        debug!(
            tokens = payload["usage"]["total_tokens"].as_u64().unwrap_or(0),
            "对话补全完成"
        );

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| VoxdError::ai_service_with_model("响应中缺少内容", &self.config.chat_model))
    }
}

#[async_trait]
impl AiClient for OpenAiClient {
    async fn generate_text(&self, system: &str, prompt: &str) -> Result<String, VoxdError> {
        debug!("使用 OpenAI 生成文本，提示词长度: {}", prompt.len());
        self.chat(system, prompt, false).await
    }

    async fn generate_json(&self, system: &str, prompt: &str) -> Result<Value, VoxdError> {
        debug!("使用 OpenAI 生成 JSON，提示词长度: {}", prompt.len());
        let text = self.chat(system, prompt, true).await?;
        extract_json(&text)
    }

    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, VoxdError> {
        let model = &self.config.image_model;
        let mut body = json!({
            "model": model,
            "prompt": prompt,
            "size": self.config.image_size,
            "n": 1
        });
        // gpt-image 系列总是返回 b64_json，不接受该参数
        if model.starts_with("dall-e") {
            body["response_format"] = json!("b64_json");
        }

        let payload = self.post("images/generations", body, model).await?;
        let item = &payload["data"][0];

        if let Some(encoded) = item["b64_json"].as_str() {
            return base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| VoxdError::ai_service_with_model(format!("图片解码失败: {}", e), model));
        }

        if let Some(url) = item["url"].as_str() {
            let bytes = self.http_client.get(url).send().await?.error_for_status()?.bytes().await?;
            return Ok(bytes.to_vec());
        }

        Err(VoxdError::ai_service_with_model("响应中缺少图片数据", model))
    }

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, VoxdError> {
        let model = &self.config.embedding_model;
        let body = json!({ "model": model, "input": text });
        let payload = self.post("embeddings", body, model).await?;

        let embedding: Vec<f32> = payload["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| VoxdError::ai_service_with_model("嵌入向量格式错误", model))?
            .iter()
            .filter_map(|v| v.as_f64())
            .map(|v| v as f32)
            .collect();

        if embedding.is_empty() {
            return Err(VoxdError::ai_service_with_model("嵌入向量为空", model));
        }

        Ok(embedding)
    }

    fn provider(&self) -> &'static str {
        "openai"
    }
}

/// 1x1 透明 PNG
const MOCK_PNG: [u8; 67] = [
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

/// Mock AI 客户端（开发环境和测试使用）
///
/// 输出是确定的：嵌入向量由文本的 SHA-256 派生。
#[derive(Debug, Clone, Default)]
pub struct MockAiClient {
    json_response: Option<Value>,
    failing_image_pattern: Option<String>,
    fail_embeddings: bool,
    fail_generation: bool,
}

impl MockAiClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 固定 JSON 模式的返回值
    pub fn with_json_response(mut self, value: Value) -> Self {
        self.json_response = Some(value);
        self
    }

    /// 提示词包含指定片段时图片生成失败
    pub fn with_failing_images(mut self, pattern: impl Into<String>) -> Self {
        self.failing_image_pattern = Some(pattern.into());
        self
    }

    pub fn with_failing_embeddings(mut self) -> Self {
        self.fail_embeddings = true;
        self
    }

    /// 文本和 JSON 生成全部失败
    pub fn with_failing_generation(mut self) -> Self {
        self.fail_generation = true;
        self
    }

    pub fn sample_conversation() -> Value {
        json!({
            "messages": [
                {"role": "user", "content": "Hi! Do you have a table for two tonight?"},
                {"role": "assistant", "content": "Good evening! We have a table at 19:30. Shall I book it?",
                 "image_prompt": "A cosy restaurant table for two by the window"},
                {"role": "user", "content": "Yes please, under the name Sam."},
                {"role": "assistant", "content": "Done! See you at 19:30, Sam."}
            ]
        })
    }
}

#[async_trait]
impl AiClient for MockAiClient {
    async fn generate_text(&self, _system: &str, prompt: &str) -> Result<String, VoxdError> {
        if self.fail_generation {
            return Err(VoxdError::ai_service_with_model("模拟生成失败", "mock-model"));
        }
        Ok(format!(
            "这是对提示词的模拟回复: {}",
            prompt.chars().take(50).collect::<String>()
        ))
    }

    async fn generate_json(&self, _system: &str, _prompt: &str) -> Result<Value, VoxdError> {
        if self.fail_generation {
            return Err(VoxdError::ai_service_with_model("模拟生成失败", "mock-model"));
        }
        Ok(self
            .json_response
            .clone()
            .unwrap_or_else(Self::sample_conversation))
    }

    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, VoxdError> {
        if let Some(ref pattern) = self.failing_image_pattern {
            if prompt.contains(pattern.as_str()) {
                return Err(VoxdError::ai_service_with_model("模拟图片生成失败", "mock-image"));
            }
        }
        Ok(MOCK_PNG.to_vec())
    }

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, VoxdError> {
        if self.fail_embeddings {
            return Err(VoxdError::ai_service_with_model("模拟嵌入失败", "mock-embedding"));
        }
        let digest = Sha256::digest(text.as_bytes());
        Ok(digest.iter().map(|b| (*b as f32 / 127.5) - 1.0).collect())
    }

    fn provider(&self) -> &'static str {
        "mock"
    }
}
