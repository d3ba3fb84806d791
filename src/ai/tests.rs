// AI 模块测试

use super::*;
use crate::config::{AiConfig, AppConfig};
use crate::errors::VoxdError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn test_config(retry_attempts: u32) -> AiConfig {
    AiConfig {
        retry_attempts,
        timeout: 5,
        ..AppConfig::default().ai
    }
}

/// 前若干次调用失败的客户端
struct FlakyClient {
    calls: AtomicU32,
    failures: u32,
    error: fn() -> VoxdError,
}

#[async_trait]
impl AiClient for FlakyClient {
    async fn generate_text(&self, _system: &str, _prompt: &str) -> Result<String, VoxdError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err((self.error)());
        }
        Ok(format!("ok after {}", call))
    }

    async fn generate_json(&self, _system: &str, _prompt: &str) -> Result<Value, VoxdError> {
        Ok(json!({}))
    }

    async fn generate_image(&self, _prompt: &str) -> Result<Vec<u8>, VoxdError> {
        Ok(Vec::new())
    }

    async fn generate_embedding(&self, _text: &str) -> Result<Vec<f32>, VoxdError> {
        Ok(vec![0.0])
    }

    fn provider(&self) -> &'static str {
        "flaky"
    }
}

#[test]
fn test_manager_defaults_to_mock_provider() {
    let manager = AiClientManager::new(test_config(1)).unwrap();
    assert_eq!(manager.client().provider(), "mock");
}

#[test]
fn test_manager_builds_openai_client() {
    let config = AiConfig {
        provider: "openai".to_string(),
        api_key: "sk-test".to_string(),
        ..test_config(1)
    };
    let manager = AiClientManager::new(config).unwrap();
    assert_eq!(manager.client().provider(), "openai");
}

#[tokio::test]
async fn test_retry_recovers_from_transient_failure() {
    let client = Arc::new(FlakyClient {
        calls: AtomicU32::new(0),
        failures: 1,
        error: || VoxdError::ai_service("upstream 500"),
    });
    let manager = AiClientManager::with_client(test_config(2), client.clone());

    let text = manager.generate_text("system", "prompt").await.unwrap();
    assert_eq!(text, "ok after 2");
    assert_eq!(client.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_retry_stops_on_client_error() {
    let client = Arc::new(FlakyClient {
        calls: AtomicU32::new(0),
        failures: 5,
        error: || VoxdError::bad_request("prompt too long"),
    });
    let manager = AiClientManager::with_client(test_config(3), client.clone());

    let err = manager.generate_text("system", "prompt").await.unwrap_err();
    assert_eq!(err.status_code(), 400);
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_mock_client_outputs() {
    let client = MockAiClient::new();

    let conversation = client.generate_json("s", "p").await.unwrap();
    assert_eq!(conversation["messages"].as_array().unwrap().len(), 4);

    let image = client.generate_image("a table").await.unwrap();
    assert_eq!(&image[..4], &[0x89, b'P', b'N', b'G']);

    let first = client.generate_embedding("opening hours").await.unwrap();
    let second = client.generate_embedding("opening hours").await.unwrap();
    assert_eq!(first.len(), 32);
    assert_eq!(first, second);
    assert!(first.iter().all(|v| (-1.0..=1.0).contains(v)));
}

#[tokio::test]
async fn test_mock_client_failure_switches() {
    let client = MockAiClient::new()
        .with_failing_images("window")
        .with_failing_embeddings()
        .with_failing_generation();

    assert!(client.generate_image("A table by the window").await.is_err());
    assert!(client.generate_image("A bowl of soup").await.is_ok());
    assert!(client.generate_embedding("text").await.is_err());
    assert!(client.generate_text("s", "p").await.is_err());
    assert!(client.generate_json("s", "p").await.is_err());
}

#[tokio::test]
async fn test_mock_client_custom_json() {
    let client = MockAiClient::new().with_json_response(json!({"messages": []}));
    let value = client.generate_json("s", "p").await.unwrap();
    assert!(value["messages"].as_array().unwrap().is_empty());
}
