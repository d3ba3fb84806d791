// S3 兼容对象存储（Wasabi）
// 路径风格请求，AWS Signature Version 4 签名

use super::{sanitize_key, ObjectStorage};
use crate::config::StorageConfig;
use crate::errors::VoxdError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "s3";

pub struct S3Storage {
    endpoint: Url,
    host: String,
    region: String,
    bucket: String,
    access_key: String,
    secret_key: String,
    public_base_url: String,
    http_client: reqwest::Client,
}

impl S3Storage {
    pub fn new(config: &StorageConfig) -> Result<Self, VoxdError> {
        if config.access_key.is_empty() || config.secret_key.is_empty() {
            return Err(VoxdError::configuration("S3 存储需要 access_key 和 secret_key"));
        }

        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| VoxdError::configuration(format!("无效的 S3 端点: {}", e)))?;
        let host = match (endpoint.host_str(), endpoint.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(VoxdError::configuration("S3 端点缺少主机名")),
        };

        // 未配置 CDN 时直接使用路径风格地址
        let public_base_url = if config.public_base_url.is_empty() {
            format!("{}/{}", config.endpoint.trim_end_matches('/'), config.bucket)
        } else {
            config.public_base_url.trim_end_matches('/').to_string()
        };

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| VoxdError::storage(format!("创建 HTTP 客户端失败: {}", e)))?;

        Ok(Self {
            endpoint,
            host,
            region: config.region.clone(),
            bucket: config.bucket.clone(),
            access_key: config.access_key.clone(),
            secret_key: config.secret_key.clone(),
            public_base_url,
            http_client,
        })
    }

    fn canonical_uri(&self, key: &str) -> String {
        let encoded: Vec<String> = key.split('/').map(uri_encode).collect();
        format!("/{}/{}", uri_encode(&self.bucket), encoded.join("/"))
    }

    fn object_url(&self, canonical_uri: &str) -> String {
        format!(
            "{}://{}{}",
            self.endpoint.scheme(),
            self.host,
            canonical_uri
        )
    }

    /// 计算请求的 Authorization 头
    ///
    /// 签名的头部固定为 host、x-amz-content-sha256 和 x-amz-date。
    pub fn authorization_header(
        &self,
        method: &str,
        canonical_uri: &str,
        payload_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(String, String), VoxdError> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let signed_headers = "host;x-amz-content-sha256;x-amz-date";

        let canonical_request = format!(
            "{}\n{}\n\nhost:{}\nx-amz-content-sha256:{}\nx-amz-date:{}\n\n{}\n{}",
            method, canonical_uri, self.host, payload_hash, amz_date, signed_headers, payload_hash
        );

        let scope = format!("{}/{}/{}/aws4_request", date, self.region, SERVICE);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let signing_key = derive_signing_key(&self.secret_key, &date, &self.region, SERVICE)?;
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

        let header = format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            self.access_key, scope, signed_headers, signature
        );

        Ok((header, amz_date))
    }

    async fn send(
        &self,
        method: reqwest::Method,
        key: &str,
        body: Option<(Vec<u8>, &str)>,
    ) -> Result<reqwest::Response, VoxdError> {
        let canonical_uri = self.canonical_uri(key);
        let payload_hash = match &body {
            Some((bytes, _)) => hex::encode(Sha256::digest(bytes)),
            None => hex::encode(Sha256::digest(b"")),
        };

        let (authorization, amz_date) =
            self.authorization_header(method.as_str(), &canonical_uri, &payload_hash, Utc::now())?;

        let mut request = self
            .http_client
            .request(method, self.object_url(&canonical_uri))
            .header("authorization", authorization)
            .header("x-amz-content-sha256", payload_hash)
            .header("x-amz-date", amz_date);

        if let Some((bytes, content_type)) = body {
            request = request.header("content-type", content_type).body(bytes);
        }

        request
            .send()
            .await
            .map_err(|e| VoxdError::storage(format!("S3 请求失败: {}", e)))
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, VoxdError> {
        let key = sanitize_key(key)?;
        let size = bytes.len();

        let response = self
            .send(reqwest::Method::PUT, &key, Some((bytes, content_type)))
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(key = %key, status = status.as_u16(), "S3 上传失败");
            return Err(VoxdError::storage(format!(
                "上传 {} 失败 (HTTP {}): {}",
                key,
                status.as_u16(),
                s3_error_message(&body)
            )));
        }

        debug!(key = %key, size, "对象已上传");
        Ok(self.public_url(&key))
    }

    async fn delete_object(&self, key: &str) -> Result<(), VoxdError> {
        let key = sanitize_key(key)?;
        let response = self.send(reqwest::Method::DELETE, &key, None).await?;

        let status = response.status();
        if status.is_success() || status.as_u16() == 404 {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(VoxdError::storage(format!(
            "删除 {} 失败 (HTTP {}): {}",
            key,
            status.as_u16(),
            s3_error_message(&body)
        )))
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key.trim_start_matches('/'))
    }

    fn backend(&self) -> &'static str {
        "s3"
    }
}

/// RFC 3986 编码，保留非保留字符
fn uri_encode(segment: &str) -> String {
    let mut result = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                result.push(byte as char);
            }
            _ => result.push_str(&format!("%{:02X}", byte)),
        }
    }
    result
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, VoxdError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| VoxdError::internal(format!("HMAC 初始化失败: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// 派生 SigV4 签名密钥
fn derive_signing_key(
    secret_key: &str,
    date: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, VoxdError> {
    let k_date = hmac_sha256(format!("AWS4{}", secret_key).as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

/// 从 S3 的 XML 错误中取出 Message
fn s3_error_message(body: &str) -> String {
    body.split_once("<Message>")
        .and_then(|(_, rest)| rest.split_once("</Message>"))
        .map(|(message, _)| message.to_string())
        .unwrap_or_else(|| body.chars().take(200).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use chrono::TimeZone;

    fn storage() -> S3Storage {
        let mut config = AppConfig::default().storage;
        config.backend = "s3".to_string();
        config.endpoint = "https://s3.eu-central-1.wasabisys.com".to_string();
        config.region = "eu-central-1".to_string();
        config.bucket = "voxd".to_string();
        config.access_key = "AKIDEXAMPLE".to_string();
        config.secret_key = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string();
        config.public_base_url = "https://cdn.voxd.test".to_string();
        S3Storage::new(&config).unwrap()
    }

    #[test]
    fn test_empty_payload_hash() {
        assert_eq!(
            hex::encode(Sha256::digest(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_signing_key_derivation() {
        // AWS 文档中的派生密钥示例
        let key = derive_signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        )
        .unwrap();
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn test_canonical_uri_encodes_segments() {
        let storage = storage();
        assert_eq!(
            storage.canonical_uri("examples/abc/0 image.png"),
            "/voxd/examples/abc/0%20image.png"
        );
        assert_eq!(
            storage.object_url("/voxd/a.png"),
            "https://s3.eu-central-1.wasabisys.com/voxd/a.png"
        );
    }

    #[test]
    fn test_authorization_header_shape() {
        let storage = storage();
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let payload = hex::encode(Sha256::digest(b""));

        let (header, amz_date) = storage
            .authorization_header("PUT", "/voxd/a.png", &payload, now)
            .unwrap();

        assert_eq!(amz_date, "20250102T030405Z");
        assert!(header.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20250102/eu-central-1/s3/aws4_request, \
SignedHeaders=host;x-amz-content-sha256;x-amz-date, Signature="
        ));

        let signature = header.rsplit("Signature=").next().unwrap();
        assert_eq!(signature.len(), 64);

        // 相同输入签名稳定，不同方法签名不同
        let (again, _) = storage
            .authorization_header("PUT", "/voxd/a.png", &payload, now)
            .unwrap();
        let (delete, _) = storage
            .authorization_header("DELETE", "/voxd/a.png", &payload, now)
            .unwrap();
        assert_eq!(header, again);
        assert_ne!(header, delete);
    }

    #[test]
    fn test_public_url_and_error_message() {
        let storage = storage();
        assert_eq!(storage.public_url("logos/a.png"), "https://cdn.voxd.test/logos/a.png");
        assert_eq!(
            s3_error_message("<Error><Code>AccessDenied</Code><Message>Access Denied</Message></Error>"),
            "Access Denied"
        );
    }

    #[test]
    fn test_requires_credentials() {
        let mut config = AppConfig::default().storage;
        config.backend = "s3".to_string();
        assert!(S3Storage::new(&config).is_err());
    }
}
