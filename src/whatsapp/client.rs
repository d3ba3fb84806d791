// Graph API 客户端

use super::models::*;
use crate::config::WhatsAppConfig;
use crate::errors::VoxdError;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const SERVICE: &str = "whatsapp";

/// 模板同步最多跟随的分页数
const MAX_TEMPLATE_PAGES: usize = 10;

pub struct WhatsAppClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl WhatsAppClient {
    pub fn new(config: &WhatsAppConfig) -> Result<Self, VoxdError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .map_err(|e| VoxdError::external_service(SERVICE, format!("创建 HTTP 客户端失败: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: format!(
                "{}/{}",
                config.graph_base_url.trim_end_matches('/'),
                config.api_version
            ),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str, access_token: &str) -> RequestBuilder {
        self.http_client
            .request(method, self.url(path))
            .bearer_auth(access_token)
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, VoxdError> {
        let response = request
            .send()
            .await
            .map_err(|e| VoxdError::external_service(SERVICE, format!("请求失败: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| VoxdError::external_service(SERVICE, format!("读取响应失败: {}", e)))?;

        if !status.is_success() {
            let message = parse_graph_error(&body)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            warn!(status = status.as_u16(), error = %message, "Graph API 返回错误");
            return Err(VoxdError::external_service(SERVICE, message));
        }

        serde_json::from_str(&body)
            .map_err(|e| VoxdError::external_service(SERVICE, format!("无法解析响应: {}", e)))
    }

    /// 校验 WABA 并返回其名称
    #[instrument(skip(self, access_token))]
    pub async fn get_waba(&self, waba_id: &str, access_token: &str) -> Result<GraphWaba, VoxdError> {
        let request = self
            .request(Method::GET, waba_id, access_token)
            .query(&[("fields", "id,name")]);
        self.execute(request).await
    }

    #[instrument(skip(self, access_token))]
    pub async fn list_phone_numbers(
        &self,
        waba_id: &str,
        access_token: &str,
    ) -> Result<Vec<GraphPhoneNumber>, VoxdError> {
        let request = self
            .request(Method::GET, &format!("{}/phone_numbers", waba_id), access_token)
            .query(&[(
                "fields",
                "id,display_phone_number,verified_name,quality_rating,code_verification_status",
            )]);
        let list: GraphList<GraphPhoneNumber> = self.execute(request).await?;
        Ok(list.data)
    }

    /// 拉取全部模板（跟随分页）
    #[instrument(skip(self, access_token))]
    pub async fn list_templates(
        &self,
        waba_id: &str,
        access_token: &str,
    ) -> Result<Vec<GraphTemplate>, VoxdError> {
        let first = self
            .request(Method::GET, &format!("{}/message_templates", waba_id), access_token)
            .query(&[
                ("fields", "id,name,language,category,status,components,rejected_reason"),
                ("limit", "100"),
            ]);

        let mut page: GraphList<GraphTemplate> = self.execute(first).await?;
        let mut templates = std::mem::take(&mut page.data);

        for _ in 1..MAX_TEMPLATE_PAGES {
            let Some(next) = page.paging.as_ref().and_then(|p| p.next.clone()) else {
                break;
            };
            let request = self.http_client.get(next).bearer_auth(access_token);
            page = self.execute(request).await?;
            templates.append(&mut page.data);
        }

        debug!(count = templates.len(), "模板拉取完成");
        Ok(templates)
    }

    /// 订阅 WABA 的 webhook
    #[instrument(skip(self, access_token))]
    pub async fn subscribe_app(&self, waba_id: &str, access_token: &str) -> Result<bool, VoxdError> {
        let request = self.request(
            Method::POST,
            &format!("{}/subscribed_apps", waba_id),
            access_token,
        );
        let result: GraphSuccess = self.execute(request).await?;
        Ok(result.success)
    }

    /// 注册电话号码
    #[instrument(skip(self, access_token, pin))]
    pub async fn register_phone_number(
        &self,
        phone_number_id: &str,
        pin: &str,
        access_token: &str,
    ) -> Result<bool, VoxdError> {
        let request = self
            .request(
                Method::POST,
                &format!("{}/register", phone_number_id),
                access_token,
            )
            .json(&json!({ "messaging_product": "whatsapp", "pin": pin }));
        let result: GraphSuccess = self.execute(request).await?;
        Ok(result.success)
    }

    #[instrument(skip(self, access_token, template), fields(name = %template.name))]
    pub async fn create_template(
        &self,
        waba_id: &str,
        template: &CreateTemplateRequest,
        access_token: &str,
    ) -> Result<CreatedTemplate, VoxdError> {
        let request = self
            .request(
                Method::POST,
                &format!("{}/message_templates", waba_id),
                access_token,
            )
            .json(template);
        self.execute(request).await
    }

    /// 按名称删除模板（会删除该名称下所有语言版本）
    #[instrument(skip(self, access_token))]
    pub async fn delete_template(
        &self,
        waba_id: &str,
        name: &str,
        access_token: &str,
    ) -> Result<bool, VoxdError> {
        let request = self
            .request(
                Method::DELETE,
                &format!("{}/message_templates", waba_id),
                access_token,
            )
            .query(&[("name", name)]);
        let result: GraphSuccess = self.execute(request).await?;
        Ok(result.success)
    }
}

/// 提取 Meta 错误信息
pub fn parse_graph_error(body: &str) -> Option<String> {
    serde_json::from_str::<GraphErrorBody>(body)
        .ok()
        .map(|b| b.error.display_message())
}

/// 掩码访问令牌，只保留末 4 位
pub fn mask_token(token: &str) -> String {
    let count = token.chars().count();
    if count <= 8 {
        return "****".to_string();
    }
    let tail: String = token.chars().skip(count - 4).collect();
    format!("****{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn test_url_building() {
        let client = WhatsAppClient::new(&AppConfig::default().whatsapp).unwrap();
        assert_eq!(
            client.url("/1234/phone_numbers"),
            "https://graph.facebook.com/v21.0/1234/phone_numbers"
        );
    }

    #[test]
    fn test_parse_graph_error() {
        let body = r#"{"error":{"message":"Invalid OAuth access token.","type":"OAuthException","code":190,"fbtrace_id":"AbC"}}"#;
        assert_eq!(
            parse_graph_error(body).unwrap(),
            "Invalid OAuth access token. (code 190)"
        );

        let body = r#"{"error":{"message":"Invalid parameter","code":100,"error_user_msg":"Template name already exists"}}"#;
        assert_eq!(
            parse_graph_error(body).unwrap(),
            "Template name already exists (code 100)"
        );

        assert!(parse_graph_error("<html>bad gateway</html>").is_none());
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("EAAGm0PX4ZCpsBAabcd1234"), "****1234");
        assert_eq!(mask_token("short"), "****");
    }

    #[test]
    fn test_template_list_deserialization() {
        let body = r#"{
            "data": [{"id": "1", "name": "order_update", "language": "en_US",
                      "category": "UTILITY", "status": "APPROVED",
                      "components": [{"type": "BODY", "text": "Hi {{1}}"}]}],
            "paging": {"cursors": {"before": "a", "after": "b"}}
        }"#;
        let list: GraphList<GraphTemplate> = serde_json::from_str(body).unwrap();
        assert_eq!(list.data[0].name, "order_update");
        assert!(list.data[0].rejected_reason.is_none());
        assert!(list.paging.unwrap().next.is_none());
    }
}
