// 日志上下文管理

use crate::errors::RequestId;
use actix_web::HttpMessage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 请求上下文
///
/// 认证通过后由提取器构造，用于在日志中携带请求和操作者信息。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    pub request_id: String,
    pub admin_id: Option<Uuid>,
    pub partner_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub method: Option<String>,
    pub path: Option<String>,
    pub start_time: chrono::DateTime<chrono::Utc>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            admin_id: None,
            partner_id: None,
            ip_address: None,
            method: None,
            path: None,
            start_time: chrono::Utc::now(),
        }
    }

    /// 从 HTTP 请求创建上下文，优先沿用中间件写入的请求 ID
    pub fn from_http_request(req: &actix_web::HttpRequest) -> Self {
        let mut context = Self::new();

        if let Some(request_id) = req.extensions().get::<RequestId>() {
            context.request_id = request_id.0.clone();
        }

        context.method = Some(req.method().to_string());
        context.path = Some(req.path().to_string());
        context.ip_address = req
            .connection_info()
            .realip_remote_addr()
            .map(|s| s.to_string());

        context
    }

    pub fn with_admin(mut self, admin_id: Uuid, partner_id: Option<Uuid>) -> Self {
        self.admin_id = Some(admin_id);
        self.partner_id = partner_id;
        self
    }

    pub fn duration(&self) -> chrono::Duration {
        chrono::Utc::now() - self.start_time
    }

    /// 转换为日志字段
    pub fn to_log_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("request_id", self.request_id.clone()),
            ("start_time", self.start_time.to_rfc3339()),
        ];

        if let Some(admin_id) = self.admin_id {
            fields.push(("admin_id", admin_id.to_string()));
        }
        if let Some(partner_id) = self.partner_id {
            fields.push(("partner_id", partner_id.to_string()));
        }
        if let Some(ref ip_address) = self.ip_address {
            fields.push(("ip_address", ip_address.clone()));
        }
        if let Some(ref method) = self.method {
            fields.push(("method", method.clone()));
        }
        if let Some(ref path) = self.path {
            fields.push(("path", path.clone()));
        }

        fields
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// 带请求上下文字段的日志宏
#[macro_export]
macro_rules! log_with_context {
    ($level:ident, $context:expr, $($arg:tt)*) => {
        tracing::$level!(
            request_id = %$context.request_id,
            admin_id = ?$context.admin_id,
            partner_id = ?$context.partner_id,
            $($arg)*
        );
    };
}
