// 错误响应格式化

use crate::errors::VoxdError;
use actix_web::HttpResponse;
use serde::Serialize;
use voxd_common::ActionResult;

/// 错误响应
///
/// 错误统一渲染为 `success: false` 的 `ActionResult`，
/// 重试和请求 ID 信息放在响应头中。
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    #[serde(flatten)]
    pub body: ActionResult<()>,
    #[serde(skip)]
    pub status: u16,
    #[serde(skip)]
    pub request_id: Option<String>,
}

impl ErrorResponse {
    /// 从 VoxdError 创建错误响应
    pub fn from_error(error: &VoxdError) -> Self {
        let body = match error {
            VoxdError::Validation { message, field_errors } => {
                ActionResult::invalid(message.clone(), field_errors.clone())
            }
            _ => ActionResult::failure(error.error_code(), error.to_string()),
        };

        Self {
            body,
            status: error.status_code(),
            request_id: None,
        }
    }

    /// 设置请求 ID
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// 转换为 HTTP 响应
    pub fn into_http_response(self) -> HttpResponse {
        let mut response = HttpResponse::build(
            actix_web::http::StatusCode::from_u16(self.status)
                .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR),
        );

        if let Some(ref request_id) = self.request_id {
            response.insert_header(("X-Request-ID", request_id.clone()));
        }

        response.json(self.body)
    }
}

/// 请求体、查询参数、路径参数解析失败时的统一处理
pub fn json_error_handler(
    err: actix_web::error::JsonPayloadError,
    _req: &actix_web::HttpRequest,
) -> actix_web::Error {
    VoxdError::bad_request(format!("请求体无效: {}", err)).into()
}

pub fn query_error_handler(
    err: actix_web::error::QueryPayloadError,
    _req: &actix_web::HttpRequest,
) -> actix_web::Error {
    VoxdError::bad_request(format!("查询参数无效: {}", err)).into()
}

pub fn path_error_handler(
    err: actix_web::error::PathError,
    _req: &actix_web::HttpRequest,
) -> actix_web::Error {
    VoxdError::bad_request(format!("路径参数无效: {}", err)).into()
}
