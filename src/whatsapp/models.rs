// Graph API 数据模型

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// WABA 基本信息
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphWaba {
    pub id: String,
    pub name: Option<String>,
}

/// 电话号码
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphPhoneNumber {
    pub id: String,
    pub display_phone_number: String,
    pub verified_name: Option<String>,
    pub quality_rating: Option<String>,
    pub code_verification_status: Option<String>,
}

/// 消息模板
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphTemplate {
    pub id: String,
    pub name: String,
    pub language: String,
    pub category: String,
    pub status: String,
    #[serde(default)]
    pub components: Value,
    pub rejected_reason: Option<String>,
}

/// 创建模板的请求
#[derive(Debug, Clone, Serialize)]
pub struct CreateTemplateRequest {
    pub name: String,
    pub language: String,
    pub category: String,
    pub components: Value,
}

/// 创建模板的返回
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedTemplate {
    pub id: String,
    pub status: String,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Paging {
    pub next: Option<String>,
}

/// 列表响应
#[derive(Debug, Clone, Deserialize)]
pub struct GraphList<T> {
    pub data: Vec<T>,
    pub paging: Option<Paging>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphSuccess {
    #[serde(default)]
    pub success: bool,
}

/// Graph API 错误体
#[derive(Debug, Clone, Deserialize)]
pub struct GraphErrorBody {
    pub error: GraphError,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphError {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub code: Option<i64>,
    pub error_subcode: Option<i64>,
    pub error_user_msg: Option<String>,
    pub fbtrace_id: Option<String>,
}

impl GraphError {
    /// 面向用户的错误描述
    pub fn display_message(&self) -> String {
        let message = self.error_user_msg.as_deref().unwrap_or(&self.message);
        match self.code {
            Some(code) => format!("{} (code {})", message, code),
            None => message.to_string(),
        }
    }
}
