// 通用类型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// 表单字段错误：字段名 -> 错误消息列表
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// 统一操作结果
///
/// 所有接口都返回这一结构。失败时 `error` 给出可直接展示的消息，
/// 表单验证失败时 `fieldErrors` 按字段给出错误。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(rename = "fieldErrors", skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<FieldErrors>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ActionResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
            field_errors: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            code: Some(code.into()),
            field_errors: None,
            timestamp: Utc::now(),
        }
    }

    pub fn invalid(message: impl Into<String>, field_errors: FieldErrors) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            code: Some("VALIDATION_ERROR".to_string()),
            field_errors: if field_errors.is_empty() { None } else { Some(field_errors) },
            timestamp: Utc::now(),
        }
    }
}

impl ActionResult<()> {
    /// 无数据的成功结果
    pub fn done() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
            code: None,
            field_errors: None,
            timestamp: Utc::now(),
        }
    }
}

/// 默认每页条数
pub const DEFAULT_PAGE_SIZE: u64 = 20;
/// 每页条数上限
pub const MAX_PAGE_SIZE: u64 = 100;

/// 分页参数
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
    pub search: Option<String>,
}

impl PaginationParams {
    /// 页码，从 1 开始
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> u64 {
        (self.page() - 1) * self.page_size()
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order.unwrap_or_default()
    }

    /// 去掉首尾空白后的搜索词，空字符串视为未搜索
    pub fn search(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// 排序顺序
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// 分页响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, page_size: u64) -> Self {
        let page_size = page_size.max(1);
        let total_pages = total.div_ceil(page_size);
        Self {
            items,
            total,
            page,
            page_size,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResponse<U> {
        PaginatedResponse {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
            total_pages: self.total_pages,
            has_next: self.has_next,
            has_prev: self.has_prev,
        }
    }
}

/// 远程下拉选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SelectOption {
    pub value: Uuid,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: Uuid, label: impl Into<String>) -> Self {
        Self {
            value,
            label: label.into(),
        }
    }
}

/// 合作伙伴 ID 类型
pub type PartnerId = Uuid;

/// 组织 ID 类型
pub type OrganisationId = Uuid;

/// 管理员 ID 类型
pub type AdminId = Uuid;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults() {
        let params = PaginationParams::default();
        assert_eq!(params.page(), 1);
        assert_eq!(params.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(params.offset(), 0);
        assert_eq!(params.sort_order(), SortOrder::Desc);
        assert!(params.search().is_none());
    }

    #[test]
    fn test_pagination_clamps_values() {
        let params = PaginationParams {
            page: Some(0),
            page_size: Some(1000),
            search: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(params.page(), 1);
        assert_eq!(params.page_size(), MAX_PAGE_SIZE);
        assert!(params.search().is_none());

        let params = PaginationParams {
            page: Some(3),
            page_size: Some(25),
            search: Some("  acme ".to_string()),
            ..Default::default()
        };
        assert_eq!(params.offset(), 50);
        assert_eq!(params.search(), Some("acme"));
    }

    #[test]
    fn test_paginated_response_pages() {
        let response = PaginatedResponse::new(vec![1, 2, 3], 41, 2, 20);
        assert_eq!(response.total_pages, 3);
        assert!(response.has_next);
        assert!(response.has_prev);

        let empty: PaginatedResponse<i32> = PaginatedResponse::new(vec![], 0, 1, 20);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next);
        assert!(!empty.has_prev);
    }

    #[test]
    fn test_action_result_serialization() {
        let ok = serde_json::to_value(ActionResult::ok(5)).unwrap();
        assert_eq!(ok["success"], true);
        assert_eq!(ok["data"], 5);
        assert!(ok.get("error").is_none());
        assert!(ok.get("fieldErrors").is_none());

        let mut fields = FieldErrors::new();
        fields.insert("email".to_string(), vec!["邮箱格式无效".to_string()]);
        let invalid = serde_json::to_value(ActionResult::<()>::invalid("表单验证失败", fields)).unwrap();
        assert_eq!(invalid["success"], false);
        assert_eq!(invalid["code"], "VALIDATION_ERROR");
        assert_eq!(invalid["fieldErrors"]["email"][0], "邮箱格式无效");
    }

    #[test]
    fn test_sort_order_deserialize() {
        let order: SortOrder = serde_json::from_str("\"asc\"").unwrap();
        assert_eq!(order, SortOrder::Asc);
    }
}
