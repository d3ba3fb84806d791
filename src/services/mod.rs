// 服务层模块
// 包含所有业务逻辑服务

pub mod access;
pub mod admin_user;
pub mod agent;
pub mod auth;
pub mod chat_user;
pub mod conversation;
pub mod dashboard;
pub mod document;
pub mod example;
pub mod export;
pub mod mention;
pub mod options;
pub mod organisation;
pub mod partner;
pub mod query;
pub mod quote;
pub mod support_ticket;
pub mod upload;
pub mod validation;
pub mod waba;

pub use access::{AccessScope, CurrentAdmin};

use serde::{Deserialize, Deserializer};

/// 区分“未提供”和“显式置空”的可空字段
///
/// 配合 `#[serde(default)]`：缺省为 `None`，`null` 为 `Some(None)`。
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        value: Option<Option<Uuid>>,
    }

    #[test]
    fn test_double_option_distinguishes_null() {
        let missing: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.value, None);

        let cleared: Patch = serde_json::from_str(r#"{"value": null}"#).unwrap();
        assert_eq!(cleared.value, Some(None));

        let id = Uuid::new_v4();
        let set: Patch = serde_json::from_str(&format!(r#"{{"value": "{}"}}"#, id)).unwrap();
        assert_eq!(set.value, Some(Some(id)));
    }
}
