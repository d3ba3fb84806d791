// 表单验证辅助

use once_cell::sync::Lazy;
use regex::Regex;
use validator::{Validate, ValidationError};

use crate::errors::VoxdError;

/// 小写字母、数字和单个连字符
pub static SLUG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug 正则无效"));

/// WhatsApp 模板名
pub static TEMPLATE_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_]{1,512}$").expect("模板名正则无效"));

/// 6 位数字 PIN
pub static PIN_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{6}$").expect("PIN 正则无效"));

/// ISO 4217 货币代码
pub static CURRENCY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{3}$").expect("货币正则无效"));

/// 校验请求体，失败时返回带字段错误的验证错误
pub fn validate_request<T: Validate>(request: &T) -> Result<(), VoxdError> {
    request.validate().map_err(VoxdError::from)
}

/// 规范化电话号码为 `+` 加数字
///
/// 去掉空格、连字符、括号和点，`00` 前缀视为国际前缀。
pub fn normalize_phone(raw: &str) -> Result<String, VoxdError> {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect();

    let digits = if let Some(rest) = compact.strip_prefix('+') {
        rest
    } else if let Some(rest) = compact.strip_prefix("00") {
        rest
    } else {
        compact.as_str()
    };

    if !digits.chars().all(|c| c.is_ascii_digit()) || !(8..=15).contains(&digits.len()) {
        return Err(VoxdError::validation("phone_number", "电话号码必须包含 8-15 位数字"));
    }

    Ok(format!("+{}", digits))
}

/// validator 自定义校验：电话号码
pub fn validate_phone(value: &str) -> Result<(), ValidationError> {
    normalize_phone(value).map(|_| ()).map_err(|_| {
        let mut error = ValidationError::new("phone");
        error.message = Some("电话号码必须包含 8-15 位数字".into());
        error
    })
}

/// 由名称生成 slug
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;

    for c in name.chars().flat_map(|c| c.to_lowercase()) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }

    slug.trim_end_matches('-').to_string()
}

/// 去掉首尾空白，空字符串视为未填写
pub fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_regex() {
        assert!(SLUG_REGEX.is_match("acme-digital"));
        assert!(SLUG_REGEX.is_match("voxd2"));
        assert!(!SLUG_REGEX.is_match("Acme"));
        assert!(!SLUG_REGEX.is_match("acme--digital"));
        assert!(!SLUG_REGEX.is_match("-acme"));
        assert!(!SLUG_REGEX.is_match("acme_digital"));
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("+31 6 1234 5678").unwrap(), "+31612345678");
        assert_eq!(normalize_phone("0031 (6) 12-34-56-78").unwrap(), "+31612345678");
        assert_eq!(normalize_phone("31612345678").unwrap(), "+31612345678");

        let err = normalize_phone("12345").unwrap_err();
        assert_eq!(err.field_errors().unwrap()["phone_number"].len(), 1);
        assert!(normalize_phone("+31 6 abc 5678").is_err());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Bakkerij Jansen & Zn."), "bakkerij-jansen-zn");
        assert_eq!(slugify("  Voxd  "), "voxd");
        assert!(SLUG_REGEX.is_match(&slugify("Hello -- World!")));
    }

    #[test]
    fn test_other_patterns() {
        assert!(TEMPLATE_NAME_REGEX.is_match("order_update_2"));
        assert!(!TEMPLATE_NAME_REGEX.is_match("Order Update"));
        assert!(PIN_REGEX.is_match("123456"));
        assert!(!PIN_REGEX.is_match("12345a"));
        assert!(CURRENCY_REGEX.is_match("EUR"));
        assert!(!CURRENCY_REGEX.is_match("eur"));
        assert_eq!(clean_optional(Some("  ".to_string())), None);
    }
}
