// CSV 导出

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;

use crate::db::entities::{
    ChatUserModel, OrganisationModel, PartnerModel, QuoteModel, SupportTicketModel,
};

/// 单次导出的最大行数
pub const EXPORT_LIMIT: u64 = 10_000;

/// 可以导出为 CSV 行的记录
pub trait CsvRecord {
    fn headers() -> &'static [&'static str];
    fn row(&self) -> Vec<String>;
}

/// RFC 4180 写入器，行尾使用 CRLF
#[derive(Debug, Default)]
pub struct CsvWriter {
    buffer: String,
}

impl CsvWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_row<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for (i, field) in fields.into_iter().enumerate() {
            if i > 0 {
                self.buffer.push(',');
            }
            self.write_field(field.as_ref());
        }
        self.buffer.push_str("\r\n");
    }

    fn write_field(&mut self, field: &str) {
        if field.contains([',', '"', '\r', '\n']) {
            self.buffer.push('"');
            self.buffer.push_str(&field.replace('"', "\"\""));
            self.buffer.push('"');
        } else {
            self.buffer.push_str(field);
        }
    }

    pub fn into_string(self) -> String {
        self.buffer
    }
}

pub fn to_csv<T: CsvRecord>(records: &[T]) -> String {
    let mut writer = CsvWriter::new();
    writer.write_row(T::headers());
    for record in records {
        writer.write_row(record.row());
    }
    writer.into_string()
}

/// 形如 `partners-20260115.csv`
pub fn export_filename(resource: &str, date: NaiveDate) -> String {
    format!("{}-{}.csv", resource, date.format("%Y%m%d"))
}

fn timestamp(value: &DateTimeWithTimeZone) -> String {
    let utc: DateTime<Utc> = (*value).into();
    utc.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn optional_timestamp(value: &Option<DateTimeWithTimeZone>) -> String {
    value.as_ref().map(timestamp).unwrap_or_default()
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn uuid_text(value: &Option<uuid::Uuid>) -> String {
    value.map(|id| id.to_string()).unwrap_or_default()
}

/// 分转换为两位小数
pub fn format_cents(value: i64) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// serde 序列化得到的枚举字符串
fn label<T: serde::Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => String::new(),
    }
}

impl CsvRecord for PartnerModel {
    fn headers() -> &'static [&'static str] {
        &["id", "name", "slug", "email", "phone", "website", "commission_rate", "status", "created_at"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.name.clone(),
            self.slug.clone(),
            text(&self.email),
            text(&self.phone),
            text(&self.website),
            format!("{:.2}", self.commission_rate),
            label(&self.status),
            timestamp(&self.created_at),
        ]
    }
}

impl CsvRecord for OrganisationModel {
    fn headers() -> &'static [&'static str] {
        &[
            "id",
            "partner_id",
            "name",
            "slug",
            "contact_email",
            "contact_phone",
            "industry",
            "status",
            "timezone",
            "created_at",
        ]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            uuid_text(&self.partner_id),
            self.name.clone(),
            self.slug.clone(),
            text(&self.contact_email),
            text(&self.contact_phone),
            text(&self.industry),
            label(&self.status),
            self.timezone.clone(),
            timestamp(&self.created_at),
        ]
    }
}

impl CsvRecord for ChatUserModel {
    fn headers() -> &'static [&'static str] {
        &["id", "organisation_id", "phone_number", "name", "email", "language", "is_blocked", "last_seen_at", "created_at"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.organisation_id.to_string(),
            self.phone_number.clone(),
            text(&self.name),
            text(&self.email),
            text(&self.language),
            self.is_blocked.to_string(),
            optional_timestamp(&self.last_seen_at),
            timestamp(&self.created_at),
        ]
    }
}

impl CsvRecord for QuoteModel {
    fn headers() -> &'static [&'static str] {
        &[
            "quote_number",
            "title",
            "client_name",
            "client_email",
            "client_company",
            "currency",
            "subtotal",
            "discount",
            "tax",
            "total",
            "status",
            "valid_until",
            "sent_at",
            "responded_at",
            "created_at",
        ]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.quote_number.clone(),
            self.title.clone(),
            self.client_name.clone(),
            text(&self.client_email),
            text(&self.client_company),
            self.currency.clone(),
            format_cents(self.subtotal_cents),
            format_cents(self.discount_cents),
            format_cents(self.tax_cents),
            format_cents(self.total_cents),
            label(&self.status),
            optional_timestamp(&self.valid_until),
            optional_timestamp(&self.sent_at),
            optional_timestamp(&self.responded_at),
            timestamp(&self.created_at),
        ]
    }
}

impl CsvRecord for SupportTicketModel {
    fn headers() -> &'static [&'static str] {
        &[
            "ticket_number",
            "organisation_id",
            "subject",
            "status",
            "priority",
            "category",
            "assigned_to",
            "resolved_at",
            "closed_at",
            "created_at",
        ]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.ticket_number.clone(),
            self.organisation_id.to_string(),
            self.subject.clone(),
            label(&self.status),
            label(&self.priority),
            text(&self.category),
            uuid_text(&self.assigned_to),
            optional_timestamp(&self.resolved_at),
            optional_timestamp(&self.closed_at),
            timestamp(&self.created_at),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::entities::PartnerStatus;
    use chrono::TimeZone;
    use uuid::Uuid;

    #[test]
    fn test_field_quoting() {
        let mut writer = CsvWriter::new();
        writer.write_row(["plain", "with,comma", "say \"hi\"", "line\nbreak", ""]);
        assert_eq!(
            writer.into_string(),
            "plain,\"with,comma\",\"say \"\"hi\"\"\",\"line\nbreak\",\r\n"
        );
    }

    #[test]
    fn test_cents_formatting() {
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(123456), "1234.56");
        assert_eq!(format_cents(5), "0.05");
        assert_eq!(format_cents(-250), "-2.50");
    }

    #[test]
    fn test_export_filename() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        assert_eq!(export_filename("quotes", date), "quotes-20260105.csv");
    }

    #[test]
    fn test_partner_csv() {
        let created = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let partner = PartnerModel {
            id: Uuid::nil(),
            name: "Acme, Inc.".to_string(),
            slug: "acme".to_string(),
            email: Some("hello@acme.io".to_string()),
            phone: None,
            website: None,
            logo_url: None,
            commission_rate: 12.5,
            status: PartnerStatus::Active,
            notes: Some("internal".to_string()),
            created_at: created.into(),
            updated_at: created.into(),
        };

        let csv = to_csv(&[partner]);
        let lines: Vec<&str> = csv.split("\r\n").collect();
        assert_eq!(lines[0], "id,name,slug,email,phone,website,commission_rate,status,created_at");
        assert_eq!(
            lines[1],
            "00000000-0000-0000-0000-000000000000,\"Acme, Inc.\",acme,hello@acme.io,,,12.50,active,2026-03-01 09:30:00"
        );
        assert_eq!(lines[2], "");
    }
}
