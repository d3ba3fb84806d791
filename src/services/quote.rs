// 报价单服务
// 金额计算、状态流转、AI 文案和客户公开页面

use std::sync::Arc;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::distributions::Uniform;
use rand::{Rng, RngCore};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, QuerySelect, Select, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;
use voxd_common::{PaginatedResponse, PaginationParams};

use crate::ai::prompts::{quote_concept_prompt, quote_pitch_prompt, QuoteBrief, QUOTE_WRITER_SYSTEM};
use crate::ai::AiClientManager;
use crate::db::entities::{quote, Quote, QuoteModel, QuoteStatus};
use crate::errors::VoxdError;
use crate::services::access::CurrentAdmin;
use crate::services::export::{format_cents, EXPORT_LIMIT};
use crate::services::query::{fetch_page, ilike, order_of};
use crate::services::validation::{clean_optional, validate_request, CURRENCY_REGEX};

const NUMBER_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const NUMBER_ATTEMPTS: usize = 5;

/// 报价明细
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct LineItem {
    #[validate(length(min = 1, max = 500, message = "明细描述长度必须在 1-500 之间"))]
    pub description: String,
    #[validate(range(min = 1, max = 1000000, message = "数量必须在 1-1000000 之间"))]
    pub quantity: i64,
    #[validate(range(min = 0, message = "单价不能为负数"))]
    pub unit_price_cents: i64,
}

impl LineItem {
    pub fn amount_cents(&self) -> Option<i64> {
        self.quantity.checked_mul(self.unit_price_cents)
    }
}

/// 服务端计算的金额
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteTotals {
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

/// 计算小计、税额和总额
///
/// 税额对折后金额四舍五入到分。
pub fn compute_totals(
    items: &[LineItem],
    discount_cents: i64,
    tax_rate_bps: i32,
) -> Result<QuoteTotals, VoxdError> {
    let overflow = || VoxdError::validation("line_items", "金额超出范围");

    let mut subtotal: i64 = 0;
    for item in items {
        subtotal = subtotal
            .checked_add(item.amount_cents().ok_or_else(overflow)?)
            .ok_or_else(overflow)?;
    }

    if discount_cents < 0 {
        return Err(VoxdError::validation("discount_cents", "折扣不能为负数"));
    }
    if discount_cents > subtotal {
        return Err(VoxdError::validation("discount_cents", "折扣不能超过小计"));
    }
    if !(0..=10_000).contains(&tax_rate_bps) {
        return Err(VoxdError::validation("tax_rate_bps", "税率必须在 0-10000 之间"));
    }

    let taxable = subtotal - discount_cents;
    let tax = taxable
        .checked_mul(tax_rate_bps as i64)
        .map(|v| (v + 5_000) / 10_000)
        .ok_or_else(overflow)?;

    Ok(QuoteTotals {
        subtotal_cents: subtotal,
        discount_cents,
        tax_cents: tax,
        total_cents: taxable + tax,
    })
}

/// 形如 `Q-202601-4F7K2Q`，去掉了易混淆字符
pub fn generate_quote_number(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let dist = Uniform::from(0..NUMBER_ALPHABET.len());
    let suffix: String = (0..6)
        .map(|_| NUMBER_ALPHABET[rng.sample(dist)] as char)
        .collect();
    format!("Q-{}-{}", now.format("%Y%m"), suffix)
}

/// 32 个 URL 安全字符
pub fn generate_public_token() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// 按有效期推导的实际状态
///
/// 已发送但未答复的报价超过有效期即视为过期，草稿不会过期。
pub fn effective_status(quote: &QuoteModel, now: DateTime<Utc>) -> QuoteStatus {
    match quote.status {
        QuoteStatus::Sent | QuoteStatus::Viewed => match quote.valid_until {
            Some(valid_until) if DateTime::<Utc>::from(valid_until) < now => QuoteStatus::Expired,
            _ => quote.status,
        },
        status => status,
    }
}

pub fn parse_line_items(value: &Value) -> Vec<LineItem> {
    serde_json::from_value(value.clone()).unwrap_or_default()
}

fn line_items_json(items: &[LineItem]) -> Result<Value, VoxdError> {
    serde_json::to_value(items).map_err(|e| VoxdError::internal(format!("明细序列化失败: {}", e)))
}

fn validate_items(items: &[LineItem]) -> Result<(), VoxdError> {
    for item in items {
        validate_request(item)?;
    }
    Ok(())
}

/// 客户答复前的检查
fn ensure_can_respond(quote: &QuoteModel, now: DateTime<Utc>) -> Result<(), VoxdError> {
    match effective_status(quote, now) {
        QuoteStatus::Draft => Err(VoxdError::not_found("报价单")),
        QuoteStatus::Expired => Err(VoxdError::conflict("报价单已过期")),
        status if status.is_decided() => Err(VoxdError::conflict("报价单已经答复过")),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateQuoteRequest {
    /// 合作伙伴管理员创建时忽略
    pub partner_id: Option<Uuid>,
    pub organisation_id: Option<Uuid>,
    #[validate(length(min = 1, max = 255, message = "标题长度必须在 1-255 之间"))]
    pub title: String,
    #[validate(length(min = 1, max = 255, message = "客户名称长度必须在 1-255 之间"))]
    pub client_name: String,
    #[validate(email(message = "邮箱格式无效"))]
    pub client_email: Option<String>,
    #[validate(length(max = 255))]
    pub client_company: Option<String>,
    #[validate(regex(path = "CURRENCY_REGEX", message = "货币代码必须是 3 位大写字母"))]
    pub currency: Option<String>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub discount_cents: i64,
    #[serde(default)]
    pub tax_rate_bps: i32,
    pub valid_until: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub terms: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateQuoteRequest {
    pub organisation_id: Option<Uuid>,
    #[validate(length(min = 1, max = 255, message = "标题长度必须在 1-255 之间"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 255, message = "客户名称长度必须在 1-255 之间"))]
    pub client_name: Option<String>,
    #[validate(email(message = "邮箱格式无效"))]
    pub client_email: Option<String>,
    #[validate(length(max = 255))]
    pub client_company: Option<String>,
    #[validate(regex(path = "CURRENCY_REGEX", message = "货币代码必须是 3 位大写字母"))]
    pub currency: Option<String>,
    pub line_items: Option<Vec<LineItem>>,
    pub discount_cents: Option<i64>,
    pub tax_rate_bps: Option<i32>,
    pub valid_until: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub terms: Option<String>,
}

impl UpdateQuoteRequest {
    fn touches_pricing(&self) -> bool {
        self.line_items.is_some()
            || self.discount_cents.is_some()
            || self.tax_rate_bps.is_some()
            || self.currency.is_some()
    }
}

/// 客户答复
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct QuoteResponseRequest {
    #[validate(length(max = 2000, message = "备注不能超过 2000 字"))]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct QuoteFilter {
    pub status: Option<QuoteStatus>,
    pub organisation_id: Option<Uuid>,
    pub partner_id: Option<Uuid>,
}

/// 后台返回的报价单
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuoteResponse {
    pub id: Uuid,
    pub partner_id: Option<Uuid>,
    pub organisation_id: Option<Uuid>,
    pub quote_number: String,
    pub public_token: String,
    pub title: String,
    pub client_name: String,
    pub client_email: Option<String>,
    pub client_company: Option<String>,
    pub currency: String,
    pub line_items: Vec<LineItem>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_rate_bps: i32,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub status: QuoteStatus,
    pub valid_until: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub pitch: Option<String>,
    pub concept: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub viewed_at: Option<DateTime<Utc>>,
    pub responded_at: Option<DateTime<Utc>>,
    pub response_note: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QuoteResponse {
    pub fn from_model(model: QuoteModel, now: DateTime<Utc>) -> Self {
        let status = effective_status(&model, now);
        Self {
            id: model.id,
            partner_id: model.partner_id,
            organisation_id: model.organisation_id,
            line_items: parse_line_items(&model.line_items),
            quote_number: model.quote_number,
            public_token: model.public_token,
            title: model.title,
            client_name: model.client_name,
            client_email: model.client_email,
            client_company: model.client_company,
            currency: model.currency,
            subtotal_cents: model.subtotal_cents,
            discount_cents: model.discount_cents,
            tax_rate_bps: model.tax_rate_bps,
            tax_cents: model.tax_cents,
            total_cents: model.total_cents,
            status,
            valid_until: model.valid_until.map(Into::into),
            notes: model.notes,
            terms: model.terms,
            pitch: model.pitch,
            concept: model.concept,
            sent_at: model.sent_at.map(Into::into),
            viewed_at: model.viewed_at.map(Into::into),
            responded_at: model.responded_at.map(Into::into),
            response_note: model.response_note,
            created_by: model.created_by,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

/// 客户公开页面看到的报价单，不含内部 ID 和备注
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublicQuoteView {
    pub quote_number: String,
    pub title: String,
    pub client_name: String,
    pub client_company: Option<String>,
    pub currency: String,
    pub line_items: Vec<LineItem>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_rate_bps: i32,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub status: QuoteStatus,
    pub valid_until: Option<DateTime<Utc>>,
    pub pitch: Option<String>,
    pub concept: Option<String>,
    pub terms: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl PublicQuoteView {
    pub fn from_model(model: QuoteModel, now: DateTime<Utc>) -> Self {
        let status = effective_status(&model, now);
        Self {
            line_items: parse_line_items(&model.line_items),
            quote_number: model.quote_number,
            title: model.title,
            client_name: model.client_name,
            client_company: model.client_company,
            currency: model.currency,
            subtotal_cents: model.subtotal_cents,
            discount_cents: model.discount_cents,
            tax_rate_bps: model.tax_rate_bps,
            tax_cents: model.tax_cents,
            total_cents: model.total_cents,
            status,
            valid_until: model.valid_until.map(Into::into),
            pitch: model.pitch,
            concept: model.concept,
            terms: model.terms,
            sent_at: model.sent_at.map(Into::into),
            responded_at: model.responded_at.map(Into::into),
        }
    }
}

/// AI 文案类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteCopy {
    Pitch,
    Concept,
}

pub struct QuoteService {
    db: Arc<DatabaseConnection>,
    ai: AiClientManager,
}

impl QuoteService {
    pub fn new(db: Arc<DatabaseConnection>, ai: AiClientManager) -> Self {
        Self { db, ai }
    }

    fn scoped_query(&self, current: &CurrentAdmin, filter: &QuoteFilter, search: Option<&str>) -> Select<Quote> {
        let mut query = Quote::find().filter(current.scope.partner_condition(quote::Column::PartnerId));

        if let Some(status) = filter.status {
            query = query.filter(quote::Column::Status.eq(status));
        }
        if let Some(organisation_id) = filter.organisation_id {
            query = query.filter(quote::Column::OrganisationId.eq(organisation_id));
        }
        if let Some(partner_id) = filter.partner_id {
            query = query.filter(quote::Column::PartnerId.eq(partner_id));
        }
        if let Some(term) = search {
            query = query.filter(
                Condition::any()
                    .add(ilike(quote::Column::QuoteNumber, term))
                    .add(ilike(quote::Column::Title, term))
                    .add(ilike(quote::Column::ClientName, term))
                    .add(ilike(quote::Column::ClientCompany, term)),
            );
        }
        query
    }

    /// 将超过有效期的已发送报价标记为过期
    pub async fn expire_overdue(&self) -> Result<u64, VoxdError> {
        let now = Utc::now();
        let result = Quote::update_many()
            .col_expr(quote::Column::Status, Expr::value(QuoteStatus::Expired))
            .col_expr(quote::Column::UpdatedAt, Expr::value(now))
            .filter(quote::Column::Status.is_in([QuoteStatus::Sent, QuoteStatus::Viewed]))
            .filter(quote::Column::ValidUntil.lt(now))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected > 0 {
            info!(count = result.rows_affected, "报价单已过期");
        }
        Ok(result.rows_affected)
    }

    #[instrument(skip(self, current, params, filter))]
    pub async fn list(
        &self,
        current: &CurrentAdmin,
        params: &PaginationParams,
        filter: &QuoteFilter,
    ) -> Result<PaginatedResponse<QuoteResponse>, VoxdError> {
        self.expire_overdue().await?;

        let column = match params.sort_by.as_deref() {
            Some("quote_number") => quote::Column::QuoteNumber,
            Some("client_name") => quote::Column::ClientName,
            Some("total") => quote::Column::TotalCents,
            Some("valid_until") => quote::Column::ValidUntil,
            Some("updated_at") => quote::Column::UpdatedAt,
            _ => quote::Column::CreatedAt,
        };
        let query = self
            .scoped_query(current, filter, params.search())
            .order_by(column, order_of(params));

        let now = Utc::now();
        Ok(fetch_page(self.db.as_ref(), query, params)
            .await?
            .map(|model| QuoteResponse::from_model(model, now)))
    }

    async fn find(&self, current: &CurrentAdmin, id: Uuid) -> Result<QuoteModel, VoxdError> {
        let found = Quote::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| VoxdError::not_found("报价单"))?;

        current.scope.ensure_partner(found.partner_id, "报价单")?;
        Ok(found)
    }

    pub async fn get(&self, current: &CurrentAdmin, id: Uuid) -> Result<QuoteResponse, VoxdError> {
        Ok(QuoteResponse::from_model(self.find(current, id).await?, Utc::now()))
    }

    /// 确定报价单的合作伙伴归属
    ///
    /// 关联组织时合作伙伴必须与组织一致。
    async fn resolve_owner(
        &self,
        current: &CurrentAdmin,
        requested_partner: Option<Uuid>,
        organisation_id: Option<Uuid>,
    ) -> Result<Option<Uuid>, VoxdError> {
        let partner_id = current.scope.partner_id().or(requested_partner);

        if let Some(organisation_id) = organisation_id {
            let organisation = current.scope.ensure_organisation(self.db.as_ref(), organisation_id).await?;
            return match (partner_id, organisation.partner_id) {
                (Some(a), Some(b)) if a != b => Err(VoxdError::validation(
                    "organisation_id",
                    "组织不属于该合作伙伴",
                )),
                (Some(a), _) => Ok(Some(a)),
                (None, b) => Ok(b),
            };
        }
        Ok(partner_id)
    }

    async fn unique_quote_number(&self) -> Result<String, VoxdError> {
        for _ in 0..NUMBER_ATTEMPTS {
            let candidate = generate_quote_number(Utc::now());
            let taken = Quote::find()
                .filter(quote::Column::QuoteNumber.eq(candidate.as_str()))
                .one(self.db.as_ref())
                .await?
                .is_some();
            if !taken {
                return Ok(candidate);
            }
        }
        Err(VoxdError::internal("无法生成唯一的报价单号"))
    }

    #[instrument(skip(self, current, request), fields(title = %request.title))]
    pub async fn create(
        &self,
        current: &CurrentAdmin,
        request: CreateQuoteRequest,
    ) -> Result<QuoteResponse, VoxdError> {
        validate_request(&request)?;
        validate_items(&request.line_items)?;
        let totals = compute_totals(&request.line_items, request.discount_cents, request.tax_rate_bps)?;
        let partner_id = self
            .resolve_owner(current, request.partner_id, request.organisation_id)
            .await?;
        let quote_number = self.unique_quote_number().await?;

        let now = Utc::now();
        let model = quote::ActiveModel {
            id: Set(Uuid::new_v4()),
            partner_id: Set(partner_id),
            organisation_id: Set(request.organisation_id),
            quote_number: Set(quote_number),
            public_token: Set(generate_public_token()),
            title: Set(request.title.trim().to_string()),
            client_name: Set(request.client_name.trim().to_string()),
            client_email: Set(clean_optional(request.client_email).map(|e| e.to_lowercase())),
            client_company: Set(clean_optional(request.client_company)),
            currency: Set(clean_optional(request.currency).unwrap_or_else(|| "EUR".to_string())),
            line_items: Set(line_items_json(&request.line_items)?),
            subtotal_cents: Set(totals.subtotal_cents),
            discount_cents: Set(totals.discount_cents),
            tax_rate_bps: Set(request.tax_rate_bps),
            tax_cents: Set(totals.tax_cents),
            total_cents: Set(totals.total_cents),
            status: Set(QuoteStatus::Draft),
            valid_until: Set(request.valid_until.map(Into::into)),
            notes: Set(clean_optional(request.notes)),
            terms: Set(clean_optional(request.terms)),
            pitch: Set(None),
            concept: Set(None),
            sent_at: Set(None),
            viewed_at: Set(None),
            responded_at: Set(None),
            response_note: Set(None),
            created_by: Set(Some(current.id)),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let created = model.insert(self.db.as_ref()).await?;
        info!(quote_id = %created.id, quote_number = %created.quote_number, "报价单创建成功");
        Ok(QuoteResponse::from_model(created, now))
    }

    /// 更新报价单，价格相关字段只能在草稿状态修改
    #[instrument(skip(self, current, request))]
    pub async fn update(
        &self,
        current: &CurrentAdmin,
        id: Uuid,
        request: UpdateQuoteRequest,
    ) -> Result<QuoteResponse, VoxdError> {
        validate_request(&request)?;
        let existing = self.find(current, id).await?;
        let now = Utc::now();
        let status = effective_status(&existing, now);

        if status.is_decided() {
            return Err(VoxdError::conflict("客户已答复的报价单不能修改"));
        }
        if request.touches_pricing() && existing.status != QuoteStatus::Draft {
            return Err(VoxdError::conflict("只有草稿状态的报价单可以修改明细和价格"));
        }

        let organisation_id = match request.organisation_id {
            Some(organisation_id) => {
                let owner = self
                    .resolve_owner(current, existing.partner_id, Some(organisation_id))
                    .await?;
                if owner != existing.partner_id && !current.is_staff() {
                    return Err(VoxdError::authorization("不能将报价单转移到其他合作伙伴"));
                }
                Some((organisation_id, owner))
            }
            None => None,
        };

        let items = match request.line_items {
            Some(ref items) => {
                validate_items(items)?;
                items.clone()
            }
            None => parse_line_items(&existing.line_items),
        };
        let discount = request.discount_cents.unwrap_or(existing.discount_cents);
        let tax_rate = request.tax_rate_bps.unwrap_or(existing.tax_rate_bps);
        let totals = compute_totals(&items, discount, tax_rate)?;

        let mut model = existing.into_active_model();
        if let Some((organisation_id, owner)) = organisation_id {
            model.organisation_id = Set(Some(organisation_id));
            model.partner_id = Set(owner);
        }
        if let Some(title) = request.title {
            model.title = Set(title.trim().to_string());
        }
        if let Some(client_name) = request.client_name {
            model.client_name = Set(client_name.trim().to_string());
        }
        if request.client_email.is_some() {
            model.client_email = Set(clean_optional(request.client_email).map(|e| e.to_lowercase()));
        }
        if request.client_company.is_some() {
            model.client_company = Set(clean_optional(request.client_company));
        }
        if let Some(currency) = clean_optional(request.currency) {
            model.currency = Set(currency);
        }
        if request.line_items.is_some() {
            model.line_items = Set(line_items_json(&items)?);
        }
        model.subtotal_cents = Set(totals.subtotal_cents);
        model.discount_cents = Set(totals.discount_cents);
        model.tax_rate_bps = Set(tax_rate);
        model.tax_cents = Set(totals.tax_cents);
        model.total_cents = Set(totals.total_cents);
        if let Some(valid_until) = request.valid_until {
            model.valid_until = Set(Some(valid_until.into()));
            // 延长有效期后过期的报价恢复为已发送
            if status == QuoteStatus::Expired && valid_until > now {
                model.status = Set(QuoteStatus::Sent);
            }
        }
        if request.notes.is_some() {
            model.notes = Set(clean_optional(request.notes));
        }
        if request.terms.is_some() {
            model.terms = Set(clean_optional(request.terms));
        }
        model.updated_at = Set(now.into());

        Ok(QuoteResponse::from_model(model.update(self.db.as_ref()).await?, now))
    }

    pub async fn delete(&self, current: &CurrentAdmin, id: Uuid) -> Result<(), VoxdError> {
        let existing = self.find(current, id).await?;
        Quote::delete_by_id(existing.id).exec(self.db.as_ref()).await?;
        info!(quote_id = %id, "报价单已删除");
        Ok(())
    }

    /// 草稿 → 已发送
    #[instrument(skip(self, current))]
    pub async fn send(&self, current: &CurrentAdmin, id: Uuid) -> Result<QuoteResponse, VoxdError> {
        let existing = self.find(current, id).await?;
        let now = Utc::now();

        if existing.status != QuoteStatus::Draft {
            return Err(VoxdError::conflict("只有草稿状态的报价单可以发送"));
        }
        if parse_line_items(&existing.line_items).is_empty() {
            return Err(VoxdError::validation("line_items", "报价单至少需要一项明细"));
        }
        if let Some(valid_until) = existing.valid_until {
            if DateTime::<Utc>::from(valid_until) < now {
                return Err(VoxdError::validation("valid_until", "有效期已过，请先修改有效期"));
            }
        }

        let mut model = existing.into_active_model();
        model.status = Set(QuoteStatus::Sent);
        model.sent_at = Set(Some(now.into()));
        model.updated_at = Set(now.into());

        let updated = model.update(self.db.as_ref()).await?;
        info!(quote_id = %id, quote_number = %updated.quote_number, "报价单已发送");
        Ok(QuoteResponse::from_model(updated, now))
    }

    fn brief(quote: &QuoteModel) -> QuoteBrief<'_> {
        let line_items = parse_line_items(&quote.line_items)
            .into_iter()
            .map(|item| {
                format!(
                    "{} x {} ({} {})",
                    item.quantity,
                    item.description,
                    quote.currency,
                    format_cents(item.unit_price_cents)
                )
            })
            .collect();

        QuoteBrief {
            title: &quote.title,
            client_name: &quote.client_name,
            client_company: quote.client_company.as_deref(),
            line_items,
            total: format!("{} {}", quote.currency, format_cents(quote.total_cents)),
        }
    }

    /// 生成销售说辞或方案构想并保存
    #[instrument(skip(self, current))]
    pub async fn generate_copy(
        &self,
        current: &CurrentAdmin,
        id: Uuid,
        kind: QuoteCopy,
    ) -> Result<QuoteResponse, VoxdError> {
        let existing = self.find(current, id).await?;

        let prompt = {
            let brief = Self::brief(&existing);
            match kind {
                QuoteCopy::Pitch => quote_pitch_prompt(&brief),
                QuoteCopy::Concept => quote_concept_prompt(&brief),
            }
        };
        let text = self.ai.generate_text(QUOTE_WRITER_SYSTEM, &prompt).await?;
        let text = text.trim().to_string();

        let now = Utc::now();
        let mut model = existing.into_active_model();
        match kind {
            QuoteCopy::Pitch => model.pitch = Set(Some(text)),
            QuoteCopy::Concept => model.concept = Set(Some(text)),
        }
        model.updated_at = Set(now.into());

        let updated = model.update(self.db.as_ref()).await?;
        info!(quote_id = %id, kind = ?kind, "报价单文案已生成");
        Ok(QuoteResponse::from_model(updated, now))
    }

    pub async fn export(
        &self,
        current: &CurrentAdmin,
        filter: &QuoteFilter,
        search: Option<&str>,
    ) -> Result<Vec<QuoteModel>, VoxdError> {
        self.expire_overdue().await?;
        Ok(self
            .scoped_query(current, filter, search)
            .order_by_desc(quote::Column::CreatedAt)
            .limit(EXPORT_LIMIT)
            .all(self.db.as_ref())
            .await?)
    }

    async fn find_public(&self, token: &str) -> Result<QuoteModel, VoxdError> {
        // 草稿对客户不可见
        Quote::find()
            .filter(quote::Column::PublicToken.eq(token))
            .filter(quote::Column::Status.ne(QuoteStatus::Draft))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| VoxdError::not_found("报价单"))
    }

    /// 客户查看报价单，首次查看时记录
    #[instrument(skip(self, token))]
    pub async fn public_view(&self, token: &str) -> Result<PublicQuoteView, VoxdError> {
        let found = self.find_public(token).await?;
        let now = Utc::now();

        if found.viewed_at.is_some() && effective_status(&found, now) == found.status {
            return Ok(PublicQuoteView::from_model(found, now));
        }

        let status = effective_status(&found, now);
        let first_view = found.viewed_at.is_none();
        let mut model = found.into_active_model();
        if first_view {
            model.viewed_at = Set(Some(now.into()));
        }
        model.status = Set(match status {
            QuoteStatus::Sent => QuoteStatus::Viewed,
            other => other,
        });
        model.updated_at = Set(now.into());

        let updated = model.update(self.db.as_ref()).await?;
        if first_view {
            info!(quote_number = %updated.quote_number, "客户首次查看报价单");
        }
        Ok(PublicQuoteView::from_model(updated, now))
    }

    /// 客户接受或拒绝，只能答复一次
    #[instrument(skip(self, token, request))]
    pub async fn respond(
        &self,
        token: &str,
        accept: bool,
        request: QuoteResponseRequest,
    ) -> Result<PublicQuoteView, VoxdError> {
        validate_request(&request)?;
        let found = self.find_public(token).await?;
        let now = Utc::now();

        if let Err(e) = ensure_can_respond(&found, now) {
            if effective_status(&found, now) == QuoteStatus::Expired && found.status != QuoteStatus::Expired {
                let mut model = found.into_active_model();
                model.status = Set(QuoteStatus::Expired);
                model.updated_at = Set(now.into());
                if let Err(update_error) = model.update(self.db.as_ref()).await {
                    warn!(error = %update_error, "标记报价单过期失败");
                }
            }
            return Err(e);
        }

        // 带状态条件的更新，并发答复只有一个能成功
        let status = if accept { QuoteStatus::Accepted } else { QuoteStatus::Declined };
        let note = clean_optional(request.note);
        let result = Quote::update_many()
            .col_expr(quote::Column::Status, Expr::value(status))
            .col_expr(quote::Column::RespondedAt, Expr::value(now))
            .col_expr(quote::Column::ResponseNote, Expr::value(note.clone()))
            .col_expr(quote::Column::UpdatedAt, Expr::value(now))
            .filter(quote::Column::Id.eq(found.id))
            .filter(quote::Column::Status.is_in([QuoteStatus::Sent, QuoteStatus::Viewed]))
            .filter(
                Condition::any()
                    .add(quote::Column::ValidUntil.is_null())
                    .add(quote::Column::ValidUntil.gte(now)),
            )
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Err(VoxdError::conflict("报价单已经答复过"));
        }

        let updated = QuoteModel {
            status,
            responded_at: Some(now.into()),
            response_note: note,
            updated_at: now.into(),
            ..found
        };
        info!(quote_number = %updated.quote_number, accepted = accept, "客户已答复报价单");
        Ok(PublicQuoteView::from_model(updated, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockAiClient;
    use crate::config::{AiConfig, AppConfig};
    use crate::db::entities::AdminRole;
    use chrono::Duration;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn item(description: &str, quantity: i64, unit_price_cents: i64) -> LineItem {
        LineItem {
            description: description.to_string(),
            quantity,
            unit_price_cents,
        }
    }

    fn quote_model(status: QuoteStatus, partner_id: Option<Uuid>) -> QuoteModel {
        let items = vec![item("Chatbot setup", 1, 49_900), item("Monthly hosting", 12, 2_500)];
        QuoteModel {
            id: Uuid::new_v4(),
            partner_id,
            organisation_id: None,
            quote_number: "Q-202601-ABC234".to_string(),
            public_token: generate_public_token(),
            title: "WhatsApp assistant".to_string(),
            client_name: "Eva de Vries".to_string(),
            client_email: None,
            client_company: Some("Bakkerij Jansen".to_string()),
            currency: "EUR".to_string(),
            line_items: serde_json::to_value(&items).unwrap(),
            subtotal_cents: 79_900,
            discount_cents: 0,
            tax_rate_bps: 2_100,
            tax_cents: 16_779,
            total_cents: 96_679,
            status,
            valid_until: None,
            notes: Some("internal margin 40%".to_string()),
            terms: None,
            pitch: None,
            concept: None,
            sent_at: None,
            viewed_at: None,
            responded_at: None,
            response_note: None,
            created_by: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn service(db: Arc<DatabaseConnection>) -> QuoteService {
        let config = AiConfig {
            retry_attempts: 1,
            timeout: 5,
            ..AppConfig::default().ai
        };
        QuoteService::new(db, AiClientManager::with_client(config, Arc::new(MockAiClient::new())))
    }

    #[test]
    fn test_compute_totals() {
        let items = vec![item("Setup", 1, 49_900), item("Hosting", 12, 2_500)];
        let totals = compute_totals(&items, 9_900, 2_100).unwrap();
        assert_eq!(totals.subtotal_cents, 79_900);
        assert_eq!(totals.discount_cents, 9_900);
        // (79900 - 9900) * 0.21 = 14700
        assert_eq!(totals.tax_cents, 14_700);
        assert_eq!(totals.total_cents, 84_700);
    }

    #[test]
    fn test_tax_rounds_half_up() {
        // 1001 * 0.05 = 50.05
        let totals = compute_totals(&[item("x", 1, 1_001)], 0, 500).unwrap();
        assert_eq!(totals.tax_cents, 50);
        // 1010 * 0.05 = 50.5
        let totals = compute_totals(&[item("x", 1, 1_010)], 0, 500).unwrap();
        assert_eq!(totals.tax_cents, 51);
    }

    #[test]
    fn test_discount_limits() {
        let items = vec![item("Setup", 1, 1_000)];
        let err = compute_totals(&items, 1_001, 0).unwrap_err();
        assert!(err.field_errors().unwrap().contains_key("discount_cents"));
        assert!(compute_totals(&items, -1, 0).is_err());
        assert!(compute_totals(&items, 0, 10_001).is_err());
        assert!(compute_totals(&[item("x", i64::MAX, 2)], 0, 0).is_err());
    }

    #[test]
    fn test_quote_number_and_token_format() {
        let now = Utc::now();
        let number = generate_quote_number(now);
        assert_eq!(number.len(), 15);
        assert!(number.starts_with(&format!("Q-{}-", now.format("%Y%m"))));
        assert!(number[9..].bytes().all(|b| NUMBER_ALPHABET.contains(&b)));

        let token = generate_public_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(token, generate_public_token());
    }

    #[test]
    fn test_effective_status() {
        let now = Utc::now();
        let mut quote = quote_model(QuoteStatus::Sent, None);
        assert_eq!(effective_status(&quote, now), QuoteStatus::Sent);

        quote.valid_until = Some((now - Duration::days(1)).into());
        assert_eq!(effective_status(&quote, now), QuoteStatus::Expired);

        quote.status = QuoteStatus::Draft;
        assert_eq!(effective_status(&quote, now), QuoteStatus::Draft);

        quote.status = QuoteStatus::Accepted;
        assert_eq!(effective_status(&quote, now), QuoteStatus::Accepted);
    }

    #[test]
    fn test_respond_guards() {
        let now = Utc::now();
        assert!(ensure_can_respond(&quote_model(QuoteStatus::Sent, None), now).is_ok());
        assert!(ensure_can_respond(&quote_model(QuoteStatus::Viewed, None), now).is_ok());
        assert_eq!(
            ensure_can_respond(&quote_model(QuoteStatus::Accepted, None), now).unwrap_err().status_code(),
            409
        );

        let mut expired = quote_model(QuoteStatus::Viewed, None);
        expired.valid_until = Some((now - Duration::hours(1)).into());
        assert_eq!(ensure_can_respond(&expired, now).unwrap_err().status_code(), 409);
    }

    #[test]
    fn test_public_view_hides_internal_fields() {
        let view = PublicQuoteView::from_model(quote_model(QuoteStatus::Sent, Some(Uuid::new_v4())), Utc::now());
        let value = serde_json::to_value(&view).unwrap();
        assert!(value.get("notes").is_none());
        assert!(value.get("id").is_none());
        assert!(value.get("partner_id").is_none());
        assert_eq!(value["line_items"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_send_moves_draft_to_sent() {
        let draft = quote_model(QuoteStatus::Draft, None);
        let mut sent = draft.clone();
        sent.status = QuoteStatus::Sent;
        sent.sent_at = Some(Utc::now().into());
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![draft.clone()]])
            .append_query_results([vec![sent]])
            .into_connection());
        let staff = CurrentAdmin::new(Uuid::new_v4(), "ops@voxd.io", AdminRole::Admin, None).unwrap();

        let response = service(db).send(&staff, draft.id).await.unwrap();
        assert_eq!(response.status, QuoteStatus::Sent);
        assert!(response.sent_at.is_some());
    }

    #[tokio::test]
    async fn test_pricing_locked_after_send() {
        let sent = quote_model(QuoteStatus::Sent, None);
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sent.clone()]])
            .into_connection());
        let staff = CurrentAdmin::new(Uuid::new_v4(), "ops@voxd.io", AdminRole::Admin, None).unwrap();

        let err = service(db)
            .update(
                &staff,
                sent.id,
                UpdateQuoteRequest {
                    line_items: Some(vec![item("Setup", 1, 100)]),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 409);
    }

    #[tokio::test]
    async fn test_foreign_partner_quote_not_found() {
        let quote = quote_model(QuoteStatus::Draft, Some(Uuid::new_v4()));
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![quote.clone()]])
            .into_connection());
        let partner = CurrentAdmin::new(Uuid::new_v4(), "p@acme.io", AdminRole::Partner, Some(Uuid::new_v4())).unwrap();

        assert_eq!(service(db).get(&partner, quote.id).await.unwrap_err().status_code(), 404);
    }

    #[tokio::test]
    async fn test_generate_pitch_persists_text() {
        let quote = quote_model(QuoteStatus::Draft, None);
        let mut updated = quote.clone();
        updated.pitch = Some("generated".to_string());
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![quote.clone()]])
            .append_query_results([vec![updated]])
            .into_connection());
        let staff = CurrentAdmin::new(Uuid::new_v4(), "ops@voxd.io", AdminRole::Admin, None).unwrap();

        let response = service(db).generate_copy(&staff, quote.id, QuoteCopy::Pitch).await.unwrap();
        assert_eq!(response.pitch.as_deref(), Some("generated"));
    }

    #[tokio::test]
    async fn test_accept_twice_is_conflict() {
        let mut accepted = quote_model(QuoteStatus::Accepted, None);
        accepted.responded_at = Some(Utc::now().into());
        let token = accepted.public_token.clone();
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![accepted]])
            .into_connection());

        let err = service(db)
            .respond(&token, true, QuoteResponseRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 409);
    }

    fn exec_result(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    fn statements(db: Arc<DatabaseConnection>) -> String {
        format!("{:?}", Arc::into_inner(db).unwrap().into_transaction_log())
    }

    #[tokio::test]
    async fn test_respond_is_conditional_update() {
        let sent = quote_model(QuoteStatus::Sent, None);
        let token = sent.public_token.clone();
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sent]])
            .append_exec_results([exec_result(1)])
            .into_connection());

        let view = service(db.clone())
            .respond(
                &token,
                true,
                QuoteResponseRequest {
                    note: Some("Looks great".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(view.status, QuoteStatus::Accepted);
        assert!(view.responded_at.is_some());

        let log = statements(db);
        assert!(log.contains("UPDATE"));
        assert!(log.contains("IN ($"));
        assert!(log.contains("IS NULL"));
        assert!(log.contains("\"accepted\""));
    }

    #[tokio::test]
    async fn test_concurrent_response_is_conflict() {
        // 读取时仍为 sent，条件更新时已被另一个答复抢先
        let viewed = quote_model(QuoteStatus::Viewed, None);
        let token = viewed.public_token.clone();
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![viewed]])
            .append_exec_results([exec_result(0)])
            .into_connection());

        let err = service(db)
            .respond(&token, false, QuoteResponseRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 409);
    }

    #[tokio::test]
    async fn test_first_public_view_marks_viewed() {
        let sent = quote_model(QuoteStatus::Sent, None);
        let token = sent.public_token.clone();
        let mut viewed = sent.clone();
        viewed.status = QuoteStatus::Viewed;
        viewed.viewed_at = Some(Utc::now().into());
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sent]])
            .append_query_results([vec![viewed]])
            .into_connection());

        let view = service(db.clone()).public_view(&token).await.unwrap();
        assert_eq!(view.status, QuoteStatus::Viewed);

        let log = statements(db);
        assert!(log.contains("UPDATE"));
        assert!(log.contains("\"viewed\""));
    }

    #[tokio::test]
    async fn test_draft_token_not_found() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<QuoteModel>::new()])
            .into_connection());

        let err = service(db.clone()).public_view(&generate_public_token()).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
        // 查询条件排除草稿
        assert!(statements(db).contains("\"draft\""));
    }

    #[tokio::test]
    async fn test_extending_validity_revives_expired_quote() {
        let now = Utc::now();
        let mut expired = quote_model(QuoteStatus::Expired, None);
        expired.valid_until = Some((now - Duration::days(2)).into());
        let mut revived = expired.clone();
        revived.status = QuoteStatus::Sent;
        revived.valid_until = Some((now + Duration::days(14)).into());
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![expired.clone()]])
            .append_query_results([vec![revived]])
            .into_connection());
        let staff = CurrentAdmin::new(Uuid::new_v4(), "ops@voxd.io", AdminRole::Admin, None).unwrap();

        let response = service(db.clone())
            .update(
                &staff,
                expired.id,
                UpdateQuoteRequest {
                    valid_until: Some(now + Duration::days(14)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(response.status, QuoteStatus::Sent);
        assert!(statements(db).contains("\"sent\""));
    }

    #[tokio::test]
    async fn test_expire_overdue_only_touches_open_quotes() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec_result(3)])
            .into_connection());

        assert_eq!(service(db.clone()).expire_overdue().await.unwrap(), 3);

        let log = statements(db);
        assert!(log.contains("\"expired\""));
        assert!(log.contains("\"sent\""));
        assert!(log.contains("\"viewed\""));
        assert!(log.contains("valid_until"));
    }
}
