// 认证服务
// 管理员登录、JWT 签发与校验

use std::sync::Arc;
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::config::SecurityConfig;
use crate::db::entities::{admin_user, AdminRole, AdminUser};
use crate::errors::VoxdError;
use crate::services::access::CurrentAdmin;
use crate::services::admin_user::AdminUserResponse;
use crate::services::validation::validate_request;

const ISSUER: &str = "voxd-admin";

/// JWT 声明
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// 管理员 ID
    pub sub: String,
    pub email: String,
    pub role: String,
    pub partner_id: Option<String>,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// 登录请求
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "邮箱格式无效"))]
    pub email: String,
    #[validate(length(min = 1, message = "请输入密码"))]
    pub password: String,
}

/// 登录响应
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    /// 有效期（秒）
    pub expires_in: u64,
    pub admin: AdminUserResponse,
}

pub fn hash_password(password: &str, cost: u32) -> Result<String, VoxdError> {
    hash(password, cost).map_err(|e| VoxdError::internal(format!("密码哈希失败: {}", e)))
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    verify(password, password_hash).unwrap_or(false)
}

/// JWT 工具
#[derive(Clone)]
pub struct JwtUtils {
    secret: String,
    expiration: u64,
}

impl JwtUtils {
    pub fn new(secret: impl Into<String>, expiration: u64) -> Self {
        Self {
            secret: secret.into(),
            expiration,
        }
    }

    pub fn from_config(config: &SecurityConfig) -> Self {
        Self::new(config.jwt_secret.clone(), config.jwt_expiration)
    }

    pub fn expiration(&self) -> u64 {
        self.expiration
    }

    pub fn issue(
        &self,
        admin_id: Uuid,
        email: &str,
        role: AdminRole,
        partner_id: Option<Uuid>,
    ) -> Result<String, VoxdError> {
        let now = Utc::now();
        let claims = JwtClaims {
            sub: admin_id.to_string(),
            email: email.to_string(),
            role: role.as_str().to_string(),
            partner_id: partner_id.map(|id| id.to_string()),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.expiration as i64)).timestamp(),
            iss: ISSUER.to_string(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| VoxdError::internal(format!("JWT 生成失败: {}", e)))
    }

    /// 校验令牌并还原当前管理员
    pub fn verify(&self, token: &str) -> Result<CurrentAdmin, VoxdError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);

        let claims = decode::<JwtClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| VoxdError::authentication(format!("令牌无效: {}", e)))?
        .claims;

        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| VoxdError::authentication("令牌中的管理员 ID 无效"))?;
        let role = AdminRole::parse(&claims.role)
            .ok_or_else(|| VoxdError::authentication("令牌中的角色无效"))?;
        let partner_id = claims
            .partner_id
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|_| VoxdError::authentication("令牌中的合作伙伴 ID 无效"))?;

        CurrentAdmin::new(id, claims.email, role, partner_id)
    }
}

pub struct AuthService {
    db: Arc<DatabaseConnection>,
    jwt: JwtUtils,
}

impl AuthService {
    pub fn new(db: Arc<DatabaseConnection>, jwt: JwtUtils) -> Self {
        Self { db, jwt }
    }

    /// 管理员登录
    ///
    /// 账号不存在、已停用和密码错误返回同一错误。
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, VoxdError> {
        validate_request(&request)?;
        let email = request.email.trim().to_lowercase();

        let admin = AdminUser::find()
            .filter(admin_user::Column::Email.eq(email.as_str()))
            .one(self.db.as_ref())
            .await?;

        let admin = match admin {
            Some(admin) if admin.is_active && verify_password(&request.password, &admin.password_hash) => admin,
            _ => {
                warn!("管理员登录失败");
                return Err(VoxdError::authentication("邮箱或密码错误"));
            }
        };

        let token = self.jwt.issue(admin.id, &admin.email, admin.role, admin.partner_id)?;

        let mut model = admin.into_active_model();
        model.last_login_at = Set(Some(Utc::now().into()));
        let admin = model.update(self.db.as_ref()).await?;

        info!(admin_id = %admin.id, role = admin.role.as_str(), "管理员登录成功");

        Ok(LoginResponse {
            access_token: token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.expiration(),
            admin: admin.into(),
        })
    }

    /// 当前管理员信息
    pub async fn me(&self, current: &CurrentAdmin) -> Result<AdminUserResponse, VoxdError> {
        let admin = AdminUser::find_by_id(current.id)
            .one(self.db.as_ref())
            .await?
            .filter(|admin| admin.is_active)
            .ok_or_else(|| VoxdError::authentication("账号不存在或已停用"))?;

        Ok(admin.into())
    }
}
