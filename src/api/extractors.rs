// API 请求提取器
// 认证管理员和上传文件

use actix_multipart::Multipart;
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use futures::StreamExt;
use std::future::Future;
use std::ops::Deref;
use std::pin::Pin;

use crate::errors::VoxdError;
use crate::log_with_context;
use crate::logging::RequestContext;
use crate::services::access::CurrentAdmin;
use crate::services::upload::UploadedFile;
use crate::state::AppState;

/// 已认证的管理员
///
/// 从 `Authorization: Bearer` 头读取 JWT 并校验。
#[derive(Debug, Clone)]
pub struct AuthenticatedAdmin {
    pub admin: CurrentAdmin,
    pub context: RequestContext,
}

impl Deref for AuthenticatedAdmin {
    type Target = CurrentAdmin;

    fn deref(&self) -> &Self::Target {
        &self.admin
    }
}

impl FromRequest for AuthenticatedAdmin {
    type Error = VoxdError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let bearer = BearerAuth::from_request(req, payload);
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let context = RequestContext::from_http_request(req);

        Box::pin(async move {
            let bearer = bearer
                .await
                .map_err(|_| VoxdError::authentication("缺少访问令牌"))?;
            let state = state.ok_or_else(|| VoxdError::internal("应用状态未注册"))?;

            let admin = state.jwt.verify(bearer.token())?;
            let context = context.with_admin(admin.id, admin.partner_id);
            log_with_context!(debug, context, role = admin.role.as_str(), "管理员已认证");

            Ok(Self { admin, context })
        })
    }
}

/// 读取 multipart 中的单个文件字段
///
/// 超过 `max_bytes` 时立即返回，其余字段忽略。
pub async fn read_upload(
    mut payload: Multipart,
    field_name: &str,
    max_bytes: u64,
) -> Result<UploadedFile, VoxdError> {
    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| VoxdError::bad_request(format!("上传数据无效: {}", e)))?;

        if field.name() != field_name {
            while field.next().await.is_some() {}
            continue;
        }

        let filename = field
            .content_disposition()
            .get_filename()
            .map(|s| s.to_string());
        let content_type = field
            .content_type()
            .map(|ct| ct.essence_str().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| VoxdError::bad_request(format!("上传数据无效: {}", e)))?;
            bytes.extend_from_slice(&chunk);
            if bytes.len() as u64 > max_bytes {
                return Err(VoxdError::validation(
                    field_name,
                    format!("文件不能超过 {} KB", max_bytes / 1024),
                ));
            }
        }

        return Ok(UploadedFile {
            filename,
            content_type,
            bytes,
        });
    }

    Err(VoxdError::validation(field_name, "请选择要上传的文件"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::config::AppConfig;
    use crate::db::entities::AdminRole;
    use crate::services::auth::JwtUtils;
    use actix_web::test::TestRequest;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use uuid::Uuid;

    fn state() -> web::Data<AppState> {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        web::Data::new(AppState::new(Arc::new(db), AppConfig::default()).unwrap())
    }

    #[actix_web::test]
    async fn test_missing_token_rejected() {
        let req = TestRequest::default().app_data(state()).to_http_request();
        let err = AuthenticatedAdmin::extract(&req).await.unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[actix_web::test]
    async fn test_valid_token_accepted() {
        let state = state();
        let partner_id = Uuid::new_v4();
        let token = state
            .jwt
            .issue(Uuid::new_v4(), "p@acme.io", AdminRole::Partner, Some(partner_id))
            .unwrap();

        let req = TestRequest::default()
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .app_data(state)
            .to_http_request();
        let admin = AuthenticatedAdmin::extract(&req).await.unwrap();
        assert_eq!(admin.partner_id, Some(partner_id));
        assert!(!admin.is_staff());
        assert_eq!(admin.context.partner_id, Some(partner_id));
    }

    #[actix_web::test]
    async fn test_foreign_token_rejected() {
        let token = JwtUtils::new("another-secret-that-is-long-enough", 3600)
            .issue(Uuid::new_v4(), "ops@voxd.io", AdminRole::Admin, None)
            .unwrap();
        let req = TestRequest::default()
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .app_data(state())
            .to_http_request();
        assert!(AuthenticatedAdmin::extract(&req).await.is_err());
    }
}
