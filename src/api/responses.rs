// HTTP 响应构建

use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{HttpResponse, Result as ActixResult};
use chrono::Utc;
use serde::Serialize;
use voxd_common::ActionResult;

use crate::services::export::export_filename;

/// 成功响应统一包装为 `ActionResult`
pub struct HttpResponseBuilder;

impl HttpResponseBuilder {
    pub fn ok<T: Serialize>(data: T) -> ActixResult<HttpResponse> {
        Ok(HttpResponse::Ok().json(ActionResult::ok(data)))
    }

    pub fn created<T: Serialize>(data: T) -> ActixResult<HttpResponse> {
        Ok(HttpResponse::Created().json(ActionResult::ok(data)))
    }

    /// 后台任务已启动
    pub fn accepted<T: Serialize>(data: T) -> ActixResult<HttpResponse> {
        Ok(HttpResponse::Accepted().json(ActionResult::ok(data)))
    }

    /// 没有返回数据的成功操作
    pub fn done() -> ActixResult<HttpResponse> {
        Ok(HttpResponse::Ok().json(ActionResult::done()))
    }

    /// CSV 下载，文件名为 `{resource}-{YYYYMMDD}.csv`
    pub fn csv(resource: &str, body: String) -> ActixResult<HttpResponse> {
        let filename = export_filename(resource, Utc::now().date_naive());
        Ok(HttpResponse::Ok()
            .content_type("text/csv; charset=utf-8")
            .insert_header(ContentDisposition {
                disposition: DispositionType::Attachment,
                parameters: vec![DispositionParam::Filename(filename)],
            })
            .body(body))
    }
}
