use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket::Request;

use crate::types::ErrorResponse;

/// 请求级错误：客户端错误带具体字段信息，服务端错误只返回笼统消息
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// body 不是合法 JSON
    #[error("malformed request body: {0}")]
    BadBody(String),

    /// 字段缺失 / 类型不对 / 窗口长度不对
    #[error("invalid field `{field}`: {reason}")]
    InvalidField { field: String, reason: String },

    /// 推理阶段失败，细节只进日志
    #[error("inference failed")]
    Inference(anyhow::Error),
}

impl ApiError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ApiError::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn status(&self) -> Status {
        match self {
            ApiError::BadBody(_) => Status::BadRequest,
            ApiError::InvalidField { .. } => Status::UnprocessableEntity,
            ApiError::Inference(_) => Status::InternalServerError,
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        match &self {
            ApiError::Inference(err) => log::error!("{}: {:#}", req.uri(), err),
            other => log::warn!("{}: rejected request: {}", req.uri(), other),
        }

        let body = ErrorResponse::new(self.to_string());
        (self.status(), Json(body)).respond_to(req)
    }
}
