use rocket::http::Status;
use rocket::serde::json::{self, Json, Value};
use rocket::{catch, catchers, get, post, routes, Build, Request, Rocket, State};

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::types::{ErrorResponse, HealthResponse, PredictResponse, UsageResponse};

/// 挂载路由和 JSON 错误处理
pub fn mount(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/", routes![health, usage, predict])
        .register("/", catchers![default_catcher])
}

#[get("/health")]
pub async fn health(state: &State<AppState>) -> Json<HealthResponse> {
    let variant = state.variant;
    Json(HealthResponse {
        status: "ok".to_string(),
        variant: variant.name.to_string(),
        window_len: variant.window_len,
        features: variant.features.iter().map(|f| f.to_string()).collect(),
    })
}

#[get("/airquality")]
pub async fn usage() -> Json<UsageResponse> {
    Json(UsageResponse::hint())
}

#[post("/airquality", data = "<body>")]
pub async fn predict(
    state: &State<AppState>,
    body: Result<Json<Value>, json::Error<'_>>,
) -> Result<Json<PredictResponse>, ApiError> {
    let body = body.map_err(|e| ApiError::BadBody(e.to_string()))?;

    // 先按 schema 校验，失败时不碰模型
    let window = state.variant.extract(&body)?;

    let aqi = state
        .engine
        .predict(window)
        .await
        .map_err(ApiError::Inference)?;

    Ok(Json(PredictResponse { aqi }))
}

#[catch(default)]
fn default_catcher(status: Status, _req: &Request<'_>) -> Json<ErrorResponse> {
    Json(ErrorResponse::new(
        status.reason().unwrap_or("unknown error").to_lowercase(),
    ))
}
