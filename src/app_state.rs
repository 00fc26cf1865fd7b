use std::sync::Arc;

use anyhow::Result;
use rocket::fairing::AdHoc;

use crate::config::ServiceConfig;
use crate::engine::{Artifacts, CandleEngine, InferenceEngine};
use crate::model_registry::{ModelRegistry, ModelVariant};

/// 全局共享状态：
/// - variant: 本部署服务的模型变体（字段顺序 / 窗口长度）
/// - engine: 启动时加载好的推理引擎，只读
pub struct AppState {
    pub variant: &'static ModelVariant,
    pub engine: Arc<dyn InferenceEngine>,
}

impl AppState {
    pub fn new(engine: Arc<dyn InferenceEngine>) -> Self {
        Self {
            variant: engine.describe(),
            engine,
        }
    }

    /// 按配置加载产物；任何一步失败都直接返回错误
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let registry = ModelRegistry::new();
        let (variant, paths) = config.resolve(&registry)?;
        let artifacts = Artifacts::load(variant, &paths)?;
        Ok(Self::new(CandleEngine::new(variant, artifacts)))
    }
}

/// ignite 阶段加载模型：失败则 Rocket 不会开始监听
pub fn stage() -> AdHoc {
    AdHoc::try_on_ignite("Air quality model", |rocket| async move {
        let state = ServiceConfig::from_figment(rocket.figment())
            .and_then(|config| AppState::from_config(&config));

        match state {
            Ok(state) => Ok(rocket.manage(state)),
            Err(err) => {
                log::error!("failed to load model artifacts: {err:#}");
                Err(rocket)
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api;
    use crate::fixtures;
    use crate::model_registry::{ArtifactPaths, FILTER};
    use rocket::figment::Figment;
    use rocket::http::Status;
    use rocket::local::blocking::Client;
    use rocket::serde::json::Value;

    fn figment(variant: &str, paths: &ArtifactPaths) -> Figment {
        rocket::Config::figment()
            .merge(("airquality.variant", variant))
            .merge(("airquality.model_path", &paths.model))
            .merge(("airquality.feature_scaler_path", &paths.feature_scaler))
            .merge(("airquality.target_scaler_path", &paths.target_scaler))
    }

    fn launch(figment: Figment) -> Result<Client, rocket::Error> {
        // rocket::Error panics on drop unless inspected; mark it handled.
        Client::tracked(api::mount(rocket::custom(figment).attach(stage()))).map_err(|e| {
            let _ = e.kind();
            e
        })
    }

    #[test]
    fn launches_with_configured_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let paths = fixtures::write_artifacts(dir.path(), &FILTER);

        let client = launch(figment("filter", &paths)).unwrap();
        let resp = client.get("/health").dispatch();
        assert_eq!(resp.status(), Status::Ok);
        let body: Value = resp.into_json().unwrap();
        assert_eq!(body["variant"], "filter");
    }

    #[test]
    fn refuses_to_launch_without_model_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = fixtures::write_artifacts(dir.path(), &FILTER);
        paths.model = dir.path().join("nonexistent.safetensors");

        assert!(launch(figment("filter", &paths)).is_err());
    }

    #[test]
    fn refuses_to_launch_with_corrupt_scaler() {
        let dir = tempfile::tempdir().unwrap();
        let paths = fixtures::write_artifacts(dir.path(), &FILTER);
        std::fs::write(&paths.feature_scaler, "{not json").unwrap();

        assert!(launch(figment("filter", &paths)).is_err());
    }

    #[test]
    fn refuses_to_launch_with_mismatched_variant() {
        let dir = tempfile::tempdir().unwrap();
        let paths = fixtures::write_artifacts(dir.path(), &FILTER);

        assert!(launch(figment("weather", &paths)).is_err());
        assert!(launch(figment("ozone", &paths)).is_err());
    }
}
