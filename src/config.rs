use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use rocket::figment::Figment;
use serde::Deserialize;

use crate::model_registry::{ArtifactPaths, ModelRegistry, ModelVariant};

/// figment 里读配置的表名（Rocket.toml 的 `[<profile>.airquality]`，环境变量 `ROCKET_AIRQUALITY`）
pub const CONFIG_KEY: &str = "airquality";

/// 部署级配置：选哪个变体，以及可选的产物路径覆盖
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_variant")]
    pub variant: String,
    #[serde(default)]
    pub model_path: Option<PathBuf>,
    #[serde(default)]
    pub feature_scaler_path: Option<PathBuf>,
    #[serde(default)]
    pub target_scaler_path: Option<PathBuf>,
}

fn default_variant() -> String {
    "filter".to_string()
}

impl ServiceConfig {
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        figment
            .focus(CONFIG_KEY)
            .extract()
            .with_context(|| format!("reading `{CONFIG_KEY}` config"))
    }

    /// 变体名 -> schema，再用覆盖项替换默认路径
    pub fn resolve(&self, registry: &ModelRegistry) -> Result<(&'static ModelVariant, ArtifactPaths)> {
        let variant = registry.get(&self.variant).ok_or_else(|| {
            let known: Vec<&str> = registry.list().iter().map(|v| v.name).collect();
            anyhow!("unknown model variant `{}` (known: {})", self.variant, known.join(", "))
        })?;

        let mut paths = variant.default_paths();
        if let Some(p) = &self.model_path {
            paths.model = p.clone();
        }
        if let Some(p) = &self.feature_scaler_path {
            paths.feature_scaler = p.clone();
        }
        if let Some(p) = &self.target_scaler_path {
            paths.target_scaler = p.clone();
        }
        Ok((variant, paths))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::figment::providers::{Format, Toml};

    fn figment(toml: &str) -> Figment {
        Figment::new().merge(Toml::string(toml))
    }

    #[test]
    fn defaults_to_filter_variant() {
        let cfg = ServiceConfig::from_figment(&Figment::new()).unwrap();
        let (variant, paths) = cfg.resolve(&ModelRegistry::new()).unwrap();
        assert_eq!(variant.name, "filter");
        assert_eq!(
            paths.model,
            PathBuf::from("models/lstm-filter-data-look-back-8.safetensors")
        );
        assert_eq!(paths.target_scaler, PathBuf::from("models/scaler_y_filter.json"));
    }

    #[test]
    fn overrides_replace_default_paths() {
        let cfg = ServiceConfig::from_figment(&figment(
            r#"
            [airquality]
            variant = "weather"
            model_path = "/srv/models/weather.safetensors"
            "#,
        ))
        .unwrap();

        let (variant, paths) = cfg.resolve(&ModelRegistry::new()).unwrap();
        assert_eq!(variant.name, "weather");
        assert_eq!(paths.model, PathBuf::from("/srv/models/weather.safetensors"));
        assert_eq!(paths.feature_scaler, PathBuf::from("models/scaler_X_weather.json"));
    }

    #[test]
    fn unknown_variant_is_an_error() {
        let cfg = ServiceConfig::from_figment(&figment("[airquality]\nvariant = \"ozone\"")).unwrap();
        let err = cfg.resolve(&ModelRegistry::new()).unwrap_err();
        assert!(err.to_string().contains("ozone"));
        assert!(err.to_string().contains("filter, weather"));
    }
}
