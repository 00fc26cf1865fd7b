use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::types::ObservationWindow;

/// 请求里一个窗口怎么摆放
#[derive(Debug, Clone, Copy)]
pub enum WindowLayout {
    /// `{ key: [ {feature: f, ...} × L ] }`，数组顺序 = 时间顺序
    Records { key: &'static str },
    /// `{ "<feature>-<step>": f, ... }`，step 从 1 开始，1 最旧
    Suffixed,
}

#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub feature_scaler: PathBuf,
    pub target_scaler: PathBuf,
}

/// 一个模型变体的声明式描述：字段顺序、窗口长度、默认产物路径
#[derive(Debug, Clone)]
pub struct ModelVariant {
    pub name: &'static str,
    pub window_len: usize,
    pub features: &'static [&'static str],
    pub layout: WindowLayout,
    model_file: &'static str,
    feature_scaler_file: &'static str,
    target_scaler_file: &'static str,
}

pub static FILTER: ModelVariant = ModelVariant {
    name: "filter",
    window_len: 8,
    features: &["paqi", "rm", "rstd", "wiener"],
    layout: WindowLayout::Records { key: "data" },
    model_file: "models/lstm-filter-data-look-back-8.safetensors",
    feature_scaler_file: "models/scaler_X_filter.json",
    target_scaler_file: "models/scaler_y_filter.json",
};

pub static WEATHER: ModelVariant = ModelVariant {
    name: "weather",
    window_len: 2,
    features: &["paqi", "ap", "rh", "ri", "at", "wd", "ws"],
    layout: WindowLayout::Suffixed,
    model_file: "models/lstm-weather-data-look-back-2.safetensors",
    feature_scaler_file: "models/scaler_X_weather.json",
    target_scaler_file: "models/scaler_y_weather.json",
};

impl ModelVariant {
    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    pub fn default_paths(&self) -> ArtifactPaths {
        ArtifactPaths {
            model: PathBuf::from(self.model_file),
            feature_scaler: PathBuf::from(self.feature_scaler_file),
            target_scaler: PathBuf::from(self.target_scaler_file),
        }
    }

    /// 按 schema 把请求体抽成 (L, F) 窗口；任何字段问题都在碰模型之前返回
    pub fn extract(&self, body: &Value) -> Result<ObservationWindow, ApiError> {
        let root = body
            .as_object()
            .ok_or_else(|| ApiError::invalid("$", "request body must be a JSON object"))?;

        let mut values = Vec::with_capacity(self.window_len * self.feature_count());

        match self.layout {
            WindowLayout::Records { key } => {
                let records = root
                    .get(key)
                    .ok_or_else(|| ApiError::invalid(key, "missing"))?
                    .as_array()
                    .ok_or_else(|| ApiError::invalid(key, "expected an array"))?;

                if records.len() != self.window_len {
                    return Err(ApiError::invalid(
                        key,
                        format!(
                            "expected {} observations, got {}",
                            self.window_len,
                            records.len()
                        ),
                    ));
                }

                for (step, record) in records.iter().enumerate() {
                    let obj = record.as_object().ok_or_else(|| {
                        ApiError::invalid(format!("{key}[{step}]"), "expected an object")
                    })?;
                    for feature in self.features {
                        let path = format!("{key}[{step}].{feature}");
                        values.push(read_number(obj, feature, &path)?);
                    }
                }
            }
            WindowLayout::Suffixed => {
                for step in 1..=self.window_len {
                    for feature in self.features {
                        let name = format!("{feature}-{step}");
                        values.push(read_number(root, &name, &name)?);
                    }
                }
            }
        }

        // 上面按 schema 逐个 push，长度不符只可能是内部错误
        ObservationWindow::new(self.window_len, self.feature_count(), values)
            .map_err(ApiError::Inference)
    }
}

fn read_number(obj: &Map<String, Value>, key: &str, path: &str) -> Result<f32, ApiError> {
    let raw = obj.get(key).ok_or_else(|| ApiError::invalid(path, "missing"))?;
    let number = raw
        .as_f64()
        .ok_or_else(|| ApiError::invalid(path, format!("expected a number, got {raw}")))?;

    let value = number as f32;
    if !value.is_finite() {
        return Err(ApiError::invalid(path, "value out of range"));
    }
    Ok(value)
}

/// 静态注册表：每个部署只挑其中一个变体
#[derive(Debug)]
pub struct ModelRegistry {
    variants: Vec<&'static ModelVariant>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            variants: vec![&FILTER, &WEATHER],
        }
    }

    pub fn list(&self) -> Vec<&'static ModelVariant> {
        self.variants.clone()
    }

    pub fn get(&self, name: &str) -> Option<&'static ModelVariant> {
        self.variants.iter().copied().find(|v| v.name == name)
    }
}
