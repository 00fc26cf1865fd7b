use serde::{Deserialize, Serialize};

pub const USAGE_MESSAGE: &str = "Use POST API to pass the previous hour data";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageResponse {
    pub status: String,
    pub message: String,
}

impl UsageResponse {
    pub fn hint() -> Self {
        Self {
            status: "success".to_string(),
            message: USAGE_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub variant: String,
    pub window_len: usize,
    pub features: Vec<String>,
}

/// `aqi` 保持 (1, 1) 的嵌套形状，和逆缩放后的输出张量一致
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub aqi: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

/// 校验过的观测窗口：行优先的 (len, features) 数组，行 = 时间步，最旧的在前
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationWindow {
    len: usize,
    features: usize,
    values: Vec<f32>,
}

impl ObservationWindow {
    pub fn new(len: usize, features: usize, values: Vec<f32>) -> anyhow::Result<Self> {
        anyhow::ensure!(
            values.len() == len * features,
            "window ({len}, {features}) needs {} values, got {}",
            len * features,
            values.len()
        );
        Ok(Self {
            len,
            features,
            values,
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.len, self.features)
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }
}
