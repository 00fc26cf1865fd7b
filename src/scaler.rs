use std::path::Path;

use anyhow::{bail, Context, Result};
use candle_core::Tensor;
use serde::Deserialize;

/// 训练侧导出的 scaler 参数（JSON），按 `kind` 区分
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScalerParams {
    Robust {
        #[serde(default)]
        center: Option<Vec<f64>>,
        #[serde(default)]
        scale: Option<Vec<f64>>,
    },
    Standard {
        #[serde(default)]
        mean: Option<Vec<f64>>,
        #[serde(default)]
        scale: Option<Vec<f64>>,
    },
    MinMax {
        min: Vec<f64>,
        scale: Vec<f64>,
    },
}

/// 逐列仿射变换：forward = (x - shift) / divisor，inverse = x * divisor + shift
#[derive(Debug, Clone)]
pub struct Scaler {
    shift: Option<Vec<f32>>,
    divisor: Option<Vec<f32>>,
}

impl Scaler {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading scaler {}", path.display()))?;
        let params: ScalerParams = serde_json::from_str(&text)
            .with_context(|| format!("parsing scaler {}", path.display()))?;
        Self::from_params(params).with_context(|| format!("invalid scaler {}", path.display()))
    }

    pub fn from_params(params: ScalerParams) -> Result<Self> {
        let (shift, divisor) = match params {
            ScalerParams::Robust { center, scale } => (center, scale.map(non_zero)),
            ScalerParams::Standard { mean, scale } => (mean, scale.map(non_zero)),
            ScalerParams::MinMax { min, scale } => {
                // x * s + m  ==  (x - (-m / s)) / (1 / s)
                let scale = non_zero(scale);
                if min.len() != scale.len() {
                    bail!("min has {} columns, scale has {}", min.len(), scale.len());
                }
                let shift = min.iter().zip(&scale).map(|(m, s)| -m / s).collect();
                let divisor = scale.iter().map(|s| 1.0 / s).collect();
                (Some(shift), Some(divisor))
            }
        };

        if let (Some(a), Some(b)) = (&shift, &divisor) {
            if a.len() != b.len() {
                bail!("center has {} columns, scale has {}", a.len(), b.len());
            }
        }

        Ok(Self {
            shift: shift.map(to_f32).transpose()?,
            divisor: divisor.map(to_f32).transpose()?,
        })
    }

    /// 拟合时的列数；既不平移也不缩放时为 None
    pub fn n_features(&self) -> Option<usize> {
        self.shift
            .as_ref()
            .or(self.divisor.as_ref())
            .map(|v| v.len())
    }

    /// `x` 形状为 (rows, F)
    pub fn transform(&self, x: &Tensor) -> Result<Tensor> {
        self.check_columns(x)?;
        let mut out = x.clone();
        if let Some(shift) = &self.shift {
            out = out.broadcast_sub(&Tensor::new(shift.as_slice(), x.device())?)?;
        }
        if let Some(divisor) = &self.divisor {
            out = out.broadcast_div(&Tensor::new(divisor.as_slice(), x.device())?)?;
        }
        Ok(out)
    }

    pub fn inverse_transform(&self, x: &Tensor) -> Result<Tensor> {
        self.check_columns(x)?;
        let mut out = x.clone();
        if let Some(divisor) = &self.divisor {
            out = out.broadcast_mul(&Tensor::new(divisor.as_slice(), x.device())?)?;
        }
        if let Some(shift) = &self.shift {
            out = out.broadcast_add(&Tensor::new(shift.as_slice(), x.device())?)?;
        }
        Ok(out)
    }

    fn check_columns(&self, x: &Tensor) -> Result<()> {
        let (_, cols) = x.dims2()?;
        match self.n_features() {
            Some(n) if n != cols => bail!("scaler fitted on {n} columns, got {cols}"),
            _ => Ok(()),
        }
    }
}

// 常数列的 scale 为 0，和拟合库一样按 1 处理
fn non_zero(scale: Vec<f64>) -> Vec<f64> {
    scale
        .into_iter()
        .map(|s| if s == 0.0 { 1.0 } else { s })
        .collect()
}

fn to_f32(values: Vec<f64>) -> Result<Vec<f32>> {
    values
        .into_iter()
        .map(|v| {
            let f = v as f32;
            if f.is_finite() {
                Ok(f)
            } else {
                bail!("non-finite scaler parameter {v}")
            }
        })
        .collect()
}
