use std::sync::Arc;
use std::time::Instant;

use anyhow::{ensure, Context, Result};
use async_trait::async_trait;
use candle_core::{Device, Tensor};

use crate::model::LstmRegressor;
use crate::model_registry::{ArtifactPaths, ModelVariant};
use crate::scaler::Scaler;
use crate::types::ObservationWindow;

/// 统一的推理引擎抽象
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// 一个窗口 -> 逆缩放后的预测，形状 (1, O)
    async fn predict(&self, window: ObservationWindow) -> Result<Vec<Vec<f64>>>;

    fn describe(&self) -> &'static ModelVariant;
}

/// 启动时加载一次、之后只读的三件产物
pub struct Artifacts {
    pub model: LstmRegressor,
    pub feature_scaler: Scaler,
    pub target_scaler: Scaler,
    pub device: Device,
}

impl Artifacts {
    /// 加载并交叉校验；任何一步失败都不应该开始对外服务
    pub fn load(variant: &ModelVariant, paths: &ArtifactPaths) -> Result<Self> {
        let device = Device::Cpu;
        let start = Instant::now();

        let model = LstmRegressor::load(&paths.model, &device)?;
        let feature_scaler = Scaler::load(&paths.feature_scaler)?;
        let target_scaler = Scaler::load(&paths.target_scaler)?;

        let artifacts = Self {
            model,
            feature_scaler,
            target_scaler,
            device,
        };
        artifacts
            .check(variant)
            .with_context(|| format!("artifacts do not fit variant `{}`", variant.name))?;

        log::info!(
            "loaded `{}` model {} (F={}, H={}, O={}, gates={}) in {:.2}s",
            variant.name,
            paths.model.display(),
            artifacts.model.input_size(),
            artifacts.model.hidden_size(),
            artifacts.model.output_size(),
            artifacts.model.activation().as_str(),
            start.elapsed().as_secs_f32(),
        );
        Ok(artifacts)
    }

    fn check(&self, variant: &ModelVariant) -> Result<()> {
        let features = variant.feature_count();
        ensure!(
            self.model.input_size() == features,
            "model takes {} features, variant declares {features}",
            self.model.input_size()
        );
        if let Some(n) = self.feature_scaler.n_features() {
            ensure!(n == features, "feature scaler fitted on {n} columns, variant declares {features}");
        }
        if let Some(n) = self.target_scaler.n_features() {
            ensure!(
                n == self.model.output_size(),
                "target scaler fitted on {n} columns, model outputs {}",
                self.model.output_size()
            );
        }
        Ok(())
    }

    /// scale -> (1, L, F) -> predict -> inverse scale
    pub fn run(&self, window: &ObservationWindow) -> Result<Vec<Vec<f64>>> {
        let x = Tensor::from_vec(window.values().to_vec(), window.shape(), &self.device)?;
        let x = self.feature_scaler.transform(&x)?;
        let x = x.unsqueeze(0)?;

        let y = self.model.forward(&x)?;
        let y = self.target_scaler.inverse_transform(&y)?;

        let rows: Vec<Vec<f64>> = y
            .to_vec2::<f32>()?
            .into_iter()
            .map(|row| row.into_iter().map(f64::from).collect())
            .collect();

        ensure!(
            rows.iter().flatten().all(|v| v.is_finite()),
            "model produced a non-finite prediction"
        );
        Ok(rows)
    }
}

pub struct CandleEngine {
    variant: &'static ModelVariant,
    artifacts: Arc<Artifacts>,
}

impl CandleEngine {
    pub fn new(variant: &'static ModelVariant, artifacts: Artifacts) -> Arc<Self> {
        Arc::new(Self {
            variant,
            artifacts: Arc::new(artifacts),
        })
    }
}

#[async_trait]
impl InferenceEngine for CandleEngine {
    async fn predict(&self, window: ObservationWindow) -> Result<Vec<Vec<f64>>> {
        // CPU 密集，丢到 blocking 线程池；产物只读，不需要加锁
        let artifacts = Arc::clone(&self.artifacts);
        tokio::task::spawn_blocking(move || artifacts.run(&window))
            .await
            .context("inference task panicked")?
    }

    fn describe(&self) -> &'static ModelVariant {
        self.variant
    }
}
