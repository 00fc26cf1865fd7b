//! 测试用产物：确定性的 LSTM 权重和 scaler 文件

use std::collections::HashMap;
use std::path::Path;

use candle_core::{Device, Tensor};
use serde_json::json;

use crate::model::RECURRENT_ACTIVATION_KEY;
use crate::model_registry::{ArtifactPaths, ModelVariant};

fn pseudo_weights(len: usize, seed: f32) -> Vec<f32> {
    (0..len)
        .map(|i| ((i as f32 + 1.0) * 0.7 + seed).sin() * 0.4)
        .collect()
}

fn tensor(len: usize, shape: &[usize], seed: f32) -> Tensor {
    Tensor::from_vec(pseudo_weights(len, seed), shape, &Device::Cpu).unwrap()
}

pub fn lstm_tensors(features: usize, hidden: usize, outputs: usize) -> HashMap<String, Tensor> {
    let gates = 4 * hidden;
    let mut map = HashMap::new();
    map.insert(
        "lstm.weight_ih_l0".to_string(),
        tensor(gates * features, &[gates, features], 0.1),
    );
    map.insert(
        "lstm.weight_hh_l0".to_string(),
        tensor(gates * hidden, &[gates, hidden], 1.3),
    );
    map.insert("lstm.bias_ih_l0".to_string(), tensor(gates, &[gates], 2.9));
    map.insert("lstm.bias_hh_l0".to_string(), tensor(gates, &[gates], 4.2));
    map.insert(
        "dense.weight".to_string(),
        tensor(outputs * hidden, &[outputs, hidden], 0.5),
    );
    map.insert("dense.bias".to_string(), tensor(outputs, &[outputs], 3.3));
    map
}

/// 写 safetensors，`activation` 为 None 时不带 metadata
pub fn save_model(path: &Path, tensors: &HashMap<String, Tensor>, activation: Option<&str>) {
    let metadata = activation.map(|a| {
        HashMap::from([(RECURRENT_ACTIVATION_KEY.to_string(), a.to_string())])
    });
    safetensors::serialize_to_file(tensors.iter(), &metadata, path).unwrap();
}

/// 在 `dir` 下为某个变体写一套完整产物
pub fn write_artifacts(dir: &Path, variant: &ModelVariant) -> ArtifactPaths {
    let features = variant.feature_count();
    let paths = ArtifactPaths {
        model: dir.join(format!("lstm-{}.safetensors", variant.name)),
        feature_scaler: dir.join(format!("scaler_X_{}.json", variant.name)),
        target_scaler: dir.join(format!("scaler_y_{}.json", variant.name)),
    };

    save_model(&paths.model, &lstm_tensors(features, 8, 1), Some("sigmoid"));

    let center: Vec<f64> = (0..features).map(|i| 5.0 + i as f64).collect();
    let scale: Vec<f64> = (0..features).map(|i| 2.0 + 0.5 * i as f64).collect();
    let x = json!({ "kind": "robust", "center": center, "scale": scale });
    std::fs::write(&paths.feature_scaler, x.to_string()).unwrap();

    let y = json!({ "kind": "robust", "center": [60.0], "scale": [25.0] });
    std::fs::write(&paths.target_scaler, y.to_string()).unwrap();

    paths
}
