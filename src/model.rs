use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, bail, ensure, Context, Result};
use candle_core::{DType, Device, IndexOp, Module, Tensor};
use candle_nn::{linear, Linear, VarBuilder};
use safetensors::SafeTensors;

pub const LSTM_PREFIX: &str = "lstm";
pub const DENSE_PREFIX: &str = "dense";

/// safetensors 头部 metadata 里记录门激活函数的键
pub const RECURRENT_ACTIVATION_KEY: &str = "recurrent_activation";

/// input / forget / output 三个门用的激活函数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrentActivation {
    Sigmoid,
    /// clip(0.2 * x + 0.5, 0, 1)
    HardSigmoid,
}

impl RecurrentActivation {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrentActivation::Sigmoid => "sigmoid",
            RecurrentActivation::HardSigmoid => "hard_sigmoid",
        }
    }

    fn apply(&self, x: &Tensor) -> Result<Tensor> {
        let y = match self {
            RecurrentActivation::Sigmoid => candle_nn::ops::sigmoid(x)?,
            RecurrentActivation::HardSigmoid => x.affine(0.2, 0.5)?.clamp(0f32, 1f32)?,
        };
        Ok(y)
    }
}

impl FromStr for RecurrentActivation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sigmoid" => Ok(RecurrentActivation::Sigmoid),
            "hard_sigmoid" => Ok(RecurrentActivation::HardSigmoid),
            other => bail!("unsupported recurrent activation `{other}`"),
        }
    }
}

/// 单层 LSTM + 全连接输出头。
///
/// safetensors 里的张量命名：
/// - `lstm.weight_ih_l0` (4H, F)，`lstm.weight_hh_l0` (4H, H)
/// - `lstm.bias_ih_l0` (4H)，`lstm.bias_hh_l0` (4H)
/// - `dense.weight` (O, H)，`dense.bias` (O)
///
/// 门的顺序是 input / forget / cell / output。头部 metadata 必须带
/// `recurrent_activation`（`sigmoid` 或 `hard_sigmoid`），和训练时一致。
pub struct LstmRegressor {
    w_ih: Tensor,
    w_hh: Tensor,
    bias: Tensor,
    activation: RecurrentActivation,
    head: Linear,
    input_size: usize,
    hidden_size: usize,
    output_size: usize,
}

impl LstmRegressor {
    pub fn load(path: &Path, device: &Device) -> Result<Self> {
        let buffer = std::fs::read(path)
            .with_context(|| format!("reading model weights {}", path.display()))?;
        let activation = read_activation(&buffer)
            .with_context(|| format!("reading model metadata {}", path.display()))?;
        let tensors = candle_core::safetensors::load_buffer(&buffer, device)
            .with_context(|| format!("reading model weights {}", path.display()))?;

        Self::from_tensors(tensors, activation, device)
            .with_context(|| format!("building model from {}", path.display()))
    }

    pub fn from_tensors(
        tensors: HashMap<String, Tensor>,
        activation: RecurrentActivation,
        device: &Device,
    ) -> Result<Self> {
        let (gates, input_size) = dims2(&tensors, &format!("{LSTM_PREFIX}.weight_ih_l0"))?;
        let (gates_hh, hidden_size) = dims2(&tensors, &format!("{LSTM_PREFIX}.weight_hh_l0"))?;
        let (output_size, head_in) = dims2(&tensors, &format!("{DENSE_PREFIX}.weight"))?;

        ensure!(
            gates == 4 * hidden_size && gates_hh == gates,
            "lstm gate weights ({gates}, {gates_hh}) do not match hidden size {hidden_size}"
        );
        ensure!(
            head_in == hidden_size,
            "dense layer expects {head_in} inputs, lstm produces {hidden_size}"
        );

        let vb = VarBuilder::from_tensors(tensors, DType::F32, device);
        let lstm = vb.pp(LSTM_PREFIX);
        let w_ih = lstm.get((gates, input_size), "weight_ih_l0")?;
        let w_hh = lstm.get((gates, hidden_size), "weight_hh_l0")?;
        // 两组 bias 只在相加后使用
        let bias = (lstm.get(gates, "bias_ih_l0")? + lstm.get(gates, "bias_hh_l0")?)?;
        let head = linear(hidden_size, output_size, vb.pp(DENSE_PREFIX))?;

        Ok(Self {
            w_ih: w_ih.t()?.contiguous()?,
            w_hh: w_hh.t()?.contiguous()?,
            bias,
            activation,
            head,
            input_size,
            hidden_size,
            output_size,
        })
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    pub fn activation(&self) -> RecurrentActivation {
        self.activation
    }

    /// (batch, L, F) -> (batch, O)，取最后一个时间步的隐状态
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (batch, steps, features) = x.dims3()?;
        ensure!(
            features == self.input_size,
            "model expects {} features per step, got {features}",
            self.input_size
        );
        ensure!(steps > 0, "empty observation window");

        let mut h = Tensor::zeros((batch, self.hidden_size), DType::F32, x.device())?;
        let mut c = h.clone();
        for step in 0..steps {
            let xt = x.i((.., step, ..))?.contiguous()?;
            (h, c) = self.step(&xt, &h, &c)?;
        }
        Ok(self.head.forward(&h)?)
    }

    fn step(&self, x: &Tensor, h: &Tensor, c: &Tensor) -> Result<(Tensor, Tensor)> {
        let gates = x
            .matmul(&self.w_ih)?
            .add(&h.matmul(&self.w_hh)?)?
            .broadcast_add(&self.bias)?;
        let chunks = gates.chunk(4, 1)?;

        let input = self.activation.apply(&chunks[0])?;
        let forget = self.activation.apply(&chunks[1])?;
        let cell = chunks[2].tanh()?;
        let output = self.activation.apply(&chunks[3])?;

        let c = ((forget * c)? + (input * cell)?)?;
        let h = (output * c.tanh()?)?;
        Ok((h, c))
    }
}

fn read_activation(buffer: &[u8]) -> Result<RecurrentActivation> {
    let (_, metadata) = SafeTensors::read_metadata(buffer)?;
    let value = metadata
        .metadata()
        .as_ref()
        .and_then(|m| m.get(RECURRENT_ACTIVATION_KEY))
        .ok_or_else(|| anyhow!("missing `{RECURRENT_ACTIVATION_KEY}` in safetensors metadata"))?;
    value.parse()
}

fn dims2(tensors: &HashMap<String, Tensor>, name: &str) -> Result<(usize, usize)> {
    match tensors.get(name) {
        Some(t) => Ok(t.dims2().with_context(|| format!("tensor `{name}`"))?),
        None => bail!("missing tensor `{name}`"),
    }
}
