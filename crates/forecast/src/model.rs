//! Sequence regression models.
//!
//! [`SequenceModel`] is the seam between the engine and whatever produces
//! the next normalized AQI. [`LstmModel`] runs a stacked LSTM exported to
//! JSON (kernel layouts follow the Keras convention, gate order `i, f, c, o`).

use std::sync::Arc;

use ndarray::{Array1, Array2, ArrayView1, s};
use serde::{Deserialize, Serialize};

use aqcast_core::{ForecastError, ForecastResult};

use crate::features::FEATURE_COUNT;
use crate::window::{ForecastWindow, WINDOW_SIZE};

/// A model that maps one normalized window to one normalized scalar.
pub trait SequenceModel: Send + Sync {
    fn predict(&self, window: &ForecastWindow) -> ForecastResult<f64>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "sequence-model"
    }
}

impl<M> SequenceModel for Arc<M>
where
    M: SequenceModel + ?Sized,
{
    fn predict(&self, window: &ForecastWindow) -> ForecastResult<f64> {
        (**self).predict(window)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Linear,
    Relu,
}

impl Activation {
    fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Linear => x,
            Activation::Relu => x.max(0.0),
        }
    }
}

/// Serialized LSTM layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LstmLayerArtifact {
    /// `input_dim x 4*units`.
    pub kernel: Vec<Vec<f64>>,
    /// `units x 4*units`.
    pub recurrent_kernel: Vec<Vec<f64>>,
    /// `4*units`.
    pub bias: Vec<f64>,
}

/// Serialized dense layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayerArtifact {
    /// `input_dim x units`.
    pub kernel: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    #[serde(default = "default_activation")]
    pub activation: Activation,
}

fn default_activation() -> Activation {
    Activation::Linear
}

/// Serialized model artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LstmArtifact {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_window")]
    pub window_size: usize,
    #[serde(default = "default_features")]
    pub input_size: usize,
    pub lstm: Vec<LstmLayerArtifact>,
    #[serde(default)]
    pub dense: Vec<DenseLayerArtifact>,
}

fn default_window() -> usize {
    WINDOW_SIZE
}

fn default_features() -> usize {
    FEATURE_COUNT
}

#[derive(Debug, Clone)]
struct LstmLayer {
    units: usize,
    kernel: Array2<f64>,
    recurrent: Array2<f64>,
    bias: Array1<f64>,
}

impl LstmLayer {
    /// Run the layer over a `(timesteps, input_dim)` sequence, returning every hidden state.
    fn forward(&self, inputs: &Array2<f64>) -> Array2<f64> {
        let u = self.units;
        let mut h = Array1::<f64>::zeros(u);
        let mut c = Array1::<f64>::zeros(u);
        let mut out = Array2::<f64>::zeros((inputs.nrows(), u));

        for (t, x) in inputs.rows().into_iter().enumerate() {
            let z = x.dot(&self.kernel) + h.dot(&self.recurrent) + &self.bias;
            let i = z.slice(s![0..u]).mapv(sigmoid);
            let f = z.slice(s![u..2 * u]).mapv(sigmoid);
            let g = z.slice(s![2 * u..3 * u]).mapv(f64::tanh);
            let o = z.slice(s![3 * u..4 * u]).mapv(sigmoid);

            c = &f * &c + &i * &g;
            h = &o * &c.mapv(f64::tanh);
            out.row_mut(t).assign(&h);
        }
        out
    }
}

#[derive(Debug, Clone)]
struct DenseLayer {
    kernel: Array2<f64>,
    bias: Array1<f64>,
    activation: Activation,
}

impl DenseLayer {
    fn forward(&self, x: ArrayView1<'_, f64>) -> Array1<f64> {
        (x.dot(&self.kernel) + &self.bias).mapv(|v| self.activation.apply(v))
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Stacked LSTM followed by dense layers, ending in a single output unit.
#[derive(Debug, Clone)]
pub struct LstmModel {
    name: String,
    lstm: Vec<LstmLayer>,
    dense: Vec<DenseLayer>,
}

impl LstmModel {
    pub fn from_json_str(json: &str) -> ForecastResult<Self> {
        let artifact: LstmArtifact = serde_json::from_str(json)
            .map_err(|e| ForecastError::ArtifactInvalid(format!("model artifact: {e}")))?;
        Self::from_artifact(artifact)
    }

    pub fn from_artifact(artifact: LstmArtifact) -> ForecastResult<Self> {
        if artifact.window_size != WINDOW_SIZE || artifact.input_size != FEATURE_COUNT {
            return Err(ForecastError::ArtifactInvalid(format!(
                "model expects ({}, {}) windows, pipeline produces ({WINDOW_SIZE}, {FEATURE_COUNT})",
                artifact.window_size, artifact.input_size
            )));
        }
        if artifact.lstm.is_empty() {
            return Err(invalid("model has no LSTM layers"));
        }

        let mut width = artifact.input_size;
        let mut lstm = Vec::with_capacity(artifact.lstm.len());
        for (idx, layer) in artifact.lstm.into_iter().enumerate() {
            let units = layer.bias.len() / 4;
            if units == 0 || layer.bias.len() % 4 != 0 {
                return Err(invalid(format!("lstm[{idx}] bias length {} is not 4*units", layer.bias.len())));
            }
            let kernel = matrix(&layer.kernel, width, 4 * units, &format!("lstm[{idx}].kernel"))?;
            let recurrent = matrix(
                &layer.recurrent_kernel,
                units,
                4 * units,
                &format!("lstm[{idx}].recurrent_kernel"),
            )?;
            lstm.push(LstmLayer {
                units,
                kernel,
                recurrent,
                bias: Array1::from(layer.bias),
            });
            width = units;
        }

        let mut dense = Vec::with_capacity(artifact.dense.len());
        for (idx, layer) in artifact.dense.into_iter().enumerate() {
            let units = layer.bias.len();
            let kernel = matrix(&layer.kernel, width, units, &format!("dense[{idx}].kernel"))?;
            dense.push(DenseLayer {
                kernel,
                bias: Array1::from(layer.bias),
                activation: layer.activation,
            });
            width = units;
        }

        if width != 1 {
            return Err(invalid(format!("model output width is {width}, expected 1")));
        }

        Ok(Self {
            name: artifact.name.unwrap_or_else(|| "lstm".to_string()),
            lstm,
            dense,
        })
    }
}

impl SequenceModel for LstmModel {
    fn predict(&self, window: &ForecastWindow) -> ForecastResult<f64> {
        let mut seq = window.batch().index_axis(ndarray::Axis(0), 0).to_owned();
        for layer in &self.lstm {
            seq = layer.forward(&seq);
        }

        let mut x = seq.row(seq.nrows() - 1).to_owned();
        for layer in &self.dense {
            x = layer.forward(x.view());
        }

        match x.get(0) {
            Some(v) if v.is_finite() => Ok(*v),
            Some(v) => Err(ForecastError::inference(format!("{} produced non-finite output {v}", self.name))),
            None => Err(ForecastError::inference(format!("{} produced no output", self.name))),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn invalid(msg: impl Into<String>) -> ForecastError {
    ForecastError::ArtifactInvalid(msg.into())
}

fn matrix(rows: &[Vec<f64>], nrows: usize, ncols: usize, what: &str) -> ForecastResult<Array2<f64>> {
    if rows.len() != nrows || rows.iter().any(|r| r.len() != ncols) {
        return Err(invalid(format!("{what} must be {nrows}x{ncols}")));
    }
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((nrows, ncols), flat).map_err(|e| invalid(format!("{what}: {e}")))
}
