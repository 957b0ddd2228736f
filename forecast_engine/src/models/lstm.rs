//! Single-layer LSTM with a dense head, predicting the next scaled close.
//!
//! The forward pass for each step `t` with input `x_t`:
//! - i = σ(W_i x_t + U_i h + b_i), f = σ(W_f x_t + U_f h + b_f)
//! - g = tanh(W_g x_t + U_g h + b_g), o = σ(W_o x_t + U_o h + b_o)
//! - c = f ⊙ c + i ⊙ g, h = o ⊙ tanh(c)
//!
//! and the prediction is `w_out · h_T + b_out`. Training is full
//! back-propagation through time with Adam on mean squared error.

use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ModelError, SequenceModel, ensure_finite, linalg::dot};

const GRAD_CLIP_NORM: f64 = 1.0;

/// Hyperparameters for [`LstmNetwork::fit`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LstmParams {
    pub hidden_units: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub seed: u64,
}

impl Default for LstmParams {
    fn default() -> Self {
        Self {
            hidden_units: 32,
            epochs: 15,
            batch_size: 32,
            learning_rate: 0.001,
            seed: 42,
        }
    }
}

/// Weights of a trained network. Serialized as the `sequence_model` artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmNetwork {
    lookback: usize,
    hidden: usize,
    /// 4H input weights, gate blocks in i, f, g, o order.
    w_input: Vec<f64>,
    /// 4H × H recurrent weights, row-major.
    w_recurrent: Vec<f64>,
    bias: Vec<f64>,
    w_out: Vec<f64>,
    b_out: f64,
}

/// Loss history returned by [`LstmNetwork::fit`].
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    pub samples: usize,
    pub epoch_losses: Vec<f64>,
}

struct Step {
    i: Vec<f64>,
    f: Vec<f64>,
    g: Vec<f64>,
    o: Vec<f64>,
    c: Vec<f64>,
    h: Vec<f64>,
}

#[derive(Clone)]
struct Gradients {
    w_input: Vec<f64>,
    w_recurrent: Vec<f64>,
    bias: Vec<f64>,
    w_out: Vec<f64>,
    b_out: f64,
}

impl Gradients {
    fn zeros(hidden: usize) -> Self {
        Self {
            w_input: vec![0.0; 4 * hidden],
            w_recurrent: vec![0.0; 4 * hidden * hidden],
            bias: vec![0.0; 4 * hidden],
            w_out: vec![0.0; hidden],
            b_out: 0.0,
        }
    }

    fn norm(&self) -> f64 {
        let sq = |v: &[f64]| v.iter().map(|x| x * x).sum::<f64>();
        (sq(&self.w_input)
            + sq(&self.w_recurrent)
            + sq(&self.bias)
            + sq(&self.w_out)
            + self.b_out * self.b_out)
            .sqrt()
    }

    fn scale(&mut self, k: f64) {
        for v in [
            &mut self.w_input,
            &mut self.w_recurrent,
            &mut self.bias,
            &mut self.w_out,
        ] {
            v.iter_mut().for_each(|x| *x *= k);
        }
        self.b_out *= k;
    }
}

struct Adam {
    lr: f64,
    t: i32,
    m: Gradients,
    v: Gradients,
}

impl Adam {
    const BETA1: f64 = 0.9;
    const BETA2: f64 = 0.999;
    const EPS: f64 = 1e-7;

    fn new(lr: f64, hidden: usize) -> Self {
        Self {
            lr,
            t: 0,
            m: Gradients::zeros(hidden),
            v: Gradients::zeros(hidden),
        }
    }

    fn step(&mut self, net: &mut LstmNetwork, g: &Gradients) {
        self.t += 1;
        let bc1 = 1.0 - Self::BETA1.powi(self.t);
        let bc2 = 1.0 - Self::BETA2.powi(self.t);
        let lr = self.lr;
        let (m, v) = (&mut self.m, &mut self.v);
        adam_update(&mut net.w_input, &g.w_input, &mut m.w_input, &mut v.w_input, lr, bc1, bc2);
        adam_update(
            &mut net.w_recurrent,
            &g.w_recurrent,
            &mut m.w_recurrent,
            &mut v.w_recurrent,
            lr,
            bc1,
            bc2,
        );
        adam_update(&mut net.bias, &g.bias, &mut m.bias, &mut v.bias, lr, bc1, bc2);
        adam_update(&mut net.w_out, &g.w_out, &mut m.w_out, &mut v.w_out, lr, bc1, bc2);
        adam_update(
            std::slice::from_mut(&mut net.b_out),
            std::slice::from_ref(&g.b_out),
            std::slice::from_mut(&mut m.b_out),
            std::slice::from_mut(&mut v.b_out),
            lr,
            bc1,
            bc2,
        );
    }
}

fn adam_update(p: &mut [f64], g: &[f64], m: &mut [f64], v: &mut [f64], lr: f64, bc1: f64, bc2: f64) {
    for k in 0..p.len() {
        m[k] = Adam::BETA1 * m[k] + (1.0 - Adam::BETA1) * g[k];
        v[k] = Adam::BETA2 * v[k] + (1.0 - Adam::BETA2) * g[k] * g[k];
        let m_hat = m[k] / bc1;
        let v_hat = v[k] / bc2;
        p[k] -= lr * m_hat / (v_hat.sqrt() + Adam::EPS);
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl LstmNetwork {
    /// Xavier-uniform weights, zero biases except a forget-gate bias of 1.
    fn init(lookback: usize, hidden: usize, rng: &mut StdRng) -> Self {
        let mut uniform = |n: usize, fan_in: usize, fan_out: usize| -> Vec<f64> {
            let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
            (0..n).map(|_| rng.random_range(-limit..limit)).collect()
        };
        let w_input = uniform(4 * hidden, 1, 4 * hidden);
        let w_recurrent = uniform(4 * hidden * hidden, hidden, 4 * hidden);
        let w_out = uniform(hidden, hidden, 1);
        let mut bias = vec![0.0; 4 * hidden];
        bias[hidden..2 * hidden].iter_mut().for_each(|b| *b = 1.0);
        Self {
            lookback,
            hidden,
            w_input,
            w_recurrent,
            bias,
            w_out,
            b_out: 0.0,
        }
    }

    pub fn hidden_units(&self) -> usize {
        self.hidden
    }

    /// Checks that weight lengths agree with `hidden` and `lookback`.
    /// Decoded artifacts are not trusted to be consistent.
    pub fn validate(&self) -> Result<(), ModelError> {
        let hs = self.hidden;
        if self.lookback == 0 || hs == 0 {
            return Err(ModelError::InvalidData(format!(
                "lstm needs positive lookback and hidden units, got {} and {hs}",
                self.lookback
            )));
        }
        let expected = [
            ("w_input", self.w_input.len(), 4 * hs),
            ("w_recurrent", self.w_recurrent.len(), 4 * hs * hs),
            ("bias", self.bias.len(), 4 * hs),
            ("w_out", self.w_out.len(), hs),
        ];
        for (name, actual, want) in expected {
            if actual != want {
                return Err(ModelError::InvalidData(format!(
                    "lstm {name} has {actual} weights, expected {want} for {hs} hidden units"
                )));
            }
        }
        Ok(())
    }

    fn cell(&self, x: f64, h_prev: &[f64], c_prev: &[f64]) -> Step {
        let hs = self.hidden;
        let z: Vec<f64> = (0..4 * hs)
            .map(|k| {
                self.bias[k] + self.w_input[k] * x + dot(&self.w_recurrent[k * hs..(k + 1) * hs], h_prev)
            })
            .collect();
        let i: Vec<f64> = z[..hs].iter().map(|&v| sigmoid(v)).collect();
        let f: Vec<f64> = z[hs..2 * hs].iter().map(|&v| sigmoid(v)).collect();
        let g: Vec<f64> = z[2 * hs..3 * hs].iter().map(|&v| v.tanh()).collect();
        let o: Vec<f64> = z[3 * hs..].iter().map(|&v| sigmoid(v)).collect();
        let c: Vec<f64> = (0..hs).map(|j| f[j] * c_prev[j] + i[j] * g[j]).collect();
        let h: Vec<f64> = (0..hs).map(|j| o[j] * c[j].tanh()).collect();
        Step { i, f, g, o, c, h }
    }

    fn forward(&self, window: &[f64]) -> f64 {
        let mut h = vec![0.0; self.hidden];
        let mut c = vec![0.0; self.hidden];
        for &x in window {
            let s = self.cell(x, &h, &c);
            h = s.h;
            c = s.c;
        }
        dot(&self.w_out, &h) + self.b_out
    }

    /// Adds `scale ×` the gradient of the squared error for one sample into
    /// `grads`; returns the squared error.
    fn backprop(&self, window: &[f64], target: f64, grads: &mut Gradients, scale: f64) -> f64 {
        let hs = self.hidden;
        let mut h_states = vec![vec![0.0; hs]];
        let mut c_states = vec![vec![0.0; hs]];
        let mut steps = Vec::with_capacity(window.len());
        for &x in window {
            let s = self.cell(x, &h_states[h_states.len() - 1], &c_states[c_states.len() - 1]);
            h_states.push(s.h.clone());
            c_states.push(s.c.clone());
            steps.push(s);
        }

        let h_last = &h_states[h_states.len() - 1];
        let err = dot(&self.w_out, h_last) + self.b_out - target;
        let dy = 2.0 * err * scale;
        grads.b_out += dy;
        for j in 0..hs {
            grads.w_out[j] += dy * h_last[j];
        }

        let mut dh: Vec<f64> = self.w_out.iter().map(|w| w * dy).collect();
        let mut dc = vec![0.0; hs];
        let mut dz = vec![0.0; 4 * hs];
        for t in (0..steps.len()).rev() {
            let s = &steps[t];
            let c_prev = &c_states[t];
            let h_prev = &h_states[t];
            for j in 0..hs {
                let tc = s.c[j].tanh();
                let d_o = dh[j] * tc;
                let dcj = dc[j] + dh[j] * s.o[j] * (1.0 - tc * tc);
                let d_i = dcj * s.g[j];
                let d_g = dcj * s.i[j];
                let d_f = dcj * c_prev[j];
                dc[j] = dcj * s.f[j];
                dz[j] = d_i * s.i[j] * (1.0 - s.i[j]);
                dz[hs + j] = d_f * s.f[j] * (1.0 - s.f[j]);
                dz[2 * hs + j] = d_g * (1.0 - s.g[j] * s.g[j]);
                dz[3 * hs + j] = d_o * s.o[j] * (1.0 - s.o[j]);
            }
            let mut dh_prev = vec![0.0; hs];
            for k in 0..4 * hs {
                grads.w_input[k] += dz[k] * window[t];
                grads.bias[k] += dz[k];
                let row = &self.w_recurrent[k * hs..(k + 1) * hs];
                let grow = &mut grads.w_recurrent[k * hs..(k + 1) * hs];
                for j in 0..hs {
                    grow[j] += dz[k] * h_prev[j];
                    dh_prev[j] += row[j] * dz[k];
                }
            }
            dh = dh_prev;
        }
        err * err
    }

    /// Trains on every `lookback`-long window of `scaled` with the value that
    /// follows it as target.
    pub fn fit(
        scaled: &[f64],
        lookback: usize,
        params: &LstmParams,
    ) -> Result<(Self, FitReport), ModelError> {
        if lookback == 0 {
            return Err(ModelError::InvalidParameter {
                name: "lookback",
                reason: "must be at least 1".into(),
            });
        }
        if params.hidden_units == 0 || params.batch_size == 0 || params.epochs == 0 {
            return Err(ModelError::InvalidParameter {
                name: "hidden_units/batch_size/epochs",
                reason: "must be positive".into(),
            });
        }
        if !(params.learning_rate > 0.0 && params.learning_rate.is_finite()) {
            return Err(ModelError::InvalidParameter {
                name: "learning_rate",
                reason: format!("{} is not a positive number", params.learning_rate),
            });
        }
        if scaled.len() <= lookback {
            return Err(ModelError::InsufficientData {
                required: lookback + 1,
                actual: scaled.len(),
            });
        }
        ensure_finite(scaled, "training series")?;

        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut net = Self::init(lookback, params.hidden_units, &mut rng);
        let mut adam = Adam::new(params.learning_rate, params.hidden_units);
        let samples = scaled.len() - lookback;
        let mut order: Vec<usize> = (0..samples).collect();
        let mut epoch_losses = Vec::with_capacity(params.epochs);

        for epoch in 0..params.epochs {
            order.shuffle(&mut rng);
            let mut total = 0.0;
            for batch in order.chunks(params.batch_size) {
                let mut grads = Gradients::zeros(net.hidden);
                let scale = 1.0 / batch.len() as f64;
                for &s in batch {
                    total += net.backprop(&scaled[s..s + lookback], scaled[s + lookback], &mut grads, scale);
                }
                let norm = grads.norm();
                if !norm.is_finite() {
                    return Err(ModelError::Numerical(format!(
                        "gradient diverged in epoch {}",
                        epoch + 1
                    )));
                }
                if norm > GRAD_CLIP_NORM {
                    grads.scale(GRAD_CLIP_NORM / norm);
                }
                adam.step(&mut net, &grads);
            }
            let loss = total / samples as f64;
            debug!(epoch = epoch + 1, loss, "lstm epoch finished");
            epoch_losses.push(loss);
        }

        Ok((
            net,
            FitReport {
                samples,
                epoch_losses,
            },
        ))
    }
}

impl SequenceModel for LstmNetwork {
    fn lookback(&self) -> usize {
        self.lookback
    }

    fn predict_next(&self, window: &[f64]) -> Result<f64, ModelError> {
        self.validate()?;
        if window.len() != self.lookback {
            return Err(ModelError::ShapeMismatch {
                expected: self.lookback,
                actual: window.len(),
            });
        }
        let y = self.forward(window);
        if y.is_finite() {
            Ok(y)
        } else {
            Err(ModelError::Numerical("network produced a non-finite output".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> LstmParams {
        LstmParams {
            hidden_units: 4,
            epochs: 3,
            batch_size: 8,
            learning_rate: 0.01,
            seed: 7,
        }
    }

    fn wave(n: usize) -> Vec<f64> {
        (0..n).map(|i| 0.5 + 0.4 * (i as f64 / 6.0).sin()).collect()
    }

    #[test]
    fn backprop_matches_finite_differences() {
        let mut rng = StdRng::seed_from_u64(1);
        let net = LstmNetwork::init(5, 3, &mut rng);
        let window = [0.1, 0.4, 0.3, 0.8, 0.6];
        let target = 0.5;
        let mut grads = Gradients::zeros(3);
        net.backprop(&window, target, &mut grads, 1.0);

        let loss = |n: &LstmNetwork| (n.forward(&window) - target).powi(2);
        let eps = 1e-6;
        for k in [0, 5, 11] {
            let mut plus = net.clone();
            plus.w_recurrent[k] += eps;
            let mut minus = net.clone();
            minus.w_recurrent[k] -= eps;
            let numeric = (loss(&plus) - loss(&minus)) / (2.0 * eps);
            assert!(
                (numeric - grads.w_recurrent[k]).abs() < 1e-6,
                "w_recurrent[{k}]: numeric {numeric} vs analytic {}",
                grads.w_recurrent[k]
            );
        }
        for k in [0, 4, 10] {
            let mut plus = net.clone();
            plus.w_input[k] += eps;
            let mut minus = net.clone();
            minus.w_input[k] -= eps;
            let numeric = (loss(&plus) - loss(&minus)) / (2.0 * eps);
            assert!((numeric - grads.w_input[k]).abs() < 1e-6);
        }
    }

    #[test]
    fn training_reduces_loss_and_is_seeded() {
        let data = wave(120);
        let params = LstmParams { epochs: 8, ..small() };
        let (a, report) = LstmNetwork::fit(&data, 10, &params).unwrap();
        let (b, _) = LstmNetwork::fit(&data, 10, &params).unwrap();
        assert_eq!(a, b);
        assert_eq!(report.samples, 110);
        let first = report.epoch_losses[0];
        let last = *report.epoch_losses.last().unwrap();
        assert!(last < first, "loss did not decrease: {first} -> {last}");
    }

    #[test]
    fn rejects_short_series_and_wrong_window() {
        let err = LstmNetwork::fit(&wave(10), 10, &small()).unwrap_err();
        assert_eq!(err, ModelError::InsufficientData { required: 11, actual: 10 });

        let (net, _) = LstmNetwork::fit(&wave(30), 10, &small()).unwrap();
        assert!(matches!(
            net.predict_next(&[0.5; 9]),
            Err(ModelError::ShapeMismatch { expected: 10, actual: 9 })
        ));
        assert!(net.predict_next(&[0.5; 10]).unwrap().is_finite());
    }

    #[test]
    fn inconsistent_weights_are_rejected_not_sliced() {
        let (net, _) = LstmNetwork::fit(&wave(30), 10, &small()).unwrap();
        assert!(net.validate().is_ok());

        let mut truncated = net.clone();
        truncated.w_recurrent = vec![0.1, 0.2];
        assert!(matches!(
            truncated.predict_next(&[0.5; 10]),
            Err(ModelError::InvalidData(msg)) if msg.contains("w_recurrent")
        ));

        let mut no_lookback = net.clone();
        no_lookback.lookback = 0;
        assert!(matches!(no_lookback.validate(), Err(ModelError::InvalidData(_))));

        let mut short_head = net;
        short_head.w_out.pop();
        assert!(matches!(short_head.validate(), Err(ModelError::InvalidData(msg)) if msg.contains("w_out")));
    }
}
