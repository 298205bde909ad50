use ndarray::{s, Array1, Array2, ArrayView1, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Clone, Copy, Deserialize, Serialize)]
pub struct LstmArchitecture {
    pub input_size : usize,
    pub hidden_size : usize,
    pub num_layers : usize
}

/// One LSTM layer with the four gates stacked as `[input, forget, cell, output]`.
/// `w` maps the concatenation `[x; h_prev]` to the gate pre-activations.
#[derive(Debug, PartialEq, Clone, Deserialize, Serialize)]
pub struct LstmLayer {
    pub w : Array2<f64>,
    pub b : Array1<f64>
}

#[derive(Debug, Clone)]
struct StepCache {
    z : Array1<f64>,
    i : Array1<f64>,
    f : Array1<f64>,
    g : Array1<f64>,
    o : Array1<f64>,
    c_prev : Array1<f64>,
    tanh_c : Array1<f64>
}

#[derive(Debug, Clone)]
pub struct LayerCache {
    steps : Vec<StepCache>,
    outputs : Vec<Array1<f64>>
}

fn sigmoid(v : f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

impl LstmLayer {
    pub fn hidden_size(&self) -> usize {
        self.b.len() / 4
    }

    pub fn input_size(&self) -> usize {
        self.w.ncols() - self.hidden_size()
    }

    fn step(&self, x : ArrayView1<f64>, h_prev : &Array1<f64>, c_prev : &Array1<f64>) -> (Array1<f64>, Array1<f64>, StepCache) {
        let hidden = self.hidden_size();
        let input = self.input_size();

        let mut z = Array1::<f64>::zeros(input + hidden);
        z.slice_mut(s![..input]).assign(&x);
        z.slice_mut(s![input..]).assign(h_prev);

        let a = self.w.dot(&z) + &self.b;
        let i = a.slice(s![..hidden]).mapv(sigmoid);
        let f = a.slice(s![hidden..2 * hidden]).mapv(sigmoid);
        let g = a.slice(s![2 * hidden..3 * hidden]).mapv(f64::tanh);
        let o = a.slice(s![3 * hidden..]).mapv(sigmoid);

        let c = &f * c_prev + &(&i * &g);
        let tanh_c = c.mapv(f64::tanh);
        let h = &o * &tanh_c;

        let cache = StepCache { z, i, f, g, o, c_prev : c_prev.clone(), tanh_c };
        (h, c, cache)
    }

    fn forward(&self, inputs : &[Array1<f64>]) -> LayerCache {
        let hidden = self.hidden_size();
        let mut h = Array1::<f64>::zeros(hidden);
        let mut c = Array1::<f64>::zeros(hidden);

        let mut steps = Vec::with_capacity(inputs.len());
        let mut outputs = Vec::with_capacity(inputs.len());
        for x in inputs {
            let (h_next, c_next, cache) = self.step(x.view(), &h, &c);
            h = h_next;
            c = c_next;
            steps.push(cache);
            outputs.push(h.clone());
        }

        LayerCache { steps, outputs }
    }

    /// Backpropagation through time. `dh_out[t]` is the loss gradient flowing into
    /// the hidden output of step `t` from above; returns the gradient for each input.
    fn backward(&self, cache : &LayerCache, dh_out : &[Array1<f64>], grad : &mut LstmLayer) -> Vec<Array1<f64>> {
        let hidden = self.hidden_size();
        let input = self.input_size();

        let mut dh_next = Array1::<f64>::zeros(hidden);
        let mut dc_next = Array1::<f64>::zeros(hidden);
        let mut dx = vec![Array1::<f64>::zeros(input); cache.steps.len()];

        for t in (0..cache.steps.len()).rev() {
            let step = &cache.steps[t];
            let dh = &dh_out[t] + &dh_next;

            let dtanh_c = step.tanh_c.mapv(|v| 1.0 - v * v);
            let dc = &dc_next + &(&dh * &step.o * &dtanh_c);

            let da_i = &dc * &step.g * &step.i.mapv(|v| v * (1.0 - v));
            let da_f = &dc * &step.c_prev * &step.f.mapv(|v| v * (1.0 - v));
            let da_g = &dc * &step.i * &step.g.mapv(|v| 1.0 - v * v);
            let da_o = &dh * &step.tanh_c * &step.o.mapv(|v| v * (1.0 - v));

            let mut da = Array1::<f64>::zeros(4 * hidden);
            da.slice_mut(s![..hidden]).assign(&da_i);
            da.slice_mut(s![hidden..2 * hidden]).assign(&da_f);
            da.slice_mut(s![2 * hidden..3 * hidden]).assign(&da_g);
            da.slice_mut(s![3 * hidden..]).assign(&da_o);

            let outer = da.view().insert_axis(Axis(1)).dot(&step.z.view().insert_axis(Axis(0)));
            grad.w += &outer;
            grad.b += &da;

            let dz = self.w.t().dot(&da);
            dx[t] = dz.slice(s![..input]).to_owned();
            dh_next = dz.slice(s![input..]).to_owned();
            dc_next = &dc * &step.f;
        }

        dx
    }
}

/// Stacked LSTM layers followed by a linear head. The head predicts the change
/// from the window's anchor, so a zero head repeats the last value.
#[derive(Debug, PartialEq, Clone, Deserialize, Serialize)]
pub struct LstmWeights {
    pub layers : Vec<LstmLayer>,
    pub head_w : Array1<f64>,
    pub head_b : Array1<f64>
}

pub struct ForwardPass {
    layer_caches : Vec<LayerCache>,
    pub output : f64
}

impl LstmWeights {
    pub fn init(architecture : &LstmArchitecture, rng : &mut impl Rng) -> LstmWeights {
        let hidden = architecture.hidden_size;
        let limit = 1.0 / (hidden as f64).sqrt();

        let mut layers = Vec::with_capacity(architecture.num_layers);
        for layer in 0..architecture.num_layers {
            let input = if layer == 0 { architecture.input_size } else { hidden };
            let w = Array2::from_shape_fn((4 * hidden, input + hidden), |_| rng.gen_range(-limit, limit));
            let mut b = Array1::<f64>::zeros(4 * hidden);
            // Forget gate starts open
            b.slice_mut(s![hidden..2 * hidden]).fill(1.0);
            layers.push(LstmLayer { w, b });
        }

        LstmWeights { layers, head_w : Array1::zeros(hidden), head_b : Array1::zeros(1) }
    }

    pub fn zeros_like(&self) -> LstmWeights {
        LstmWeights {
            layers : self.layers.iter()
                .map(|l| LstmLayer { w : Array2::zeros(l.w.raw_dim()), b : Array1::zeros(l.b.len()) })
                .collect(),
            head_w : Array1::zeros(self.head_w.len()),
            head_b : Array1::zeros(self.head_b.len())
        }
    }

    pub fn architecture(&self) -> LstmArchitecture {
        LstmArchitecture {
            input_size : self.layers.first().map(|l| l.input_size()).unwrap_or(0),
            hidden_size : self.head_w.len(),
            num_layers : self.layers.len()
        }
    }

    pub fn forward(&self, steps : &[Array1<f64>], anchor : f64) -> ForwardPass {
        let mut layer_caches = Vec::with_capacity(self.layers.len());
        let mut inputs = steps.to_vec();
        for layer in &self.layers {
            let cache = layer.forward(&inputs);
            inputs = cache.outputs.clone();
            layer_caches.push(cache);
        }

        let head = match inputs.last() {
            Some(h_last) => self.head_w.dot(h_last),
            None => 0.0
        };

        ForwardPass { layer_caches, output : anchor + head + self.head_b[0] }
    }

    /// Accumulates into `grad` the gradient of a loss whose derivative with respect
    /// to this pass's output is `d_output`.
    pub fn backward(&self, pass : &ForwardPass, d_output : f64, grad : &mut LstmWeights) {
        grad.head_b[0] += d_output;

        let top = match pass.layer_caches.last() {
            Some(top) => top,
            None => return
        };
        let seq_len = top.outputs.len();
        if seq_len == 0 {
            return;
        }
        grad.head_w.scaled_add(d_output, &top.outputs[seq_len - 1]);

        let mut dh_out = vec![Array1::<f64>::zeros(self.head_w.len()); seq_len];
        dh_out[seq_len - 1] = &self.head_w * d_output;
        for (layer_index, layer) in self.layers.iter().enumerate().rev() {
            dh_out = layer.backward(&pass.layer_caches[layer_index], &dh_out, &mut grad.layers[layer_index]);
        }
    }

    pub fn norm(&self) -> f64 {
        let mut total = self.head_w.iter().map(|v| v * v).sum::<f64>() + self.head_b.iter().map(|v| v * v).sum::<f64>();
        for layer in &self.layers {
            total += layer.w.iter().map(|v| v * v).sum::<f64>();
            total += layer.b.iter().map(|v| v * v).sum::<f64>();
        }

        total.sqrt()
    }

    pub fn scale(&mut self, factor : f64) {
        for layer in self.layers.iter_mut() {
            layer.w *= factor;
            layer.b *= factor;
        }
        self.head_w *= factor;
        self.head_b *= factor;
    }

    pub fn is_finite(&self) -> bool {
        self.norm().is_finite()
    }
}
