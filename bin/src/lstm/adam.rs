use ndarray::{Array, Dimension, Zip};

use super::network::LstmWeights;

/// Adam optimizer keeping first and second moment estimates shaped like the weights.
///
/// ```text
/// m = beta1 * m + (1 - beta1) * gradient
/// v = beta2 * v + (1 - beta2) * gradient^2
/// weight -= learning_rate * m_hat / (sqrt(v_hat) + epsilon)
/// ```
pub struct Adam {
    learning_rate : f64,
    beta1 : f64,
    beta2 : f64,
    epsilon : f64,
    m : LstmWeights,
    v : LstmWeights,
    t : i32
}

#[derive(Clone, Copy)]
struct AdamStep {
    learning_rate : f64,
    beta1 : f64,
    beta2 : f64,
    epsilon : f64,
    bias_correction1 : f64,
    bias_correction2 : f64
}

impl AdamStep {
    fn apply<D : Dimension>(&self, weight : &mut Array<f64, D>, gradient : &Array<f64, D>,
                            m : &mut Array<f64, D>, v : &mut Array<f64, D>) {
        Zip::from(weight).and(gradient).and(m).and(v).for_each(|w, &g, m, v| {
            *m = self.beta1 * *m + (1.0 - self.beta1) * g;
            *v = self.beta2 * *v + (1.0 - self.beta2) * g * g;

            let m_hat = *m / self.bias_correction1;
            let v_hat = *v / self.bias_correction2;
            *w -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
        });
    }
}

impl Adam {
    pub fn new(learning_rate : f64, weights : &LstmWeights) -> Adam {
        Adam { learning_rate, beta1 : 0.9, beta2 : 0.999, epsilon : 1e-8,
            m : weights.zeros_like(), v : weights.zeros_like(), t : 0 }
    }

    pub fn step(&mut self, weights : &mut LstmWeights, gradients : &LstmWeights) {
        self.t += 1;
        let update = AdamStep {
            learning_rate : self.learning_rate,
            beta1 : self.beta1,
            beta2 : self.beta2,
            epsilon : self.epsilon,
            bias_correction1 : 1.0 - self.beta1.powi(self.t),
            bias_correction2 : 1.0 - self.beta2.powi(self.t)
        };

        let moments = self.m.layers.iter_mut().zip(self.v.layers.iter_mut());
        for ((layer, gradient), (m, v)) in weights.layers.iter_mut().zip(&gradients.layers).zip(moments) {
            update.apply(&mut layer.w, &gradient.w, &mut m.w, &mut v.w);
            update.apply(&mut layer.b, &gradient.b, &mut m.b, &mut v.b);
        }
        update.apply(&mut weights.head_w, &gradients.head_w, &mut self.m.head_w, &mut self.v.head_w);
        update.apply(&mut weights.head_b, &gradients.head_b, &mut self.m.head_b, &mut self.v.head_b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lstm::network::LstmArchitecture;
    use rand::{SeedableRng, rngs::StdRng};

    fn weights() -> LstmWeights {
        let architecture = LstmArchitecture { input_size : 1, hidden_size : 2, num_layers : 1 };
        LstmWeights::init(&architecture, &mut StdRng::seed_from_u64(1))
    }

    #[test]
    fn first_step_moves_each_weight_by_learning_rate() {
        let mut weights = weights();
        let original = weights.clone();
        let mut gradients = weights.zeros_like();
        gradients.head_b[0] = 3.0;
        gradients.layers[0].w[[0, 0]] = -0.02;

        let mut adam = Adam::new(0.01, &weights);
        adam.step(&mut weights, &gradients);

        assert!((weights.head_b[0] - (original.head_b[0] - 0.01)).abs() < 1e-6);
        assert!((weights.layers[0].w[[0, 0]] - (original.layers[0].w[[0, 0]] + 0.01)).abs() < 1e-6);
        assert_eq!(weights.layers[0].w[[1, 1]], original.layers[0].w[[1, 1]]);
        assert_eq!(weights.head_w, original.head_w);
    }

    #[test]
    fn repeated_steps_descend_a_quadratic() {
        let mut weights = weights();
        let mut adam = Adam::new(0.05, &weights);

        // Loss (head_b - 2)^2
        for _ in 0..500 {
            let mut gradients = weights.zeros_like();
            gradients.head_b[0] = 2.0 * (weights.head_b[0] - 2.0);
            adam.step(&mut weights, &gradients);
        }

        assert!((weights.head_b[0] - 2.0).abs() < 0.1);
    }
}
