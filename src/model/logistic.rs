use super::Classifier;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

const EPOCHS: usize = 300;
const LEARNING_RATE: f64 = 0.05;
const L2_PENALTY: f64 = 1e-4;
const SEED: u64 = 42;

/// Logistic regression on z-scored features, fitted by seeded SGD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    mean: Vec<f64>,
    scale: Vec<f64>,
    weights: Vec<f64>,
    bias: f64,
}

impl LogisticRegression {
    pub fn fit(features: &[Vec<f64>], labels: &[bool]) -> Self {
        let n = features.len() as f64;
        let num_features = features[0].len();

        let mean: Vec<f64> = (0..num_features)
            .map(|j| features.iter().map(|f| f[j]).sum::<f64>() / n)
            .collect();
        let scale: Vec<f64> = (0..num_features)
            .map(|j| {
                let var = features.iter().map(|f| (f[j] - mean[j]).powi(2)).sum::<f64>() / n;
                if var.sqrt() > 1e-12 {
                    var.sqrt()
                } else {
                    1.0
                }
            })
            .collect();

        let mut model = Self {
            mean,
            scale,
            weights: vec![0.0; num_features],
            bias: 0.0,
        };
        let standardized: Vec<Vec<f64>> = features.iter().map(|f| model.standardize(f)).collect();

        let mut rng = StdRng::seed_from_u64(SEED);
        let mut order: Vec<usize> = (0..features.len()).collect();
        for _ in 0..EPOCHS {
            order.shuffle(&mut rng);
            for &i in &order {
                let z = &standardized[i];
                let target = if labels[i] { 1.0 } else { 0.0 };
                let error = model.linear_prob(z) - target;
                for (w, x) in model.weights.iter_mut().zip(z) {
                    *w -= LEARNING_RATE * (error * x + L2_PENALTY * *w);
                }
                model.bias -= LEARNING_RATE * error;
            }
        }
        model
    }

    pub fn num_features(&self) -> usize {
        self.weights.len()
    }

    fn standardize(&self, features: &[f64]) -> Vec<f64> {
        features
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (m, s))| (x - m) / s)
            .collect()
    }

    fn linear_prob(&self, z: &[f64]) -> f64 {
        let score: f64 = self.bias + self.weights.iter().zip(z).map(|(w, x)| w * x).sum::<f64>();
        1.0 / (1.0 + (-score).exp())
    }
}

impl Classifier for LogisticRegression {
    fn predict_proba(&self, features: &[f64]) -> f64 {
        self.linear_prob(&self.standardize(features))
    }
}
