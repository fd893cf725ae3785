use super::Classifier;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const VAR_SMOOTHING: f64 = 1e-9;

/// Gaussian naive Bayes with one mean/variance per class and feature.
/// Class index 0 is unmodified, 1 is modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianNaiveBayes {
    priors: [f64; 2],
    means: [Vec<f64>; 2],
    vars: [Vec<f64>; 2],
}

impl GaussianNaiveBayes {
    pub fn fit(features: &[Vec<f64>], labels: &[bool]) -> Self {
        let num_features = features[0].len();
        // smoothing scales with the largest feature variance
        let overall_max_var = (0..num_features)
            .map(|j| variance(features.iter().map(|f| f[j])))
            .fold(0.0, f64::max);
        let epsilon = VAR_SMOOTHING * overall_max_var.max(1.0);

        let class_stats = |class: bool| {
            let rows: Vec<&Vec<f64>> = features
                .iter()
                .zip(labels)
                .filter(|(_, &l)| l == class)
                .map(|(f, _)| f)
                .collect();
            let n = rows.len() as f64;
            let means: Vec<f64> = (0..num_features)
                .map(|j| rows.iter().map(|f| f[j]).sum::<f64>() / n)
                .collect();
            let vars: Vec<f64> = (0..num_features)
                .map(|j| variance(rows.iter().map(|f| f[j])) + epsilon)
                .collect();
            (n / features.len() as f64, means, vars)
        };
        let (prior0, means0, vars0) = class_stats(false);
        let (prior1, means1, vars1) = class_stats(true);

        Self {
            priors: [prior0, prior1],
            means: [means0, means1],
            vars: [vars0, vars1],
        }
    }

    pub fn num_features(&self) -> usize {
        self.means[0].len()
    }

    fn joint_log_likelihood(&self, class: usize, features: &[f64]) -> f64 {
        let log_prior = self.priors[class].ln();
        let log_density: f64 = features
            .iter()
            .zip(self.means[class].iter().zip(&self.vars[class]))
            .map(|(x, (m, v))| -0.5 * (2.0 * PI * v).ln() - (x - m).powi(2) / (2.0 * v))
            .sum();
        log_prior + log_density
    }
}

impl Classifier for GaussianNaiveBayes {
    fn predict_proba(&self, features: &[f64]) -> f64 {
        let unmodified = self.joint_log_likelihood(0, features);
        let modified = self.joint_log_likelihood(1, features);
        1.0 / (1.0 + (unmodified - modified).exp())
    }
}

fn variance<I: Iterator<Item = f64> + Clone>(values: I) -> f64 {
    let n = values.clone().count() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mean = values.clone().sum::<f64>() / n;
    values.map(|x| (x - mean).powi(2)).sum::<f64>() / n
}
