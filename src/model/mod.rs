//! Classifiers over window feature vectors and their model files.

mod logistic;
mod naive_bayes;

pub use logistic::LogisticRegression;
pub use naive_bayes::GaussianNaiveBayes;

use crate::utils::Result;
use bincode::{deserialize_from, serialize_into};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::str::FromStr;

pub const MIN_TRAINING_EXAMPLES: usize = 5;
const MODEL_FORMAT_VERSION: u32 = 1;

/// Probability that a feature vector comes from a modified base.
pub trait Classifier: Send + Sync {
    fn predict_proba(&self, features: &[f64]) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassifierKind {
    LogisticRegression,
    NaiveBayes,
}

impl ClassifierKind {
    pub fn code(self) -> &'static str {
        match self {
            ClassifierKind::LogisticRegression => "LR",
            ClassifierKind::NaiveBayes => "NBC",
        }
    }
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for ClassifierKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "LR" => Ok(ClassifierKind::LogisticRegression),
            "NBC" => Ok(ClassifierKind::NaiveBayes),
            _ => Err(format!("Invalid classifier '{}', options are LR or NBC", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Model {
    Logistic(LogisticRegression),
    NaiveBayes(GaussianNaiveBayes),
}

#[derive(Serialize, Deserialize)]
struct SerializedModel {
    format_version: u32,
    model: Model,
}

impl Model {
    pub fn fit(kind: ClassifierKind, features: &[Vec<f64>], labels: &[bool]) -> Result<Self> {
        if features.len() != labels.len() {
            return Err(format!(
                "Got {} feature vectors but {} labels",
                features.len(),
                labels.len()
            ));
        }
        if labels.len() < MIN_TRAINING_EXAMPLES {
            return Err(format!(
                "Insufficient data aligned to labeled positions for training: {} observations, at least {} required",
                labels.len(),
                MIN_TRAINING_EXAMPLES
            ));
        }
        let num_features = features[0].len();
        if num_features == 0 || features.iter().any(|f| f.len() != num_features) {
            return Err("Feature vectors must be non-empty and of equal length".into());
        }
        let num_modified = labels.iter().filter(|&&l| l).count();
        if num_modified == 0 || num_modified == labels.len() {
            return Err(format!(
                "Training requires both modified and unmodified observations, got {} modified of {}",
                num_modified,
                labels.len()
            ));
        }
        log::info!(
            "Training {} classifier on {} observations ({} modified)",
            kind,
            labels.len(),
            num_modified
        );
        Ok(match kind {
            ClassifierKind::LogisticRegression => {
                Model::Logistic(LogisticRegression::fit(features, labels))
            }
            ClassifierKind::NaiveBayes => {
                Model::NaiveBayes(GaussianNaiveBayes::fit(features, labels))
            }
        })
    }

    pub fn kind(&self) -> ClassifierKind {
        match self {
            Model::Logistic(_) => ClassifierKind::LogisticRegression,
            Model::NaiveBayes(_) => ClassifierKind::NaiveBayes,
        }
    }

    pub fn num_features(&self) -> usize {
        match self {
            Model::Logistic(m) => m.num_features(),
            Model::NaiveBayes(m) => m.num_features(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .map_err(|e| format!("Failed to create model file {}: {}", path.display(), e))?;
        let mut writer = BufWriter::new(file);
        let serialized = SerializedModel {
            format_version: MODEL_FORMAT_VERSION,
            model: self.clone(),
        };
        serialize_into(&mut writer, &serialized)
            .map_err(|e| format!("Failed to write model file {}: {}", path.display(), e))?;
        writer
            .flush()
            .map_err(|e| format!("Failed to write model file {}: {}", path.display(), e))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| format!("Failed to open model file {}: {}", path.display(), e))?;
        Self::read(BufReader::new(file))
            .map_err(|e| format!("Invalid model file {}: {}", path.display(), e))
    }

    fn read<R: Read>(reader: R) -> Result<Self> {
        let snapshot: SerializedModel = deserialize_from(reader).map_err(|e| e.to_string())?;
        if snapshot.format_version != MODEL_FORMAT_VERSION {
            return Err(format!(
                "format version {} is not supported, expected {}",
                snapshot.format_version, MODEL_FORMAT_VERSION
            ));
        }
        Ok(snapshot.model)
    }
}

impl Classifier for Model {
    fn predict_proba(&self, features: &[f64]) -> f64 {
        match self {
            Model::Logistic(m) => m.predict_proba(features),
            Model::NaiveBayes(m) => m.predict_proba(features),
        }
    }
}
