use crate::model::Classifier;
use crate::utils::{Label, LabelTable, Result, Strand, TargetBase};
use itertools::Itertools;
use std::io::Write;
use std::sync::Arc;

/// `k` slot means in strand order followed by the read quality.
pub type FeatureVector = Vec<f64>;

/// A flushed window together with where it was observed.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteFeatures {
    pub contig: String,
    pub read_id: String,
    /// 0-based anchor position
    pub position: usize,
    pub strand: Strand,
    pub context: String,
    pub features: FeatureVector,
}

impl SiteFeatures {
    fn tsv_prefix(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.contig,
            self.read_id,
            self.position,
            self.context,
            self.features.iter().join(","),
            self.strand
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationRecord {
    pub site: SiteFeatures,
    pub label: &'static str,
    pub probability: f64,
}

impl ClassificationRecord {
    pub fn to_tsv(&self) -> String {
        format!(
            "{}\t{}\t{:.2}",
            self.site.tsv_prefix(),
            self.label,
            self.probability
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    pub site: SiteFeatures,
    pub label: Label,
}

impl TrainingExample {
    pub fn to_tsv(&self, base: TargetBase) -> String {
        format!("{}\t{}", self.site.tsv_prefix(), self.label.tag(base))
    }
}

/// Destination of the feature vectors produced by flushed windows.
pub trait FeatureSink {
    fn accept(&mut self, site: SiteFeatures) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Scores every site with the model and appends one line per site.
pub struct ScoringSink<W: Write> {
    writer: W,
    classifier: Arc<dyn Classifier>,
    base: TargetBase,
}

impl<W: Write> ScoringSink<W> {
    pub fn new(writer: W, classifier: Arc<dyn Classifier>, base: TargetBase) -> Self {
        Self {
            writer,
            classifier,
            base,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> FeatureSink for ScoringSink<W> {
    fn accept(&mut self, site: SiteFeatures) -> Result<()> {
        let probability = self.classifier.predict_proba(&site.features);
        let label = if probability >= 0.5 {
            self.base.modified_tag()
        } else {
            self.base.unmodified_tag()
        };
        let record = ClassificationRecord {
            site,
            label,
            probability,
        };
        writeln!(self.writer, "{}", record.to_tsv())
            .map_err(|e| format!("Failed to write classification: {}", e))
    }

    fn finish(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| format!("Failed to flush classifications: {}", e))
    }
}

/// Collects labelled examples in memory for the coordinator.
pub struct TrainingSink {
    labels: Arc<LabelTable>,
    examples: Vec<TrainingExample>,
}

impl TrainingSink {
    pub fn new(labels: Arc<LabelTable>) -> Self {
        Self {
            labels,
            examples: Vec::new(),
        }
    }

    pub fn into_examples(self) -> Vec<TrainingExample> {
        self.examples
    }
}

impl FeatureSink for TrainingSink {
    fn accept(&mut self, site: SiteFeatures) -> Result<()> {
        let label = self
            .labels
            .get(&site.contig, site.position, site.strand)
            .ok_or_else(|| {
                format!(
                    "No training label for {}:{} ({}); the positions file does not match the alignments",
                    site.contig,
                    site.position + 1,
                    site.strand
                )
            })?;
        self.examples.push(TrainingExample { site, label });
        Ok(())
    }
}
