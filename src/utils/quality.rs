use super::{open_text_reader, Result};
use bio::io::fastq;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

const PHRED_OFFSET: f64 = 33.0;

/// Mean base quality per read id, looked up while streaming alignments.
#[derive(Debug, Default, Clone)]
pub struct ReadQualities {
    by_read: HashMap<String, f64>,
}

impl ReadQualities {
    pub fn from_fastq(path: &Path) -> Result<Self> {
        let reader = open_text_reader(path)?;
        let qualities = Self::from_reader(reader)
            .map_err(|e| format!("Error reading {}: {}", path.display(), e))?;
        log::info!(
            "Loaded quality scores for {} reads from {}",
            qualities.len(),
            path.display()
        );
        Ok(qualities)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut by_read = HashMap::new();
        for (index, result) in fastq::Reader::new(reader).records().enumerate() {
            let record = result.map_err(|e| format!("FASTQ record {}: {}", index + 1, e))?;
            by_read.insert(record.id().to_string(), mean_phred(record.qual()));
        }
        Ok(Self { by_read })
    }

    pub fn get(&self, read_id: &str) -> Option<f64> {
        self.by_read.get(read_id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_read.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_read.is_empty()
    }
}

impl FromIterator<(String, f64)> for ReadQualities {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            by_read: iter.into_iter().collect(),
        }
    }
}

fn mean_phred(qual: &[u8]) -> f64 {
    if qual.is_empty() {
        return 0.0;
    }
    let total: f64 = qual.iter().map(|&q| q as f64 - PHRED_OFFSET).sum();
    total / qual.len() as f64
}
