use crate::utils::Result;

const EXPECTED_FIELD_COUNT: usize = 14;
const READ_ID_COLUMN: usize = 3;

/// One event-alignment line with its columns parsed into typed fields.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentRecord {
    pub contig: String,
    /// 0-based reference offset of the aligned k-mer
    pub position: usize,
    pub read_kmer: String,
    pub read_id: String,
    pub event_index: i64,
    pub event_mean: f64,
    pub event_stdv: f64,
    pub model_kmer: String,
    pub model_mean: f64,
    pub model_stdv: f64,
    pub samples: Vec<f64>,
}

impl AlignmentRecord {
    /// Parses a tab-separated line. Returns `Ok(None)` for the header line.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let fields: Vec<&str> = line.trim_end_matches(['\n', '\r']).split('\t').collect();
        if fields.len() != EXPECTED_FIELD_COUNT {
            return Err(format!(
                "Expected {} tab-separated fields, found {}",
                EXPECTED_FIELD_COUNT,
                fields.len()
            ));
        }
        if fields[0] == "contig" {
            return Ok(None);
        }

        let float = |index: usize, name: &str| {
            fields[index]
                .parse::<f64>()
                .map_err(|_| format!("Invalid {}: '{}'", name, fields[index]))
        };

        let position = fields[1]
            .parse::<usize>()
            .map_err(|_| format!("Invalid position: '{}'", fields[1]))?;
        let event_index = fields[5]
            .parse::<i64>()
            .map_err(|_| format!("Invalid event index: '{}'", fields[5]))?;
        let samples = if fields[13].is_empty() {
            Vec::new()
        } else {
            fields[13]
                .split(',')
                .map(|s| s.parse::<f64>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|_| format!("Invalid samples: '{}'", fields[13]))?
        };

        Ok(Some(Self {
            contig: fields[0].to_string(),
            position,
            read_kmer: fields[2].to_string(),
            read_id: fields[READ_ID_COLUMN].to_string(),
            event_index,
            event_mean: float(6, "event mean")?,
            event_stdv: float(7, "event stdv")?,
            model_kmer: fields[9].to_string(),
            model_mean: float(10, "model mean")?,
            model_stdv: float(11, "model stdv")?,
            samples,
        }))
    }

    /// Observed minus expected current for this event.
    pub fn current_diff(&self) -> f64 {
        self.event_mean - self.model_mean
    }

    pub fn has_placeholder_kmer(&self) -> bool {
        !self.model_kmer.is_empty() && self.model_kmer.bytes().all(|b| b == b'N')
    }
}

/// Read id column of a raw line, without decoding or parsing the rest.
pub fn read_id_of(line: &[u8]) -> Option<&[u8]> {
    line.split(|&b| b == b'\t').nth(READ_ID_COLUMN)
}

/// Contig column of a raw line.
pub fn contig_of(line: &[u8]) -> &[u8] {
    line.split(|&b| b == b'\t').next().unwrap_or_default()
}
