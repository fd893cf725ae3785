use crate::utils::Strand;
use std::collections::HashSet;

/// Counters of one worker; merged by the coordinator at the end of a run.
#[derive(Debug, Default, Clone)]
pub struct ExtractStats {
    pub lines: usize,
    pub malformed_lines: usize,
    pub missing_contig_records: usize,
    pub unknown_read_records: usize,
    pub low_quality_records: usize,
    pub placeholder_records: usize,
    pub reads: HashSet<String>,
    pub positions: HashSet<(String, usize, Strand)>,
    pub observations: usize,
    pub windows_with_skips: usize,
    pub windows_too_many_skips: usize,
    pub multi_site_windows: usize,
    pub discarded_windows: usize,
}

impl ExtractStats {
    pub fn merge(&mut self, other: ExtractStats) {
        self.lines += other.lines;
        self.malformed_lines += other.malformed_lines;
        self.missing_contig_records += other.missing_contig_records;
        self.unknown_read_records += other.unknown_read_records;
        self.low_quality_records += other.low_quality_records;
        self.placeholder_records += other.placeholder_records;
        self.reads.extend(other.reads);
        self.positions.extend(other.positions);
        self.observations += other.observations;
        self.windows_with_skips += other.windows_with_skips;
        self.windows_too_many_skips += other.windows_too_many_skips;
        self.multi_site_windows += other.multi_site_windows;
        self.discarded_windows += other.discarded_windows;
    }

    pub fn log_summary(&self, scope: &str) {
        log::info!(
            "{}: {} reads examined, {} observations, {} positions",
            scope,
            self.reads.len(),
            self.observations,
            self.positions.len()
        );
        log::info!(
            "{}: {} regions with multiple candidate sites, {} observations with skips included, {} observations with too many skips",
            scope,
            self.multi_site_windows,
            self.windows_with_skips,
            self.windows_too_many_skips
        );
        log::debug!(
            "{}: {} lines, {} malformed, {} missing contig, {} unknown read, {} low quality, {} placeholder k-mer, {} windows discarded",
            scope,
            self.lines,
            self.malformed_lines,
            self.missing_contig_records,
            self.unknown_read_records,
            self.low_quality_records,
            self.placeholder_records,
            self.discarded_windows
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_unions_sets_and_sums_counters() {
        let mut a = ExtractStats {
            observations: 2,
            windows_too_many_skips: 1,
            ..Default::default()
        };
        a.reads.insert("r1".into());
        a.positions.insert(("chr1".into(), 5, Strand::Forward));

        let mut b = ExtractStats {
            observations: 3,
            ..Default::default()
        };
        b.reads.extend(["r1".to_string(), "r2".to_string()]);
        b.positions.insert(("chr1".into(), 5, Strand::Reverse));

        a.merge(b);
        assert_eq!(a.observations, 5);
        assert_eq!(a.windows_too_many_skips, 1);
        assert_eq!(a.reads.len(), 2);
        assert_eq!(a.positions.len(), 2);
    }
}
