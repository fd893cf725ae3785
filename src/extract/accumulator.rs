use super::annotate::{AnnotatedContig, ContigSource};
use super::record::AlignmentRecord;
use super::sink::{FeatureSink, SiteFeatures};
use super::stats::ExtractStats;
use super::window::{CandidateWindow, Step, WindowState};
use crate::utils::{ReadQualities, Result, Strand, TargetBase, MARKER};
use std::collections::HashSet;
use std::sync::Arc;

const PROGRESS_READ_INTERVAL: usize = 1000;

#[derive(Debug, Clone)]
pub struct ExtractParams {
    /// Number of slots per window; the context spans 2k - 1 bases
    pub k: usize,
    pub skip_thresh: usize,
    pub qual_thresh: f64,
    pub base: TargetBase,
}

/// Streams alignment records of one worker through the window state machine.
pub struct Accumulator<S: ContigSource, K: FeatureSink> {
    params: ExtractParams,
    qualities: Arc<ReadQualities>,
    contigs: S,
    sink: K,
    contig: Option<Arc<AnnotatedContig>>,
    missing_contigs: HashSet<String>,
    current_read: Option<String>,
    first_event_index: i64,
    state: WindowState,
    stats: ExtractStats,
}

impl<S: ContigSource, K: FeatureSink> Accumulator<S, K> {
    pub fn new(params: ExtractParams, qualities: Arc<ReadQualities>, contigs: S, sink: K) -> Self {
        Self {
            params,
            qualities,
            contigs,
            sink,
            contig: None,
            missing_contigs: HashSet::new(),
            current_read: None,
            first_event_index: 0,
            state: WindowState::Idle,
            stats: ExtractStats::default(),
        }
    }

    pub fn state(&self) -> &WindowState {
        &self.state
    }

    pub fn stats(&self) -> &ExtractStats {
        &self.stats
    }

    /// Processes one undecoded line; lines that are not valid UTF-8 count as malformed.
    pub fn process_raw(&mut self, line: &[u8]) -> Result<()> {
        match std::str::from_utf8(line) {
            Ok(line) => self.process_line(line),
            Err(e) => {
                self.stats.lines += 1;
                self.stats.malformed_lines += 1;
                log::debug!("Skipping alignment line that is not valid UTF-8: {}", e);
                Ok(())
            }
        }
    }

    /// Parses and processes one line; malformed lines are counted and skipped.
    pub fn process_line(&mut self, line: &str) -> Result<()> {
        self.stats.lines += 1;
        match AlignmentRecord::parse(line) {
            Ok(Some(record)) => self.process(&record),
            Ok(None) => Ok(()),
            Err(e) => {
                self.stats.malformed_lines += 1;
                log::debug!("Skipping malformed alignment line: {}", e);
                Ok(())
            }
        }
    }

    pub fn process(&mut self, record: &AlignmentRecord) -> Result<()> {
        let contig = match self.switch_contig(&record.contig)? {
            Some(contig) => contig,
            None => {
                self.stats.missing_contig_records += 1;
                return Ok(());
            }
        };

        let first_of_read = self.current_read.as_deref() != Some(record.read_id.as_str());
        if first_of_read {
            self.current_read = Some(record.read_id.clone());
            self.first_event_index = record.event_index;
        }

        let Some(quality) = self.qualities.get(&record.read_id) else {
            self.stats.unknown_read_records += 1;
            return Ok(());
        };
        if quality < self.params.qual_thresh {
            self.stats.low_quality_records += 1;
            return Ok(());
        }
        if record.has_placeholder_kmer() {
            self.stats.placeholder_records += 1;
            return Ok(());
        }
        if self.stats.reads.insert(record.read_id.clone())
            && self.stats.reads.len() % PROGRESS_READ_INTERVAL == 0
        {
            log::info!("{} reads examined", self.stats.reads.len());
        }

        // later records of a forward read have increasing event indices
        let forward = if first_of_read {
            record.read_kmer == record.model_kmer
        } else {
            record.event_index > self.first_event_index
        };
        let strand = if forward {
            Strand::Forward
        } else {
            Strand::Reverse
        };

        let view = contig.view(strand);
        let marker_offset = if record.position < view.len() {
            let end = record.position.saturating_add(self.params.k).min(view.len());
            view[record.position..end].iter().position(|&b| b == MARKER)
        } else {
            None
        };

        let step = Step {
            read_id: &record.read_id,
            position: record.position,
            marker_offset,
            strand,
            diff: record.current_diff(),
        };
        let transition =
            std::mem::take(&mut self.state).advance(&step, self.params.k, self.params.skip_thresh);
        self.state = transition.state;
        if transition.carried {
            self.stats.multi_site_windows += 1;
        }
        if transition.discarded {
            self.stats.discarded_windows += 1;
        }
        if let Some(window) = transition.completed {
            self.flush(&contig, window)?;
        }
        Ok(())
    }

    /// Flushes the open window, if any, and hands back the counters and sink.
    pub fn finish(mut self) -> Result<(ExtractStats, K)> {
        self.flush_open()?;
        self.sink.finish()?;
        Ok((self.stats, self.sink))
    }

    fn switch_contig(&mut self, id: &str) -> Result<Option<Arc<AnnotatedContig>>> {
        if let Some(contig) = self.contig.as_ref().filter(|c| c.id == id) {
            return Ok(Some(Arc::clone(contig)));
        }
        if self.missing_contigs.contains(id) {
            return Ok(None);
        }
        self.flush_open()?;
        self.current_read = None;
        match self.contigs.fetch(id)? {
            Some(contig) => {
                self.contig = Some(Arc::clone(&contig));
                Ok(Some(contig))
            }
            None => {
                log::warn!("Could not find sequence for reference contig {}", id);
                self.missing_contigs.insert(id.to_string());
                Ok(None)
            }
        }
    }

    fn flush_open(&mut self) -> Result<()> {
        if let WindowState::Accumulating(window) = std::mem::take(&mut self.state) {
            if let Some(contig) = self.contig.clone() {
                self.flush(&contig, window)?;
            }
        }
        Ok(())
    }

    fn flush(&mut self, contig: &AnnotatedContig, window: CandidateWindow) -> Result<()> {
        let skips = window.skips();
        if skips > self.params.skip_thresh {
            self.stats.windows_too_many_skips += 1;
            log::trace!(
                "Dropping {}:{} of {}: {} skips",
                contig.id,
                window.anchor(),
                window.read_id(),
                skips
            );
            return Ok(());
        }
        if skips > 0 {
            self.stats.windows_with_skips += 1;
        }

        let quality = self
            .qualities
            .get(window.read_id())
            .ok_or_else(|| format!("No quality score for read {}", window.read_id()))?;
        let site = SiteFeatures {
            contig: contig.id.clone(),
            read_id: window.read_id().to_string(),
            position: window.anchor(),
            strand: window.strand(),
            context: contig.context(window.anchor(), self.params.k, window.strand()),
            features: window.feature_vector(quality),
        };
        self.stats.observations += 1;
        self.stats
            .positions
            .insert((site.contig.clone(), site.position, site.strand));
        self.sink.accept(site)
    }
}
