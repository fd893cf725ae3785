//! Marks candidate bases of a reference contig.
//!
//! Every candidate is replaced by [`MARKER`] in two views of the same
//! forward-coordinate sequence: the forward view marks the target base, the
//! reverse view marks its complement (what an antisense read would cover).

use crate::utils::{
    complement_base, fetch_contig, normalize_sequence, open_genome_reader, reverse_complement,
    PositionTable, Result, SitePosition, Strand, TargetBase, MARKER,
};
use rust_htslib::faidx;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum Selection {
    Motif {
        motif: Vec<u8>,
        offset: Option<usize>,
    },
    Positions(PositionTable),
}

impl Selection {
    pub fn new(
        motif: Option<&str>,
        offset: Option<usize>,
        positions: Option<PositionTable>,
        base: TargetBase,
    ) -> Result<Self> {
        match (motif, positions) {
            (Some(_), Some(_)) => Err("Specify either a motif or a positions file, not both".into()),
            (None, Some(positions)) => Ok(Selection::Positions(positions)),
            (Some(motif), None) => {
                let motif = motif.to_ascii_uppercase().into_bytes();
                if !motif.contains(&base.base()) {
                    return Err(format!(
                        "Motif {} does not contain the target base {}",
                        String::from_utf8_lossy(&motif),
                        base.base() as char
                    ));
                }
                if let Some(offset) = offset {
                    if motif.get(offset) != Some(&base.base()) {
                        return Err(format!(
                            "Motif offset {} does not point at the target base {}",
                            offset,
                            base.base() as char
                        ));
                    }
                }
                Ok(Selection::Motif { motif, offset })
            }
            (None, None) => Err("No motifs or positions specified".into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedContig {
    pub id: String,
    pub forward: Vec<u8>,
    pub reverse: Vec<u8>,
}

impl AnnotatedContig {
    pub fn view(&self, strand: Strand) -> &[u8] {
        match strand {
            Strand::Forward => &self.forward,
            Strand::Reverse => &self.reverse,
        }
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn num_sites(&self) -> usize {
        let count = |view: &[u8]| view.iter().filter(|&&b| b == MARKER).count();
        count(&self.forward) + count(&self.reverse)
    }

    /// Up to `k` - 1 bases on each side of `anchor`, read in the strand's direction.
    pub fn context(&self, anchor: usize, k: usize, strand: Strand) -> String {
        let view = self.view(strand);
        let start = anchor.saturating_sub(k - 1).min(view.len());
        let end = (anchor + k).min(view.len());
        let slice = &view[start..end];
        let oriented = match strand {
            Strand::Forward => slice.to_vec(),
            Strand::Reverse => reverse_complement(slice),
        };
        String::from_utf8_lossy(&oriented).into_owned()
    }
}

pub fn annotate(
    id: &str,
    seq: &[u8],
    base: TargetBase,
    selection: &Selection,
) -> Result<AnnotatedContig> {
    let seq = normalize_sequence(seq);
    let (forward, reverse) = match selection {
        Selection::Motif { motif, offset } => {
            let forward_marked = mark_motif_bases(motif, base.base(), *offset);
            let rev_motif = reverse_complement(motif);
            let rev_offset = offset.map(|o| motif.len() - 1 - o);
            let reverse_marked =
                mark_motif_bases(&rev_motif, complement_base(base.base()), rev_offset);
            (
                replace_motif(&seq, motif, &forward_marked),
                replace_motif(&seq, &rev_motif, &reverse_marked),
            )
        }
        Selection::Positions(table) => mark_positions(id, &seq, table.for_contig(id), base)?,
    };
    Ok(AnnotatedContig {
        id: id.to_string(),
        forward,
        reverse,
    })
}

fn mark_motif_bases(motif: &[u8], base: u8, offset: Option<usize>) -> Vec<u8> {
    motif
        .iter()
        .enumerate()
        .map(|(i, &b)| match offset {
            Some(o) if i == o => MARKER,
            None if b == base => MARKER,
            _ => b,
        })
        .collect()
}

/// Non-overlapping, left-to-right substitution of `motif` by `marked`.
fn replace_motif(seq: &[u8], motif: &[u8], marked: &[u8]) -> Vec<u8> {
    let mut out = seq.to_vec();
    if motif.is_empty() {
        return out;
    }
    let mut i = 0;
    while i + motif.len() <= seq.len() {
        if &seq[i..i + motif.len()] == motif {
            out[i..i + motif.len()].copy_from_slice(marked);
            i += motif.len();
        } else {
            i += 1;
        }
    }
    out
}

fn mark_positions(
    id: &str,
    seq: &[u8],
    sites: &[SitePosition],
    base: TargetBase,
) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut forward = seq.to_vec();
    let mut reverse = seq.to_vec();
    for site in sites {
        let index = site.position - 1;
        let expected = base.base_on(site.strand);
        let observed = *seq.get(index).ok_or_else(|| {
            format!(
                "Position {}:{} ({}) is outside the contig (length {})",
                id,
                site.position,
                site.strand,
                seq.len()
            )
        })?;
        if observed != expected {
            let context = &seq[index.saturating_sub(5)..(index + 6).min(seq.len())];
            return Err(format!(
                "Base mismatch at {}:{} ({}): expected {}, found {} in {}; the positions file does not match the reference",
                id,
                site.position,
                site.strand,
                expected as char,
                observed as char,
                String::from_utf8_lossy(context)
            ));
        }
        match site.strand {
            Strand::Forward => forward[index] = MARKER,
            Strand::Reverse => reverse[index] = MARKER,
        }
    }
    Ok((forward, reverse))
}

/// Supplies annotated contigs to an accumulator as their records show up.
/// `Ok(None)` means the contig is not part of the reference.
pub trait ContigSource {
    fn fetch(&mut self, contig: &str) -> Result<Option<Arc<AnnotatedContig>>>;
}

impl ContigSource for HashMap<String, Arc<AnnotatedContig>> {
    fn fetch(&mut self, contig: &str) -> Result<Option<Arc<AnnotatedContig>>> {
        Ok(self.get(contig).cloned())
    }
}

/// Annotates contigs on demand from an indexed reference.
pub struct GenomeContigSource {
    reader: faidx::Reader,
    names: HashSet<String>,
    base: TargetBase,
    selection: Arc<Selection>,
}

impl GenomeContigSource {
    pub fn new(reference_path: &Path, base: TargetBase, selection: Arc<Selection>) -> Result<Self> {
        let reader = open_genome_reader(reference_path)?;
        let names = crate::utils::contig_names(&reader)?.into_iter().collect();
        Ok(Self {
            reader,
            names,
            base,
            selection,
        })
    }
}

impl ContigSource for GenomeContigSource {
    fn fetch(&mut self, contig: &str) -> Result<Option<Arc<AnnotatedContig>>> {
        if !self.names.contains(contig) {
            return Ok(None);
        }
        let seq = fetch_contig(&self.reader, contig)?;
        let annotated = annotate(contig, &seq, self.base, &self.selection)?;
        log::info!(
            "Finished loading {}: {} positions to examine",
            contig,
            annotated.num_sites()
        );
        Ok(Some(Arc::new(annotated)))
    }
}
