use super::{open_text_reader, Result, Strand, TargetBase};
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

/// Gold-standard modification status of a training position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Modified,
    Unmodified,
}

impl Label {
    pub fn parse(s: &str, base: TargetBase) -> Result<Self> {
        if s == "1" || s.eq_ignore_ascii_case(base.modified_tag()) {
            Ok(Label::Modified)
        } else if s == "0" || s.eq_ignore_ascii_case(base.unmodified_tag()) {
            Ok(Label::Unmodified)
        } else {
            Err(format!(
                "Invalid label '{}', expected {}/1 or {}/0",
                s,
                base.modified_tag(),
                base.unmodified_tag()
            ))
        }
    }

    pub fn tag(self, base: TargetBase) -> &'static str {
        match self {
            Label::Modified => base.modified_tag(),
            Label::Unmodified => base.unmodified_tag(),
        }
    }

    pub fn is_modified(self) -> bool {
        self == Label::Modified
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SitePosition {
    /// 1-based, as written in the positions file
    pub position: usize,
    pub strand: Strand,
    pub label: Option<Label>,
}

/// Explicit candidate positions, grouped by contig in file order.
#[derive(Debug, Default, Clone)]
pub struct PositionTable {
    sites: HashMap<String, Vec<SitePosition>>,
}

impl PositionTable {
    pub fn from_path(path: &Path, base: TargetBase) -> Result<Self> {
        let reader = open_text_reader(path)?;
        Self::from_reader(reader, base).map_err(|e| format!("{}: {}", path.display(), e))
    }

    pub fn from_reader<R: BufRead>(reader: R, base: TargetBase) -> Result<Self> {
        let mut sites: HashMap<String, Vec<SitePosition>> = HashMap::new();
        for (line_number, line) in reader.lines().enumerate() {
            let line =
                line.map_err(|e| format!("Error reading line {}: {}", line_number + 1, e))?;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.is_empty() || fields[0].starts_with('#') {
                continue;
            }
            if fields.len() < 3 {
                return Err(format!(
                    "Expected 'chromosome position strand [label]' at line {}: {}",
                    line_number + 1,
                    line
                ));
            }
            let position: usize = fields[1]
                .parse()
                .ok()
                .filter(|&p| p > 0)
                .ok_or_else(|| {
                    format!("Invalid position at line {}: {}", line_number + 1, fields[1])
                })?;
            let strand = fields[2]
                .parse::<Strand>()
                .map_err(|e| format!("Line {}: {}", line_number + 1, e))?;
            let label = fields
                .get(3)
                .map(|s| Label::parse(s, base))
                .transpose()
                .map_err(|e| format!("Line {}: {}", line_number + 1, e))?;
            sites
                .entry(fields[0].to_string())
                .or_default()
                .push(SitePosition {
                    position,
                    strand,
                    label,
                });
        }
        Ok(Self { sites })
    }

    pub fn for_contig(&self, contig: &str) -> &[SitePosition] {
        self.sites.get(contig).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.sites.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Training labels keyed by 0-based position; every row must carry one.
    pub fn labels(&self) -> Result<LabelTable> {
        let mut by_contig: HashMap<String, HashMap<(usize, Strand), Label>> = HashMap::new();
        for (contig, sites) in &self.sites {
            let contig_labels = by_contig.entry(contig.clone()).or_default();
            for site in sites {
                let label = site.label.ok_or_else(|| {
                    format!(
                        "Missing training label for {}:{} ({})",
                        contig, site.position, site.strand
                    )
                })?;
                contig_labels.insert((site.position - 1, site.strand), label);
            }
        }
        Ok(LabelTable { by_contig })
    }
}

#[derive(Debug, Default, Clone)]
pub struct LabelTable {
    by_contig: HashMap<String, HashMap<(usize, Strand), Label>>,
}

impl LabelTable {
    pub fn get(&self, contig: &str, position: usize, strand: Strand) -> Option<Label> {
        self.by_contig
            .get(contig)
            .and_then(|labels| labels.get(&(position, strand)))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.by_contig.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
