use crate::utils::Result;
use std::fmt;
use std::str::FromStr;

/// Sentinel written over every candidate base of an annotated reference.
pub const MARKER: u8 = b'M';

pub fn complement_base(base: u8) -> u8 {
    match base {
        b'A' => b'T',
        b'T' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        MARKER => MARKER,
        _ => b'N',
    }
}

pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&b| complement_base(b)).collect()
}

/// Upper-cases a reference sequence and masks bases that collide with the
/// marker (IUPAC `M`), so every marker in an annotated view is a candidate.
pub fn normalize_sequence(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .map(|b| match b.to_ascii_uppercase() {
            MARKER => b'N',
            upper => upper,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn as_char(self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for Strand {
    type Err = String;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "+" => Ok(Strand::Forward),
            "-" => Ok(Strand::Reverse),
            _ => Err(format!("Invalid strand '{}', expected '+' or '-'", s)),
        }
    }
}

/// Base whose modification status is being classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetBase {
    A,
    C,
}

impl TargetBase {
    pub fn base(self) -> u8 {
        match self {
            TargetBase::A => b'A',
            TargetBase::C => b'C',
        }
    }

    pub fn base_on(self, strand: Strand) -> u8 {
        match strand {
            Strand::Forward => self.base(),
            Strand::Reverse => complement_base(self.base()),
        }
    }

    pub fn modified_tag(self) -> &'static str {
        match self {
            TargetBase::A => "m6A",
            TargetBase::C => "m5C",
        }
    }

    pub fn unmodified_tag(self) -> &'static str {
        match self {
            TargetBase::A => "A",
            TargetBase::C => "C",
        }
    }
}

impl FromStr for TargetBase {
    type Err = String;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(TargetBase::A),
            "C" => Ok(TargetBase::C),
            _ => Err(format!(
                "Classification is only available for A or C bases, got '{}'",
                s
            )),
        }
    }
}
