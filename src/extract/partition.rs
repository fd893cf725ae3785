//! Line-range partitioning of an alignment file across workers.
//!
//! Chunks are cut by line count. A read that straddles a cut belongs to the
//! worker where it starts: that worker keeps reading past its last line until
//! the read ends, and the next worker skips the read's leading lines.

use super::record::{contig_of, read_id_of};
use crate::utils::{open_text_reader, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Contiguous block of lines, 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub len: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub index: usize,
    /// Byte offset of the first line
    pub offset: u64,
    pub start_line: usize,
    pub num_lines: usize,
    /// Read id of the line just before this chunk, when it lies in the same scope
    pub straddling_read: Option<Vec<u8>>,
    pub scope: Option<String>,
}

/// Lines of `contig`, or of the whole file when unscoped. The contig's lines
/// are expected to be contiguous; later stray lines are ignored with a warning.
pub fn scoped_range(path: &Path, contig: Option<&str>) -> Result<LineRange> {
    let reader = open_text_reader(path)?;
    let mut start = None;
    let mut len = 0;
    let mut stray = 0;
    for (line_number, line) in reader.split(b'\n').enumerate() {
        let line = line.map_err(|e| format!("Error at line {}: {}", line_number + 1, e))?;
        match contig {
            None => len += 1,
            Some(contig) if contig_of(&line) == contig.as_bytes() => match start {
                None => {
                    start = Some(line_number);
                    len = 1;
                }
                Some(s) if s + len == line_number => len += 1,
                Some(_) => stray += 1,
            },
            Some(_) => {}
        }
    }
    if stray > 0 {
        log::warn!(
            "{} lines of contig {} are not contiguous with its first block and will be skipped",
            stray,
            contig.unwrap_or_default()
        );
    }
    Ok(LineRange {
        start: start.unwrap_or(0),
        len,
    })
}

pub fn chunk_starts(range: LineRange, workers: usize) -> Vec<LineRange> {
    if range.len == 0 || workers == 0 {
        return Vec::new();
    }
    let chunk_size = range.len.div_ceil(workers);
    (0..workers)
        .map(|i| i * chunk_size)
        .take_while(|&offset| offset < range.len)
        .map(|offset| LineRange {
            start: range.start + offset,
            len: chunk_size.min(range.len - offset),
        })
        .collect()
}

pub fn plan_partitions(path: &Path, scope: Option<&str>, workers: usize) -> Result<Vec<Partition>> {
    let range = scoped_range(path, scope)?;
    let chunks = chunk_starts(range, workers);
    if chunks.is_empty() {
        return Ok(Vec::new());
    }

    let file = File::open(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    let mut reader = BufReader::new(file);
    let mut partitions = Vec::with_capacity(chunks.len());
    let mut buf = Vec::new();
    let mut previous_read: Option<Vec<u8>> = None;
    let mut offset = 0u64;
    let mut line_number = 0;
    let mut next_chunk = chunks.iter().enumerate().peekable();

    while let Some(&(index, chunk)) = next_chunk.peek() {
        buf.clear();
        let bytes = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| format!("Error at line {}: {}", line_number + 1, e))?;
        if bytes == 0 {
            break;
        }
        if line_number == chunk.start {
            let straddling_read = if line_number > range.start {
                previous_read.clone()
            } else {
                None
            };
            partitions.push(Partition {
                index,
                offset,
                start_line: chunk.start,
                num_lines: chunk.len,
                straddling_read,
                scope: scope.map(str::to_string),
            });
            next_chunk.next();
        }
        previous_read = read_id_of(&buf).map(<[u8]>::to_vec);
        offset += bytes as u64;
        line_number += 1;
    }
    Ok(partitions)
}

/// Reader positioned at the first line of a partition.
pub fn open_partition(path: &Path, partition: &Partition) -> Result<BufReader<Box<dyn Read>>> {
    let mut file = File::open(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    file.seek(SeekFrom::Start(partition.offset))
        .map_err(|e| format!("Failed to seek in {}: {}", path.display(), e))?;
    Ok(BufReader::new(Box::new(file)))
}

/// Feeds the lines a partition owns to `process`.
pub fn for_each_owned_line<R, F>(reader: R, partition: &Partition, mut process: F) -> Result<()>
where
    R: BufRead,
    F: FnMut(&[u8]) -> Result<()>,
{
    let mut leading = partition.straddling_read.clone();
    let mut consumed = 0;
    let mut tail_read: Option<Vec<u8>> = None;

    for (i, line) in reader.split(b'\n').enumerate() {
        let line = line.map_err(|e| {
            format!(
                "Error at line {}: {}",
                partition.start_line + i + 1,
                e
            )
        })?;
        let read_id = read_id_of(&line);

        if consumed < partition.num_lines {
            consumed += 1;
            if let Some(straddling) = &leading {
                if read_id == Some(straddling.as_slice()) {
                    continue;
                }
                leading = None;
            }
            tail_read = read_id.map(<[u8]>::to_vec);
            process(&line)?;
        } else {
            let in_scope = partition
                .scope
                .as_deref()
                .map_or(true, |scope| contig_of(&line) == scope.as_bytes());
            if leading.is_some() || !in_scope || tail_read.is_none() || read_id != tail_read.as_deref() {
                break;
            }
            process(&line)?;
        }
    }
    Ok(())
}
