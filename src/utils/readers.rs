use super::Result;
use flate2::read::MultiGzDecoder;
use rust_htslib::faidx;
use std::fs::File;
use std::io::{BufReader, Read as ioRead};
use std::path::{Path, PathBuf};

pub fn is_gzipped(path: &Path) -> bool {
    let path_str = path.to_string_lossy().to_lowercase();
    path_str.ends_with(".gz") || path_str.ends_with(".gzip")
}

/// Opens a plain or gzip-compressed text input (alignments, reads, positions).
pub fn open_text_reader(path: &Path) -> Result<BufReader<Box<dyn ioRead>>> {
    let file = File::open(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    if is_gzipped(path) {
        let gz_decoder = MultiGzDecoder::new(file);
        if gz_decoder.header().is_some() {
            Ok(BufReader::new(Box::new(gz_decoder)))
        } else {
            Err(format!("Invalid gzip header: {}", path.to_string_lossy()))
        }
    } else {
        Ok(BufReader::new(Box::new(file)))
    }
}

pub fn open_genome_reader(path: &Path) -> Result<faidx::Reader> {
    let mut fai_path = path.as_os_str().to_owned();
    fai_path.push(".fai");
    let fai_path = PathBuf::from(fai_path);
    if !fai_path.exists() {
        return Err(format!(
            "Reference index file not found: {}. Create it using 'samtools faidx {}'",
            fai_path.display(),
            path.display()
        ));
    }
    faidx::Reader::from_path(path).map_err(|e| e.to_string())
}

/// Contig names in reference index order.
pub fn contig_names(reader: &faidx::Reader) -> Result<Vec<String>> {
    let num_seqs = reader.n_seqs() as usize;
    let mut names = Vec::with_capacity(num_seqs);
    for i in 0..num_seqs {
        let name = reader.seq_name(i as i32).map_err(|e| e.to_string())?;
        names.push(name);
    }
    Ok(names)
}

pub fn fetch_contig(reader: &faidx::Reader, name: &str) -> Result<Vec<u8>> {
    let len = reader.fetch_seq_len(name);
    let len = usize::try_from(len)
        .map_err(|_| format!("Sequence length for '{}' cannot be converted", name))?;
    if len == 0 {
        return Ok(Vec::new());
    }
    reader
        .fetch_seq_string(name, 0, len - 1)
        .map(String::into_bytes)
        .map_err(|e| format!("Error fetching sequence for contig {}: {}", name, e))
}
