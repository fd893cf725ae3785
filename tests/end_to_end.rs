use clap::Parser;
use mcaller::cli::{Cli, Command};
use mcaller::commands::{call, train};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const K: usize = 3;
const MODIFIED_SITE: usize = 19;
const UNMODIFIED_SITE: usize = 39;
const NUM_READS: usize = 6;

const HEADER: &str = "contig\tposition\treference_kmer\tread_name\tstrand\tevent_index\tevent_level_mean\tevent_stdv\tevent_length\tmodel_kmer\tmodel_mean\tmodel_stdv\tstandardized_level\tsamples";

struct Fixture {
    dir: TempDir,
    chr1: Vec<u8>,
    num_reads: usize,
}

impl Fixture {
    fn new() -> Self {
        Self::with_reads(NUM_READS)
    }

    /// Reference with `A` at the two labelled sites of chr1 and an extra contig
    /// without alignments.
    fn with_reads(num_reads: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut chr1: Vec<u8> = b"GCGTCGTTGC".iter().cycle().take(60).copied().collect();
        chr1[MODIFIED_SITE] = b'A';
        chr1[UNMODIFIED_SITE] = b'A';
        let chr2 = b"GCGCGCGCGCGCGCGCGCGC".to_vec();

        let fixture = Fixture {
            dir,
            chr1,
            num_reads,
        };
        fixture.write_reference(&[("chr1", fixture.chr1.as_slice()), ("chr2", chr2.as_slice())]);
        fixture.write_reads();
        fixture.write_alignments();
        fs::write(
            fixture.path("positions.txt"),
            format!(
                "# chrom\tpos\tstrand\tlabel\nchr1\t{}\t+\tm6A\nchr1\t{}\t+\tA\n",
                MODIFIED_SITE + 1,
                UNMODIFIED_SITE + 1
            ),
        )
        .unwrap();
        fixture
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write_reference(&self, contigs: &[(&str, &[u8])]) {
        let mut fasta = String::new();
        let mut fai = String::new();
        for (name, seq) in contigs {
            fasta.push_str(&format!(">{}\n", name));
            fai.push_str(&format!(
                "{}\t{}\t{}\t{}\t{}\n",
                name,
                seq.len(),
                fasta.len(),
                seq.len(),
                seq.len() + 1
            ));
            fasta.push_str(std::str::from_utf8(seq).unwrap());
            fasta.push('\n');
        }
        fs::write(self.path("ref.fa"), fasta).unwrap();
        fs::write(self.path("ref.fa.fai"), fai).unwrap();
    }

    fn write_reads(&self) {
        let fastq: String = (0..self.num_reads)
            .map(|r| format!("@read{}\nACGTACGTAC\n+\nIIIIIIIIII\n", r))
            .collect();
        fs::write(self.path("reads.fastq"), fastq).unwrap();
    }

    /// Forward reads over all of chr1. Events around the modified site are
    /// shifted up, those around the unmodified site shifted down.
    fn write_alignments(&self) {
        let mut lines = vec![HEADER.to_string()];
        for r in 0..self.num_reads {
            let jitter = 0.1 * (r % 10) as f64;
            for position in 0..=self.chr1.len() - K {
                let diff = if (MODIFIED_SITE + 1 - K..=MODIFIED_SITE).contains(&position) {
                    3.0 + jitter
                } else if (UNMODIFIED_SITE + 1 - K..=UNMODIFIED_SITE).contains(&position) {
                    -3.0 - jitter
                } else {
                    0.0
                };
                let kmer = std::str::from_utf8(&self.chr1[position..position + K]).unwrap();
                lines.push(format!(
                    "chr1\t{}\t{}\tread{}\tt\t{}\t{:.3}\t1.0\t0.002\t{}\t100.0\t1.5\t0.1\t99.5,100.5",
                    position,
                    kmer,
                    r,
                    100 + position,
                    100.0 + diff,
                    kmer
                ));
            }
        }
        fs::write(self.path("reads.eventalign.tsv"), lines.join("\n") + "\n").unwrap();
    }

    fn args(&self, subcommand: &str, extra: &[&str]) -> Cli {
        let mut args: Vec<String> = vec![
            "mcaller".into(),
            subcommand.into(),
            "-r".into(),
            path_str(&self.path("ref.fa")),
            "-e".into(),
            path_str(&self.path("reads.eventalign.tsv")),
            "-f".into(),
            path_str(&self.path("reads.fastq")),
            "-n".into(),
            K.to_string(),
            "-d".into(),
            path_str(&self.path("model_LR_3_m6A.model")),
        ];
        args.extend(extra.iter().map(|s| s.to_string()));
        Cli::try_parse_from(args).unwrap()
    }

    fn train(&self) {
        let positions = path_str(&self.path("positions.txt"));
        let Command::Train(args) = self.args("train", &["-p", &positions]).command else {
            panic!("expected train subcommand");
        };
        train::train(args).unwrap();
    }

    fn train_to(&self, output: &str, threads: usize) -> Vec<String> {
        let positions = path_str(&self.path("positions.txt"));
        let output = path_str(&self.path(output));
        let threads = threads.to_string();
        let cli = self.args("train", &["-p", &positions, "-o", &output, "-t", &threads]);
        let Command::Train(args) = cli.command else {
            panic!("expected train subcommand");
        };
        train::train(args).unwrap();
        read_lines(Path::new(&output))
    }

    fn call(&self, output: &str, threads: usize) -> mcaller::utils::Result<Vec<String>> {
        let output = path_str(&self.path(output));
        let threads = threads.to_string();
        let cli = self.args("call", &["-m", "A", "-o", &output, "-t", &threads]);
        let Command::Call(args) = cli.command else {
            panic!("expected call subcommand");
        };
        call::call(args)?;
        Ok(read_lines(Path::new(&output)))
    }
}

fn path_str(path: &Path) -> String {
    path.to_str().unwrap().to_string()
}

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn train_writes_labelled_observations_and_model() {
    let fixture = Fixture::new();
    fixture.train();

    let training = read_lines(&fixture.path("reads.eventalign.diffs.3.train"));
    assert_eq!(training.len(), 2 * NUM_READS);
    let first: Vec<&str> = training[0].split('\t').collect();
    assert_eq!(first[0], "chr1");
    assert_eq!(first[1], "read0");
    assert_eq!(first[2], MODIFIED_SITE.to_string());
    assert_eq!(first[3], "TGMGC");
    assert_eq!(first[4], "3,3,3,40");
    assert_eq!(first[5], "+");
    assert_eq!(first[6], "m6A");
    assert_eq!(
        training.iter().filter(|l| l.ends_with("\tA")).count(),
        NUM_READS
    );

    assert!(fixture.path("model_LR_3_m6A.model").exists());
}

#[test]
fn call_classifies_sites_with_trained_model() {
    let fixture = Fixture::new();
    fixture.train();

    let calls = fixture.call("calls.tsv", 1).unwrap();
    assert_eq!(calls.len(), 2 * NUM_READS);
    for line in &calls {
        let fields: Vec<&str> = line.split('\t').collect();
        assert_eq!(fields.len(), 8);
        let probability: f64 = fields[7].parse().unwrap();
        if fields[2] == MODIFIED_SITE.to_string() {
            assert_eq!(fields[6], "m6A");
            assert!(probability >= 0.5);
        } else {
            assert_eq!(fields[2], UNMODIFIED_SITE.to_string());
            assert_eq!(fields[6], "A");
            assert!(probability < 0.5);
        }
    }
}

#[test]
fn parallel_call_matches_single_threaded_output() {
    let fixture = Fixture::new();
    fixture.train();

    let single = fixture.call("single.tsv", 1).unwrap();
    let parallel = fixture.call("parallel.tsv", 4).unwrap();
    assert_eq!(single, parallel);
    assert!(!fixture.path("parallel.tsv.part0").exists());
}

#[test]
fn parallel_call_on_single_contig_reference() {
    let fixture = Fixture::new();
    fixture.train();
    let single = fixture.call("single.tsv", 1).unwrap();

    fixture.write_reference(&[("chr1", fixture.chr1.as_slice())]);
    let parallel = fixture.call("parallel.tsv", 3).unwrap();
    assert_eq!(single, parallel);
}

#[test]
fn parallel_training_matches_single_threaded_output() {
    let fixture = Fixture::new();
    let single = fixture.train_to("single.train", 1);
    let parallel = fixture.train_to("parallel.train", 4);
    assert_eq!(single.len(), 2 * NUM_READS);
    assert_eq!(single, parallel);
}

#[test]
fn parallel_runs_on_large_single_contig_reference() {
    let num_reads = 18;
    let fixture = Fixture::with_reads(num_reads);
    fixture.write_reference(&[("chr1", fixture.chr1.as_slice())]);
    assert!(read_lines(&fixture.path("reads.eventalign.tsv")).len() > 1000);

    let single = fixture.train_to("single.train", 1);
    assert_eq!(single.len(), 2 * num_reads);
    for threads in [4, 7] {
        let parallel = fixture.train_to(&format!("parallel{}.train", threads), threads);
        assert_eq!(single, parallel);
    }

    let single = fixture.call("single.tsv", 1).unwrap();
    assert_eq!(single.len(), 2 * num_reads);
    for threads in [4, 7] {
        let parallel = fixture.call(&format!("parallel{}.tsv", threads), threads).unwrap();
        assert_eq!(single, parallel);
    }
}

#[test]
fn alignment_line_with_invalid_utf8_is_skipped() {
    let fixture = Fixture::new();
    fixture.train();
    let clean = fixture.call("clean.tsv", 1).unwrap();

    let alignments = fixture.path("reads.eventalign.tsv");
    let text = fs::read(&alignments).unwrap();
    let mut lines: Vec<&[u8]> = text.split(|&b| b == b'\n').collect();
    let bad: &[u8] = b"chr1\t30\tGC\xff\tread1\tt\t130\t100.000\t1.0\t0.002\tGCG\t100.0\t1.5\t0.1\t99.5";
    lines.insert(100, bad);
    fs::write(&alignments, lines.join(&b'\n')).unwrap();

    assert_eq!(fixture.call("single.tsv", 1).unwrap(), clean);
    assert_eq!(fixture.call("parallel.tsv", 4).unwrap(), clean);
}

#[test]
fn call_without_model_is_fatal() {
    let fixture = Fixture::new();
    let err = fixture.call("calls.tsv", 1).unwrap_err();
    assert!(err.starts_with("Model file not found"), "{}", err);
}

#[test]
fn training_on_motif_is_rejected() {
    let fixture = Fixture::new();
    let Command::Train(args) = fixture.args("train", &["-m", "A"]).command else {
        panic!("expected train subcommand");
    };
    assert!(train::train(args).is_err());
}

#[test]
fn training_with_too_few_observations_is_fatal() {
    let fixture = Fixture::new();
    fs::write(fixture.path("reads.fastq"), "@read0\nACGT\n+\nIIII\n").unwrap();
    let positions = path_str(&fixture.path("positions.txt"));
    let Command::Train(args) = fixture.args("train", &["-p", &positions]).command else {
        panic!("expected train subcommand");
    };
    let err = train::train(args).unwrap_err();
    assert!(err.starts_with("Insufficient data aligned to labeled positions for training"));
}

#[test]
fn mismatched_positions_file_is_fatal() {
    let fixture = Fixture::new();
    fs::write(fixture.path("positions.txt"), "chr1\t1\t+\tm6A\n").unwrap();
    let positions = path_str(&fixture.path("positions.txt"));
    let Command::Train(args) = fixture.args("train", &["-p", &positions]).command else {
        panic!("expected train subcommand");
    };
    let err = train::train(args).unwrap_err();
    assert!(err.contains("Base mismatch at chr1:1 (+)"), "{}", err);
}
