use crate::model::ClassifierKind;
use crate::utils::{Result, TargetBase};
use chrono::Datelike;
use clap::{ArgAction, Args, Parser, Subcommand};
use env_logger::fmt::Color;
use log::{Level, LevelFilter};
use once_cell::sync::Lazy;
use std::{
    io::Write,
    path::{Path, PathBuf},
};

pub static FULL_VERSION: Lazy<String> = Lazy::new(|| {
    format!(
        "{}-{}",
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_GIT_DESCRIBE")
    )
});

#[derive(Parser)]
#[command(name="mcaller",
          version=&**FULL_VERSION,
          about="Classify modified bases from nanopore event alignments",
          long_about = None,
          disable_help_subcommand = true,
          after_help = format!("Copyright (C) 2016-{}     mCaller developers", chrono::Utc::now().year()),
          help_template = "{name} {version}\n{about-section}\n{usage-heading}\n    {usage}\n\n{all-args}{after-help}",
          )]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = ArgAction::Count, help = "Specify multiple times to increase verbosity level (e.g., -vv for more verbosity)")]
    pub verbosity: u8,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Classify candidate bases as modified or unmodified")]
    Call(CallArgs),
    #[clap(about = "Train a classifier on labelled positions")]
    Train(TrainArgs),
}

#[derive(Parser, Debug)]
#[command(arg_required_else_help(true))]
pub struct CallArgs {
    #[command(flatten)]
    pub extract: ExtractArgs,
}

#[derive(Parser, Debug)]
#[command(arg_required_else_help(true))]
pub struct TrainArgs {
    #[command(flatten)]
    pub extract: ExtractArgs,
}

#[derive(Args, Debug)]
pub struct ExtractArgs {
    #[clap(short = 'p')]
    #[clap(long = "positions")]
    #[clap(help = "Positions to classify: chromosome, position, strand and, for training, label")]
    #[clap(value_name = "POSITIONS")]
    #[clap(required_unless_present = "motif", conflicts_with = "motif")]
    #[arg(value_parser = check_file_exists)]
    pub positions_path: Option<PathBuf>,

    #[clap(short = 'm')]
    #[clap(long = "motif")]
    #[clap(help = "Classify every target base in this motif (can be a single base)")]
    #[clap(value_name = "MOTIF")]
    #[arg(value_parser = check_motif)]
    pub motif: Option<String>,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "motif-offset")]
    #[clap(help = "Only classify the base at this 0-based offset of the motif")]
    #[clap(value_name = "OFFSET")]
    #[clap(requires = "motif")]
    pub motif_offset: Option<usize>,

    #[clap(required = true)]
    #[clap(short = 'r')]
    #[clap(long = "reference")]
    #[clap(help = "Indexed FASTA file the reads were aligned to")]
    #[clap(value_name = "FASTA")]
    #[arg(value_parser = check_file_exists)]
    pub reference_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'e')]
    #[clap(long = "tsv")]
    #[clap(help = "Event alignment TSV (nanopolish eventalign)")]
    #[clap(value_name = "TSV")]
    #[arg(value_parser = check_file_exists)]
    pub alignment_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'f')]
    #[clap(long = "fastq")]
    #[clap(help = "FASTQ file with the aligned reads")]
    #[clap(value_name = "FASTQ")]
    #[arg(value_parser = check_file_exists)]
    pub fastq_path: PathBuf,

    #[clap(short = 'o')]
    #[clap(long = "output")]
    #[clap(help = "Output path [default: <TSV stem>.diffs.<K>]")]
    #[clap(value_name = "OUTPUT")]
    #[arg(value_parser = check_prefix_path)]
    pub output_path: Option<PathBuf>,

    #[clap(short = 'd')]
    #[clap(long = "model")]
    #[clap(help = "Model file [default: model_<CLASSIFIER>_<K>_<MOD>.model]")]
    #[clap(value_name = "MODEL")]
    pub model_path: Option<PathBuf>,

    #[clap(short = 't')]
    #[clap(long = "threads")]
    #[clap(help = "Number of threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    #[arg(value_parser = threads_in_range)]
    pub num_threads: usize,

    #[clap(short = 'b')]
    #[clap(long = "base")]
    #[clap(help = "Base to classify as modified or unmodified (A or C)")]
    #[clap(value_name = "BASE")]
    #[clap(default_value = "A")]
    pub base: TargetBase,

    #[clap(help_heading("Advanced"))]
    #[clap(short = 'n')]
    #[clap(long = "num-variables")]
    #[clap(help = "Number of signal variables; 6 corresponds to an 11-mer context (2*6-1)")]
    #[clap(value_name = "K")]
    #[clap(default_value = "6")]
    #[arg(value_parser = ensure_window_len)]
    pub num_variables: usize,

    #[clap(help_heading("Advanced"))]
    #[clap(short = 's')]
    #[clap(long = "skip-thresh")]
    #[clap(help = "Number of skips to allow within an observation")]
    #[clap(value_name = "SKIPS")]
    #[clap(default_value = "0")]
    pub skip_thresh: usize,

    #[clap(help_heading("Advanced"))]
    #[clap(short = 'q')]
    #[clap(long = "qual-thresh")]
    #[clap(help = "Minimum mean base quality of a read")]
    #[clap(value_name = "QUAL")]
    #[clap(default_value = "0")]
    pub qual_thresh: f64,

    #[clap(help_heading("Advanced"))]
    #[clap(short = 'c')]
    #[clap(long = "classifier")]
    #[clap(help = "Classifier: LR (logistic regression) or NBC (Gaussian naive Bayes)")]
    #[clap(value_name = "CLASSIFIER")]
    #[clap(default_value = "LR")]
    pub classifier: ClassifierKind,
}

impl ExtractArgs {
    /// A single-base motif overrides the base option.
    pub fn target_base(&self) -> Result<TargetBase> {
        match self.motif.as_deref() {
            Some(motif) if motif.len() == 1 => motif.parse(),
            _ => Ok(self.base),
        }
    }

    pub fn check_skip_thresh(&self) -> Result<()> {
        if 2 * self.skip_thresh >= self.num_variables {
            return Err(format!(
                "Too many skips ({}) with only {} variables - try < half",
                self.skip_thresh, self.num_variables
            ));
        }
        Ok(())
    }

    pub fn model_path(&self, base: TargetBase) -> PathBuf {
        self.model_path.clone().unwrap_or_else(|| {
            PathBuf::from(format!(
                "model_{}_{}_{}.model",
                self.classifier,
                self.num_variables,
                base.modified_tag()
            ))
        })
    }
}

pub fn init_verbose(args: &Cli) {
    let filter_level: LevelFilter = match args.verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            let level = record.level();
            let mut style = buf.style();
            match record.level() {
                Level::Error => style.set_color(Color::Red),
                Level::Warn => style.set_color(Color::Yellow),
                Level::Info => style.set_color(Color::Green),
                Level::Debug => style.set_color(Color::Blue),
                Level::Trace => style.set_color(Color::Cyan),
            };

            writeln!(
                buf,
                "{} [{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                style.value(level),
                record.args()
            )
        })
        .filter_level(filter_level)
        .init();
}

fn check_prefix_path(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            return Err(format!("Path does not exist: {}", parent_dir.display()));
        }
    }
    Ok(path.to_path_buf())
}

fn check_motif(s: &str) -> Result<String> {
    let motif = s.to_ascii_uppercase();
    if motif.is_empty() || !motif.bytes().all(|b| b"ACGT".contains(&b)) {
        return Err(format!("Motif must consist of A, C, G and T, got '{}'", s));
    }
    Ok(motif)
}

fn threads_in_range(s: &str) -> Result<usize> {
    let thread: usize = s
        .parse()
        .map_err(|_| format!("`{}` is not a valid thread number", s))?;
    if thread >= 1 {
        Ok(thread)
    } else {
        Err("Number of threads must be at least 1".into())
    }
}

fn ensure_window_len(s: &str) -> Result<usize> {
    let k: usize = s
        .parse()
        .map_err(|_| format!("`{}` is not a valid number of variables", s))?;
    if k >= 2 {
        Ok(k)
    } else {
        Err("Number of variables must be at least 2".into())
    }
}

fn check_file_exists(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    if !path.exists() {
        Err(format!("File does not exist: {}", path.display()))
    } else {
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> std::result::Result<Cli, clap::Error> {
        Cli::try_parse_from(args.iter().copied())
    }

    fn with<'a>(base: &[&'a str], extra: &[&'a str]) -> Vec<&'a str> {
        [base, extra].concat()
    }

    #[test]
    fn selection_is_required_and_exclusive() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        let base = ["mcaller", "call", "-r", path, "-e", path, "-f", path];

        assert!(parse(&base).is_err());
        assert!(parse(&with(&base, &["-m", "GATC", "-p", path])).is_err());

        let cli = parse(&with(&base, &["-m", "gatc"])).unwrap();
        let Command::Call(args) = cli.command else {
            panic!("expected call subcommand");
        };
        assert_eq!(args.extract.motif.as_deref(), Some("GATC"));
        assert_eq!(args.extract.num_variables, 6);
        assert_eq!(args.extract.skip_thresh, 0);
        assert_eq!(args.extract.num_threads, 1);
        assert_eq!(args.extract.base, TargetBase::A);
        assert_eq!(args.extract.classifier, ClassifierKind::LogisticRegression);
    }

    #[test]
    fn single_base_motif_sets_target_base() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        let cli = parse(&[
            "mcaller", "train", "-r", path, "-e", path, "-f", path, "-m", "C", "-b", "A",
        ])
        .unwrap();
        let Command::Train(args) = cli.command else {
            panic!("expected train subcommand");
        };
        assert_eq!(args.extract.target_base().unwrap(), TargetBase::C);
        assert_eq!(
            args.extract.model_path(TargetBase::C),
            PathBuf::from("model_LR_6_m5C.model")
        );
    }

    #[test]
    fn skip_thresh_must_be_below_half_of_k() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        let cli = parse(&[
            "mcaller", "call", "-r", path, "-e", path, "-f", path, "-m", "A", "-n", "6", "-s",
            "3",
        ])
        .unwrap();
        let Command::Call(args) = cli.command else {
            panic!("expected call subcommand");
        };
        assert!(args.extract.check_skip_thresh().is_err());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(check_motif("GAXC").is_err());
        assert!(threads_in_range("0").is_err());
        assert!(ensure_window_len("1").is_err());
        assert!(check_file_exists("/definitely/not/here").is_err());
    }
}
