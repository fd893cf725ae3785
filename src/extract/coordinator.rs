use super::accumulator::{Accumulator, ExtractParams};
use super::annotate::{annotate, AnnotatedContig, ContigSource, GenomeContigSource, Selection};
use super::partition::{for_each_owned_line, open_partition, plan_partitions, Partition};
use super::sink::{FeatureSink, ScoringSink, TrainingExample, TrainingSink};
use super::stats::ExtractStats;
use crate::model::Classifier;
use crate::utils::{
    contig_names, create_appender, fetch_contig, is_gzipped, merge_parts, open_genome_reader,
    open_text_reader, part_path, remove_if_exists, LabelTable, ReadQualities, Result,
};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use itertools::Itertools;
use rayon::ThreadPoolBuilder;
use std::collections::{BTreeSet, HashMap};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const WAIT_REPORT_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub enum Mode {
    Score { classifier: Arc<dyn Classifier> },
    Train { labels: Arc<LabelTable> },
}

pub struct ExtractConfig {
    pub alignment_path: PathBuf,
    pub reference_path: PathBuf,
    pub output_path: PathBuf,
    pub params: ExtractParams,
    pub selection: Arc<Selection>,
    pub qualities: Arc<ReadQualities>,
    pub num_workers: usize,
    pub mode: Mode,
}

#[derive(Debug, Default)]
pub struct ExtractOutcome {
    pub stats: ExtractStats,
    /// Empty in scoring mode
    pub examples: Vec<TrainingExample>,
}

#[derive(Clone)]
enum ContigSupply {
    Preloaded(Arc<AnnotatedContig>),
    Genome {
        reference_path: PathBuf,
        selection: Arc<Selection>,
    },
}

struct WorkerJob {
    index: usize,
    alignment_path: PathBuf,
    partition: Option<Partition>,
    output_path: PathBuf,
    params: ExtractParams,
    qualities: Arc<ReadQualities>,
    contigs: ContigSupply,
    mode: Mode,
}

struct WorkerOutput {
    stats: ExtractStats,
    examples: Vec<TrainingExample>,
}

/// Runs feature extraction over the whole alignment file and merges the
/// workers' results. Scoring output is written to `output_path`; training
/// examples are also written there and returned for fitting.
pub fn run_extraction(config: &ExtractConfig) -> Result<ExtractOutcome> {
    let genome_reader = open_genome_reader(&config.reference_path)?;
    let contigs = contig_names(&genome_reader)?;
    log::info!("{} contigs", contigs.len());
    log::info!("{} threads", config.num_workers);

    remove_if_exists(&config.output_path)?;

    let genome_supply = ContigSupply::Genome {
        reference_path: config.reference_path.clone(),
        selection: Arc::clone(&config.selection),
    };

    let outputs = if config.num_workers == 1 {
        let job = config.job(0, None, config.output_path.clone(), genome_supply);
        vec![run_worker(job)?]
    } else {
        if is_gzipped(&config.alignment_path) {
            return Err(format!(
                "Compressed alignments cannot be split across workers, decompress {} or use a single thread",
                config.alignment_path.display()
            ));
        }
        let (scope, supply) = match contigs.as_slice() {
            [contig] => {
                log::info!(
                    "contig = {} - allocating {} threads",
                    contig,
                    config.num_workers
                );
                let seq = fetch_contig(&genome_reader, contig)?;
                let annotated =
                    annotate(contig, &seq, config.params.base, &config.selection)?;
                log::info!(
                    "Finished loading {}: {} positions to examine",
                    contig,
                    annotated.num_sites()
                );
                (
                    Some(contig.as_str()),
                    ContigSupply::Preloaded(Arc::new(annotated)),
                )
            }
            _ => (None, genome_supply),
        };
        run_partitioned(config, scope, supply)?
    };

    log::info!("Finished extracting signals");
    let mut outcome = ExtractOutcome::default();
    for output in outputs {
        outcome.stats.merge(output.stats);
        outcome.examples.extend(output.examples);
    }
    if let Mode::Train { .. } = config.mode {
        write_training_examples(&outcome.examples, config)?;
    }
    outcome.stats.log_summary("Total");
    Ok(outcome)
}

impl ExtractConfig {
    fn job(
        &self,
        index: usize,
        partition: Option<Partition>,
        output_path: PathBuf,
        contigs: ContigSupply,
    ) -> WorkerJob {
        WorkerJob {
            index,
            alignment_path: self.alignment_path.clone(),
            partition,
            output_path,
            params: self.params.clone(),
            qualities: Arc::clone(&self.qualities),
            contigs,
            mode: self.mode.clone(),
        }
    }
}

fn run_partitioned(
    config: &ExtractConfig,
    scope: Option<&str>,
    supply: ContigSupply,
) -> Result<Vec<WorkerOutput>> {
    let partitions = plan_partitions(&config.alignment_path, scope, config.num_workers)?;
    if partitions.is_empty() {
        log::warn!("No alignment lines to process");
        return Ok(Vec::new());
    }
    let part_paths = partitions
        .iter()
        .map(|p| part_path(&config.output_path, p.index))
        .collect_vec();
    for path in &part_paths {
        remove_if_exists(path)?;
    }

    log::debug!("Initializing thread pool with {} threads...", partitions.len());
    let pool = ThreadPoolBuilder::new()
        .num_threads(partitions.len())
        .thread_name(|i| format!("mcaller-{}", i))
        .panic_handler(|_| log::error!("Worker thread panicked"))
        .build()
        .map_err(|e| format!("Failed to initialize thread pool: {}", e))?;

    let (sender, receiver) = unbounded();
    let num_jobs = partitions.len();
    for (partition, output_path) in partitions.into_iter().zip(part_paths.iter().cloned()) {
        log::debug!(
            "Worker {}: lines {}..{}",
            partition.index,
            partition.start_line + 1,
            partition.start_line + partition.num_lines
        );
        let job = config.job(partition.index, Some(partition), output_path, supply.clone());
        let sender = sender.clone();
        pool.spawn(move || {
            let index = job.index;
            let result = run_worker(job);
            if sender.send((index, result)).is_err() {
                log::error!("Worker {} could not report its result", index);
            }
        });
    }
    drop(sender);

    let mut results = wait_for_workers(&receiver, num_jobs)?;
    results.sort_by_key(|(index, _)| *index);

    let mut outputs = Vec::with_capacity(results.len());
    let mut errors = Vec::new();
    for (index, result) in results {
        match result {
            Ok(output) => outputs.push(output),
            Err(e) => errors.push(format!("worker {}: {}", index, e)),
        }
    }
    if !errors.is_empty() {
        return Err(errors.join("; "));
    }

    if let Mode::Score { .. } = config.mode {
        merge_parts(&part_paths, &config.output_path)?;
    }
    Ok(outputs)
}

/// Blocks until every worker reported, logging the stragglers periodically.
fn wait_for_workers<T>(receiver: &Receiver<(usize, T)>, num_jobs: usize) -> Result<Vec<(usize, T)>> {
    let mut pending: BTreeSet<usize> = (0..num_jobs).collect();
    let mut results = Vec::with_capacity(num_jobs);
    while !pending.is_empty() {
        match receiver.recv_timeout(WAIT_REPORT_INTERVAL) {
            Ok((index, result)) => {
                pending.remove(&index);
                log::debug!("Worker {} finished, {} remaining", index, pending.len());
                results.push((index, result));
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "Still waiting on {} worker(s): {}",
                    pending.len(),
                    pending.iter().join(", ")
                );
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(format!(
                    "Worker(s) {} exited without reporting a result",
                    pending.iter().join(", ")
                ));
            }
        }
    }
    Ok(results)
}

fn run_worker(job: WorkerJob) -> Result<WorkerOutput> {
    let output = match &job.mode {
        Mode::Score { classifier } => {
            let writer = create_appender(&job.output_path)?;
            let sink = ScoringSink::new(writer, Arc::clone(classifier), job.params.base);
            let (stats, _) = run_with_sink(&job, sink)?;
            WorkerOutput {
                stats,
                examples: Vec::new(),
            }
        }
        Mode::Train { labels } => {
            let sink = TrainingSink::new(Arc::clone(labels));
            let (stats, sink) = run_with_sink(&job, sink)?;
            WorkerOutput {
                stats,
                examples: sink.into_examples(),
            }
        }
    };
    log::info!("Worker {} finished processing", job.index);
    output.stats.log_summary(&format!("Worker {}", job.index));
    Ok(output)
}

fn run_with_sink<K: FeatureSink>(job: &WorkerJob, sink: K) -> Result<(ExtractStats, K)> {
    match &job.contigs {
        ContigSupply::Preloaded(contig) => {
            let source = HashMap::from([(contig.id.clone(), Arc::clone(contig))]);
            stream(job, source, sink)
        }
        ContigSupply::Genome {
            reference_path,
            selection,
        } => {
            let source =
                GenomeContigSource::new(reference_path, job.params.base, Arc::clone(selection))?;
            stream(job, source, sink)
        }
    }
}

fn stream<S: ContigSource, K: FeatureSink>(
    job: &WorkerJob,
    source: S,
    sink: K,
) -> Result<(ExtractStats, K)> {
    let mut accumulator = Accumulator::new(
        job.params.clone(),
        Arc::clone(&job.qualities),
        source,
        sink,
    );
    match &job.partition {
        Some(partition) => {
            let reader = open_partition(&job.alignment_path, partition)?;
            for_each_owned_line(reader, partition, |line| accumulator.process_raw(line))?;
        }
        None => {
            let reader = open_text_reader(&job.alignment_path)?;
            for (line_number, line) in reader.split(b'\n').enumerate() {
                let line = line.map_err(|e| {
                    format!(
                        "Error at {} line {}: {}",
                        job.alignment_path.display(),
                        line_number + 1,
                        e
                    )
                })?;
                accumulator.process_raw(&line)?;
            }
        }
    }
    accumulator.finish()
}

fn write_training_examples(examples: &[TrainingExample], config: &ExtractConfig) -> Result<()> {
    let mut writer = create_appender(&config.output_path)?;
    for example in examples {
        writeln!(writer, "{}", example.to_tsv(config.params.base))
            .map_err(|e| format!("Failed to write {}: {}", config.output_path.display(), e))?;
    }
    writer
        .flush()
        .map_err(|e| format!("Failed to write {}: {}", config.output_path.display(), e))?;
    log::info!(
        "Wrote {} training observations to {}",
        examples.len(),
        config.output_path.display()
    );
    Ok(())
}
