use crate::cli::ExtractArgs;
use crate::extract::{ExtractConfig, ExtractParams, Mode, Selection};
use crate::utils::{default_output_path, PositionTable, ReadQualities, Result, TargetBase};
use std::path::PathBuf;
use std::sync::Arc;

/// Inputs shared by `call` and `train` once the arguments are validated.
pub struct Inputs {
    pub base: TargetBase,
    pub selection: Arc<Selection>,
    pub qualities: Arc<ReadQualities>,
    pub output_path: PathBuf,
    pub model_path: PathBuf,
}

impl Inputs {
    pub fn load(args: &ExtractArgs, train: bool) -> Result<Self> {
        args.check_skip_thresh()?;
        let base = args.target_base()?;
        log::info!("Target base: {} ({})", base.unmodified_tag(), base.modified_tag());

        let positions = match &args.positions_path {
            Some(path) => {
                let table = PositionTable::from_path(path, base)?;
                log::info!("Loaded {} positions from {}", table.len(), path.display());
                Some(table)
            }
            None => None,
        };
        let selection = Selection::new(args.motif.as_deref(), args.motif_offset, positions, base)?;

        let qualities = ReadQualities::from_fastq(&args.fastq_path)?;

        let output_path = args
            .output_path
            .clone()
            .unwrap_or_else(|| default_output_path(&args.alignment_path, args.num_variables, train));

        Ok(Inputs {
            base,
            selection: Arc::new(selection),
            qualities: Arc::new(qualities),
            output_path,
            model_path: args.model_path(base),
        })
    }

    pub fn extract_config(&self, args: &ExtractArgs, mode: Mode) -> ExtractConfig {
        ExtractConfig {
            alignment_path: args.alignment_path.clone(),
            reference_path: args.reference_path.clone(),
            output_path: self.output_path.clone(),
            params: ExtractParams {
                k: args.num_variables,
                skip_thresh: args.skip_thresh,
                qual_thresh: args.qual_thresh,
                base: self.base,
            },
            selection: Arc::clone(&self.selection),
            qualities: Arc::clone(&self.qualities),
            num_workers: args.num_threads,
            mode,
        }
    }
}
