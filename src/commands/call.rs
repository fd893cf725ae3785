use super::setup::Inputs;
use crate::cli::CallArgs;
use crate::extract::{run_extraction, Mode};
use crate::model::Model;
use crate::utils::{ensure_file_exists, Result};
use std::sync::Arc;
use std::time::Instant;

pub fn call(args: CallArgs) -> Result<()> {
    let start_timer = Instant::now();
    let args = args.extract;
    let inputs = Inputs::load(&args, false)?;

    ensure_file_exists(&inputs.model_path, "Model file")?;
    let model = Model::load(&inputs.model_path)?;
    if model.num_features() != args.num_variables + 1 {
        return Err(format!(
            "Model {} expects {} features but {} variables produce {}; retrain or pass a matching -n",
            inputs.model_path.display(),
            model.num_features(),
            args.num_variables,
            args.num_variables + 1
        ));
    }
    log::info!(
        "Loaded {} model from {}",
        model.kind(),
        inputs.model_path.display()
    );

    let config = inputs.extract_config(
        &args,
        Mode::Score {
            classifier: Arc::new(model),
        },
    );
    run_extraction(&config)?;

    log::info!("Classifications written to {}", config.output_path.display());
    log::info!("Total execution time: {:.2?}", start_timer.elapsed());
    Ok(())
}
