use super::setup::Inputs;
use crate::cli::TrainArgs;
use crate::extract::{run_extraction, Mode, Selection};
use crate::model::Model;
use crate::utils::Result;
use std::sync::Arc;
use std::time::Instant;

pub fn train(args: TrainArgs) -> Result<()> {
    let start_timer = Instant::now();
    let args = args.extract;
    let inputs = Inputs::load(&args, true)?;

    let label_table = match inputs.selection.as_ref() {
        Selection::Positions(positions) => positions.labels()?,
        Selection::Motif { .. } => {
            return Err("Training requires a positions file with a label for every position".into())
        }
    };
    log::info!("{} labelled positions", label_table.len());

    let config = inputs.extract_config(
        &args,
        Mode::Train {
            labels: Arc::new(label_table),
        },
    );
    let outcome = run_extraction(&config)?;

    let (features, labels): (Vec<_>, Vec<_>) = outcome
        .examples
        .into_iter()
        .map(|example| (example.site.features, example.label.is_modified()))
        .unzip();
    log::info!(
        "{} training observations ({} modified)",
        labels.len(),
        labels.iter().filter(|&&l| l).count()
    );
    let model = Model::fit(args.classifier, &features, &labels)?;
    model.save(&inputs.model_path)?;

    log::info!(
        "Finished training, model written to {}",
        inputs.model_path.display()
    );
    log::info!("Total execution time: {:.2?}", start_timer.elapsed());
    Ok(())
}
