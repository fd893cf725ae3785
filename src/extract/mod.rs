pub mod accumulator;
pub mod annotate;
pub mod coordinator;
pub mod partition;
pub mod record;
pub mod sink;
pub mod stats;
pub mod window;

pub use accumulator::{Accumulator, ExtractParams};
pub use annotate::{annotate, AnnotatedContig, ContigSource, GenomeContigSource, Selection};
pub use coordinator::{run_extraction, ExtractConfig, ExtractOutcome, Mode};
pub use record::AlignmentRecord;
pub use sink::{
    ClassificationRecord, FeatureSink, FeatureVector, ScoringSink, SiteFeatures, TrainingExample,
    TrainingSink,
};
pub use stats::ExtractStats;
pub use window::{CandidateWindow, Step, Transition, WindowState};
