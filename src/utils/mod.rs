mod io_utils;
mod positions;
mod quality;
mod readers;
mod seq;
mod util;

pub use io_utils::{create_appender, default_output_path, merge_parts, part_path, remove_if_exists};
pub use positions::{Label, LabelTable, PositionTable, SitePosition};
pub use quality::ReadQualities;
pub use readers::{contig_names, fetch_contig, is_gzipped, open_genome_reader, open_text_reader};
pub use seq::{complement_base, normalize_sequence, reverse_complement, Strand, TargetBase, MARKER};
pub use util::{ensure_file_exists, handle_error_and_exit, Result};
