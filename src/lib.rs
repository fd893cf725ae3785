pub mod cli;
pub mod commands;
pub mod extract;
pub mod model;
pub mod utils;
