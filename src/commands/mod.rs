pub mod call;
pub mod train;
mod setup;
