pub mod cli;
pub mod errors;
pub mod loader;
pub mod output;

pub use cli::{CliContext, run_batch, run_generate, run_inspect};
pub use errors::FrontendError;
