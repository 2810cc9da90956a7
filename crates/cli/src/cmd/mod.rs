mod build;
mod clean;
mod plan;

pub use build::cmd_build;
pub use clean::{cmd_clean, cmd_clean_deps};
pub use plan::cmd_plan;
