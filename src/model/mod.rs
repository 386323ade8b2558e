pub mod board;
pub mod config;
pub mod preferences;
pub mod task;

pub use board::*;
pub use config::*;
pub use preferences::*;
pub use task::*;
