pub mod command;
pub mod config;
pub mod driver;
pub mod error;
pub mod extension;
pub mod host;
pub mod terminal;
pub mod utils;

pub use command::{resolve_template, CommandInvoker, ResolutionContext, RunOptions, COMMAND_RUN};
pub use config::Config;
pub use error::AppError;
pub use extension::Extension;
pub use terminal::{CloseOutcome, SessionHandle, TerminalRegistry};
