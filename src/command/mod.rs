pub mod args;
pub mod invoker;
pub mod template;

pub use args::{RunOptions, RunOptionsBuilder};
pub use invoker::{CommandInvoker, COMMAND_RUN};
pub use template::{resolve_template, ResolutionContext};
