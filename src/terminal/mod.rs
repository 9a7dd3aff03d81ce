pub mod registry;
pub mod session;

pub use registry::{CloseOutcome, TerminalRegistry};
pub use session::{SessionHandle, SessionInfo};
