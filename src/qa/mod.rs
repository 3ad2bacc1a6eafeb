//! Question answering: startup wiring, the per-query pipeline, and the
//! interactive session

pub mod pipeline;
pub mod session;
pub mod setup;

pub use pipeline::{Answer, QueryPipeline, RetrievalQa};
pub use session::{Input, InputSource, Session, SessionState, TerminalInput};
pub use setup::build_pipeline;
