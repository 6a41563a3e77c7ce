//! Asynchronous side of the pipeline: the dispatcher that schedules jobs
//! and the worker that drives each one to a terminal state.

pub mod dispatcher;
pub mod generation;

pub use dispatcher::{JobDispatcher, TokioDispatcher};
pub use generation::{ContentSource, GenerationWorker, WorkerOutcome};
