//! Test execution engine

pub mod executor;
pub mod requester;

pub use executor::{
    CaseFailure, ConsoleProgress, Executor, NoOpProgress, ProgressCallback, RunOutcome,
};
pub use requester::Requester;
