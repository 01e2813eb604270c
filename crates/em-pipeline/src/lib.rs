//! # em-pipeline
//!
//! Runs one video through its encoder's task chain.
//!
//! - **[`TaskChain`]** is an ordered snapshot of an encoder's steps.
//! - **[`Transcoder`]** runs a single step. [`FfmpegTranscoder`] is the
//!   production implementation on top of `em-av`.
//! - **[`VideoRecorder`]** and **[`CompletionNotifier`]** are where the
//!   runner writes state and announces completion.
//! - **[`PipelineRunner`]** executes the chain strictly in order and stops at
//!   the first failure.

pub mod chain;
pub mod progress;
pub mod runner;
pub mod sink;
pub mod transcoder;

pub use chain::{TaskChain, TaskStep};
pub use progress::ProgressSender;
pub use runner::{PipelineRunner, RunOutcome, RunRequest};
pub use sink::{CompletionNotifier, VideoRecorder};
pub use transcoder::{FfmpegTranscoder, Transcoder};
