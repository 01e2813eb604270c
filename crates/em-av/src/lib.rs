//! # em-av
//!
//! External tool handling for enigmamachine.
//!
//! - **Tool discovery** ([`ToolRegistry`]) finds ffmpeg via config or `PATH`.
//! - **Command execution** ([`ToolCommand`]) runs a process, either capturing
//!   its output or streaming stderr line by line with cancellation.
//! - **Progress parsing** ([`ProgressParser`]) turns ffmpeg's `-progress`
//!   output into whole percentages.
//! - **Command templates** ([`template`]) expand an encoding task's command
//!   into an ffmpeg argument list.
//! - **Transcoding** ([`transcode_with_progress`]) runs one encoding step.

pub mod command;
pub mod progress;
pub mod template;
pub mod tools;
pub mod transcode;

pub use command::{ToolCommand, ToolOutput};
pub use progress::ProgressParser;
pub use tools::{ToolInfo, ToolRegistry};
pub use transcode::transcode_with_progress;
