//! Ordered snapshot of an encoder's encoding tasks.

use std::path::{Path, PathBuf};

use em_core::{EncoderId, EncodingTaskId};

/// One step of a task chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStep {
    pub id: EncodingTaskId,
    pub position: i64,
    pub name: String,
    /// Appended to the source file's stem to name this step's output.
    pub output_suffix: String,
    /// ffmpeg arguments for this step.
    pub command: String,
}

impl TaskStep {
    /// Human-readable label for logs.
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            format!("#{}", self.position)
        } else {
            format!("#{} ({})", self.position, self.name)
        }
    }
}

/// An encoder's steps, taken once at run start and read-only afterwards.
#[derive(Debug, Clone)]
pub struct TaskChain {
    encoder_id: EncoderId,
    name: String,
    steps: Vec<TaskStep>,
}

impl TaskChain {
    /// Build a chain; steps are ordered by position.
    pub fn new(encoder_id: EncoderId, name: impl Into<String>, mut steps: Vec<TaskStep>) -> Self {
        steps.sort_by_key(|s| s.position);
        Self {
            encoder_id,
            name: name.into(),
            steps,
        }
    }

    pub fn encoder_id(&self) -> EncoderId {
        self.encoder_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[TaskStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn first(&self) -> Option<&TaskStep> {
        self.steps.first()
    }

    /// The step that follows `step`, or `None` if it is the last one or not
    /// part of this chain.
    pub fn next_after(&self, step: &TaskStep) -> Option<&TaskStep> {
        let idx = self.steps.iter().position(|s| s.id == step.id)?;
        self.steps.get(idx + 1)
    }

    /// Output file for `step`: the source's directory and stem plus the
    /// step's suffix. `/v/in.mp4` with suffix `-360p.mp4` becomes
    /// `/v/in-360p.mp4`.
    pub fn output_path_for(source: &Path, step: &TaskStep) -> PathBuf {
        let dir = source.parent().unwrap_or_else(|| Path::new(""));
        let stem = source
            .file_stem()
            .or_else(|| source.file_name())
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        dir.join(format!("{stem}{}", step.output_suffix))
    }
}

#[cfg(test)]
pub(crate) fn step(position: i64, suffix: &str, command: &str) -> TaskStep {
    TaskStep {
        id: EncodingTaskId::new(),
        position,
        name: String::new(),
        output_suffix: suffix.to_string(),
        command: command.to_string(),
    }
}
