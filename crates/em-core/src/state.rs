//! Video lifecycle and progress reporting enums.
//!
//! Both serialize in lowercase and round-trip through their string form,
//! which is also how they are stored in the database.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

// ---------------------------------------------------------------------------
// VideoState
// ---------------------------------------------------------------------------

/// Lifecycle state of a video.
///
/// `unencoded -> encoding -> complete | error`. The only way back to
/// `unencoded` is the startup recovery sweep or an explicit re-queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoState {
    Unencoded,
    Encoding,
    Complete,
    Error,
}

impl VideoState {
    pub const ALL: [VideoState; 4] = [
        VideoState::Unencoded,
        VideoState::Encoding,
        VideoState::Complete,
        VideoState::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unencoded => "unencoded",
            Self::Encoding => "encoding",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }

    /// `complete` and `error` are terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

impl fmt::Display for VideoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for VideoState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unencoded" => Ok(Self::Unencoded),
            "encoding" => Ok(Self::Encoding),
            "complete" => Ok(Self::Complete),
            "error" => Ok(Self::Error),
            other => Err(Error::Validation(format!("unknown video state: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// ProgressMode
// ---------------------------------------------------------------------------

/// How step progress is mapped onto the video's progress field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressMode {
    /// Each step's own 0-100 overwrites the field.
    #[default]
    Step,
    /// Steps are weighted equally across the whole chain.
    Chain,
}

impl ProgressMode {
    /// Map a step's percentage to the value written to the video.
    ///
    /// `index` is the zero-based position of the running step and `total`
    /// the chain length.
    pub fn overall(&self, index: usize, total: usize, step_pct: u8) -> u8 {
        let step_pct = step_pct.min(100);
        match self {
            Self::Step => step_pct,
            Self::Chain if total == 0 => 100,
            Self::Chain => {
                let done = index.min(total) as u64 * 100 + u64::from(step_pct);
                (done / total as u64).min(100) as u8
            }
        }
    }
}

impl fmt::Display for ProgressMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Step => write!(f, "step"),
            Self::Chain => write!(f, "chain"),
        }
    }
}
