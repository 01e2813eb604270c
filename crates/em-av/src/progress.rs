//! Parser for ffmpeg progress output.
//!
//! ffmpeg is run with `-progress pipe:2 -nostats`, so stderr carries the
//! usual banner (including the input's `Duration:` line) followed by blocks
//! of `key=value` lines. The fraction of the input processed so far is
//! `out_time_us / duration`.

use std::time::Duration;

/// Turns ffmpeg stderr lines into whole percentages (0-100).
#[derive(Debug, Default)]
pub struct ProgressParser {
    duration_us: Option<u64>,
    last: Option<u8>,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a known duration instead of waiting for the banner.
    pub fn with_duration(duration: Duration) -> Self {
        Self {
            duration_us: Some(duration.as_micros() as u64).filter(|d| *d > 0),
            last: None,
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration_us.map(Duration::from_micros)
    }

    /// Feed one stderr line.
    ///
    /// Returns a percentage only when it is higher than the last one
    /// returned, so the sequence of reported values never decreases.
    pub fn feed(&mut self, line: &str) -> Option<u8> {
        let line = line.trim();

        if self.duration_us.is_none() {
            if let Some(rest) = line.strip_prefix("Duration:") {
                self.duration_us = parse_banner_duration(rest).filter(|d| *d > 0);
                return None;
            }
        }

        let (key, value) = line.split_once('=')?;
        let pct = match key {
            // ffmpeg's out_time_ms is also in microseconds.
            "out_time_us" | "out_time_ms" => {
                let out_us: u64 = value.trim().parse().ok()?;
                let total = self.duration_us?;
                let fraction = (out_us as f64 / total as f64).clamp(0.0, 1.0);
                (fraction * 100.0).floor() as u8
            }
            "progress" if value.trim() == "end" => 100,
            _ => return None,
        };

        match self.last {
            Some(prev) if pct <= prev => None,
            _ => {
                self.last = Some(pct);
                Some(pct)
            }
        }
    }
}

/// Parse the `HH:MM:SS.ss` that follows `Duration:` in the banner.
fn parse_banner_duration(rest: &str) -> Option<u64> {
    let stamp = rest.trim().split(',').next()?.trim();
    let mut parts = stamp.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let total = (hours * 3600 + minutes * 60) as f64 + seconds;
    Some((total * 1_000_000.0).round() as u64)
}
