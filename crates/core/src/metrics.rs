//! Lightweight metrics recorder (JSONL) for the conductivity pipeline.

use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Mutex,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

/// Axis labels used by folding diagnostics, matching the reference tool's
/// "first"/"second"/"third" wording.
pub const AXIS_NAMES: [&str; 3] = ["first", "second", "third"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub format: MetricsFormat,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            output: None,
            format: MetricsFormat::JsonLines,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MetricsFormat {
    #[default]
    JsonLines,
}

pub struct MetricsRecorder {
    writer: Mutex<File>,
    format: MetricsFormat,
}

impl MetricsRecorder {
    pub fn new(path: &Path, format: MetricsFormat) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        Ok(Self {
            writer: Mutex::new(file),
            format,
        })
    }

    pub fn emit(&self, event: MetricsEvent<'_>) {
        if let Err(err) = self.write_event(event) {
            eprintln!("[metrics] failed to write event: {err}");
        }
    }

    fn write_event(&self, event: MetricsEvent<'_>) -> io::Result<()> {
        match self.format {
            MetricsFormat::JsonLines => {
                let envelope = EventEnvelope {
                    timestamp_ms: now_millis(),
                    event,
                };
                let mut guard = self.writer.lock().expect("metrics writer poisoned");
                serde_json::to_writer(&mut *guard, &envelope)?;
                guard.write_all(b"\n")?;
                guard.flush()
            }
        }
    }
}

#[derive(Serialize)]
struct EventEnvelope<'a> {
    timestamp_ms: f64,
    #[serde(flatten)]
    event: MetricsEvent<'a>,
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MetricsEvent<'a> {
    InitStart {
        mesh: [usize; 3],
        mesh_divisors: [usize; 3],
        coarse_mesh: [usize; 3],
        grid_points: usize,
        sigmas: usize,
        temperatures: usize,
        bands: usize,
    },
    DivisorFallback {
        axis: &'a str,
        mesh_number: usize,
        divisor: usize,
    },
    ShiftDisabled {
        axis: &'a str,
        divisor: usize,
    },
    GridPointSolve {
        index: usize,
        grid_point: usize,
        weight: usize,
        order_kstar: usize,
        duration_ms: f64,
    },
    PipelineDone {
        grid_points: usize,
        sampling_points: usize,
        duration_ms: f64,
    },
}

fn now_millis() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|dur| dur.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

impl MetricsConfig {
    pub fn build_recorder(&self) -> io::Result<Option<MetricsRecorder>> {
        if !self.enabled {
            return Ok(None);
        }
        let path = self.output.as_ref().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "metrics.output must be set when metrics are enabled",
            )
        })?;
        MetricsRecorder::new(path, self.format).map(Some)
    }
}
