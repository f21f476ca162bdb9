//! Engine backed by the SWMM command-line runner.
//!
//! Each run writes a copy of the network with the requested simulation
//! period, invokes `<executable> <inp> <rpt> <out>`, and reads the binary
//! results and the report's continuity tables. Progress is taken from the
//! runner's console output while it simulates.

pub mod output;
pub mod report;

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use chrono::NaiveDateTime;

use st_network::{NetworkFile, set_options};

use crate::engine::{EngineError, EngineOutput, EngineRequest, EngineStep, SimulationEngine};
use output::{NODE_LATERAL_INFLOW, NODE_TOTAL_INFLOW, OutputError, OutputFile};

pub const DEFAULT_EXECUTABLE: &str = "runswmm";

impl From<OutputError> for EngineError {
    fn from(err: OutputError) -> Self {
        EngineError::new(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct SwmmCli {
    executable: PathBuf,
}

impl Default for SwmmCli {
    fn default() -> Self {
        Self::new(DEFAULT_EXECUTABLE)
    }
}

struct RunFiles {
    input: PathBuf,
    report: PathBuf,
    output: PathBuf,
    keep: bool,
}

impl RunFiles {
    fn new(network_path: &Path, keep: bool) -> Self {
        let input = network_path.with_extension("run.inp");
        let base = if keep { network_path } else { input.as_path() };
        Self {
            report: base.with_extension("rpt"),
            output: base.with_extension("out"),
            input,
            keep,
        }
    }

    fn cleanup(&self) {
        let mut paths = vec![&self.input];
        if !self.keep {
            paths.push(&self.report);
            paths.push(&self.output);
        }
        for path in paths {
            if let Err(err) = fs::remove_file(path) {
                tracing::debug!(path = %path.display(), error = %err, "could not remove run file");
            }
        }
    }
}

/// Percent complete read from the runner's console.
///
/// The runner redraws its status line with backspaces or carriage returns,
/// either as `NN% complete` or as `Simulating day: D hour: H`; the latter is
/// scaled by the simulated duration. Reported values only ever increase.
struct ConsoleProgress {
    total_hours: f64,
    pending: String,
    last: f64,
}

impl ConsoleProgress {
    fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            total_hours: (end - start).num_minutes() as f64 / 60.0,
            pending: String::new(),
            last: 0.0,
        }
    }

    /// Feed raw console bytes; returns the new percentage when it advanced.
    fn feed(&mut self, bytes: &[u8]) -> Option<f64> {
        self.pending.push_str(&String::from_utf8_lossy(bytes));
        let mut advanced = None;
        while let Some(end) = self
            .pending
            .find(|c: char| matches!(c, '\r' | '\n' | '\u{8}'))
        {
            let segment: String = self.pending.drain(..end).collect();
            self.pending.remove(0);
            if let Some(percent) = self.parse(&segment)
                && percent > self.last
            {
                self.last = percent;
                advanced = Some(percent);
            }
        }
        advanced
    }

    fn parse(&self, segment: &str) -> Option<f64> {
        if let Some(idx) = segment.find('%') {
            let value = segment[..idx].split_whitespace().last()?.parse::<f64>().ok()?;
            return Some(value.clamp(0.0, 100.0));
        }
        let idx = segment.find("day:")?;
        let mut tokens = segment[idx + "day:".len()..].split_whitespace();
        let day = tokens.next()?.parse::<f64>().ok()?;
        let hour = match (tokens.next(), tokens.next()) {
            (Some("hour:"), Some(h)) => h.parse::<f64>().ok()?,
            _ => 0.0,
        };
        if self.total_hours <= 0.0 {
            return None;
        }
        Some(((day * 24.0 + hour) / self.total_hours * 100.0).clamp(0.0, 100.0))
    }
}

fn io_error(path: &Path, err: std::io::Error) -> EngineError {
    EngineError::new(format!("{}: {}", path.display(), err))
}

impl SwmmCli {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    fn write_input(&self, request: &EngineRequest<'_>, path: &Path) -> Result<(), EngineError> {
        let mut file = NetworkFile::load(request.network_path)
            .map_err(|e| EngineError::new(e.to_string()))?;
        let start_date = request.start.format("%m/%d/%Y").to_string();
        let start_time = request.start.format("%H:%M:%S").to_string();
        let end_date = request.end.format("%m/%d/%Y").to_string();
        let end_time = request.end.format("%H:%M:%S").to_string();
        set_options(
            &mut file,
            &[
                ("START_DATE", start_date.as_str()),
                ("START_TIME", start_time.as_str()),
                ("REPORT_START_DATE", start_date.as_str()),
                ("REPORT_START_TIME", start_time.as_str()),
                ("END_DATE", end_date.as_str()),
                ("END_TIME", end_time.as_str()),
            ],
        )
        .map_err(|e| EngineError::new(e.to_string()))?;
        file.save(path).map_err(|e| EngineError::new(e.to_string()))
    }

    fn execute(
        &self,
        files: &RunFiles,
        console: &mut ConsoleProgress,
        progress: &mut dyn FnMut(f64),
    ) -> Result<(), EngineError> {
        let mut child = Command::new(&self.executable)
            .arg(&files.input)
            .arg(&files.report)
            .arg(&files.output)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| io_error(&self.executable, e))?;

        let stderr_handle = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut text = String::new();
                pipe.read_to_string(&mut text).map(|_| text).unwrap_or_default()
            })
        });

        let mut read_result = Ok(());
        if let Some(mut stdout) = child.stdout.take() {
            let mut buf = [0u8; 512];
            loop {
                match stdout.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if let Some(percent) = console.feed(&buf[..n]) {
                            progress(percent);
                        }
                    }
                    Err(err) => {
                        read_result = Err(io_error(&self.executable, err));
                        if let Err(err) = child.kill() {
                            tracing::debug!(error = %err, "engine process already exited");
                        }
                        break;
                    }
                }
            }
        }

        let status = child.wait().map_err(|e| io_error(&self.executable, e))?;
        let stderr = stderr_handle
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        read_result?;
        if !status.success() {
            return Err(EngineError::new(format!(
                "{} exited with {}: {}",
                self.executable.display(),
                status,
                stderr.trim()
            )));
        }
        Ok(())
    }

    fn read_results(
        &self,
        request: &EngineRequest<'_>,
        files: &RunFiles,
    ) -> Result<EngineOutput, EngineError> {
        let bytes = fs::read(&files.output).map_err(|e| io_error(&files.output, e))?;
        let out = OutputFile::parse(&bytes)?;
        let outfall = out.node_index(request.outfall)?;
        let pollutant = out.pollutant_index(request.pollutant)?;
        let nodes = request
            .nodes
            .iter()
            .map(|n| out.node_index(n))
            .collect::<Result<Vec<_>, _>>()?;

        let mut steps = Vec::with_capacity(out.periods);
        for period in 0..out.periods {
            let mut step = EngineStep {
                time: out.period_time(period)?,
                outfall_inflow: out.node_flow(period, outfall, NODE_TOTAL_INFLOW)?,
                outfall_concentration: out.node_concentration(period, outfall, pollutant)?,
                node_inflow: Vec::with_capacity(nodes.len()),
                node_concentration: Vec::with_capacity(nodes.len()),
            };
            for &node in &nodes {
                step.node_inflow
                    .push(out.node_flow(period, node, NODE_LATERAL_INFLOW)?);
                step.node_concentration
                    .push(out.node_concentration(period, node, pollutant)?);
            }
            steps.push(step);
        }

        let report_text = fs::read_to_string(&files.report).map_err(|e| io_error(&files.report, e))?;
        let continuity = report::parse_continuity(&report_text, request.pollutant);
        Ok(EngineOutput {
            start: out.start,
            steps,
            flow_error: continuity.flow_error,
            quality_error: continuity.quality_error,
        })
    }
}

impl SimulationEngine for SwmmCli {
    fn run(
        &mut self,
        request: &EngineRequest<'_>,
        progress: &mut dyn FnMut(f64),
    ) -> Result<EngineOutput, EngineError> {
        let files = RunFiles::new(request.network_path, request.create_report);
        let mut console = ConsoleProgress::new(request.start, request.end);
        progress(0.0);
        self.write_input(request, &files.input)?;
        let result = self
            .execute(&files, &mut console, &mut *progress)
            .and_then(|()| self.read_results(request, &files));
        files.cleanup();
        let output = result?;
        progress(100.0);
        tracing::debug!(
            periods = output.steps.len(),
            flow_error = output.flow_error,
            quality_error = output.quality_error,
            "engine run finished"
        );
        Ok(output)
    }
}
