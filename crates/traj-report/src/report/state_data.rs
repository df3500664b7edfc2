use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::{ReportError, ReportResult};
use crate::report::{AlchemicalFields, FrameSink, ReportFrame, Reporter};
use crate::schedule::{ReportTiming, StateRequirements};
use crate::snapshot::{
    temperature_from_kinetic, Simulation, StateSnapshot, AMU_PER_NM3_IN_G_PER_ML,
};

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDataOptions {
    #[serde(default)]
    pub outfname: Option<String>,
    #[serde(default = "default_interval")]
    pub report_interval: u64,
    #[serde(default, alias = "frame_indices")]
    pub frame_indices: Vec<u64>,
    /// Prefix label distinguishing report lines, e.g. `md` vs `ncmc`.
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub step: bool,
    #[serde(default)]
    pub time: bool,
    #[serde(default)]
    pub potential_energy: bool,
    #[serde(default)]
    pub kinetic_energy: bool,
    #[serde(default)]
    pub total_energy: bool,
    #[serde(default)]
    pub temperature: bool,
    #[serde(default)]
    pub volume: bool,
    #[serde(default)]
    pub density: bool,
    #[serde(default)]
    pub progress: bool,
    #[serde(default)]
    pub remaining_time: bool,
    #[serde(default)]
    pub speed: bool,
    #[serde(default)]
    pub elapsed_time: bool,
    #[serde(default = "default_separator")]
    pub separator: String,
    #[serde(default)]
    pub total_steps: Option<u64>,
    /// Override for the system mass used by the density column, in amu.
    #[serde(default)]
    pub system_mass: Option<f64>,
}

impl Default for StateDataOptions {
    fn default() -> Self {
        Self {
            outfname: None,
            report_interval: 1,
            frame_indices: Vec::new(),
            title: String::new(),
            step: false,
            time: false,
            potential_energy: false,
            kinetic_energy: false,
            total_energy: false,
            temperature: false,
            volume: false,
            density: false,
            progress: false,
            remaining_time: false,
            speed: false,
            elapsed_time: false,
            separator: default_separator(),
            total_steps: None,
            system_mass: None,
        }
    }
}

impl StateDataOptions {
    pub fn needs_energy(&self) -> bool {
        self.potential_energy || self.kinetic_energy || self.total_energy || self.temperature
    }
}

fn default_interval() -> u64 {
    1
}

fn default_separator() -> String {
    "\t".into()
}

/// Where tabular report lines go: a file of their own, or the process log
/// under the report target.
pub enum StreamTarget {
    File(File),
    Log,
}

impl StreamTarget {
    fn write_line(&mut self, line: &str) -> ReportResult<()> {
        match self {
            StreamTarget::File(file) => {
                writeln!(file, "{line}")?;
                file.flush()?;
                Ok(())
            }
            StreamTarget::Log => {
                crate::report_log!("{line}");
                Ok(())
            }
        }
    }
}

struct StartMarks {
    clock: Instant,
    time_ps: f32,
    step: u64,
}

/// Tabular state-data output: one header line on the first report, then one
/// separator-joined line per report, each prefixed with the title label.
pub struct StateDataSink {
    out: StreamTarget,
    options: StateDataOptions,
    marks: Option<StartMarks>,
    dof: usize,
    system_mass_amu: f64,
}

impl StateDataSink {
    pub fn to_file(path: &Path, options: StateDataOptions) -> ReportResult<Self> {
        let file = File::create(path)?;
        Ok(Self::with_target(StreamTarget::File(file), options))
    }

    pub fn to_log(options: StateDataOptions) -> Self {
        Self::with_target(StreamTarget::Log, options)
    }

    fn with_target(out: StreamTarget, options: StateDataOptions) -> Self {
        Self {
            out,
            options,
            marks: None,
            dof: 0,
            system_mass_amu: 0.0,
        }
    }

    fn headers(&self) -> Vec<&'static str> {
        let o = &self.options;
        let mut headers = Vec::new();
        if o.progress {
            headers.push("Progress (%)");
        }
        if o.step {
            headers.push("Step");
        }
        if o.time {
            headers.push("Time (ps)");
        }
        if o.potential_energy {
            headers.push("Potential Energy (kJ/mole)");
        }
        if o.kinetic_energy {
            headers.push("Kinetic Energy (kJ/mole)");
        }
        if o.total_energy {
            headers.push("Total Energy (kJ/mole)");
        }
        if o.temperature {
            headers.push("Temperature (K)");
        }
        if o.volume {
            headers.push("Box Volume (nm^3)");
        }
        if o.density {
            headers.push("Density (g/mL)");
        }
        if o.speed {
            headers.push("Speed (ns/day)");
        }
        if o.elapsed_time {
            headers.push("Elapsed Time (s)");
        }
        if o.remaining_time {
            headers.push("Time Remaining (s)");
        }
        headers
    }

    fn values(&self, frame: &ReportFrame, marks: &StartMarks) -> ReportResult<Vec<String>> {
        let o = &self.options;
        let mut values = Vec::new();
        let elapsed = marks.clock.elapsed().as_secs_f64();
        if o.progress {
            let total = require_total_steps(o)?;
            values.push(format!("{:.1}%", 100.0 * frame.step as f64 / total as f64));
        }
        if o.step {
            values.push(frame.step.to_string());
        }
        if o.time {
            values.push(format!("{:.4}", frame.time_ps));
        }
        if o.potential_energy {
            let pe = frame
                .potential_energy_kj_mol
                .ok_or_else(|| missing_column("potential energy"))?;
            values.push(format!("{pe:.4}"));
        }
        if o.kinetic_energy {
            let ke = frame
                .kinetic_energy_kj_mol
                .ok_or_else(|| missing_column("kinetic energy"))?;
            values.push(format!("{ke:.4}"));
        }
        if o.total_energy {
            let pe = frame
                .potential_energy_kj_mol
                .ok_or_else(|| missing_column("potential energy"))?;
            let ke = frame
                .kinetic_energy_kj_mol
                .ok_or_else(|| missing_column("kinetic energy"))?;
            values.push(format!("{:.4}", pe + ke));
        }
        if o.temperature {
            let ke = frame
                .kinetic_energy_kj_mol
                .ok_or_else(|| missing_column("kinetic energy"))?;
            values.push(format!("{:.2}", temperature_from_kinetic(ke, self.dof)?));
        }
        if o.volume {
            let volume = frame
                .box_
                .volume()
                .ok_or_else(|| missing_column("box volume"))?;
            values.push(format!("{volume:.4}"));
        }
        if o.density {
            let volume = frame
                .box_
                .volume()
                .ok_or_else(|| missing_column("box volume"))?;
            let density = self.system_mass_amu / volume * AMU_PER_NM3_IN_G_PER_ML;
            values.push(format!("{density:.4}"));
        }
        if o.speed {
            values.push(speed_ns_per_day(frame.time_ps, marks, elapsed));
        }
        if o.elapsed_time {
            values.push(format!("{elapsed:.1}"));
        }
        if o.remaining_time {
            let total = require_total_steps(o)?;
            values.push(remaining_seconds(frame.step, total, marks, elapsed));
        }
        Ok(values)
    }
}

impl FrameSink for StateDataSink {
    fn initialize(&mut self, sim: &dyn Simulation, snapshot: &StateSnapshot) -> ReportResult<()> {
        if self.options.progress || self.options.remaining_time {
            require_total_steps(&self.options)?;
        }
        self.dof = sim.degrees_of_freedom();
        self.system_mass_amu = self
            .options
            .system_mass
            .unwrap_or_else(|| sim.topology().total_mass_amu());
        self.marks = Some(StartMarks {
            clock: Instant::now(),
            time_ps: snapshot.time_ps,
            step: sim.current_step(),
        });
        let sep = self.options.separator.clone();
        let header = format!("#\"{}\"", self.headers().join(&format!("\"{sep}\"")));
        self.out.write_line(&header)
    }

    fn append(&mut self, frame: &ReportFrame) -> ReportResult<()> {
        let marks = self
            .marks
            .as_ref()
            .ok_or_else(|| ReportError::Invalid("state data sink not initialized".into()))?;
        let values = self.values(frame, marks)?;
        let line = format!(
            "{}: {}",
            self.options.title,
            values.join(&self.options.separator)
        );
        self.out.write_line(&line)
    }
}

fn require_total_steps(options: &StateDataOptions) -> ReportResult<u64> {
    options.total_steps.ok_or_else(|| {
        ReportError::Invalid(
            "progress and remaining-time columns require totalSteps to be set".into(),
        )
    })
}

fn missing_column(what: &str) -> ReportError {
    ReportError::Invalid(format!(
        "state data reporter is configured to write {what} but the frame has none"
    ))
}

fn speed_ns_per_day(time_ps: f32, marks: &StartMarks, elapsed_s: f64) -> String {
    if elapsed_s <= 0.0 {
        return "0".into();
    }
    let simulated_ns = (time_ps - marks.time_ps) as f64 / 1_000.0;
    format!("{:.3}", simulated_ns / (elapsed_s / SECONDS_PER_DAY))
}

fn remaining_seconds(step: u64, total_steps: u64, marks: &StartMarks, elapsed_s: f64) -> String {
    if step <= marks.step {
        return "--".into();
    }
    let done = (step - marks.step) as f64;
    let left = total_steps.saturating_sub(step) as f64;
    format!("{:.0}", elapsed_s * left / done)
}

/// Reporter writing tabular state data to its own file.
pub fn state_data_reporter(path: &Path, options: StateDataOptions) -> ReportResult<Reporter> {
    let sink = StateDataSink::to_file(path, options.clone())?;
    build_reporter(options, Box::new(sink))
}

/// Reporter streaming tabular state data into the process log, titled so MD
/// and NCMC phases can be told apart.
pub fn stream_reporter(options: StateDataOptions) -> ReportResult<Reporter> {
    let sink = StateDataSink::to_log(options.clone());
    build_reporter(options, Box::new(sink))
}

fn build_reporter(options: StateDataOptions, sink: Box<dyn FrameSink>) -> ReportResult<Reporter> {
    let timing = ReportTiming::from_options(options.report_interval, &options.frame_indices)?;
    let wants = StateRequirements {
        positions: false,
        velocities: false,
        forces: false,
        energy: options.needs_energy(),
    };
    Ok(Reporter::new(
        timing,
        wants,
        AlchemicalFields::default(),
        sink,
    ))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressOptions {
    #[serde(default)]
    pub outfname: Option<String>,
    #[serde(default = "default_progress_interval")]
    pub report_interval: u64,
    #[serde(default, alias = "frame_indices")]
    pub frame_indices: Vec<u64>,
    pub total_steps: u64,
}

fn default_progress_interval() -> u64 {
    500
}

/// Single-file progress summary, rewritten in place on every report so the
/// file always shows the latest estimate.
pub struct ProgressSink {
    path: PathBuf,
    total_steps: u64,
    marks: Option<StartMarks>,
}

impl ProgressSink {
    pub fn new(path: &Path, total_steps: u64) -> Self {
        Self {
            path: path.to_path_buf(),
            total_steps,
            marks: None,
        }
    }
}

impl FrameSink for ProgressSink {
    fn initialize(&mut self, sim: &dyn Simulation, snapshot: &StateSnapshot) -> ReportResult<()> {
        if self.total_steps == 0 {
            return Err(ReportError::Invalid(
                "progress reporter requires totalSteps >= 1".into(),
            ));
        }
        self.marks = Some(StartMarks {
            clock: Instant::now(),
            time_ps: snapshot.time_ps,
            step: sim.current_step(),
        });
        Ok(())
    }

    fn append(&mut self, frame: &ReportFrame) -> ReportResult<()> {
        let marks = self
            .marks
            .as_ref()
            .ok_or_else(|| ReportError::Invalid("progress sink not initialized".into()))?;
        let elapsed = marks.clock.elapsed().as_secs_f64();
        let percent = 100.0 * frame.step as f64 / self.total_steps as f64;
        let mut file = File::create(&self.path)?;
        writeln!(file, "Total steps: {}", self.total_steps)?;
        writeln!(file, "Completed: {} ({percent:.1}%)", frame.step)?;
        writeln!(
            file,
            "Remaining: {}",
            self.total_steps.saturating_sub(frame.step)
        )?;
        writeln!(
            file,
            "Estimated time remaining: {} s",
            remaining_seconds(frame.step, self.total_steps, marks, elapsed)
        )?;
        writeln!(
            file,
            "Speed: {} ns/day",
            speed_ns_per_day(frame.time_ps, marks, elapsed)
        )?;
        writeln!(file, "Elapsed wall time: {elapsed:.1} s")?;
        file.flush()?;
        Ok(())
    }
}

/// Reporter maintaining a `.prog` progress file.
pub fn progress_reporter(path: &Path, options: ProgressOptions) -> ReportResult<Reporter> {
    let timing = ReportTiming::from_options(options.report_interval, &options.frame_indices)?;
    let sink = ProgressSink::new(path, options.total_steps);
    Ok(Reporter::new(
        timing,
        StateRequirements::default(),
        AlchemicalFields::default(),
        Box::new(sink),
    ))
}
