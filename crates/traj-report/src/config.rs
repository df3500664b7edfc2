use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ReportError, ReportResult};
use crate::report::netcdf::{netcdf_reporter, OpenNetcdf};
use crate::report::restart::restart_reporter;
use crate::report::state_data::{progress_reporter, state_data_reporter, stream_reporter};
use crate::report::Reporter;

pub use crate::report::netcdf::NetcdfOptions;
pub use crate::report::restart::RestartOptions;
pub use crate::report::state_data::{ProgressOptions, StateDataOptions};

/// Options for the log-stream reporter: the same tabular column surface as
/// the file-backed state reporter.
pub type StreamOptions = StateDataOptions;

/// Declarative reporter configuration: one optional options record per
/// recognized kind. Unknown keys in the source mapping are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReporterOptions {
    #[serde(default)]
    pub state: Option<StateDataOptions>,
    #[serde(default)]
    pub traj_netcdf: Option<NetcdfOptions>,
    #[serde(default)]
    pub restart: Option<RestartOptions>,
    #[serde(default)]
    pub progress: Option<ProgressOptions>,
    #[serde(default)]
    pub stream: Option<StreamOptions>,
}

/// Result of reporter construction. The trajectory interval, when a NetCDF
/// reporter was configured, is surfaced here explicitly so callers can
/// convert between report index and simulation time without poking at
/// builder internals.
pub struct ReporterSet {
    pub reporters: Vec<Reporter>,
    pub trajectory_interval: Option<u64>,
}

impl ReporterSet {
    pub fn time_per_frame_ps(&self, timestep_ps: f64) -> Option<f64> {
        self.trajectory_interval
            .map(|interval| interval as f64 * timestep_ps)
    }
}

/// Translates a reporter configuration into constructed reporters.
///
/// Output paths resolve per kind: the kind's own `outfname` when given,
/// otherwise the top-level prefix, plus a fixed suffix (`.ene`, `.nc`,
/// `.rst7`, `.prog`; the stream kind has no file). The returned order is the
/// fixed check order state, traj_netcdf, restart, progress, stream,
/// regardless of how the source mapping was keyed.
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    outfname: String,
    options: ReporterOptions,
}

impl ReporterConfig {
    pub fn new(outfname: impl Into<String>, options: ReporterOptions) -> Self {
        Self {
            outfname: outfname.into(),
            options,
        }
    }

    /// Build from a loose JSON-shaped mapping, as hosts holding parsed
    /// YAML/JSON configs have it. Unknown reporter kinds are dropped
    /// silently.
    pub fn from_value(
        outfname: impl Into<String>,
        value: serde_json::Value,
    ) -> ReportResult<Self> {
        let options: ReporterOptions = serde_json::from_value(value)
            .map_err(|err| ReportError::Invalid(format!("bad reporter config: {err}")))?;
        Ok(Self::new(outfname, options))
    }

    pub fn options(&self) -> &ReporterOptions {
        &self.options
    }

    fn resolve(&self, override_: &Option<String>, suffix: &str) -> String {
        let base = override_.as_deref().unwrap_or(&self.outfname);
        format!("{base}{suffix}")
    }

    /// Construct every configured reporter. The NetCDF backend factory is
    /// injected; it is only consulted when a `traj_netcdf` section is
    /// present.
    pub fn make_reporters(&self, netcdf_open: Arc<dyn OpenNetcdf>) -> ReportResult<ReporterSet> {
        let mut reporters = Vec::new();
        let mut trajectory_interval = None;

        if let Some(opts) = &self.options.state {
            let path = self.resolve(&opts.outfname, ".ene");
            reporters.push(state_data_reporter(Path::new(&path), opts.clone())?);
        }
        if let Some(opts) = &self.options.traj_netcdf {
            let path = self.resolve(&opts.outfname, ".nc");
            trajectory_interval = Some(opts.report_interval);
            reporters.push(netcdf_reporter(path, opts.clone(), netcdf_open)?);
        }
        if let Some(opts) = &self.options.restart {
            let path = self.resolve(&opts.outfname, ".rst7");
            reporters.push(restart_reporter(Path::new(&path), opts.clone())?);
        }
        if let Some(opts) = &self.options.progress {
            let path = self.resolve(&opts.outfname, ".prog");
            reporters.push(progress_reporter(Path::new(&path), opts.clone())?);
        }
        if let Some(opts) = &self.options.stream {
            reporters.push(stream_reporter(opts.clone())?);
        }

        Ok(ReporterSet {
            reporters,
            trajectory_interval,
        })
    }
}
