#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod logging;
pub mod report;
pub mod resources;
pub mod schedule;
pub mod snapshot;
pub mod topology;

pub use config::{
    NetcdfOptions, ProgressOptions, ReporterConfig, ReporterOptions, ReporterSet, RestartOptions,
    StateDataOptions, StreamOptions,
};
pub use error::{ReportError, ReportResult};
pub use logging::{init_logging, REPORT_TARGET};
pub use report::hdf5::{hdf5_reporter, Hdf5File, Hdf5Options, Hdf5Record, LengthUnit};
pub use report::netcdf::{netcdf_reporter, NetcdfFile, NetcdfSpec, OpenNetcdf};
pub use report::restart::{restart_reporter, RestartData, Rst7File};
pub use report::state_data::{progress_reporter, state_data_reporter, stream_reporter};
pub use report::{AlchemicalFields, FileMode, FrameSink, ReportFrame, Reporter};
pub use resources::data_filename;
pub use schedule::{FrameIndexSet, NextReport, ReportRequest, ReportTiming, StateRequirements};
pub use snapshot::{Box3, Simulation, StateSnapshot};
pub use topology::{atom_indices_from_top, Topology, TopologyAtom};
