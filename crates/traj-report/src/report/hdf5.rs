use serde::{Deserialize, Serialize};

use crate::error::{ReportError, ReportResult};
use crate::report::{AlchemicalFields, FrameSink, ReportFrame, Reporter};
use crate::schedule::{ReportTiming, StateRequirements};
use crate::snapshot::{temperature_from_kinetic, Simulation, StateSnapshot, ANGSTROM_PER_NM};

/// Distance unit the backing file declares; coordinates, cell lengths and
/// velocities are converted to it before writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnit {
    Nanometer,
    Angstrom,
}

impl LengthUnit {
    fn per_nm(self) -> f32 {
        match self {
            LengthUnit::Nanometer => 1.0,
            LengthUnit::Angstrom => ANGSTROM_PER_NM,
        }
    }
}

/// HDF5-backed trajectory file collaborator. The binary encoding is the
/// host's business; reporters only append records and flush.
pub trait Hdf5File {
    fn distance_unit(&self) -> LengthUnit;
    fn set_title(&mut self, title: &str) -> ReportResult<()>;
    fn write(&mut self, record: &Hdf5Record) -> ReportResult<()>;
    fn flush(&mut self) -> ReportResult<()>;
}

/// One appended record, already converted to the file's declared units.
#[derive(Debug, Clone, Default)]
pub struct Hdf5Record {
    pub coordinates: Option<Vec<[f32; 3]>>,
    pub time_ps: Option<f32>,
    pub cell_lengths: Option<[f32; 3]>,
    pub cell_angles: Option<[f32; 3]>,
    pub potential_energy_kj_mol: Option<f64>,
    pub kinetic_energy_kj_mol: Option<f64>,
    pub temperature_k: Option<f64>,
    pub velocities: Option<Vec<[f32; 3]>>,
    pub protocol_work: Option<f64>,
    pub alchemical_lambda: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hdf5Options {
    #[serde(default = "default_interval")]
    pub report_interval: u64,
    #[serde(default, alias = "frame_indices")]
    pub frame_indices: Vec<u64>,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_true")]
    pub coordinates: bool,
    #[serde(default)]
    pub time: bool,
    #[serde(default = "default_true")]
    pub cell: bool,
    #[serde(default)]
    pub potential_energy: bool,
    #[serde(default)]
    pub kinetic_energy: bool,
    #[serde(default)]
    pub temperature: bool,
    #[serde(default)]
    pub velocities: bool,
    #[serde(default = "default_true")]
    pub protocol_work: bool,
    #[serde(default = "default_true")]
    pub alchemical_lambda: bool,
}

impl Default for Hdf5Options {
    fn default() -> Self {
        Self {
            report_interval: 1,
            frame_indices: Vec::new(),
            title: default_title(),
            coordinates: true,
            time: false,
            cell: true,
            potential_energy: false,
            kinetic_energy: false,
            temperature: false,
            velocities: false,
            protocol_work: true,
            alchemical_lambda: true,
        }
    }
}

fn default_interval() -> u64 {
    1
}

fn default_title() -> String {
    "NCMC Trajectory".into()
}

fn default_true() -> bool {
    true
}

pub struct Hdf5Sink {
    file: Box<dyn Hdf5File>,
    options: Hdf5Options,
    dof: usize,
}

impl Hdf5Sink {
    pub fn new(file: Box<dyn Hdf5File>, options: Hdf5Options) -> Self {
        Self {
            file,
            options,
            dof: 0,
        }
    }
}

impl FrameSink for Hdf5Sink {
    fn initialize(&mut self, sim: &dyn Simulation, _snapshot: &StateSnapshot) -> ReportResult<()> {
        self.dof = sim.degrees_of_freedom();
        self.file.set_title(&self.options.title)
    }

    fn append(&mut self, frame: &ReportFrame) -> ReportResult<()> {
        let scale = self.file.distance_unit().per_nm();
        let mut record = Hdf5Record::default();
        if self.options.coordinates {
            let coords = frame
                .coords_nm
                .as_ref()
                .ok_or_else(|| missing("coordinates"))?;
            record.coordinates = Some(scaled(coords, scale));
        }
        if self.options.time {
            record.time_ps = Some(frame.time_ps);
        }
        if self.options.cell {
            let (lengths, angles) = frame.box_.lengths_and_angles()?;
            record.cell_lengths = Some([
                lengths[0] * scale,
                lengths[1] * scale,
                lengths[2] * scale,
            ]);
            record.cell_angles = Some(angles);
        }
        if self.options.potential_energy {
            record.potential_energy_kj_mol = Some(
                frame
                    .potential_energy_kj_mol
                    .ok_or_else(|| missing("potential energy"))?,
            );
        }
        if self.options.kinetic_energy {
            record.kinetic_energy_kj_mol = Some(
                frame
                    .kinetic_energy_kj_mol
                    .ok_or_else(|| missing("kinetic energy"))?,
            );
        }
        if self.options.temperature {
            let kinetic = frame
                .kinetic_energy_kj_mol
                .ok_or_else(|| missing("kinetic energy for temperature"))?;
            record.temperature_k = Some(temperature_from_kinetic(kinetic, self.dof)?);
        }
        if self.options.velocities {
            let vels = frame
                .velocities_nm_ps
                .as_ref()
                .ok_or_else(|| missing("velocities"))?;
            record.velocities = Some(scaled(vels, scale));
        }
        record.protocol_work = frame.protocol_work;
        record.alchemical_lambda = frame.alchemical_lambda;

        self.file.write(&record)?;
        // Flush every record. A long NCMC run that fills the disk should
        // lose at most one frame, not the whole trajectory.
        self.file.flush()
    }
}

fn scaled(values: &[[f32; 3]], scale: f32) -> Vec<[f32; 3]> {
    values
        .iter()
        .map(|v| [v[0] * scale, v[1] * scale, v[2] * scale])
        .collect()
}

fn missing(what: &str) -> ReportError {
    ReportError::Invalid(format!(
        "hdf5 reporter is configured to write {what} but the frame has none"
    ))
}

/// Reporter wrapping an HDF5 trajectory collaborator.
pub fn hdf5_reporter(file: Box<dyn Hdf5File>, options: Hdf5Options) -> ReportResult<Reporter> {
    let timing = ReportTiming::from_options(options.report_interval, &options.frame_indices)?;
    let wants = StateRequirements {
        positions: options.coordinates,
        velocities: options.velocities,
        forces: false,
        energy: options.potential_energy || options.kinetic_energy || options.temperature,
    };
    let alchemical = AlchemicalFields {
        protocol_work: options.protocol_work,
        alchemical_lambda: options.alchemical_lambda,
    };
    Ok(Reporter::new(
        timing,
        wants,
        alchemical,
        Box::new(Hdf5Sink::new(file, options)),
    ))
}
