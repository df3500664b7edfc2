use std::fmt;

use crate::error::{ReportError, ReportResult};
use crate::schedule::{ReportRequest, ReportTiming, StateRequirements};
use crate::snapshot::{Box3, Simulation, StateSnapshot, LAMBDA_VARIABLE};

pub mod hdf5;
pub mod netcdf;
pub mod restart;
pub mod state_data;

/// Mode a report-owned file handle was opened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Read,
    Write,
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileMode::Read => write!(f, "r"),
            FileMode::Write => write!(f, "w"),
        }
    }
}

pub(crate) fn check_mode(mode: FileMode, required: FileMode) -> ReportResult<()> {
    if mode != required {
        return Err(ReportError::WrongMode { required });
    }
    Ok(())
}

/// Alchemical side-channel fields read from the NCMC integrator rather than
/// from the state snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlchemicalFields {
    pub protocol_work: bool,
    pub alchemical_lambda: bool,
}

/// One report's worth of data, assembled from the driver and snapshot
/// according to the reporter's requirements. Fields the reporter did not ask
/// for stay `None`.
#[derive(Debug, Clone, Default)]
pub struct ReportFrame {
    pub step: u64,
    pub time_ps: f32,
    pub coords_nm: Option<Vec<[f32; 3]>>,
    pub velocities_nm_ps: Option<Vec<[f32; 3]>>,
    pub forces_kj_mol_nm: Option<Vec<[f32; 3]>>,
    pub box_: Box3,
    pub potential_energy_kj_mol: Option<f64>,
    pub kinetic_energy_kj_mol: Option<f64>,
    pub protocol_work: Option<f64>,
    pub alchemical_lambda: Option<f64>,
}

/// Output destination for assembled report frames. One sink per output kind;
/// the surrounding `Reporter` owns the shared scheduling and initialization
/// state machine.
pub trait FrameSink {
    /// One-time setup, called exactly once, on the first report.
    fn initialize(&mut self, sim: &dyn Simulation, snapshot: &StateSnapshot) -> ReportResult<()>;

    /// Append one frame. Sinks that promise durability flush before
    /// returning.
    fn append(&mut self, frame: &ReportFrame) -> ReportResult<()>;
}

/// A scheduled output channel: cadence, required engine state, and the sink
/// the frames go to.
///
/// The lifecycle is two states, Uninitialized then Initialized, transitioning
/// on the first `report` call and never going back.
pub struct Reporter {
    timing: ReportTiming,
    wants: StateRequirements,
    alchemical: AlchemicalFields,
    sink: Box<dyn FrameSink>,
    initialized: bool,
}

impl Reporter {
    pub fn new(
        timing: ReportTiming,
        wants: StateRequirements,
        alchemical: AlchemicalFields,
        sink: Box<dyn FrameSink>,
    ) -> Self {
        Self {
            timing,
            wants,
            alchemical,
            sink,
            initialized: false,
        }
    }

    pub fn timing(&self) -> &ReportTiming {
        &self.timing
    }

    pub fn wants(&self) -> StateRequirements {
        self.wants
    }

    /// When this reporter next fires and what state it needs then. The flag
    /// set is fixed at construction; only the step count varies.
    pub fn describe_next_report(&self, current_step: u64) -> ReportRequest {
        ReportRequest {
            next: self.timing.next_report(current_step),
            wants: self.wants,
        }
    }

    /// Generate one report. The first call initializes the sink before the
    /// frame is processed.
    pub fn report(&mut self, sim: &dyn Simulation, snapshot: &StateSnapshot) -> ReportResult<()> {
        if !self.initialized {
            self.sink.initialize(sim, snapshot)?;
            self.initialized = true;
        }
        let frame = self.assemble(sim, snapshot)?;
        self.sink.append(&frame)
    }

    fn assemble(&self, sim: &dyn Simulation, snapshot: &StateSnapshot) -> ReportResult<ReportFrame> {
        let mut frame = ReportFrame {
            step: sim.current_step(),
            time_ps: snapshot.time_ps,
            box_: snapshot.box_,
            ..ReportFrame::default()
        };
        if self.wants.positions {
            frame.coords_nm = Some(require(&snapshot.coords_nm, "positions")?.clone());
        }
        if self.wants.velocities {
            frame.velocities_nm_ps = Some(require(&snapshot.velocities_nm_ps, "velocities")?.clone());
        }
        if self.wants.forces {
            frame.forces_kj_mol_nm = Some(require(&snapshot.forces_kj_mol_nm, "forces")?.clone());
        }
        if self.wants.energy {
            frame.potential_energy_kj_mol = snapshot.potential_energy_kj_mol;
            frame.kinetic_energy_kj_mol = snapshot.kinetic_energy_kj_mol;
        }
        if self.alchemical.protocol_work {
            frame.protocol_work = Some(sim.protocol_work());
        }
        if self.alchemical.alchemical_lambda {
            let lambda = sim.global_variable(LAMBDA_VARIABLE).ok_or_else(|| {
                ReportError::Invalid(format!(
                    "integrator does not define global variable \"{LAMBDA_VARIABLE}\""
                ))
            })?;
            frame.alchemical_lambda = Some(lambda);
        }
        Ok(frame)
    }
}

fn require<'a, T>(field: &'a Option<T>, name: &str) -> ReportResult<&'a T> {
    field.as_ref().ok_or_else(|| {
        ReportError::Invalid(format!("reporter requires {name} but the snapshot has none"))
    })
}
