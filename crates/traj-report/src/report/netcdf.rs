use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ReportError, ReportResult};
use crate::report::{AlchemicalFields, FrameSink, ReportFrame, Reporter};
use crate::schedule::{ReportTiming, StateRequirements};
use crate::snapshot::{Simulation, StateSnapshot, ANGSTROM_PER_NM, KCAL_PER_KJ};

/// Everything the backend needs to create a new trajectory file. Assembled
/// on the first append, once the atom count is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetcdfSpec {
    pub path: String,
    pub n_atoms: usize,
    pub uses_pbc: bool,
    pub coordinates: bool,
    pub velocities: bool,
    pub forces: bool,
    pub protocol_work: bool,
    pub alchemical_lambda: bool,
    pub title: String,
}

/// NetCDF trajectory collaborator. Units at this boundary are Amber
/// conventions: angstrom, angstrom/ps, kcal/mol/angstrom, degrees, ps.
pub trait NetcdfFile {
    fn add_cell_lengths_angles(
        &mut self,
        lengths_a: [f32; 3],
        angles_deg: [f32; 3],
    ) -> ReportResult<()>;
    fn add_coordinates(&mut self, coords_a: &[[f32; 3]]) -> ReportResult<()>;
    fn add_velocities(&mut self, vels_a_ps: &[[f32; 3]]) -> ReportResult<()>;
    fn add_forces(&mut self, forces_kcal_mol_a: &[[f32; 3]]) -> ReportResult<()>;
    fn add_protocol_work(&mut self, work: f64) -> ReportResult<()>;
    fn add_alchemical_lambda(&mut self, lambda: f64) -> ReportResult<()>;
    fn add_time(&mut self, time_ps: f32) -> ReportResult<()>;
}

/// Factory the hosting application supplies for creating trajectory files.
pub trait OpenNetcdf: Send + Sync {
    fn open_new(&self, spec: &NetcdfSpec) -> ReportResult<Box<dyn NetcdfFile>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetcdfOptions {
    #[serde(default)]
    pub outfname: Option<String>,
    #[serde(default = "default_interval")]
    pub report_interval: u64,
    #[serde(default, alias = "frame_indices")]
    pub frame_indices: Vec<u64>,
    #[serde(default = "default_true")]
    pub crds: bool,
    #[serde(default)]
    pub vels: bool,
    #[serde(default)]
    pub frcs: bool,
    #[serde(default)]
    pub protocol_work: bool,
    #[serde(default)]
    pub alchemical_lambda: bool,
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for NetcdfOptions {
    fn default() -> Self {
        Self {
            outfname: None,
            report_interval: 1,
            frame_indices: Vec::new(),
            crds: true,
            vels: false,
            frcs: false,
            protocol_work: false,
            alchemical_lambda: false,
            title: default_title(),
        }
    }
}

fn default_interval() -> u64 {
    1
}

fn default_true() -> bool {
    true
}

fn default_title() -> String {
    "NCMC trajectory".into()
}

pub struct NetcdfSink {
    path: String,
    options: NetcdfOptions,
    opener: Arc<dyn OpenNetcdf>,
    uses_pbc: bool,
    file: Option<Box<dyn NetcdfFile>>,
}

impl NetcdfSink {
    pub fn new(path: String, options: NetcdfOptions, opener: Arc<dyn OpenNetcdf>) -> Self {
        Self {
            path,
            options,
            opener,
            uses_pbc: false,
            file: None,
        }
    }

    fn open_spec(&self, n_atoms: usize) -> NetcdfSpec {
        NetcdfSpec {
            path: self.path.clone(),
            n_atoms,
            uses_pbc: self.uses_pbc,
            coordinates: self.options.crds,
            velocities: self.options.vels,
            forces: self.options.frcs,
            protocol_work: self.options.protocol_work,
            alchemical_lambda: self.options.alchemical_lambda,
            title: self.options.title.clone(),
        }
    }
}

impl FrameSink for NetcdfSink {
    fn initialize(&mut self, sim: &dyn Simulation, _snapshot: &StateSnapshot) -> ReportResult<()> {
        // Cell handling is decided once, from the topology's declared unit
        // cell, and stays fixed for this sink's lifetime.
        self.uses_pbc = sim.topology().unit_cell_nm.is_some();
        Ok(())
    }

    fn append(&mut self, frame: &ReportFrame) -> ReportResult<()> {
        let crds = self
            .options
            .crds
            .then(|| frame.coords_nm.as_ref())
            .flatten();
        let vels = self
            .options
            .vels
            .then(|| frame.velocities_nm_ps.as_ref())
            .flatten();
        let frcs = self
            .options
            .frcs
            .then(|| frame.forces_kj_mol_nm.as_ref())
            .flatten();

        if self.file.is_none() {
            // First frame: the file is created only now, with the atom count
            // taken from whichever payload is enabled.
            let n_atoms = crds
                .map(|v| v.len())
                .or_else(|| vels.map(|v| v.len()))
                .or_else(|| frcs.map(|v| v.len()))
                .ok_or_else(|| {
                    ReportError::Invalid(
                        "netcdf reporter has no coordinates, velocities or forces to size the file from"
                            .into(),
                    )
                })?;
            let spec = self.open_spec(n_atoms);
            self.file = Some(self.opener.open_new(&spec)?);
        }
        let file = self.file.as_mut().ok_or_else(|| {
            ReportError::Backend("netcdf trajectory file unavailable after open".into())
        })?;

        if self.uses_pbc {
            let (lengths, angles) = frame.box_.lengths_and_angles()?;
            let lengths_a = [
                lengths[0] * ANGSTROM_PER_NM,
                lengths[1] * ANGSTROM_PER_NM,
                lengths[2] * ANGSTROM_PER_NM,
            ];
            file.add_cell_lengths_angles(lengths_a, angles)?;
        }
        if let Some(crds) = crds {
            file.add_coordinates(&to_angstrom(crds))?;
        }
        if let Some(vels) = vels {
            file.add_velocities(&to_angstrom(vels))?;
        }
        if let Some(frcs) = frcs {
            file.add_forces(&to_kcal_per_angstrom(frcs))?;
        }
        if let Some(work) = frame.protocol_work {
            file.add_protocol_work(work)?;
        }
        if let Some(lambda) = frame.alchemical_lambda {
            file.add_alchemical_lambda(lambda)?;
        }
        file.add_time(frame.time_ps)
    }
}

fn to_angstrom(values: &[[f32; 3]]) -> Vec<[f32; 3]> {
    values
        .iter()
        .map(|v| {
            [
                v[0] * ANGSTROM_PER_NM,
                v[1] * ANGSTROM_PER_NM,
                v[2] * ANGSTROM_PER_NM,
            ]
        })
        .collect()
}

fn to_kcal_per_angstrom(values: &[[f32; 3]]) -> Vec<[f32; 3]> {
    let scale = (KCAL_PER_KJ as f32) / ANGSTROM_PER_NM;
    values
        .iter()
        .map(|v| [v[0] * scale, v[1] * scale, v[2] * scale])
        .collect()
}

/// Reporter appending to a lazily created NetCDF trajectory.
pub fn netcdf_reporter(
    path: String,
    options: NetcdfOptions,
    opener: Arc<dyn OpenNetcdf>,
) -> ReportResult<Reporter> {
    let timing = ReportTiming::from_options(options.report_interval, &options.frame_indices)?;
    let wants = StateRequirements {
        positions: options.crds,
        velocities: options.vels,
        forces: options.frcs,
        energy: false,
    };
    let alchemical = AlchemicalFields {
        protocol_work: options.protocol_work,
        alchemical_lambda: options.alchemical_lambda,
    };
    Ok(Reporter::new(
        timing,
        wants,
        alchemical,
        Box::new(NetcdfSink::new(path, options, opener)),
    ))
}
