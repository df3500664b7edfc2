#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use traj_report::{
    Box3, Hdf5File, Hdf5Record, LengthUnit, NetcdfFile, NetcdfSpec, OpenNetcdf, ReportResult,
    Simulation, StateSnapshot, Topology, TopologyAtom,
};

pub fn temp_path(label: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let label_path = Path::new(label);
    let stem = label_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(label);
    path.push(format!(
        "traj_report_test_{stem}_{}_{}",
        std::process::id(),
        nanos
    ));
    path
}

pub struct TestSim {
    pub step: u64,
    pub topology: Topology,
    pub dof: usize,
    pub work: f64,
    pub lambda: Option<f64>,
}

impl TestSim {
    pub fn new(step: u64, periodic: bool) -> Self {
        Self {
            step,
            topology: test_topology(periodic),
            dof: 6,
            work: 1.25,
            lambda: Some(0.5),
        }
    }
}

impl Simulation for TestSim {
    fn current_step(&self) -> u64 {
        self.step
    }

    fn topology(&self) -> &Topology {
        &self.topology
    }

    fn degrees_of_freedom(&self) -> usize {
        self.dof
    }

    fn protocol_work(&self) -> f64 {
        self.work
    }

    fn global_variable(&self, name: &str) -> Option<f64> {
        if name == "lambda" {
            self.lambda
        } else {
            None
        }
    }
}

pub fn test_topology(periodic: bool) -> Topology {
    let atom = |name: &str, resname: &str, resid: i32| TopologyAtom {
        name: name.into(),
        element: name.chars().next().unwrap().to_string(),
        resname: resname.into(),
        resid,
        mass_amu: 12.0,
    };
    Topology {
        atoms: vec![
            atom("C1", "LIG", 1),
            atom("C2", "LIG", 1),
            atom("O1", "HOH", 2),
        ],
        unit_cell_nm: periodic.then_some([2.0, 2.0, 2.0]),
    }
}

pub fn test_snapshot(time_ps: f32, periodic: bool) -> StateSnapshot {
    StateSnapshot {
        time_ps,
        coords_nm: Some(vec![
            [0.1, 0.2, 0.3],
            [0.4, 0.5, 0.6],
            [0.7, 0.8, 0.9],
        ]),
        velocities_nm_ps: Some(vec![
            [0.01, 0.02, 0.03],
            [0.04, 0.05, 0.06],
            [0.07, 0.08, 0.09],
        ]),
        forces_kj_mol_nm: Some(vec![
            [10.0, 20.0, 30.0],
            [40.0, 50.0, 60.0],
            [70.0, 80.0, 90.0],
        ]),
        box_: if periodic {
            Box3::Orthorhombic {
                lx: 2.0,
                ly: 2.0,
                lz: 2.0,
            }
        } else {
            Box3::None
        },
        potential_energy_kj_mol: Some(-500.0),
        kinetic_energy_kj_mol: Some(30.0),
    }
}

pub struct RecordingNetcdf {
    ops: Arc<Mutex<Vec<String>>>,
}

impl NetcdfFile for RecordingNetcdf {
    fn add_cell_lengths_angles(
        &mut self,
        lengths_a: [f32; 3],
        _angles_deg: [f32; 3],
    ) -> ReportResult<()> {
        self.ops
            .lock()
            .unwrap()
            .push(format!("cell:{:.1}", lengths_a[0]));
        Ok(())
    }

    fn add_coordinates(&mut self, coords_a: &[[f32; 3]]) -> ReportResult<()> {
        self.ops
            .lock()
            .unwrap()
            .push(format!("coords:{}:{:.1}", coords_a.len(), coords_a[0][0]));
        Ok(())
    }

    fn add_velocities(&mut self, vels_a_ps: &[[f32; 3]]) -> ReportResult<()> {
        self.ops
            .lock()
            .unwrap()
            .push(format!("vels:{}", vels_a_ps.len()));
        Ok(())
    }

    fn add_forces(&mut self, forces_kcal_mol_a: &[[f32; 3]]) -> ReportResult<()> {
        self.ops
            .lock()
            .unwrap()
            .push(format!("frcs:{}", forces_kcal_mol_a.len()));
        Ok(())
    }

    fn add_protocol_work(&mut self, work: f64) -> ReportResult<()> {
        self.ops.lock().unwrap().push(format!("work:{work:.2}"));
        Ok(())
    }

    fn add_alchemical_lambda(&mut self, lambda: f64) -> ReportResult<()> {
        self.ops.lock().unwrap().push(format!("lambda:{lambda:.2}"));
        Ok(())
    }

    fn add_time(&mut self, time_ps: f32) -> ReportResult<()> {
        self.ops.lock().unwrap().push(format!("time:{time_ps:.1}"));
        Ok(())
    }
}

/// NetCDF factory that counts opens and records every backend call.
#[derive(Clone, Default)]
pub struct CountingOpener {
    pub opens: Arc<AtomicUsize>,
    pub specs: Arc<Mutex<Vec<NetcdfSpec>>>,
    pub ops: Arc<Mutex<Vec<String>>>,
}

impl CountingOpener {
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn recorded_ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    pub fn recorded_specs(&self) -> Vec<NetcdfSpec> {
        self.specs.lock().unwrap().clone()
    }
}

impl OpenNetcdf for CountingOpener {
    fn open_new(&self, spec: &NetcdfSpec) -> ReportResult<Box<dyn NetcdfFile>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.specs.lock().unwrap().push(spec.clone());
        Ok(Box::new(RecordingNetcdf {
            ops: self.ops.clone(),
        }))
    }
}

/// HDF5 collaborator that keeps every written record in memory.
#[derive(Clone)]
pub struct RecordingHdf5 {
    pub unit: LengthUnit,
    pub title: Arc<Mutex<Vec<String>>>,
    pub records: Arc<Mutex<Vec<Hdf5Record>>>,
    pub flushes: Arc<AtomicUsize>,
}

impl RecordingHdf5 {
    pub fn new(unit: LengthUnit) -> Self {
        Self {
            unit,
            title: Arc::new(Mutex::new(Vec::new())),
            records: Arc::new(Mutex::new(Vec::new())),
            flushes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn written(&self) -> Vec<Hdf5Record> {
        self.records.lock().unwrap().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.title.lock().unwrap().clone()
    }
}

impl Hdf5File for RecordingHdf5 {
    fn distance_unit(&self) -> LengthUnit {
        self.unit
    }

    fn set_title(&mut self, title: &str) -> ReportResult<()> {
        self.title.lock().unwrap().push(title.to_string());
        Ok(())
    }

    fn write(&mut self, record: &Hdf5Record) -> ReportResult<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> ReportResult<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
