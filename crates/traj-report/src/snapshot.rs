use crate::error::{ReportError, ReportResult};
use crate::topology::Topology;

pub const ANGSTROM_PER_NM: f32 = 10.0;
pub const KCAL_PER_KJ: f64 = 1.0 / 4.184;
/// Molar gas constant in kJ/(mol K).
pub const GAS_CONSTANT_KJ_PER_MOL_K: f64 = 8.314_462_618_153_24e-3;
/// 1 amu / nm^3 expressed in g/mL.
pub const AMU_PER_NM3_IN_G_PER_ML: f64 = 1.660_539_066_60e-3;

/// Periodic cell of the reported frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Box3 {
    None,
    Orthorhombic { lx: f32, ly: f32, lz: f32 },
    Triclinic { m: [f32; 9] },
}

impl Default for Box3 {
    fn default() -> Self {
        Box3::None
    }
}

impl Box3 {
    pub fn is_periodic(&self) -> bool {
        !matches!(self, Box3::None)
    }

    /// Cell lengths and angles, lengths in the box's own length unit and
    /// angles in degrees.
    pub fn lengths_and_angles(&self) -> ReportResult<([f32; 3], [f32; 3])> {
        match *self {
            Box3::None => Err(ReportError::Invalid(
                "cell output requested for a non-periodic frame".into(),
            )),
            Box3::Orthorhombic { lx, ly, lz } => Ok(([lx, ly, lz], [90.0, 90.0, 90.0])),
            Box3::Triclinic { m } => {
                let a = [m[0], m[1], m[2]];
                let b = [m[3], m[4], m[5]];
                let c = [m[6], m[7], m[8]];
                let la = norm(a);
                let lb = norm(b);
                let lc = norm(c);
                if la == 0.0 || lb == 0.0 || lc == 0.0 {
                    return Err(ReportError::Invalid(
                        "triclinic cell has a zero-length vector".into(),
                    ));
                }
                let alpha = angle_deg(b, c, lb, lc);
                let beta = angle_deg(a, c, la, lc);
                let gamma = angle_deg(a, b, la, lb);
                Ok(([la, lb, lc], [alpha, beta, gamma]))
            }
        }
    }

    /// Cell volume in the cube of the box's length unit.
    pub fn volume(&self) -> Option<f64> {
        match *self {
            Box3::None => None,
            Box3::Orthorhombic { lx, ly, lz } => Some(lx as f64 * ly as f64 * lz as f64),
            Box3::Triclinic { m } => {
                let a = [m[0] as f64, m[1] as f64, m[2] as f64];
                let b = [m[3] as f64, m[4] as f64, m[5] as f64];
                let c = [m[6] as f64, m[7] as f64, m[8] as f64];
                let cross = [
                    b[1] * c[2] - b[2] * c[1],
                    b[2] * c[0] - b[0] * c[2],
                    b[0] * c[1] - b[1] * c[0],
                ];
                Some((a[0] * cross[0] + a[1] * cross[1] + a[2] * cross[2]).abs())
            }
        }
    }
}

fn norm(v: [f32; 3]) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

fn angle_deg(u: [f32; 3], v: [f32; 3], lu: f32, lv: f32) -> f32 {
    let dot = u[0] * v[0] + u[1] * v[1] + u[2] * v[2];
    let cos = (dot / (lu * lv)).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

/// Engine-owned state handed to reporters on demand. Reporters read and
/// serialize it; they never own or mutate it. Fields the driver was not
/// asked for are `None`.
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    pub time_ps: f32,
    pub coords_nm: Option<Vec<[f32; 3]>>,
    pub velocities_nm_ps: Option<Vec<[f32; 3]>>,
    pub forces_kj_mol_nm: Option<Vec<[f32; 3]>>,
    pub box_: Box3,
    pub potential_energy_kj_mol: Option<f64>,
    pub kinetic_energy_kj_mol: Option<f64>,
}

/// The external simulation driver as reporters see it. The step counter is
/// one-based: `current_step() == 1` right after the first step completes.
pub trait Simulation {
    fn current_step(&self) -> u64;

    fn topology(&self) -> &Topology;

    /// Degrees of freedom of the system, used for instantaneous temperature.
    fn degrees_of_freedom(&self) -> usize;

    /// Accumulated alchemical protocol work from the NCMC integrator,
    /// dimensionless (units of kT).
    fn protocol_work(&self) -> f64;

    /// Named global variable of the integrator; the alchemical lambda lives
    /// under `"lambda"`.
    fn global_variable(&self, name: &str) -> Option<f64>;
}

pub const LAMBDA_VARIABLE: &str = "lambda";

/// Instantaneous temperature in K from kinetic energy (kJ/mol).
pub fn temperature_from_kinetic(kinetic_kj_mol: f64, dof: usize) -> ReportResult<f64> {
    if dof == 0 {
        return Err(ReportError::Invalid(
            "temperature requires a nonzero degree-of-freedom count".into(),
        ));
    }
    Ok(2.0 * kinetic_kj_mol / (dof as f64 * GAS_CONSTANT_KJ_PER_MOL_K))
}
