use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ReportError, ReportResult};
use crate::report::{
    check_mode, AlchemicalFields, FileMode, FrameSink, ReportFrame, Reporter,
};
use crate::schedule::{ReportTiming, StateRequirements};
use crate::snapshot::{Simulation, StateSnapshot, ANGSTROM_PER_NM};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartOptions {
    #[serde(default)]
    pub outfname: Option<String>,
    #[serde(default = "default_interval")]
    pub report_interval: u64,
    #[serde(default, alias = "frame_indices")]
    pub frame_indices: Vec<u64>,
    #[serde(default = "default_true")]
    pub write_velocities: bool,
    #[serde(default = "default_restart_title")]
    pub title: String,
}

impl Default for RestartOptions {
    fn default() -> Self {
        Self {
            outfname: None,
            report_interval: 1,
            frame_indices: Vec::new(),
            write_velocities: true,
            title: default_restart_title(),
        }
    }
}

fn default_interval() -> u64 {
    1
}

fn default_true() -> bool {
    true
}

fn default_restart_title() -> String {
    "NCMC restart".into()
}

/// Contents of one Amber ASCII restart frame. Coordinates and velocities are
/// in angstrom and angstrom/ps, cell lengths in angstrom, angles in degrees.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestartData {
    pub title: String,
    pub time_ps: f32,
    pub coords_a: Vec<[f32; 3]>,
    pub velocities_a_ps: Option<Vec<[f32; 3]>>,
    pub cell: Option<([f32; 3], [f32; 3])>,
}

/// Handle on a `.rst7` restart file. The mode is fixed at open: a handle
/// opened for reading cannot be written through and vice versa.
pub struct Rst7File {
    path: PathBuf,
    mode: FileMode,
}

impl Rst7File {
    /// Open for writing. The file is rewritten on every frame; a restart is
    /// only ever the latest state.
    pub fn create(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            mode: FileMode::Write,
        }
    }

    /// Open an existing restart for reading.
    pub fn open(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            mode: FileMode::Read,
        }
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    pub fn write_frame(&mut self, data: &RestartData) -> ReportResult<()> {
        check_mode(self.mode, FileMode::Write)?;
        let mut file = File::create(&self.path)?;
        writeln!(file, "{}", data.title)?;
        writeln!(file, "{:5}{:15.7e}", data.coords_a.len(), data.time_ps)?;
        write_triplets(&mut file, &data.coords_a)?;
        if let Some(vels) = &data.velocities_a_ps {
            if vels.len() != data.coords_a.len() {
                return Err(ReportError::Invalid(format!(
                    "restart velocity count {} does not match atom count {}",
                    vels.len(),
                    data.coords_a.len()
                )));
            }
            write_triplets(&mut file, vels)?;
        }
        if let Some((lengths, angles)) = data.cell {
            writeln!(
                file,
                "{:12.7}{:12.7}{:12.7}{:12.7}{:12.7}{:12.7}",
                lengths[0], lengths[1], lengths[2], angles[0], angles[1], angles[2]
            )?;
        }
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }

    pub fn read_frame(&mut self) -> ReportResult<RestartData> {
        check_mode(self.mode, FileMode::Read)?;
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let title = lines
            .next()
            .ok_or_else(|| ReportError::Invalid("restart file is empty".into()))??;
        let header = lines
            .next()
            .ok_or_else(|| ReportError::Invalid("restart file missing atom count".into()))??;
        let mut header_parts = header.split_whitespace();
        let n_atoms: usize = header_parts
            .next()
            .and_then(|tok| tok.parse().ok())
            .ok_or_else(|| ReportError::Invalid("restart file has no atom count".into()))?;
        let time_ps: f32 = header_parts
            .next()
            .and_then(|tok| tok.parse().ok())
            .unwrap_or(0.0);

        let mut floats = Vec::with_capacity(n_atoms * 6 + 6);
        for line in lines {
            let line = line?;
            for tok in line.split_whitespace() {
                let value: f32 = tok.parse().map_err(|_| {
                    ReportError::Invalid(format!("invalid number in restart file: {tok}"))
                })?;
                floats.push(value);
            }
        }
        if floats.len() < n_atoms * 3 {
            return Err(ReportError::Invalid(
                "restart file does not contain enough coordinates".into(),
            ));
        }
        let coords_a = triplets(&floats[..n_atoms * 3]);
        let mut rest = &floats[n_atoms * 3..];
        let velocities_a_ps = if rest.len() >= n_atoms * 3 {
            let vels = triplets(&rest[..n_atoms * 3]);
            rest = &rest[n_atoms * 3..];
            Some(vels)
        } else {
            None
        };
        let cell = if rest.len() >= 6 {
            Some((
                [rest[0], rest[1], rest[2]],
                [rest[3], rest[4], rest[5]],
            ))
        } else {
            None
        };
        Ok(RestartData {
            title,
            time_ps,
            coords_a,
            velocities_a_ps,
            cell,
        })
    }
}

fn write_triplets(file: &mut File, values: &[[f32; 3]]) -> ReportResult<()> {
    // Six values per line, Amber fixed-width convention.
    for pair in values.chunks(2) {
        let mut line = String::new();
        for v in pair {
            for component in v {
                line.push_str(&format!("{component:12.7}"));
            }
        }
        writeln!(file, "{line}")?;
    }
    Ok(())
}

fn triplets(values: &[f32]) -> Vec<[f32; 3]> {
    values
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2]])
        .collect()
}

/// Restart sink: rewrites the `.rst7` with the latest coordinates (and
/// optionally velocities) on each report.
pub struct RestartSink {
    file: Rst7File,
    options: RestartOptions,
    periodic: bool,
}

impl RestartSink {
    pub fn new(path: &Path, options: RestartOptions) -> Self {
        Self {
            file: Rst7File::create(path),
            options,
            periodic: false,
        }
    }
}

impl FrameSink for RestartSink {
    fn initialize(&mut self, sim: &dyn Simulation, _snapshot: &StateSnapshot) -> ReportResult<()> {
        self.periodic = sim.topology().unit_cell_nm.is_some();
        Ok(())
    }

    fn append(&mut self, frame: &ReportFrame) -> ReportResult<()> {
        let coords_nm = frame.coords_nm.as_ref().ok_or_else(|| {
            ReportError::Invalid("restart reporter requires positions in the frame".into())
        })?;
        let coords_a = coords_nm
            .iter()
            .map(|v| {
                [
                    v[0] * ANGSTROM_PER_NM,
                    v[1] * ANGSTROM_PER_NM,
                    v[2] * ANGSTROM_PER_NM,
                ]
            })
            .collect();
        let velocities_a_ps = match (&frame.velocities_nm_ps, self.options.write_velocities) {
            (Some(vels), true) => Some(
                vels.iter()
                    .map(|v| {
                        [
                            v[0] * ANGSTROM_PER_NM,
                            v[1] * ANGSTROM_PER_NM,
                            v[2] * ANGSTROM_PER_NM,
                        ]
                    })
                    .collect(),
            ),
            _ => None,
        };
        let cell = if self.periodic {
            let (lengths, angles) = frame.box_.lengths_and_angles()?;
            Some((
                [
                    lengths[0] * ANGSTROM_PER_NM,
                    lengths[1] * ANGSTROM_PER_NM,
                    lengths[2] * ANGSTROM_PER_NM,
                ],
                angles,
            ))
        } else {
            None
        };
        self.file.write_frame(&RestartData {
            title: self.options.title.clone(),
            time_ps: frame.time_ps,
            coords_a,
            velocities_a_ps,
            cell,
        })
    }
}

/// Reporter maintaining an Amber ASCII restart file.
pub fn restart_reporter(path: &Path, options: RestartOptions) -> ReportResult<Reporter> {
    let timing = ReportTiming::from_options(options.report_interval, &options.frame_indices)?;
    let wants = StateRequirements {
        positions: true,
        velocities: options.write_velocities,
        forces: false,
        energy: false,
    };
    let sink = RestartSink::new(path, options);
    Ok(Reporter::new(
        timing,
        wants,
        AlchemicalFields::default(),
        Box::new(sink),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn temp(name: &str) -> PathBuf {
        env::temp_dir().join(format!("traj-report-rst7-{}-{name}", std::process::id()))
    }

    #[test]
    fn restart_round_trips_coordinates_and_cell() {
        let path = temp("roundtrip.rst7");
        let data = RestartData {
            title: "test restart".into(),
            time_ps: 12.5,
            coords_a: vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]],
            velocities_a_ps: Some(vec![[0.1, 0.2, 0.3], [0.4, 0.5, 0.6], [0.7, 0.8, 0.9]]),
            cell: Some(([20.0, 20.0, 20.0], [90.0, 90.0, 90.0])),
        };
        Rst7File::create(&path).write_frame(&data).expect("write");
        let read = Rst7File::open(&path).read_frame().expect("read");
        assert_eq!(read.title, "test restart");
        assert_eq!(read.coords_a.len(), 3);
        assert!((read.time_ps - 12.5).abs() < 1e-4);
        assert!((read.coords_a[2][2] - 9.0).abs() < 1e-4);
        let vels = read.velocities_a_ps.expect("velocities");
        assert!((vels[1][0] - 0.4).abs() < 1e-4);
        let (lengths, angles) = read.cell.expect("cell");
        assert!((lengths[0] - 20.0).abs() < 1e-4);
        assert!((angles[0] - 90.0).abs() < 1e-4);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn wrong_mode_names_the_required_mode() {
        let path = temp("mode.rst7");
        let data = RestartData {
            title: "t".into(),
            coords_a: vec![[0.0, 0.0, 0.0]],
            ..RestartData::default()
        };
        Rst7File::create(&path).write_frame(&data).expect("write");

        let err = Rst7File::open(&path).write_frame(&data).expect_err("mode");
        assert!(err.to_string().contains("mode \"w\""));
        let err = Rst7File::create(&path).read_frame().expect_err("mode");
        assert!(err.to_string().contains("mode \"r\""));
        let _ = std::fs::remove_file(&path);
    }
}
