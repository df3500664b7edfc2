use std::fs;
use std::sync::Arc;

mod common;
use common::{temp_path, test_snapshot, CountingOpener, RecordingHdf5, TestSim};

use traj_report::{
    hdf5_reporter, netcdf_reporter, state_data_reporter, stream_reporter, Hdf5Options, LengthUnit,
    NetcdfOptions, Rst7File, StateDataOptions,
};

#[test]
fn netcdf_file_opens_lazily_and_only_once() {
    let opener = CountingOpener::default();
    let options = NetcdfOptions {
        protocol_work: true,
        alchemical_lambda: true,
        ..NetcdfOptions::default()
    };
    let mut reporter = netcdf_reporter(
        "lazy.nc".into(),
        options,
        Arc::new(opener.clone()),
    )
    .expect("reporter");
    assert_eq!(opener.open_count(), 0, "no open at construction");

    let sim = TestSim::new(1, true);
    let snapshot = test_snapshot(0.002, true);
    reporter.report(&sim, &snapshot).expect("first report");
    assert_eq!(opener.open_count(), 1, "lazy open on first report");
    reporter.report(&sim, &snapshot).expect("second report");
    assert_eq!(opener.open_count(), 1, "no reopen on second report");

    let specs = opener.recorded_specs();
    assert_eq!(specs[0].n_atoms, 3);
    assert!(specs[0].uses_pbc);
}

#[test]
fn netcdf_appends_fields_in_fixed_order() {
    let opener = CountingOpener::default();
    let options = NetcdfOptions {
        vels: true,
        frcs: true,
        protocol_work: true,
        alchemical_lambda: true,
        ..NetcdfOptions::default()
    };
    let mut reporter = netcdf_reporter(
        "order.nc".into(),
        options,
        Arc::new(opener.clone()),
    )
    .expect("reporter");
    let sim = TestSim::new(1, true);
    let snapshot = test_snapshot(1.5, true);
    reporter.report(&sim, &snapshot).expect("report");

    let ops = opener.recorded_ops();
    let ops: Vec<&str> = ops.iter().map(|s| s.as_str()).collect();
    // Cell first (angstrom), then coordinates, velocities, forces, work,
    // lambda, and finally the elapsed time.
    assert_eq!(
        ops,
        vec![
            "cell:20.0",
            "coords:3:1.0",
            "vels:3",
            "frcs:3",
            "work:1.25",
            "lambda:0.50",
            "time:1.5",
        ]
    );
}

#[test]
fn netcdf_skips_cell_for_aperiodic_topology() {
    let opener = CountingOpener::default();
    let mut reporter = netcdf_reporter(
        "nopbc.nc".into(),
        NetcdfOptions::default(),
        Arc::new(opener.clone()),
    )
    .expect("reporter");
    let sim = TestSim::new(1, false);
    let snapshot = test_snapshot(0.1, false);
    reporter.report(&sim, &snapshot).expect("report");

    let specs = opener.recorded_specs();
    assert!(!specs[0].uses_pbc);
    let ops = opener.recorded_ops();
    assert!(ops.iter().all(|op| !op.starts_with("cell")));
}

#[test]
fn hdf5_flushes_after_every_write() {
    let file = RecordingHdf5::new(LengthUnit::Nanometer);
    let options = Hdf5Options {
        time: true,
        potential_energy: true,
        kinetic_energy: true,
        temperature: true,
        ..Hdf5Options::default()
    };
    let mut reporter = hdf5_reporter(Box::new(file.clone()), options).expect("reporter");
    let sim = TestSim::new(1, true);
    let snapshot = test_snapshot(0.002, true);
    for _ in 0..3 {
        reporter.report(&sim, &snapshot).expect("report");
    }

    assert_eq!(file.flush_count(), 3);
    assert_eq!(file.titles(), vec!["NCMC Trajectory".to_string()]);
    let records = file.written();
    assert_eq!(records.len(), 3);
    let first = &records[0];
    assert_eq!(first.cell_lengths, Some([2.0, 2.0, 2.0]));
    assert_eq!(first.potential_energy_kj_mol, Some(-500.0));
    // dof = 6, KE = 30 kJ/mol: T = 2*30/(6*R)
    let t = first.temperature_k.expect("temperature");
    assert!((t - 10.0 / 8.314_462_618_153_24e-3).abs() < 1e-6);
    assert_eq!(first.protocol_work, Some(1.25));
    assert_eq!(first.alchemical_lambda, Some(0.5));
}

#[test]
fn hdf5_converts_to_the_files_distance_unit() {
    let file = RecordingHdf5::new(LengthUnit::Angstrom);
    let mut reporter =
        hdf5_reporter(Box::new(file.clone()), Hdf5Options::default()).expect("reporter");
    let sim = TestSim::new(1, true);
    let snapshot = test_snapshot(0.002, true);
    reporter.report(&sim, &snapshot).expect("report");

    let records = file.written();
    let coords = records[0].coordinates.as_ref().expect("coordinates");
    assert!((coords[0][0] - 1.0).abs() < 1e-6, "0.1 nm becomes 1 A");
    assert_eq!(records[0].cell_lengths, Some([20.0, 20.0, 20.0]));
}

#[test]
fn state_data_writes_header_once_and_titles_every_line() {
    let path = temp_path("state_lines.ene");
    let options = StateDataOptions {
        title: "md".into(),
        step: true,
        time: true,
        potential_energy: true,
        temperature: true,
        volume: true,
        density: true,
        ..StateDataOptions::default()
    };
    let mut reporter = state_data_reporter(&path, options).expect("reporter");
    let snapshot = test_snapshot(0.002, true);
    reporter
        .report(&TestSim::new(250, true), &snapshot)
        .expect("first report");
    reporter
        .report(&TestSim::new(500, true), &snapshot)
        .expect("second report");

    let contents = fs::read_to_string(&path).expect("ene file");
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("#\"Step\"\t\"Time (ps)\""));
    assert!(lines[1].starts_with("md: 250\t"));
    assert!(lines[2].starts_with("md: 500\t"));
    // density: 36 amu in 8 nm^3
    assert!(lines[1].contains("0.0075"));
    let _ = fs::remove_file(&path);
}

#[test]
fn stream_reporter_reports_without_a_file() {
    let options = StateDataOptions {
        title: "ncmc".into(),
        step: true,
        progress: true,
        total_steps: Some(1000),
        ..StateDataOptions::default()
    };
    let mut reporter = stream_reporter(options).expect("reporter");
    let sim = TestSim::new(100, true);
    let snapshot = test_snapshot(0.2, true);
    reporter.report(&sim, &snapshot).expect("first report");
    reporter.report(&sim, &snapshot).expect("second report");
}

#[test]
fn restart_file_round_trips_through_the_reader() {
    let prefix = temp_path("restart_rt").to_string_lossy().to_string();
    let path = format!("{prefix}.rst7");
    let cfg = traj_report::ReporterConfig::from_value(
        prefix.clone(),
        serde_json::json!({ "restart": { "reportInterval": 100 } }),
    )
    .expect("config");
    let mut set = cfg
        .make_reporters(Arc::new(CountingOpener::default()))
        .expect("reporters");
    let sim = TestSim::new(100, true);
    let snapshot = test_snapshot(0.2, true);
    set.reporters[0].report(&sim, &snapshot).expect("report");

    let data = Rst7File::open(std::path::Path::new(&path))
        .read_frame()
        .expect("read restart");
    assert_eq!(data.coords_a.len(), 3);
    // 0.1 nm stored as 1.0 A
    assert!((data.coords_a[0][0] - 1.0).abs() < 1e-4);
    let (lengths, _angles) = data.cell.expect("cell");
    assert!((lengths[0] - 20.0).abs() < 1e-4);
    let _ = fs::remove_file(&path);
}
