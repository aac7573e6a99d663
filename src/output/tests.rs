use super::{copy_inputs, prepare_output_dir, write_gui_index, write_scenario_outputs};
use crate::aircraft::{Aircraft, AircraftSpec, BomberAttributes, UavAttributes};
use crate::dispatch::{
    Coordinator, CoordinatorConfig, CoordinatorKind, ServiceKind, Simulation,
};
use crate::geo::Location;
use crate::registry::{Base, SiteRegistry, WaterTank};
use crate::strike::{StrikeArena, StrikeInput};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fs;

const ORIGIN: Location = Location::new(-37.0, 145.0);

fn fixture_simulation() -> Simulation {
    let uav = AircraftSpec::Uav(UavAttributes {
        flight_speed: 120.0,
        fuel_refill_time: 0.0,
        range: 500.0,
        inspection_time: 1.0,
        pct_fuel_cutoff: 0.0,
    });
    let bomber = AircraftSpec::Bomber {
        kind: "helicopter".to_string(),
        attrs: BomberAttributes {
            flight_speed: 60.0,
            suppression_time: 2.0,
            water_refill_time: 1.0,
            fuel_refill_time: 0.0,
            water_per_suppression: 500.0,
            range_empty: 1000.0,
            range_under_load: 800.0,
            water_capacity: 1000.0,
            pct_fuel_cutoff: 0.0,
        },
    };
    let sites = SiteRegistry::new(
        vec![Base::any_kind(ORIGIN)],
        vec![Base::any_kind(ORIGIN)],
        vec![
            WaterTank::new(Location::new(-37.0, 145.05), 2000.0),
            WaterTank::new(Location::new(-37.0, 145.15), f64::INFINITY),
        ],
    );
    let strike = |lon: f64, time: f64, ignited: bool| StrikeInput {
        loc: Location::new(-37.0, lon),
        spawn_time: time,
        risk_rating: None,
        ignited: Some(ignited),
        ignition_probability: None,
    };
    let mut rng = StdRng::seed_from_u64(11);
    let strikes = StrikeArena::materialise(
        vec![
            strike(145.1, 0.0, true),
            strike(145.2, 1.0, false),
            strike(147.9, 2.0, false), // far out of reach, stays N/A
        ],
        0.0,
        &mut rng,
    );
    let fleet = vec![
        Aircraft::new(0, uav, ORIGIN, 1.0),
        Aircraft::new(1, bomber, ORIGIN, 1.0),
    ];
    let coordinator = |service| {
        Coordinator::new(
            CoordinatorConfig {
                policy: CoordinatorKind::Insertion,
                mean_time_power: 1.0,
                target_max_response: f64::INFINITY,
                prioritisation: None,
            },
            service,
        )
    };
    Simulation::new(
        fleet,
        sites,
        strikes,
        coordinator(ServiceKind::Inspection),
        coordinator(ServiceKind::Suppression),
        None,
    )
}

#[test]
fn every_scenario_file_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let mut sim = fixture_simulation();
    sim.run();

    let files = write_scenario_outputs("trial", dir.path(), &sim).unwrap();
    write_gui_index(dir.path(), std::slice::from_ref(&files)).unwrap();

    for name in [
        "trial_simulation_output.csv",
        "trial_uav_event_updates.csv",
        "trial_wb_event_updates.csv",
        "trial_inspection_times.png",
        "gui.json",
    ] {
        assert!(dir.path().join(name).exists(), "{name} missing");
    }

    let body = fs::read_to_string(dir.path().join("trial_simulation_output.csv")).unwrap();
    let mut lines = body.lines();
    assert_eq!(
        lines.next().unwrap(),
        "id,lat,lon,spawn_time,inspection_time,suppression_time"
    );
    // The unreachable strike keeps both times as N/A.
    let unreachable = lines.nth(2).unwrap();
    assert!(unreachable.contains("N/A"), "got {unreachable}");

    let gui: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("gui.json")).unwrap()).unwrap();
    assert_eq!(gui["scenarios"][0]["scenario"], "trial");

    let wb = fs::read_to_string(dir.path().join("trial_wb_event_updates.csv")).unwrap();
    assert!(wb.lines().next().unwrap().contains("water_capacity_L"));
    let uav = fs::read_to_string(dir.path().join("trial_uav_event_updates.csv")).unwrap();
    assert!(!uav.lines().next().unwrap().contains("water_capacity_L"));
}

#[test]
fn identical_runs_replay_byte_for_byte() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();

    let mut first = fixture_simulation();
    first.run();
    write_scenario_outputs("replay", dir_a.path(), &first).unwrap();

    let mut second = fixture_simulation();
    second.run();
    write_scenario_outputs("replay", dir_b.path(), &second).unwrap();

    for name in [
        "replay_simulation_output.csv",
        "replay_uav_event_updates.csv",
        "replay_wb_event_updates.csv",
        "replay_inspection_times.png",
    ] {
        let a = fs::read(dir_a.path().join(name)).unwrap();
        let b = fs::read(dir_b.path().join(name)).unwrap();
        assert_eq!(a, b, "{name} differs between identical runs");
    }
}

#[test]
fn event_updates_are_in_global_chronological_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut sim = fixture_simulation();
    sim.run();
    write_scenario_outputs("order", dir.path(), &sim).unwrap();

    let body = fs::read_to_string(dir.path().join("order_uav_event_updates.csv")).unwrap();
    let times: Vec<f64> = body
        .lines()
        .skip(1)
        .map(|line| line.split(',').nth(3).unwrap().parse().unwrap())
        .collect();
    assert!(!times.is_empty());
    for pair in times.windows(2) {
        assert!(pair[0] <= pair[1] + 1e-9);
    }
}

#[test]
fn a_dirty_output_folder_blocks_a_non_interactive_run() {
    let dir = tempfile::tempdir().unwrap();
    let fresh = dir.path().join("results");
    assert!(prepare_output_dir(&fresh, false).unwrap());
    assert!(prepare_output_dir(&fresh, false).unwrap(), "an empty folder is fine");

    fs::write(fresh.join("stale.csv"), "old").unwrap();
    assert!(!prepare_output_dir(&fresh, false).unwrap());
}

#[test]
fn input_copies_are_flattened_to_bare_names() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("inputs").join("deep");
    fs::create_dir_all(&nested).unwrap();
    let params = dir.path().join("parameters.json");
    fs::write(&params, "{}").unwrap();
    let table = nested.join("lightning.csv");
    fs::write(&table, "latitude,longitude,time\n").unwrap();

    let out = dir.path().join("results");
    fs::create_dir_all(&out).unwrap();
    copy_inputs(&out, &params, &[table]).unwrap();

    assert!(out.join("simulation_input").join("parameters.json").exists());
    assert!(out.join("simulation_input").join("lightning.csv").exists());
}
