use super::policy::{CoordinatorConfig, CoordinatorKind, ServiceKind};
use super::queue::{EventQueue, SimEvent};
use super::{Coordinator, Simulation};
use crate::aircraft::{Aircraft, AircraftKind, AircraftSpec, BomberAttributes, UavAttributes};
use crate::geo::Location;
use crate::registry::{Base, SiteRegistry, WaterTank};
use crate::strike::{StrikeArena, StrikeInput};
use rand::SeedableRng;
use rand::rngs::StdRng;

const ORIGIN: Location = Location::new(-37.0, 145.0);

#[test]
fn the_event_queue_pops_by_time_then_insertion_order() {
    let mut queue = EventQueue::new();
    queue.push(5.0, SimEvent::StrikeSpawn { strike: 0 });
    queue.push(1.0, SimEvent::StrikeSpawn { strike: 1 });
    queue.push(5.0, SimEvent::StrikeSpawn { strike: 2 });
    queue.push(1.0, SimEvent::ControllerTick);

    let order: Vec<(f64, SimEvent)> = std::iter::from_fn(|| queue.pop_min()).collect();
    assert_eq!(order.len(), 4);
    assert_eq!(order[0], (1.0, SimEvent::StrikeSpawn { strike: 1 }));
    assert_eq!(order[1], (1.0, SimEvent::ControllerTick));
    assert_eq!(order[2], (5.0, SimEvent::StrikeSpawn { strike: 0 }));
    assert_eq!(order[3], (5.0, SimEvent::StrikeSpawn { strike: 2 }));
    assert!(queue.is_empty());
}

fn uav_spec(flight_speed: f64, range: f64) -> AircraftSpec {
    AircraftSpec::Uav(UavAttributes {
        flight_speed,
        fuel_refill_time: 0.0,
        range,
        inspection_time: 0.0,
        pct_fuel_cutoff: 0.0,
    })
}

fn bomber_spec() -> AircraftSpec {
    AircraftSpec::Bomber {
        kind: "helicopter".to_string(),
        attrs: BomberAttributes {
            flight_speed: 60.0,
            suppression_time: 0.0,
            water_refill_time: 1.0,
            fuel_refill_time: 0.0,
            water_per_suppression: 1000.0,
            range_empty: 2000.0,
            range_under_load: 1500.0,
            water_capacity: 1000.0,
            pct_fuel_cutoff: 0.0,
        },
    }
}

fn coordinator(policy: CoordinatorKind, service: ServiceKind) -> Coordinator {
    Coordinator::new(
        CoordinatorConfig {
            policy,
            mean_time_power: 1.0,
            target_max_response: f64::INFINITY,
            prioritisation: None,
        },
        service,
    )
}

fn strike(lon: f64, time: f64, ignited: bool) -> StrikeInput {
    StrikeInput {
        loc: Location::new(-37.0, lon),
        spawn_time: time,
        risk_rating: None,
        ignited: Some(ignited),
        ignition_probability: None,
    }
}

fn arena(inputs: Vec<StrikeInput>) -> StrikeArena {
    let mut rng = StdRng::seed_from_u64(7);
    StrikeArena::materialise(inputs, 0.0, &mut rng)
}

fn simulation(
    fleet: Vec<Aircraft>,
    sites: SiteRegistry,
    strikes: StrikeArena,
    uav_policy: CoordinatorKind,
    wb_policy: CoordinatorKind,
) -> Simulation {
    Simulation::new(
        fleet,
        sites,
        strikes,
        coordinator(uav_policy, ServiceKind::Inspection),
        coordinator(wb_policy, ServiceKind::Suppression),
        None,
    )
}

/// The universal invariants every terminated scenario must satisfy.
fn assert_invariants(sim: &Simulation) {
    for craft in sim.fleet() {
        for update in craft.log() {
            assert!(
                (0.0..=1.0 + 1e-9).contains(&update.fuel),
                "fuel fraction {} out of bounds",
                update.fuel
            );
        }
        for pair in craft.log().windows(2) {
            assert!(pair[0].time <= pair[1].time + 1e-9, "log times regressed");
        }
    }
    for tank in sim.sites().tanks() {
        assert!(tank.level() >= -1e-9);
    }
    for s in sim.strikes().iter() {
        if let Some(inspected) = s.inspection_time() {
            assert!(inspected + 1e-9 >= s.spawn_time());
        }
        if let Some(done) = s.suppression_time() {
            assert!(s.ignited());
            assert!(done + 1e-9 >= s.inspection_time().unwrap());
        }
    }
}

#[test]
fn one_uav_inspects_a_strike_at_its_own_spawn_point() {
    let sites = SiteRegistry::new(vec![Base::any_kind(ORIGIN)], Vec::new(), Vec::new());
    let strikes = arena(vec![strike(145.0, 0.0, false)]);
    let fleet = vec![Aircraft::new(0, uav_spec(60.0, 120.0), ORIGIN, 1.0)];

    let mut sim = simulation(fleet, sites, strikes, CoordinatorKind::Simple, CoordinatorKind::Simple);
    sim.run();

    let s = sim.strikes().get(0);
    assert!((s.inspection_time().unwrap() - 0.0).abs() < 1e-9);
    assert!(s.suppression_time().is_none());
    assert!(sim.uninspected().is_empty());
    assert_invariants(&sim);
}

#[test]
fn an_out_of_range_strike_is_recorded_uninspected() {
    let sites = SiteRegistry::new(vec![Base::any_kind(ORIGIN)], Vec::new(), Vec::new());
    // ~88.8 km away on a 60 km tank: unreachable even from the base.
    let strikes = arena(vec![strike(146.0, 0.0, false)]);
    let fleet = vec![Aircraft::new(0, uav_spec(60.0, 60.0), ORIGIN, 1.0)];

    let mut sim = simulation(fleet, sites, strikes, CoordinatorKind::Simple, CoordinatorKind::Simple);
    sim.run();

    assert_eq!(sim.uninspected().to_vec(), vec![0]);
    assert!(sim.strikes().get(0).inspection_time().is_none());
    // The craft never had a reason to move.
    assert!(sim.fleet()[0].log().is_empty());
    assert_invariants(&sim);
}

#[test]
fn an_inspected_strike_sends_the_craft_home_to_refuel() {
    let sites = SiteRegistry::new(vec![Base::any_kind(ORIGIN)], Vec::new(), Vec::new());
    // ~26.6 km out: out and back fits the 60 km tank exactly once.
    let strikes = arena(vec![strike(145.3, 0.0, false)]);
    let fleet = vec![Aircraft::new(0, uav_spec(60.0, 60.0), ORIGIN, 1.0)];

    let mut sim = simulation(fleet, sites, strikes, CoordinatorKind::Simple, CoordinatorKind::Simple);
    sim.run();

    let log = sim.fleet()[0].log();
    let inspect_idx = log
        .iter()
        .position(|u| u.status == crate::aircraft::AircraftStatus::Inspecting)
        .expect("the strike is reachable");
    let refuel_idx = log
        .iter()
        .position(|u| u.status == crate::aircraft::AircraftStatus::Refuelling)
        .expect("the craft must head home to refuel afterwards");
    assert!(inspect_idx < refuel_idx);
    assert!((sim.fleet()[0].fuel() - 1.0).abs() < 1e-9);
    assert_invariants(&sim);
}

#[test]
fn simple_assigns_the_craft_with_the_earliest_arrival() {
    let sites = SiteRegistry::new(
        vec![Base::any_kind(ORIGIN), Base::any_kind(Location::new(-37.0, 145.4))],
        Vec::new(),
        Vec::new(),
    );
    let strikes = arena(vec![strike(145.3, 0.0, false)]);
    let fleet = vec![
        Aircraft::new(0, uav_spec(60.0, 2000.0), ORIGIN, 1.0),
        Aircraft::new(1, uav_spec(60.0, 2000.0), Location::new(-37.0, 145.4), 1.0),
    ];

    let mut sim = simulation(fleet, sites, strikes, CoordinatorKind::Simple, CoordinatorKind::Simple);
    sim.run();

    // The second craft is ~8.9 km out against ~26.6 km for the first.
    assert!(sim.fleet()[1].log().iter().any(|u| u.status == crate::aircraft::AircraftStatus::Inspecting));
    assert!(sim.fleet()[0].log().is_empty());
    assert_invariants(&sim);
}

fn three_strike_setup() -> (SiteRegistry, StrikeArena, Vec<Aircraft>) {
    let sites = SiteRegistry::new(vec![Base::any_kind(ORIGIN)], Vec::new(), Vec::new());
    // Near east at t=0, far east at t=0, near west at t=1: an appender
    // over-commits east before the west strike exists.
    let strikes = arena(vec![
        strike(145.1, 0.0, false),
        strike(146.0, 0.0, false),
        strike(144.9, 1.0, false),
    ]);
    let fleet = vec![Aircraft::new(0, uav_spec(60.0, 2000.0), ORIGIN, 1.0)];
    (sites, strikes, fleet)
}

fn total_inspection_time(sim: &Simulation) -> f64 {
    sim.strikes().iter().filter_map(|s| s.inspection_time()).sum()
}

#[test]
fn insertion_beats_simple_on_a_late_near_strike() {
    let (sites, strikes, fleet) = three_strike_setup();
    let mut simple = simulation(fleet, sites, strikes, CoordinatorKind::Simple, CoordinatorKind::Simple);
    simple.run();

    let (sites, strikes, fleet) = three_strike_setup();
    let mut insertion =
        simulation(fleet, sites, strikes, CoordinatorKind::Insertion, CoordinatorKind::Simple);
    insertion.run();

    for sim in [&simple, &insertion] {
        assert_eq!(sim.uninspected().len(), 0);
        assert_invariants(sim);
    }

    // The west strike jumps the queue under Insertion.
    let west_simple = simple.strikes().get(2).inspection_time().unwrap();
    let west_insertion = insertion.strikes().get(2).inspection_time().unwrap();
    assert!(
        west_insertion <= west_simple + 1e-9,
        "insertion must not serve the new strike later than simple"
    );
    assert!(
        total_inspection_time(&insertion) < total_inspection_time(&simple),
        "insertion {} vs simple {}",
        total_inspection_time(&insertion),
        total_inspection_time(&simple)
    );
}

#[test]
fn minimise_mean_time_with_unit_power_matches_the_cheapest_insertion() {
    let (sites, strikes, fleet) = three_strike_setup();
    let mut mmt = simulation(
        fleet,
        sites,
        strikes,
        CoordinatorKind::MinimiseMeanTime,
        CoordinatorKind::Simple,
    );
    mmt.run();
    assert_invariants(&mmt);

    // With p=1 the cheapest placement of the late west strike is ahead of
    // the far-east leg, exactly as Insertion decides.
    let west = mmt.strikes().get(2).inspection_time().unwrap();
    assert!((west - 26.6).abs() < 0.5, "west inspected at {west}");
}

#[test]
fn reprocess_max_time_completes_and_honours_the_invariants() {
    let (sites, strikes, fleet) = three_strike_setup();
    let mut sim = simulation(
        fleet,
        sites,
        strikes,
        CoordinatorKind::ReprocessMaxTime,
        CoordinatorKind::Simple,
    );
    sim.run();

    assert!(sim.uninspected().is_empty());
    assert!(sim.strikes().iter().all(|s| s.inspection_time().is_some()));
    assert_invariants(&sim);
}

#[test]
fn a_planned_refill_reroutes_when_the_tank_runs_dry() {
    let uav_base = Base::any_kind(ORIGIN);
    let wb_base = Base::any_kind(ORIGIN);
    let tanks = vec![
        WaterTank::new(Location::new(-37.0, 145.05), 1000.0),
        WaterTank::new(Location::new(-37.0, 145.15), 1000.0),
    ];
    let sites = SiteRegistry::new(vec![uav_base], vec![wb_base], tanks);
    // Three ignited strikes in quick succession: the bomber's first load
    // is onboard, both follow-ups are planned against the nearest tank
    // before any debit lands.
    let strikes = arena(vec![
        strike(145.02, 0.0, true),
        strike(145.04, 0.2, true),
        strike(145.06, 0.4, true),
    ]);
    let fleet = vec![
        Aircraft::new(0, uav_spec(600.0, 2000.0), ORIGIN, 1.0),
        Aircraft::new(1, bomber_spec(), ORIGIN, 1.0),
    ];

    let mut sim = simulation(fleet, sites, strikes, CoordinatorKind::Simple, CoordinatorKind::Insertion);
    sim.run();

    assert!(sim.unsuppressed().is_empty());
    assert!(sim.strikes().iter().all(|s| s.suppression_time().is_some()));
    assert!(sim.sites().tank(0).level().abs() < 1e-9, "first tank drained");
    assert!(sim.sites().tank(1).level().abs() < 1e-9, "second tank drained");
    let refills = sim.fleet()[1]
        .log()
        .iter()
        .filter(|u| u.status == crate::aircraft::AircraftStatus::RefillingWater)
        .count();
    assert_eq!(refills, 2);
    assert_invariants(&sim);
}

#[test]
fn an_empty_strike_stream_terminates_immediately() {
    let sites = SiteRegistry::new(vec![Base::any_kind(ORIGIN)], Vec::new(), Vec::new());
    let strikes = arena(Vec::new());
    let fleet = vec![Aircraft::new(0, uav_spec(60.0, 120.0), ORIGIN, 1.0)];

    let mut sim = simulation(fleet, sites, strikes, CoordinatorKind::Simple, CoordinatorKind::Simple);
    sim.run();

    assert_eq!(sim.clock(), 0.0);
    assert!(sim.fleet()[0].log().is_empty());
    assert!(sim.uninspected().is_empty() && sim.unsuppressed().is_empty());
}

#[test]
fn ignited_strikes_reach_the_bomber_after_inspection() {
    let sites = SiteRegistry::new(
        vec![Base::any_kind(ORIGIN)],
        vec![Base::any_kind(ORIGIN)],
        vec![WaterTank::new(Location::new(-37.0, 145.05), f64::INFINITY)],
    );
    let strikes = arena(vec![strike(145.1, 0.0, true), strike(145.2, 0.0, false)]);
    let fleet = vec![
        Aircraft::new(0, uav_spec(120.0, 2000.0), ORIGIN, 1.0),
        Aircraft::new(1, bomber_spec(), ORIGIN, 1.0),
    ];

    let mut sim = simulation(fleet, sites, strikes, CoordinatorKind::Simple, CoordinatorKind::Simple);
    sim.run();

    let ignited = sim.strikes().get(0);
    assert!(ignited.suppression_time().unwrap() >= ignited.inspection_time().unwrap());
    // The quiet strike is inspected but never bombed.
    assert!(sim.strikes().get(1).inspection_time().is_some());
    assert!(sim.strikes().get(1).suppression_time().is_none());
    assert_invariants(&sim);
}
