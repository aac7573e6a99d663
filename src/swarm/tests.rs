use super::{ForecastConfig, SwarmConfig, SwarmController, SwarmTarget};
use crate::aircraft::plan::PlanAction;
use crate::aircraft::{Aircraft, AircraftSpec, UavAttributes};
use crate::dispatch::EventQueue;
use crate::geo::{Boundary, Location};
use crate::registry::{Base, SiteRegistry};
use crate::strike::{StrikeArena, StrikeInput};
use rand::SeedableRng;
use rand::rngs::StdRng;

const CENTRE: Location = Location::new(0.0, 145.0);

fn square_boundary() -> Boundary {
    Boundary::new(vec![
        Location::new(-1.0, 144.0),
        Location::new(-1.0, 146.0),
        Location::new(1.0, 146.0),
        Location::new(1.0, 144.0),
    ])
    .unwrap()
}

fn uav(id: usize, loc: Location, fuel: f64, cutoff: f64) -> Aircraft {
    Aircraft::new(
        id,
        AircraftSpec::Uav(UavAttributes {
            flight_speed: 60.0,
            fuel_refill_time: 0.0,
            range: 500.0,
            inspection_time: 0.0,
            pct_fuel_cutoff: cutoff,
        }),
        loc,
        fuel,
    )
}

fn controller(targets: Vec<SwarmTarget>, uav_rep: f64, boundary_rep: f64) -> SwarmController {
    SwarmController::new(SwarmConfig {
        targets,
        boundary: square_boundary(),
        dt: 5.0,
        uav_repulsion_const: uav_rep,
        uav_repulsion_power: -1.0,
        boundary_repulsion_const: boundary_rep,
        boundary_repulsion_power: -1.0,
        target_attraction_const: 1.0,
        target_attraction_power: -1.0,
        centre: CENTRE,
        forecasting: None,
    })
}

fn sites() -> SiteRegistry {
    SiteRegistry::new(vec![Base::any_kind(CENTRE)], Vec::new(), Vec::new())
}

fn no_strikes() -> StrikeArena {
    let mut rng = StdRng::seed_from_u64(0);
    StrikeArena::materialise(Vec::new(), 0.0, &mut rng)
}

fn target_at(loc: Location) -> SwarmTarget {
    SwarmTarget {
        loc,
        start_time: 0.0,
        finish_time: f64::INFINITY,
    }
}

fn head_action(craft: &Aircraft) -> PlanAction {
    craft.queue().front().expect("controller planned something").action.clone()
}

#[test]
fn a_step_that_would_leave_the_boundary_becomes_a_hover() {
    // The craft sits a few metres inside the west edge with the only
    // attractor outside it, so the computed step crosses the boundary.
    let start = Location::new(0.0, 144.0001);
    let ctl = controller(vec![target_at(Location::new(0.0, 143.5))], 0.0, 0.0);
    let mut fleet = vec![uav(0, start, 1.0, 0.0)];
    let mut queue = EventQueue::new();

    ctl.replan(10.0, &mut fleet, &sites(), &no_strikes(), &mut queue);

    assert!(matches!(head_action(&fleet[0]), PlanAction::Hover { .. }));
    // Hovering leaves position and fuel untouched.
    let mut reg = sites();
    let mut arena = no_strikes();
    let step = fleet[0].execute_next(10.0, &mut reg, &mut arena);
    assert!((fleet[0].fuel() - 1.0).abs() < 1e-12);
    assert!(start.distance_to(fleet[0].loc()) < 1e-9);
    assert!((step.wake_at.unwrap() - 15.0).abs() < 1e-9);
}

#[test]
fn a_stray_craft_routes_straight_to_the_centre() {
    let ctl = controller(Vec::new(), 0.0, 0.0);
    let mut fleet = vec![uav(0, Location::new(0.0, 143.0), 1.0, 0.0)];
    let mut queue = EventQueue::new();

    ctl.replan(0.0, &mut fleet, &sites(), &no_strikes(), &mut queue);

    match head_action(&fleet[0]) {
        PlanAction::GoTo { loc, .. } => assert!(loc.distance_to(&CENTRE) < 1e-9),
        other => panic!("expected a leg to the centre, got {other}"),
    }
}

#[test]
fn an_attractor_pulls_an_idle_craft_towards_it() {
    let ctl = controller(vec![target_at(CENTRE)], 0.0, 0.0);
    let start = Location::new(0.0, 145.5);
    let mut fleet = vec![uav(0, start, 1.0, 0.0)];
    let mut queue = EventQueue::new();

    ctl.replan(0.0, &mut fleet, &sites(), &no_strikes(), &mut queue);

    match head_action(&fleet[0]) {
        PlanAction::GoTo { loc, .. } => {
            assert!(loc.lon() < start.lon(), "step must head west, got {loc}");
            assert!(loc.distance_to(&start) <= 60.0 / 60.0 * 5.0 + 1e-6);
        }
        other => panic!("expected a field step, got {other}"),
    }
}

#[test]
fn idle_craft_repel_each_other() {
    let ctl = controller(Vec::new(), 5.0, 0.0);
    let west = Location::new(0.0, 145.1);
    let east = Location::new(0.0, 145.2);
    let mut fleet = vec![uav(0, west, 1.0, 0.0), uav(1, east, 1.0, 0.0)];
    let mut queue = EventQueue::new();

    ctl.replan(0.0, &mut fleet, &sites(), &no_strikes(), &mut queue);

    match head_action(&fleet[0]) {
        PlanAction::GoTo { loc, .. } => assert!(loc.lon() < west.lon()),
        other => panic!("unexpected action {other}"),
    }
    match head_action(&fleet[1]) {
        PlanAction::GoTo { loc, .. } => assert!(loc.lon() > east.lon()),
        other => panic!("unexpected action {other}"),
    }
}

#[test]
fn a_craft_past_its_fuel_cutoff_heads_home_first() {
    let ctl = controller(vec![target_at(CENTRE)], 0.0, 0.0);
    let mut fleet = vec![uav(0, Location::new(0.0, 145.3), 0.2, 0.5)];
    let mut queue = EventQueue::new();

    ctl.replan(0.0, &mut fleet, &sites(), &no_strikes(), &mut queue);

    assert!(matches!(head_action(&fleet[0]), PlanAction::RefuelAt { .. }));
}

#[test]
fn forecast_cells_become_attractors_once_dense_enough() {
    let cfg = SwarmConfig {
        targets: Vec::new(),
        boundary: square_boundary(),
        dt: 5.0,
        uav_repulsion_const: 0.0,
        uav_repulsion_power: -1.0,
        boundary_repulsion_const: 0.0,
        boundary_repulsion_power: -1.0,
        target_attraction_const: 1.0,
        target_attraction_power: -1.0,
        centre: CENTRE,
        forecasting: Some(ForecastConfig {
            radius_km: 30.0,
            min_in_target: 2,
            look_ahead: 120.0,
        }),
    };
    let ctl = SwarmController::new(cfg);

    let cluster = Location::new(0.4, 145.4);
    let inputs = (0..3)
        .map(|i| StrikeInput {
            loc: Location::new(cluster.lat(), cluster.lon() + 0.01 * i as f64),
            spawn_time: 30.0,
            risk_rating: None,
            ignited: Some(false),
            ignition_probability: None,
        })
        .collect();
    let mut rng = StdRng::seed_from_u64(3);
    let strikes = StrikeArena::materialise(inputs, 0.0, &mut rng);

    let cells = ctl.attractors(0.0, &strikes);
    assert_eq!(cells.len(), 1);
    assert!(cells[0].distance_to(&cluster) < 45.0);

    // A lone faraway strike never forms a cell.
    let lone = StrikeArena::materialise(
        vec![StrikeInput {
            loc: Location::new(-0.5, 144.5),
            spawn_time: 30.0,
            risk_rating: None,
            ignited: Some(false),
            ignition_probability: None,
        }],
        0.0,
        &mut rng,
    );
    assert!(ctl.attractors(0.0, &lone).is_empty());
}
