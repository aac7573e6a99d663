use super::attributes::AircraftSpec;
use crate::geo::Location;
use crate::registry::SiteRegistry;
use crate::strike::{StrikeArena, StrikeId};
use std::fmt::{Display, Formatter};

pub const EPS: f64 = 1e-9;

/// Why a bare repositioning leg was planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoToReason {
    /// Stray craft returning inside the patrol boundary.
    Reposition,
    /// One force-field step of an idle UAV.
    SwarmStep,
}

/// A single planned task. Travel to the task's location is part of the
/// task itself; the craft flies there, then performs the service.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanAction {
    GoTo { loc: Location, reason: GoToReason },
    Inspect { strike: StrikeId },
    Suppress { strike: StrikeId },
    RefuelAt { base: usize },
    RefillWaterAt { tank: usize },
    Hover { until: f64 },
}

impl PlanAction {
    pub fn is_service(&self) -> bool {
        matches!(self, PlanAction::Inspect { .. } | PlanAction::Suppress { .. })
    }

    pub fn serviced_strike(&self) -> Option<StrikeId> {
        match self {
            PlanAction::Inspect { strike } | PlanAction::Suppress { strike } => Some(*strike),
            _ => None,
        }
    }
}

impl Display for PlanAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanAction::GoTo { loc, .. } => write!(f, "GoTo {loc}"),
            PlanAction::Inspect { strike } => write!(f, "Inspect strike {strike}"),
            PlanAction::Suppress { strike } => write!(f, "Suppress strike {strike}"),
            PlanAction::RefuelAt { base } => write!(f, "Refuel at base {base}"),
            PlanAction::RefillWaterAt { tank } => write!(f, "Refill at tank {tank}"),
            PlanAction::Hover { until } => write!(f, "Hover until {until:.1}"),
        }
    }
}

/// A task with its computed schedule: `start` is when the craft departs
/// towards it, `end` when its service completes.
#[derive(Debug, Clone)]
pub struct PlannedEvent {
    pub action: PlanAction,
    pub start: f64,
    pub end: f64,
}

/// The rolling state of a plan walk: where the craft will be, when, and
/// with how much fuel and water.
#[derive(Debug, Clone, Copy)]
pub struct PlanState {
    pub time: f64,
    pub loc: Location,
    pub fuel: f64,
    pub water: f64,
}

/// The fully timed result of walking a plan.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub events: Vec<PlannedEvent>,
    pub final_state: PlanState,
    /// Service completion time per strike, in plan order.
    pub strike_times: Vec<(StrikeId, f64)>,
}

pub(crate) fn action_target(
    spec: &AircraftSpec,
    action: &PlanAction,
    sites: &SiteRegistry,
    strikes: &StrikeArena,
) -> Option<Location> {
    match action {
        PlanAction::GoTo { loc, .. } => Some(*loc),
        PlanAction::Inspect { strike } | PlanAction::Suppress { strike } => {
            Some(*strikes.get(*strike).loc())
        }
        PlanAction::RefuelAt { base } => Some(*sites.base_for(&spec.kind(), *base).loc()),
        PlanAction::RefillWaterAt { tank } => Some(*sites.tank(*tank).loc()),
        PlanAction::Hover { .. } => None,
    }
}

/// Advances the plan state through one action, or `None` when the action
/// is infeasible from `state`.
///
/// Fuel must stay above the craft's cutoff at arrival, except on a leg
/// into a refuel stop where only non-negative fuel is required. Hovering
/// is free of fuel.
pub fn advance(
    spec: &AircraftSpec,
    state: &PlanState,
    action: &PlanAction,
    sites: &SiteRegistry,
    strikes: &StrikeArena,
) -> Option<PlanState> {
    let mut next = *state;
    if let Some(target) = action_target(spec, action, sites, strikes) {
        let d = state.loc.distance_to(&target);
        if d > 0.0 {
            next.fuel -= d / spec.range_km(state.water);
            next.time += d / spec.speed_km_per_min();
            next.loc = target;
        }
        let floor = if matches!(action, PlanAction::RefuelAt { .. }) {
            0.0
        } else {
            spec.pct_fuel_cutoff()
        };
        if next.fuel + EPS < floor {
            return None;
        }
    }
    match action {
        PlanAction::GoTo { .. } => {}
        PlanAction::Inspect { .. } => next.time += spec.service_time(),
        PlanAction::Suppress { .. } => {
            if next.water + EPS < spec.water_per_suppression() {
                return None;
            }
            next.water -= spec.water_per_suppression();
            next.time += spec.service_time();
        }
        PlanAction::RefuelAt { .. } => {
            next.time += spec.fuel_refill_time();
            next.fuel = 1.0;
        }
        PlanAction::RefillWaterAt { .. } => {
            next.time += spec.water_refill_time();
            next.water = spec.water_capacity();
        }
        PlanAction::Hover { until } => next.time = next.time.max(*until),
    }
    Some(next)
}

/// Whether the craft could still reach its nearest admissible refuel base
/// from `state` while preserving the fuel cutoff. With no base configured
/// there is nothing to preserve reserve for.
pub fn reserve_ok(spec: &AircraftSpec, state: &PlanState, sites: &SiteRegistry) -> bool {
    let d_home = sites.distance_home(&state.loc, &spec.kind());
    state.fuel - d_home / spec.range_km(state.water) + EPS >= spec.pct_fuel_cutoff()
}

/// Walks a full action list from `start`, computing every event's schedule
/// and the service completion time of every strike it contains. Returns
/// `None` when any step is infeasible or the final state violates the
/// reserve rule.
pub fn walk(
    spec: &AircraftSpec,
    start: PlanState,
    actions: &[PlanAction],
    sites: &SiteRegistry,
    strikes: &StrikeArena,
) -> Option<PlanOutcome> {
    let mut state = start;
    let mut events = Vec::with_capacity(actions.len());
    let mut strike_times = Vec::new();
    for action in actions {
        let depart = state.time;
        state = advance(spec, &state, action, sites, strikes)?;
        if let Some(strike) = action.serviced_strike() {
            strike_times.push((strike, state.time));
        }
        events.push(PlannedEvent {
            action: action.clone(),
            start: depart,
            end: state.time,
        });
    }
    if !reserve_ok(spec, &state, sites) {
        return None;
    }
    Some(PlanOutcome {
        events,
        final_state: state,
        strike_times,
    })
}

fn advance_block(
    spec: &AircraftSpec,
    start: &PlanState,
    block: &[PlanAction],
    sites: &SiteRegistry,
    strikes: &StrikeArena,
) -> Option<PlanState> {
    let mut state = *start;
    for action in block {
        state = advance(spec, &state, action, sites, strikes)?;
    }
    Some(state)
}

/// Expands an ordered list of service actions into a complete feasible
/// plan, inserting water refills and refuel stops just in time and a
/// return-home refuel at the tail. Returns the plan together with its
/// walked schedule, or `None` when no feasible expansion exists.
pub fn ensure_feasible(
    spec: &AircraftSpec,
    start: PlanState,
    services: &[PlanAction],
    sites: &SiteRegistry,
    strikes: &StrikeArena,
) -> Option<(Vec<PlanAction>, PlanOutcome)> {
    let kind = spec.kind();
    let mut actions: Vec<PlanAction> = Vec::new();
    let mut state = start;
    for service in services {
        let mut block: Vec<PlanAction> = Vec::new();
        if matches!(service, PlanAction::Suppress { .. })
            && state.water + EPS < spec.water_per_suppression()
        {
            let need = (spec.water_per_suppression() - state.water).max(0.0);
            let tank = sites.nearest_tank_with_water(&state.loc, need, None, f64::INFINITY)?;
            block.push(PlanAction::RefillWaterAt { tank });
        }
        block.push(service.clone());

        let direct = advance_block(spec, &state, &block, sites, strikes)
            .filter(|next| reserve_ok(spec, next, sites));
        state = match direct {
            Some(next) => next,
            None => {
                // One refuel stop ahead of the block is the only repair
                // attempted; anything deeper means the strike is out of
                // reach for this craft.
                let base = sites.nearest_base(&state.loc, &kind)?;
                block.insert(0, PlanAction::RefuelAt { base });
                let next = advance_block(spec, &state, &block, sites, strikes)?;
                if !reserve_ok(spec, &next, sites) {
                    return None;
                }
                next
            }
        };
        actions.append(&mut block);
    }

    if !actions.is_empty() && !matches!(actions.last(), Some(PlanAction::RefuelAt { .. })) {
        if let Some(base) = sites.nearest_base(&state.loc, &kind) {
            actions.push(PlanAction::RefuelAt { base });
        }
    }

    let outcome = walk(spec, start, &actions, sites, strikes)?;
    Some((actions, outcome))
}
