use super::attributes::{AircraftKind, AircraftSpec};
use super::plan::{EPS, PlanAction, PlanState, PlannedEvent, action_target, walk};
use super::status::AircraftStatus;
use super::update::EventUpdate;
use crate::geo::{Location, position_at};
use crate::registry::SiteRegistry;
use crate::strike::{StrikeArena, StrikeId};
use itertools::Itertools;
use std::collections::VecDeque;

/// The travel portion of the most recent event, kept so positions can be
/// interpolated mid-flight.
#[derive(Debug, Clone)]
struct Leg {
    from: Location,
    to: Location,
    depart: f64,
    arrive: f64,
}

/// What one advancement step produced, for the scheduler to act on.
#[derive(Debug, Default)]
pub struct StepResult {
    /// When the craft finishes the event it just started, if it started one.
    pub wake_at: Option<f64>,
    pub inspected: Option<StrikeId>,
    pub suppressed: Option<StrikeId>,
    /// Strikes whose suppression had to be abandoned because no tank with
    /// water remained in reach.
    pub abandoned: Vec<StrikeId>,
}

/// One aircraft: its attribute bundle, dynamic state, task queue, and
/// append-only event log.
#[derive(Debug)]
pub struct Aircraft {
    id: usize,
    spec: AircraftSpec,
    loc: Location,
    fuel: f64,
    water: f64,
    queue: VecDeque<PlannedEvent>,
    version: u64,
    status: AircraftStatus,
    idle_since: f64,
    busy_until: Option<f64>,
    leg: Option<Leg>,
    log: Vec<EventUpdate>,
    dist_travelled: f64,
    dist_hovered: f64,
}

impl Aircraft {
    pub fn new(id: usize, spec: AircraftSpec, loc: Location, initial_fuel: f64) -> Self {
        let water = spec.water_capacity();
        Self {
            id,
            spec,
            loc,
            fuel: initial_fuel.clamp(0.0, 1.0),
            water,
            queue: VecDeque::new(),
            version: 0,
            status: AircraftStatus::Idle,
            idle_since: 0.0,
            busy_until: None,
            leg: None,
            log: Vec::new(),
            dist_travelled: 0.0,
            dist_hovered: 0.0,
        }
    }

    pub fn id(&self) -> usize { self.id }
    pub fn spec(&self) -> &AircraftSpec { &self.spec }
    pub fn kind(&self) -> AircraftKind { self.spec.kind() }
    pub fn loc(&self) -> &Location { &self.loc }
    pub fn fuel(&self) -> f64 { self.fuel }
    pub fn water(&self) -> f64 { self.water }
    pub fn status(&self) -> AircraftStatus { self.status }
    pub fn version(&self) -> u64 { self.version }
    pub fn log(&self) -> &[EventUpdate] { &self.log }
    pub fn queue(&self) -> &VecDeque<PlannedEvent> { &self.queue }
    pub fn idle_since(&self) -> f64 { self.idle_since }

    pub fn is_busy(&self, now: f64) -> bool {
        self.busy_until.is_some_and(|t| t > now + EPS)
    }

    /// Idle means nothing queued and nothing executing: the craft is free
    /// for the force controller, and its silence counts towards
    /// termination.
    pub fn is_idle(&self, now: f64) -> bool {
        self.queue.is_empty() && !self.is_busy(now)
    }

    /// Interpolated position at `t`, honouring the current travel leg.
    pub fn position_at(&self, t: f64) -> Location {
        if let Some(leg) = &self.leg {
            if t < leg.arrive {
                return position_at(&leg.from, &leg.to, leg.depart, leg.arrive, t);
            }
        }
        self.loc
    }

    /// The state a plan must start from: the craft as it will be once its
    /// in-flight event completes, or as it stands now when free.
    pub fn planning_state(&self, now: f64) -> PlanState {
        let time = match self.busy_until {
            Some(t) if t > now => t,
            _ => now,
        };
        PlanState {
            time,
            loc: self.loc,
            fuel: self.fuel,
            water: self.water,
        }
    }

    /// Every queued action in order, as committed.
    pub fn queued_actions(&self) -> Vec<PlanAction> {
        self.queue.iter().map(|e| e.action.clone()).collect()
    }

    /// The service actions still queued, in order, stripped of the refuel
    /// and refill stops the planner manages itself.
    pub fn pending_services(&self) -> Vec<PlanAction> {
        self.queue
            .iter()
            .filter(|e| e.action.is_service())
            .map(|e| e.action.clone())
            .collect()
    }

    /// Replaces the pending queue with a freshly walked plan. Returns a
    /// wakeup to schedule when the craft is free now; a busy craft picks
    /// the new plan up through its already-pending completion.
    pub fn replace_plan(
        &mut self,
        actions: &[PlanAction],
        now: f64,
        sites: &SiteRegistry,
        strikes: &StrikeArena,
    ) -> Option<(f64, u64)> {
        let state = self.planning_state(now);
        let outcome = walk(&self.spec, state, actions, sites, strikes)
            .unwrap_or_else(|| fatal!("Aircraft {} was committed an infeasible plan", self.id));
        self.queue = outcome.events.into();
        if self.is_busy(now) {
            None
        } else {
            self.version += 1;
            Some((now, self.version))
        }
    }

    /// Advances the state machine by one event: travel to the event's
    /// location, perform it, log one record. Dry tanks re-route to the
    /// next-nearest tank with water; when none is in reach the dependent
    /// suppression is abandoned and the queue moves on.
    pub fn execute_next(
        &mut self,
        now: f64,
        sites: &mut SiteRegistry,
        strikes: &mut StrikeArena,
    ) -> StepResult {
        let mut result = StepResult::default();
        loop {
            let Some(event) = self.queue.pop_front() else {
                self.status = AircraftStatus::Idle;
                self.idle_since = now;
                self.busy_until = None;
                return result;
            };
            match &event.action {
                PlanAction::RefillWaterAt { tank } if !sites.tank(*tank).has_water() => {
                    let reach = self.fuel * self.spec.range_km(self.water);
                    match sites.nearest_tank_with_water(&self.loc, EPS, Some(*tank), reach) {
                        Some(next_tank) => {
                            self.queue.push_front(PlannedEvent {
                                action: PlanAction::RefillWaterAt { tank: next_tank },
                                start: now,
                                end: now,
                            });
                        }
                        None => self.abandon_next_suppression(&mut result),
                    }
                    continue;
                }
                PlanAction::Suppress { strike }
                    if self.water + EPS < self.spec.water_per_suppression() =>
                {
                    let strike = *strike;
                    let need = (self.spec.water_per_suppression() - self.water).max(0.0);
                    let reach = self.fuel * self.spec.range_km(self.water);
                    match sites.nearest_tank_with_water(&self.loc, need, None, reach) {
                        Some(tank) => {
                            self.queue.push_front(event);
                            self.queue.push_front(PlannedEvent {
                                action: PlanAction::RefillWaterAt { tank },
                                start: now,
                                end: now,
                            });
                        }
                        None => result.abandoned.push(strike),
                    }
                    continue;
                }
                _ => {}
            }
            return self.perform(event.action, now, sites, strikes, result);
        }
    }

    fn abandon_next_suppression(&mut self, result: &mut StepResult) {
        if let Some(pos) = self
            .queue
            .iter()
            .position(|e| matches!(e.action, PlanAction::Suppress { .. }))
        {
            if let Some(PlanAction::Suppress { strike }) = self.queue.remove(pos).map(|e| e.action)
            {
                result.abandoned.push(strike);
            }
        }
    }

    fn perform(
        &mut self,
        action: PlanAction,
        now: f64,
        sites: &mut SiteRegistry,
        strikes: &mut StrikeArena,
        mut result: StepResult,
    ) -> StepResult {
        let mut t = now;
        self.leg = None;
        if let Some(target) = action_target(&self.spec, &action, sites, strikes) {
            let d = self.loc.distance_to(&target);
            if d > 0.0 {
                self.fuel -= d / self.spec.range_km(self.water);
                if self.fuel < -EPS {
                    fatal!("Aircraft {} ran dry executing {action}", self.id);
                }
                self.fuel = self.fuel.max(0.0);
                let arrive = t + d / self.spec.speed_km_per_min();
                self.leg = Some(Leg {
                    from: self.loc,
                    to: target,
                    depart: t,
                    arrive,
                });
                self.dist_travelled += d;
                self.loc = target;
                t = arrive;
            }
        }
        let (status, end) = match &action {
            PlanAction::GoTo { .. } => (AircraftStatus::Travelling, t),
            PlanAction::Inspect { strike } => {
                let end = t + self.spec.service_time();
                strikes.get_mut(*strike).mark_inspected(end);
                result.inspected = Some(*strike);
                (AircraftStatus::Inspecting, end)
            }
            PlanAction::Suppress { strike } => {
                self.water = (self.water - self.spec.water_per_suppression()).max(0.0);
                let end = t + self.spec.service_time();
                strikes.get_mut(*strike).mark_suppressed(end);
                result.suppressed = Some(*strike);
                (AircraftStatus::Suppressing, end)
            }
            PlanAction::RefuelAt { .. } => {
                let end = t + self.spec.fuel_refill_time();
                self.fuel = 1.0;
                (AircraftStatus::Refuelling, end)
            }
            PlanAction::RefillWaterAt { tank } => {
                let drawn = sites.tank_mut(*tank).take(self.spec.water_capacity() - self.water);
                self.water = (self.water + drawn).min(self.spec.water_capacity());
                let end = t + self.spec.water_refill_time();
                (AircraftStatus::RefillingWater, end)
            }
            PlanAction::Hover { until } => {
                let end = t.max(*until);
                self.dist_hovered += self.spec.speed_km_per_min() * (end - t);
                (AircraftStatus::Hovering, end)
            }
        };
        if self.fuel > 1.0 + EPS {
            fatal!("Aircraft {} fuel fraction {} out of bounds", self.id, self.fuel);
        }
        self.status = status;
        self.busy_until = Some(end);
        self.log.push(EventUpdate {
            aircraft_id: self.id,
            kind: self.kind(),
            loc: self.loc,
            time: end,
            distance_travelled: self.dist_travelled,
            distance_hovered: self.dist_hovered,
            fuel: self.fuel,
            range_km: self.fuel * self.spec.range_km(self.water),
            water: self.water,
            status,
            next_updates: self.queue.iter().map(|e| e.action.to_string()).join(" / "),
        });
        result.wake_at = Some(end);
        result
    }
}
