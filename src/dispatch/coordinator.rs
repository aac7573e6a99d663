use super::policy::{CoordinatorConfig, CoordinatorKind, Prioritisation, ServiceKind};
use super::queue::{EventQueue, SimEvent};
use crate::aircraft::plan::{EPS, PlanAction, ensure_feasible, walk};
use crate::aircraft::{Aircraft, AircraftKind};
use crate::registry::SiteRegistry;
use crate::strike::{Strike, StrikeArena, StrikeId};
use std::collections::HashMap;

/// One feasible placement of a strike into one aircraft's schedule,
/// scored under every metric the policies select on.
#[derive(Debug, Clone)]
struct Candidate {
    aircraft: usize,
    position: usize,
    actions: Vec<PlanAction>,
    /// Service completion time for the new strike.
    completion: f64,
    /// Sum of response-time increases inflicted on already-scheduled
    /// strikes.
    aggregate_delay: f64,
    /// `Σ w·Δt^p` over the carrier's strikes, new strike included.
    weighted_cost: f64,
    /// Worst resulting response time on the carrier, for the soft ceiling.
    worst_response: f64,
}

/// Assigns strikes to one fleet under a named policy.
///
/// The coordinator holds no aircraft references: it reads and rewrites
/// schedules through fleet indices, and every replan lands before any
/// later-dated event is popped.
#[derive(Debug)]
pub struct Coordinator {
    cfg: CoordinatorConfig,
    service: ServiceKind,
}

impl Coordinator {
    pub fn new(cfg: CoordinatorConfig, service: ServiceKind) -> Self {
        Self { cfg, service }
    }

    pub fn policy(&self) -> CoordinatorKind { self.cfg.policy }
    pub fn service(&self) -> ServiceKind { self.service }

    fn serves(&self, craft: &Aircraft) -> bool {
        match self.service {
            ServiceKind::Inspection => craft.kind() == AircraftKind::Uav,
            ServiceKind::Suppression => matches!(craft.kind(), AircraftKind::Bomber(_)),
        }
    }

    fn service_action(&self, strike: StrikeId) -> PlanAction {
        match self.service {
            ServiceKind::Inspection => PlanAction::Inspect { strike },
            ServiceKind::Suppression => PlanAction::Suppress { strike },
        }
    }

    /// The moment a strike's response clock starts for this fleet.
    fn reference_time(&self, strike: &Strike) -> f64 {
        match self.service {
            ServiceKind::Inspection => strike.spawn_time(),
            ServiceKind::Suppression => strike.inspection_time().unwrap_or(strike.spawn_time()),
        }
    }

    fn weighted_term(&self, strike: &Strike, delta: f64) -> f64 {
        let base = delta.max(0.0).powf(self.cfg.mean_time_power);
        let risk = strike.risk_rating().unwrap_or(1.0);
        match self.cfg.prioritisation {
            None => base,
            Some(Prioritisation::Product) => risk * base,
            Some(Prioritisation::Sum) => risk + base,
            Some(Prioritisation::RiskOnly) => risk,
        }
    }

    /// Places a new strike with this coordinator's fleet. Returns `false`
    /// when no feasible insertion exists anywhere; the strike then stays
    /// uninspected or unsuppressed with no aircraft-side fault.
    pub fn process_new_strike(
        &self,
        strike: StrikeId,
        now: f64,
        fleet: &mut [Aircraft],
        sites: &SiteRegistry,
        strikes: &StrikeArena,
        queue: &mut EventQueue,
    ) -> bool {
        let assigned = self.insert_strike(strike, now, fleet, sites, strikes, queue);
        if assigned && self.cfg.policy == CoordinatorKind::ReprocessMaxTime {
            self.reprocess_worst(now, fleet, sites, strikes, queue);
        }
        assigned
    }

    fn insert_strike(
        &self,
        strike: StrikeId,
        now: f64,
        fleet: &mut [Aircraft],
        sites: &SiteRegistry,
        strikes: &StrikeArena,
        queue: &mut EventQueue,
    ) -> bool {
        let mut candidates = Vec::new();
        for craft in fleet.iter().filter(|c| self.serves(c)) {
            candidates.extend(self.candidates_for(craft, strike, now, sites, strikes));
        }
        let Some(best) = self.select(candidates) else {
            return false;
        };
        self.commit(&best, now, fleet, sites, strikes, queue);
        true
    }

    fn candidates_for(
        &self,
        craft: &Aircraft,
        strike: StrikeId,
        now: f64,
        sites: &SiteRegistry,
        strikes: &StrikeArena,
    ) -> Vec<Candidate> {
        let state = craft.planning_state(now);
        let services = craft.pending_services();
        let old_times: HashMap<StrikeId, f64> = self
            .current_responses(craft, now, sites, strikes)
            .into_iter()
            .collect();

        let positions: Vec<usize> = if self.cfg.policy == CoordinatorKind::Simple {
            vec![services.len()]
        } else {
            (0..=services.len()).collect()
        };

        let mut out = Vec::new();
        for k in positions {
            let mut plan = services.clone();
            plan.insert(k, self.service_action(strike));
            let Some((actions, outcome)) =
                ensure_feasible(craft.spec(), state, &plan, sites, strikes)
            else {
                continue;
            };

            let mut completion = f64::INFINITY;
            let mut aggregate_delay = 0.0;
            let mut weighted_cost = 0.0;
            let mut worst_response = 0.0_f64;
            for (sid, t) in &outcome.strike_times {
                let s = strikes.get(*sid);
                let response = t - self.reference_time(s);
                worst_response = worst_response.max(response);
                if *sid == strike {
                    completion = *t;
                    weighted_cost += self.weighted_term(s, response);
                } else {
                    let delta = old_times.get(sid).map_or(0.0, |old| (response - old).max(0.0));
                    aggregate_delay += delta;
                    weighted_cost += self.weighted_term(s, delta);
                }
            }
            out.push(Candidate {
                aircraft: craft.id(),
                position: k,
                actions,
                completion,
                aggregate_delay,
                weighted_cost,
                worst_response,
            });
        }
        out
    }

    /// Response times the craft's committed schedule already promises, in
    /// plan order so downstream scans stay deterministic.
    fn current_responses(
        &self,
        craft: &Aircraft,
        now: f64,
        sites: &SiteRegistry,
        strikes: &StrikeArena,
    ) -> Vec<(StrikeId, f64)> {
        let state = craft.planning_state(now);
        let actions = craft.queued_actions();
        walk(craft.spec(), state, &actions, sites, strikes)
            .map(|outcome| {
                outcome
                    .strike_times
                    .iter()
                    .map(|(sid, t)| (*sid, t - self.reference_time(strikes.get(*sid))))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn select(&self, candidates: Vec<Candidate>) -> Option<Candidate> {
        let ceiling = self.cfg.target_max_response;
        candidates.into_iter().min_by(|a, b| match self.cfg.policy {
            CoordinatorKind::Simple => a
                .completion
                .total_cmp(&b.completion)
                .then(a.aircraft.cmp(&b.aircraft)),
            CoordinatorKind::Insertion => a
                .completion
                .total_cmp(&b.completion)
                .then(a.aggregate_delay.total_cmp(&b.aggregate_delay))
                .then(a.aircraft.cmp(&b.aircraft))
                .then(a.position.cmp(&b.position)),
            CoordinatorKind::MinimiseMeanTime | CoordinatorKind::ReprocessMaxTime => {
                let a_over = a.worst_response > ceiling + EPS;
                let b_over = b.worst_response > ceiling + EPS;
                a_over
                    .cmp(&b_over)
                    .then(a.weighted_cost.total_cmp(&b.weighted_cost))
                    .then(a.aircraft.cmp(&b.aircraft))
                    .then(a.position.cmp(&b.position))
            }
        })
    }

    fn commit(
        &self,
        candidate: &Candidate,
        now: f64,
        fleet: &mut [Aircraft],
        sites: &SiteRegistry,
        strikes: &StrikeArena,
        queue: &mut EventQueue,
    ) {
        let craft = &mut fleet[candidate.aircraft];
        if let Some((time, version)) = craft.replace_plan(&candidate.actions, now, sites, strikes) {
            queue.push(
                time,
                SimEvent::Wakeup {
                    aircraft: candidate.aircraft,
                    version,
                },
            );
        }
    }

    /// Pulls the scheduled strike with the worst promised response out of
    /// its carrier and re-inserts it under the minimise-mean-time rule.
    /// Runs once per new strike, so the pass terminates.
    fn reprocess_worst(
        &self,
        now: f64,
        fleet: &mut [Aircraft],
        sites: &SiteRegistry,
        strikes: &StrikeArena,
        queue: &mut EventQueue,
    ) {
        let mut worst: Option<(f64, StrikeId, usize)> = None;
        for craft in fleet.iter().filter(|c| self.serves(c)) {
            for (sid, response) in self.current_responses(craft, now, sites, strikes) {
                if worst.is_none_or(|(r, ..)| response > r + EPS) {
                    worst = Some((response, sid, craft.id()));
                }
            }
        }
        let Some((_, worst_strike, owner)) = worst else {
            return;
        };

        let original = fleet[owner].pending_services();
        let reduced: Vec<PlanAction> = original
            .iter()
            .filter(|a| a.serviced_strike() != Some(worst_strike))
            .cloned()
            .collect();
        if reduced.len() == original.len() {
            return;
        }
        let state = fleet[owner].planning_state(now);
        let Some((reduced_actions, _)) =
            ensure_feasible(fleet[owner].spec(), state, &reduced, sites, strikes)
        else {
            return;
        };
        self.commit(
            &Candidate {
                aircraft: owner,
                position: 0,
                actions: reduced_actions,
                completion: 0.0,
                aggregate_delay: 0.0,
                weighted_cost: 0.0,
                worst_response: 0.0,
            },
            now,
            fleet,
            sites,
            strikes,
            queue,
        );

        if !self.insert_strike(worst_strike, now, fleet, sites, strikes, queue) {
            // Nowhere better to put it: restore the original schedule.
            let owner_state = fleet[owner].planning_state(now);
            if let Some((actions, _)) =
                ensure_feasible(fleet[owner].spec(), owner_state, &original, sites, strikes)
            {
                if let Some((time, version)) =
                    fleet[owner].replace_plan(&actions, now, sites, strikes)
                {
                    queue.push(time, SimEvent::Wakeup { aircraft: owner, version });
                }
            }
        }
    }
}
