use super::coordinator::Coordinator;
use super::queue::{EventQueue, SimEvent};
use crate::aircraft::Aircraft;
use crate::aircraft::plan::EPS;
use crate::registry::SiteRegistry;
use crate::strike::{StrikeArena, StrikeId};
use crate::swarm::SwarmController;

/// One scenario run: the fleet, the sites, the strike arena, both
/// coordinators, and the global event queue, advanced cooperatively on a
/// single thread until the stream is exhausted and every aircraft is idle.
#[derive(Debug)]
pub struct Simulation {
    clock: f64,
    queue: EventQueue,
    fleet: Vec<Aircraft>,
    sites: SiteRegistry,
    strikes: StrikeArena,
    uav_coordinator: Coordinator,
    wb_coordinator: Coordinator,
    swarm: Option<SwarmController>,
    uninspected: Vec<StrikeId>,
    unsuppressed: Vec<StrikeId>,
}

impl Simulation {
    pub fn new(
        fleet: Vec<Aircraft>,
        sites: SiteRegistry,
        strikes: StrikeArena,
        uav_coordinator: Coordinator,
        wb_coordinator: Coordinator,
        swarm: Option<SwarmController>,
    ) -> Self {
        Self {
            clock: 0.0,
            queue: EventQueue::new(),
            fleet,
            sites,
            strikes,
            uav_coordinator,
            wb_coordinator,
            swarm,
            uninspected: Vec::new(),
            unsuppressed: Vec::new(),
        }
    }

    pub fn clock(&self) -> f64 { self.clock }
    pub fn fleet(&self) -> &[Aircraft] { &self.fleet }
    pub fn sites(&self) -> &SiteRegistry { &self.sites }
    pub fn strikes(&self) -> &StrikeArena { &self.strikes }
    pub fn uninspected(&self) -> &[StrikeId] { &self.uninspected }
    pub fn unsuppressed(&self) -> &[StrikeId] { &self.unsuppressed }

    /// Runs the scenario to completion. Time only moves at event
    /// boundaries; replans triggered at time `t` finish before anything
    /// dated after `t` is popped.
    pub fn run(&mut self) {
        for strike in self.strikes.iter() {
            self.queue.push(
                strike.spawn_time(),
                SimEvent::StrikeSpawn {
                    strike: strike.id(),
                },
            );
        }
        if let Some(swarm) = &self.swarm {
            self.queue.push(swarm.dt_minutes(), SimEvent::ControllerTick);
        }
        while let Some((time, event)) = self.queue.pop_min() {
            if time + EPS < self.clock {
                fatal!("Event queue yielded time {time} behind the clock {}", self.clock);
            }
            self.clock = self.clock.max(time);
            self.handle(time, event);
        }
    }

    fn handle(&mut self, time: f64, event: SimEvent) {
        match event {
            SimEvent::StrikeSpawn { strike } => {
                event!("t={time:.1}: strike {strike} spawned");
                let assigned = self.uav_coordinator.process_new_strike(
                    strike,
                    time,
                    &mut self.fleet,
                    &self.sites,
                    &self.strikes,
                    &mut self.queue,
                );
                if !assigned {
                    warn!("Strike {strike} is out of reach of every UAV; leaving it uninspected");
                    self.uninspected.push(strike);
                }
            }
            SimEvent::Wakeup { aircraft, version } => {
                if self.fleet[aircraft].version() != version {
                    event!("t={time:.1}: superseded wakeup for aircraft {aircraft} dropped");
                    return;
                }
                let step =
                    self.fleet[aircraft].execute_next(time, &mut self.sites, &mut self.strikes);
                for strike in &step.abandoned {
                    warn!("Strike {strike} cannot be suppressed: no tank with water in reach");
                    self.unsuppressed.push(*strike);
                }
                if let Some(strike) = step.inspected {
                    if self.strikes.get(strike).ignited() {
                        let reported = self
                            .strikes
                            .get(strike)
                            .inspection_time()
                            .unwrap_or(time);
                        self.queue.push(reported, SimEvent::IgnitionReport { strike });
                    }
                }
                if let Some(at) = step.wake_at {
                    self.queue.push(
                        at,
                        SimEvent::Wakeup {
                            aircraft,
                            version: self.fleet[aircraft].version(),
                        },
                    );
                }
            }
            SimEvent::IgnitionReport { strike } => {
                event!("t={time:.1}: strike {strike} reported ignited");
                let assigned = self.wb_coordinator.process_new_strike(
                    strike,
                    time,
                    &mut self.fleet,
                    &self.sites,
                    &self.strikes,
                    &mut self.queue,
                );
                if !assigned {
                    warn!(
                        "Strike {strike} is out of reach of every water bomber; leaving it unsuppressed"
                    );
                    self.unsuppressed.push(strike);
                }
            }
            SimEvent::ControllerTick => {
                if !self.strikes_open() {
                    // Patrol work is over; let in-flight steps drain so the
                    // queue can empty.
                    return;
                }
                if let Some(swarm) = &self.swarm {
                    swarm.replan(
                        time,
                        &mut self.fleet,
                        &self.sites,
                        &self.strikes,
                        &mut self.queue,
                    );
                    self.queue.push(time + swarm.dt_minutes(), SimEvent::ControllerTick);
                }
            }
        }
    }

    /// Whether any strike still lacks a terminal outcome. Gates the
    /// controller tick chain so the queue can drain once the stream is
    /// exhausted.
    fn strikes_open(&self) -> bool {
        self.strikes.iter().any(|s| {
            let inspection_open =
                s.inspection_time().is_none() && !self.uninspected.contains(&s.id());
            let suppression_open = s.ignited()
                && s.inspection_time().is_some()
                && s.suppression_time().is_none()
                && !self.unsuppressed.contains(&s.id());
            inspection_open || suppression_open
        })
    }
}
