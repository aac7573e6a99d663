//! The idle-UAV force controller: unassigned UAVs drift on an
//! attraction/repulsion field inside a patrol boundary, stepped every
//! controller tick.

#[cfg(test)]
mod tests;

use crate::aircraft::plan::{GoToReason, PlanAction, PlanState, reserve_ok, walk};
use crate::aircraft::{Aircraft, AircraftKind};
use crate::dispatch::{EventQueue, SimEvent};
use crate::geo::{Boundary, EARTH_RADIUS_KM, Location};
use crate::registry::SiteRegistry;
use crate::strike::StrikeArena;
use std::collections::BTreeMap;

const KM_PER_DEG: f64 = EARTH_RADIUS_KM * std::f64::consts::PI / 180.0;
/// Distances below this contribute no force; the power laws blow up at
/// zero range.
const MIN_RANGE_KM: f64 = 1e-6;

/// A patrol attractor with its active time window.
#[derive(Debug, Clone)]
pub struct SwarmTarget {
    pub loc: Location,
    pub start_time: f64,
    /// May be infinite for an open-ended target.
    pub finish_time: f64,
}

/// Grid-cell strike forecasting: cells of roughly `radius_km` holding at
/// least `min_in_target` strikes inside the look-ahead window become
/// additional attractors.
#[derive(Debug, Clone)]
pub struct ForecastConfig {
    pub radius_km: f64,
    pub min_in_target: usize,
    /// Look-ahead window in minutes.
    pub look_ahead: f64,
}

#[derive(Debug, Clone)]
pub struct SwarmConfig {
    pub targets: Vec<SwarmTarget>,
    pub boundary: Boundary,
    /// Controller period in minutes.
    pub dt: f64,
    pub uav_repulsion_const: f64,
    pub uav_repulsion_power: f64,
    pub boundary_repulsion_const: f64,
    pub boundary_repulsion_power: f64,
    pub target_attraction_const: f64,
    pub target_attraction_power: f64,
    pub centre: Location,
    pub forecasting: Option<ForecastConfig>,
}

/// Re-plans every idle UAV once per tick. Busy aircraft and water bombers
/// are never touched.
#[derive(Debug)]
pub struct SwarmController {
    cfg: SwarmConfig,
}

impl SwarmController {
    pub fn new(cfg: SwarmConfig) -> Self { Self { cfg } }

    pub fn dt_minutes(&self) -> f64 { self.cfg.dt }

    pub fn boundary(&self) -> &Boundary { &self.cfg.boundary }

    pub fn replan(
        &self,
        now: f64,
        fleet: &mut [Aircraft],
        sites: &SiteRegistry,
        strikes: &StrikeArena,
        queue: &mut EventQueue,
    ) {
        let uav_positions: Vec<(usize, Location)> = fleet
            .iter()
            .filter(|c| c.kind() == AircraftKind::Uav)
            .map(|c| (c.id(), c.position_at(now)))
            .collect();
        let attractors = self.attractors(now, strikes);

        for i in 0..fleet.len() {
            if fleet[i].kind() != AircraftKind::Uav || !fleet[i].is_idle(now) {
                continue;
            }
            let actions = self.step_for(&fleet[i], now, &uav_positions, &attractors, sites, strikes);
            if let Some((time, version)) = fleet[i].replace_plan(&actions, now, sites, strikes) {
                queue.push(time, SimEvent::Wakeup { aircraft: i, version });
            }
        }
    }

    fn step_for(
        &self,
        craft: &Aircraft,
        now: f64,
        uav_positions: &[(usize, Location)],
        attractors: &[Location],
        sites: &SiteRegistry,
        strikes: &StrikeArena,
    ) -> Vec<PlanAction> {
        let loc = *craft.loc();
        let state = PlanState {
            time: now,
            loc,
            fuel: craft.fuel(),
            water: craft.water(),
        };

        // Loitering is free of fuel, but a craft past its cutoff must top
        // up before it may keep drifting.
        if !reserve_ok(craft.spec(), &state, sites) {
            if let Some(base) = sites.nearest_base(&loc, &AircraftKind::Uav) {
                return vec![PlanAction::RefuelAt { base }];
            }
            return vec![PlanAction::Hover { until: now + self.cfg.dt }];
        }

        // A stray craft heads straight back to the configured centre.
        if !self.cfg.boundary.contains(&loc) {
            let go_centre = vec![PlanAction::GoTo {
                loc: self.cfg.centre,
                reason: GoToReason::Reposition,
            }];
            if walk(craft.spec(), state, &go_centre, sites, strikes).is_some() {
                return go_centre;
            }
            return vec![PlanAction::Hover { until: now + self.cfg.dt }];
        }

        let (fx, fy) = self.force_at(&loc, craft.id(), uav_positions, attractors);
        let step_km = (fx * fx + fy * fy).sqrt() * self.cfg.dt;
        let hover = vec![PlanAction::Hover { until: now + self.cfg.dt }];
        if step_km < MIN_RANGE_KM {
            return hover;
        }
        let bearing = fx.atan2(fy).to_degrees().rem_euclid(360.0);
        let dest = loc.destination(bearing, step_km);
        if !self.cfg.boundary.contains(&dest) {
            return hover;
        }
        let reach_km = step_km.min(craft.spec().speed_km_per_min() * self.cfg.dt);
        let step = vec![PlanAction::GoTo {
            loc: loc.destination(bearing, reach_km),
            reason: GoToReason::SwarmStep,
        }];
        if walk(craft.spec(), state, &step, sites, strikes).is_some() {
            step
        } else {
            hover
        }
    }

    /// Net field at `loc` in local east/north km-per-minute components.
    fn force_at(
        &self,
        loc: &Location,
        craft_id: usize,
        uav_positions: &[(usize, Location)],
        attractors: &[Location],
    ) -> (f64, f64) {
        let mut fx = 0.0;
        let mut fy = 0.0;
        for target in attractors {
            let (dx, dy, r) = offset_km(loc, target);
            if r < MIN_RANGE_KM {
                continue;
            }
            let mag = self.cfg.target_attraction_const * r.powf(self.cfg.target_attraction_power);
            fx += mag * dx / r;
            fy += mag * dy / r;
        }
        for (other, pos) in uav_positions {
            if *other == craft_id {
                continue;
            }
            let (dx, dy, r) = offset_km(loc, pos);
            if r < MIN_RANGE_KM {
                continue;
            }
            let mag = self.cfg.uav_repulsion_const * r.powf(self.cfg.uav_repulsion_power);
            fx -= mag * dx / r;
            fy -= mag * dy / r;
        }
        let edge = self.cfg.boundary.nearest_boundary_point(loc);
        let (dx, dy, r) = offset_km(loc, &edge);
        if r >= MIN_RANGE_KM {
            let mag = self.cfg.boundary_repulsion_const * r.powf(self.cfg.boundary_repulsion_power);
            fx -= mag * dx / r;
            fy -= mag * dy / r;
        }
        (fx, fy)
    }

    /// The currently active attractors: configured targets inside their
    /// time windows plus any forecast grid cells.
    fn attractors(&self, now: f64, strikes: &StrikeArena) -> Vec<Location> {
        let mut out: Vec<Location> = self
            .cfg
            .targets
            .iter()
            .filter(|t| t.start_time <= now && now <= t.finish_time)
            .map(|t| t.loc)
            .collect();
        if let Some(forecast) = &self.cfg.forecasting {
            out.extend(self.forecast_cells(now, forecast, strikes));
        }
        out
    }

    fn forecast_cells(
        &self,
        now: f64,
        forecast: &ForecastConfig,
        strikes: &StrikeArena,
    ) -> Vec<Location> {
        let lat_step = forecast.radius_km / KM_PER_DEG;
        let lon_scale = self.cfg.centre.lat().to_radians().cos().max(1e-6);
        let lon_step = forecast.radius_km / (KM_PER_DEG * lon_scale);
        let mut cells: BTreeMap<(i64, i64), usize> = BTreeMap::new();
        for strike in strikes.iter() {
            let t = strike.spawn_time();
            if t <= now || t > now + forecast.look_ahead {
                continue;
            }
            let key = (
                (strike.loc().lat() / lat_step).floor() as i64,
                (strike.loc().lon() / lon_step).floor() as i64,
            );
            *cells.entry(key).or_insert(0) += 1;
        }
        cells
            .into_iter()
            .filter(|(_, count)| *count >= forecast.min_in_target)
            .map(|((la, lo), _)| {
                Location::new(
                    (la as f64 + 0.5) * lat_step,
                    (lo as f64 + 0.5) * lon_step,
                )
            })
            .collect()
    }
}

/// East/north offset of `to` from `from` in kilometres, plus its length,
/// on a flat local projection.
fn offset_km(from: &Location, to: &Location) -> (f64, f64, f64) {
    let scale = from.lat().to_radians().cos();
    let dx = (to.lon() - from.lon()) * scale * KM_PER_DEG;
    let dy = (to.lat() - from.lat()) * KM_PER_DEG;
    (dx, dy, (dx * dx + dy * dy).sqrt())
}
