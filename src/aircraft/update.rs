use super::attributes::AircraftKind;
use super::status::AircraftStatus;
use crate::geo::Location;

/// One row of an aircraft's append-only event log, emitted at every event
/// transition.
#[derive(Debug, Clone)]
pub struct EventUpdate {
    pub aircraft_id: usize,
    pub kind: AircraftKind,
    pub loc: Location,
    /// Completion time of the transition, simulated minutes.
    pub time: f64,
    /// Cumulative kilometres flown on legs.
    pub distance_travelled: f64,
    /// Cumulative kilometres loitered while hovering.
    pub distance_hovered: f64,
    /// Fuel fraction in `[0, 1]` after the transition.
    pub fuel: f64,
    /// Kilometres the remaining fuel buys at the current load.
    pub range_km: f64,
    /// Litres of water onboard (zero for UAVs).
    pub water: f64,
    pub status: AircraftStatus,
    /// Compact rendering of the still-queued events.
    pub next_updates: String,
}
