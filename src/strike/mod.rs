//! Lightning strikes: the arena of strike records and the time-ordered
//! stream they are released from.


use crate::geo::Location;
use rand::Rng;
use rand::rngs::StdRng;

pub type StrikeId = usize;

/// A raw strike row as read from the lightning input, before ids are
/// assigned and ignition outcomes are drawn.
#[derive(Debug, Clone)]
pub struct StrikeInput {
    pub loc: Location,
    pub spawn_time: f64,
    pub risk_rating: Option<f64>,
    pub ignited: Option<bool>,
    pub ignition_probability: Option<f64>,
}

/// One lightning strike.
///
/// Created at load and mutated exactly twice afterwards: once when a UAV
/// completes its inspection, and once more when a water bomber completes
/// suppression of an ignited strike.
#[derive(Debug, Clone)]
pub struct Strike {
    id: StrikeId,
    loc: Location,
    spawn_time: f64,
    ignited: bool,
    risk_rating: Option<f64>,
    inspection_time: Option<f64>,
    suppression_time: Option<f64>,
}

impl Strike {
    pub fn id(&self) -> StrikeId { self.id }
    pub fn loc(&self) -> &Location { &self.loc }
    pub fn spawn_time(&self) -> f64 { self.spawn_time }
    pub fn ignited(&self) -> bool { self.ignited }
    pub fn risk_rating(&self) -> Option<f64> { self.risk_rating }
    pub fn inspection_time(&self) -> Option<f64> { self.inspection_time }
    pub fn suppression_time(&self) -> Option<f64> { self.suppression_time }

    pub fn mark_inspected(&mut self, time: f64) {
        if self.inspection_time.is_some() {
            fatal!("Strike {} inspected twice", self.id);
        }
        if time + 1e-9 < self.spawn_time {
            fatal!("Strike {} inspected before it spawned", self.id);
        }
        self.inspection_time = Some(time);
    }

    pub fn mark_suppressed(&mut self, time: f64) {
        if !self.ignited || self.suppression_time.is_some() {
            fatal!("Strike {} suppression is out of order", self.id);
        }
        let inspected = self
            .inspection_time
            .unwrap_or_else(|| fatal!("Strike {} suppressed before inspection", self.id));
        if time + 1e-9 < inspected {
            fatal!("Strike {} suppressed before inspection completed", self.id);
        }
        self.suppression_time = Some(time);
    }
}

/// The arena of all strikes in one scenario, id-stable, ordered by spawn
/// time.
#[derive(Debug, Clone)]
pub struct StrikeArena {
    strikes: Vec<Strike>,
}

impl StrikeArena {
    /// Materialises the arena from input rows: rows are sorted by spawn
    /// time (stable, so file order breaks ties), ids are assigned in that
    /// order, and ignition outcomes missing from the input are drawn from
    /// `rng` so a fixed seed replays identically.
    pub fn materialise(
        mut inputs: Vec<StrikeInput>,
        default_ignition_probability: f64,
        rng: &mut StdRng,
    ) -> Self {
        inputs.sort_by(|a, b| a.spawn_time.total_cmp(&b.spawn_time));
        let strikes = inputs
            .into_iter()
            .enumerate()
            .map(|(id, input)| {
                let ignited = input.ignited.unwrap_or_else(|| {
                    let p = input
                        .ignition_probability
                        .unwrap_or(default_ignition_probability);
                    rng.random_bool(p.clamp(0.0, 1.0))
                });
                Strike {
                    id,
                    loc: input.loc,
                    spawn_time: input.spawn_time,
                    ignited,
                    risk_rating: input.risk_rating,
                    inspection_time: None,
                    suppression_time: None,
                }
            })
            .collect();
        Self { strikes }
    }

    pub fn len(&self) -> usize { self.strikes.len() }
    pub fn is_empty(&self) -> bool { self.strikes.is_empty() }
    pub fn get(&self, id: StrikeId) -> &Strike { &self.strikes[id] }
    pub fn get_mut(&mut self, id: StrikeId) -> &mut Strike { &mut self.strikes[id] }
    pub fn iter(&self) -> impl Iterator<Item = &Strike> { self.strikes.iter() }
}
