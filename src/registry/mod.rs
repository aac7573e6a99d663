//! Static refuel and rearm sites: bases and shared water tanks.


use crate::aircraft::AircraftKind;
use crate::geo::Location;
use std::collections::BTreeSet;

const EPS: f64 = 1e-9;

/// A refuel site with unlimited fuel.
///
/// A base in the water-bomber registry admits either every bomber kind
/// (`kinds` is `None`) or the kinds it is tagged with. UAV bases admit any
/// UAV and carry no tags.
#[derive(Debug, Clone)]
pub struct Base {
    loc: Location,
    kinds: Option<BTreeSet<String>>,
}

impl Base {
    pub fn any_kind(loc: Location) -> Self { Self { loc, kinds: None } }

    pub fn for_kinds(loc: Location, kinds: BTreeSet<String>) -> Self {
        Self {
            loc,
            kinds: Some(kinds),
        }
    }

    pub fn loc(&self) -> &Location { &self.loc }

    pub fn admits(&self, kind: &AircraftKind) -> bool {
        match (&self.kinds, kind) {
            (None, _) => true,
            (Some(_), AircraftKind::Uav) => false,
            (Some(set), AircraftKind::Bomber(name)) => set.contains(name.as_str()),
        }
    }
}

/// A shared water source with a finite or unlimited capacity.
#[derive(Debug, Clone)]
pub struct WaterTank {
    loc: Location,
    capacity: f64,
    level: f64,
}

impl WaterTank {
    pub fn new(loc: Location, capacity: f64) -> Self {
        Self {
            loc,
            capacity,
            level: capacity,
        }
    }

    pub fn loc(&self) -> &Location { &self.loc }
    pub fn capacity(&self) -> f64 { self.capacity }
    pub fn level(&self) -> f64 { self.level }
    pub fn has_water(&self) -> bool { self.level > EPS }

    /// Debits up to `amount` litres and returns what was actually drawn.
    /// The level never goes negative; an infinite tank never depletes.
    pub fn take(&mut self, amount: f64) -> f64 {
        if self.capacity.is_infinite() {
            return amount;
        }
        let drawn = amount.min(self.level).max(0.0);
        self.level -= drawn;
        drawn
    }
}

/// The registries of refuel bases and water tanks for one scenario.
#[derive(Debug, Clone)]
pub struct SiteRegistry {
    uav_bases: Vec<Base>,
    bomber_bases: Vec<Base>,
    tanks: Vec<WaterTank>,
}

impl SiteRegistry {
    pub fn new(uav_bases: Vec<Base>, bomber_bases: Vec<Base>, tanks: Vec<WaterTank>) -> Self {
        Self {
            uav_bases,
            bomber_bases,
            tanks,
        }
    }

    pub fn tanks(&self) -> &[WaterTank] { &self.tanks }
    pub fn tank(&self, id: usize) -> &WaterTank { &self.tanks[id] }
    pub fn tank_mut(&mut self, id: usize) -> &mut WaterTank { &mut self.tanks[id] }

    pub fn base_for(&self, kind: &AircraftKind, id: usize) -> &Base {
        match kind {
            AircraftKind::Uav => &self.uav_bases[id],
            AircraftKind::Bomber(_) => &self.bomber_bases[id],
        }
    }

    /// Index of the closest base admitting `kind`, ties to the lowest index.
    pub fn nearest_base(&self, loc: &Location, kind: &AircraftKind) -> Option<usize> {
        let pool = match kind {
            AircraftKind::Uav => &self.uav_bases,
            AircraftKind::Bomber(_) => &self.bomber_bases,
        };
        let mut best: Option<(usize, f64)> = None;
        for (i, base) in pool.iter().enumerate() {
            if !base.admits(kind) {
                continue;
            }
            let d = loc.distance_to(base.loc());
            if best.is_none_or(|(_, b)| d < b) {
                best = Some((i, d));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Index of the closest tank holding at least `min_level` litres,
    /// optionally excluding one tank and capping the leg distance.
    pub fn nearest_tank_with_water(
        &self,
        loc: &Location,
        min_level: f64,
        exclude: Option<usize>,
        max_distance: f64,
    ) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, tank) in self.tanks.iter().enumerate() {
            if Some(i) == exclude || tank.level() + EPS < min_level {
                continue;
            }
            let d = loc.distance_to(tank.loc());
            if d > max_distance {
                continue;
            }
            if best.is_none_or(|(_, b)| d < b) {
                best = Some((i, d));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Distance from `loc` to the nearest base admitting `kind`, or zero
    /// when no base exists (nothing to preserve reserve for).
    pub fn distance_home(&self, loc: &Location, kind: &AircraftKind) -> f64 {
        self.nearest_base(loc, kind)
            .map_or(0.0, |i| loc.distance_to(self.base_for(kind, i).loc()))
    }

    pub fn uav_bases(&self) -> &[Base] { &self.uav_bases }
    pub fn bomber_bases(&self) -> &[Base] { &self.bomber_bases }
}
