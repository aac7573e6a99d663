use std::fmt::{Display, Formatter};

/// Which fleet an aircraft belongs to. Water-bomber kinds carry the name
/// they were configured under, which is also what base admission tags
/// match against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AircraftKind {
    Uav,
    Bomber(String),
}

impl Display for AircraftKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AircraftKind::Uav => write!(f, "uav"),
            AircraftKind::Bomber(name) => write!(f, "{name}"),
        }
    }
}

/// Performance attributes of an inspection UAV.
#[derive(Debug, Clone)]
pub struct UavAttributes {
    /// Cruise speed in km/h.
    pub flight_speed: f64,
    /// Minutes spent refuelling at a base.
    pub fuel_refill_time: f64,
    /// Range on a full tank, in km. One unit of fuel fraction buys this
    /// many kilometres.
    pub range: f64,
    /// Minutes spent inspecting a strike on arrival.
    pub inspection_time: f64,
    /// Fuel fraction the craft must preserve to reach its next refuel base.
    pub pct_fuel_cutoff: f64,
}

/// Performance attributes of a water bomber of one kind.
#[derive(Debug, Clone)]
pub struct BomberAttributes {
    pub flight_speed: f64,
    /// Minutes spent bombing a strike on arrival.
    pub suppression_time: f64,
    /// Minutes spent filling up at a water tank.
    pub water_refill_time: f64,
    pub fuel_refill_time: f64,
    /// Litres dropped per suppression.
    pub water_per_suppression: f64,
    /// Range on a full tank with no water onboard, in km.
    pub range_empty: f64,
    /// Range on a full tank while carrying water, in km.
    pub range_under_load: f64,
    /// Litres of water the craft can carry.
    pub water_capacity: f64,
    pub pct_fuel_cutoff: f64,
}

/// The tagged attribute bundle of one aircraft. Service behaviour is
/// dispatched on the variant; everything else reads through the common
/// accessors below.
#[derive(Debug, Clone)]
pub enum AircraftSpec {
    Uav(UavAttributes),
    Bomber { kind: String, attrs: BomberAttributes },
}

impl AircraftSpec {
    pub fn kind(&self) -> AircraftKind {
        match self {
            AircraftSpec::Uav(_) => AircraftKind::Uav,
            AircraftSpec::Bomber { kind, .. } => AircraftKind::Bomber(kind.clone()),
        }
    }

    pub fn is_bomber(&self) -> bool { matches!(self, AircraftSpec::Bomber { .. }) }

    pub fn flight_speed(&self) -> f64 {
        match self {
            AircraftSpec::Uav(a) => a.flight_speed,
            AircraftSpec::Bomber { attrs, .. } => attrs.flight_speed,
        }
    }

    /// Cruise speed in km per simulated minute.
    pub fn speed_km_per_min(&self) -> f64 { self.flight_speed() / 60.0 }

    pub fn fuel_refill_time(&self) -> f64 {
        match self {
            AircraftSpec::Uav(a) => a.fuel_refill_time,
            AircraftSpec::Bomber { attrs, .. } => attrs.fuel_refill_time,
        }
    }

    pub fn pct_fuel_cutoff(&self) -> f64 {
        match self {
            AircraftSpec::Uav(a) => a.pct_fuel_cutoff,
            AircraftSpec::Bomber { attrs, .. } => attrs.pct_fuel_cutoff,
        }
    }

    /// Kilometres one full tank buys with `water` litres onboard. Bombers
    /// fly shorter under load.
    pub fn range_km(&self, water: f64) -> f64 {
        match self {
            AircraftSpec::Uav(a) => a.range,
            AircraftSpec::Bomber { attrs, .. } => {
                if water > 1e-9 {
                    attrs.range_under_load
                } else {
                    attrs.range_empty
                }
            }
        }
    }

    /// Minutes the craft spends servicing a strike: inspection for UAVs,
    /// suppression for bombers.
    pub fn service_time(&self) -> f64 {
        match self {
            AircraftSpec::Uav(a) => a.inspection_time,
            AircraftSpec::Bomber { attrs, .. } => attrs.suppression_time,
        }
    }

    pub fn water_capacity(&self) -> f64 {
        match self {
            AircraftSpec::Uav(_) => 0.0,
            AircraftSpec::Bomber { attrs, .. } => attrs.water_capacity,
        }
    }

    pub fn water_per_suppression(&self) -> f64 {
        match self {
            AircraftSpec::Uav(_) => 0.0,
            AircraftSpec::Bomber { attrs, .. } => attrs.water_per_suppression,
        }
    }

    pub fn water_refill_time(&self) -> f64 {
        match self {
            AircraftSpec::Uav(_) => 0.0,
            AircraftSpec::Bomber { attrs, .. } => attrs.water_refill_time,
        }
    }
}
