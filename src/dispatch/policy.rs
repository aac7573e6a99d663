use strum_macros::{Display, EnumString};

/// The closed set of assignment policies a coordinator can run. Unknown
/// names in the configuration are a schema error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum CoordinatorKind {
    Simple,
    Insertion,
    MinimiseMeanTime,
    ReprocessMaxTime,
}

/// How a strike's risk rating folds into a candidate's scalar cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Default)]
#[strum(serialize_all = "snake_case")]
pub enum Prioritisation {
    #[default]
    Product,
    Sum,
    RiskOnly,
}

/// Which fleet a coordinator serves and which service event it plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Inspection,
    Suppression,
}

/// The per-fleet coordinator parameters resolved from the configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub policy: CoordinatorKind,
    /// Exponent `p` of the `Σ Δt^p` cost.
    pub mean_time_power: f64,
    /// Soft ceiling on the worst resulting response time, in minutes;
    /// `f64::INFINITY` disables it.
    pub target_max_response: f64,
    /// Risk weighting, when enabled for the fleet.
    pub prioritisation: Option<Prioritisation>,
}
