//! Structured configuration: the parameters file, scenario sweeps, and
//! loading of every tabular input into a ready-to-run simulation.

pub mod parse;
pub mod tabular;

use crate::aircraft::{Aircraft, AircraftKind, AircraftSpec, BomberAttributes, UavAttributes};
use crate::dispatch::{
    Coordinator, CoordinatorConfig, CoordinatorKind, Prioritisation, ServiceKind, Simulation,
};
use crate::geo::{Boundary, Location};
use crate::registry::SiteRegistry;
use crate::strike::StrikeArena;
use crate::swarm::{ForecastConfig, SwarmConfig, SwarmController};
use self::parse::parse_inf_f64;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// A violation of the input schema. All schema errors are fatal: the
/// simulation never starts on malformed input.
#[derive(Debug)]
pub enum SchemaError {
    Io { path: String, source: std::io::Error },
    Csv { path: String, source: csv::Error },
    Json { path: String, source: serde_json::Error },
    MissingColumn { path: String, column: String },
    BadValue { path: String, column: String, row: usize, value: String },
    MissingSweepColumn { key: String },
    UnknownCoordinator(String),
    UnknownPrioritisation(String),
    DegeneratePolygon { path: String, vertices: usize },
    BadParameter { key: String, reason: String },
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaError::Io { path, source } => write!(f, "cannot read {path}: {source}"),
            SchemaError::Csv { path, source } => write!(f, "malformed table {path}: {source}"),
            SchemaError::Json { path, source } => write!(f, "malformed parameters {path}: {source}"),
            SchemaError::MissingColumn { path, column } => {
                write!(f, "{path} is missing the required column '{column}'")
            }
            SchemaError::BadValue { path, column, row, value } => {
                write!(f, "{path} row {row}: '{value}' is not a valid '{column}'")
            }
            SchemaError::MissingSweepColumn { key } => {
                write!(f, "option '{key}' is '?' but no sweep column provides it")
            }
            SchemaError::UnknownCoordinator(name) => {
                write!(f, "'{name}' is not a coordinator policy")
            }
            SchemaError::UnknownPrioritisation(name) => {
                write!(f, "'{name}' is not a prioritisation function")
            }
            SchemaError::DegeneratePolygon { path, vertices } => {
                write!(f, "{path} describes a polygon with only {vertices} vertices")
            }
            SchemaError::BadParameter { key, reason } => write!(f, "option '{key}': {reason}"),
        }
    }
}

impl std::error::Error for SchemaError {}

fn default_power() -> f64 { 1.0 }
fn default_attraction_const() -> f64 { 1.0 }
fn default_attraction_power() -> f64 { -1.0 }

fn de_opt_inf<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where D: serde::Deserializer<'de> {
    use serde::Deserialize;
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => Ok(n.as_f64()),
        Some(serde_json::Value::String(s)) => parse_inf_f64(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("'{s}' is not a number or 'inf'"))),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a number or 'inf', got {other}"
        ))),
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
struct RawUavs {
    spawn_loc_file: String,
    flight_speed: f64,
    fuel_refill_time: f64,
    range: f64,
    inspection_time: f64,
    pct_fuel_cutoff: f64,
    #[serde(default)]
    prioritisation_function: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
struct RawBomber {
    spawn_loc_file: String,
    flight_speed: f64,
    suppression_time: f64,
    water_refill_time: f64,
    fuel_refill_time: f64,
    water_per_suppression: f64,
    range_empty: f64,
    range_under_load: f64,
    water_capacity: f64,
    pct_fuel_cutoff: f64,
}

#[derive(Debug, Clone, serde::Deserialize)]
struct RawForecast {
    radius: f64,
    min_in_target: usize,
    look_ahead: f64,
}

#[derive(Debug, Clone, serde::Deserialize)]
struct RawSwarm {
    #[serde(default)]
    targets_filename: Option<String>,
    boundary_polygon_filename: String,
    dt: f64,
    uav_repulsion_const: f64,
    uav_repulsion_power: f64,
    boundary_repulsion_const: f64,
    boundary_repulsion_power: f64,
    #[serde(default = "default_attraction_const")]
    target_attraction_const: f64,
    #[serde(default = "default_attraction_power")]
    target_attraction_power: f64,
    centre_lat: f64,
    centre_lon: f64,
    #[serde(default)]
    forecasting: Option<RawForecast>,
}

#[derive(Debug, Clone, serde::Deserialize)]
struct RawParameters {
    water_bomber_bases_filename: String,
    uav_bases_filename: String,
    water_tanks_filename: String,
    lightning_filename: String,
    output_folder_name: String,
    uav_coordinator: String,
    wb_coordinator: String,
    #[serde(default = "default_power")]
    uav_mean_time_power: f64,
    #[serde(default = "default_power")]
    wb_mean_time_power: f64,
    #[serde(default, deserialize_with = "de_opt_inf")]
    target_maximum_inspection_time: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_inf")]
    target_maximum_suppression_time: Option<f64>,
    #[serde(default)]
    ignition_probability: Option<f64>,
    #[serde(default)]
    random_seed: Option<u64>,
    uavs: RawUavs,
    water_bombers: BTreeMap<String, RawBomber>,
    #[serde(default)]
    unassigned_uavs: Option<RawSwarm>,
    #[serde(default)]
    scenario_parameters_filename: Option<String>,
}

/// Resolved force-controller parameters, everything already in simulation
/// units (minutes, kilometres).
#[derive(Debug, Clone)]
pub struct SwarmParameters {
    pub targets_file: Option<PathBuf>,
    pub boundary_file: PathBuf,
    pub dt_minutes: f64,
    pub uav_repulsion_const: f64,
    pub uav_repulsion_power: f64,
    pub boundary_repulsion_const: f64,
    pub boundary_repulsion_power: f64,
    pub target_attraction_const: f64,
    pub target_attraction_power: f64,
    pub centre: Location,
    pub forecasting: Option<ForecastConfig>,
}

/// One water-bomber kind as configured.
#[derive(Debug, Clone)]
pub struct BomberFleet {
    pub kind: String,
    pub spawn_file: PathBuf,
    pub attributes: BomberAttributes,
}

/// The fully validated parameters of one scenario: closed enums parsed,
/// units converted, paths anchored at the parameters file's directory.
#[derive(Debug, Clone)]
pub struct Parameters {
    pub water_bomber_bases_file: PathBuf,
    pub uav_bases_file: PathBuf,
    pub water_tanks_file: PathBuf,
    pub lightning_file: PathBuf,
    pub output_folder: PathBuf,
    pub uav_coordinator: CoordinatorConfig,
    pub wb_coordinator: CoordinatorConfig,
    pub ignition_probability: f64,
    pub random_seed: u64,
    pub uav_spawn_file: PathBuf,
    pub uav_attributes: UavAttributes,
    pub water_bombers: Vec<BomberFleet>,
    pub swarm: Option<SwarmParameters>,
}

/// One named scenario of a run.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub parameters: Parameters,
}

/// Everything a `run-simulation` invocation will execute, in order.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub parameters_path: PathBuf,
    pub scenarios: Vec<Scenario>,
}

impl RunPlan {
    /// Loads the parameters file, expands the scenario sweep when one is
    /// configured, and validates every scenario up front.
    pub fn load(parameters_path: &Path) -> Result<Self, SchemaError> {
        let display = parameters_path.display().to_string();
        let text = std::fs::read_to_string(parameters_path).map_err(|source| SchemaError::Io {
            path: display.clone(),
            source,
        })?;
        let base: serde_json::Value =
            serde_json::from_str(&text).map_err(|source| SchemaError::Json {
                path: display.clone(),
                source,
            })?;
        let base_dir = parameters_path.parent().unwrap_or(Path::new(".")).to_path_buf();

        let sweep_file = base
            .get("scenario_parameters_filename")
            .and_then(|v| v.as_str())
            .map(|s| base_dir.join(s));

        let mut scenarios = Vec::new();
        match sweep_file {
            Some(sweep_path) => {
                for (name, values) in tabular::read_scenario_rows(&sweep_path)? {
                    let mut value = base.clone();
                    substitute(&mut value, &values, &mut Vec::new())?;
                    let raw = deserialize_raw(value, &display)?;
                    scenarios.push(Scenario {
                        name,
                        parameters: resolve(raw, &base_dir)?,
                    });
                }
            }
            None => {
                let mut value = base.clone();
                substitute(&mut value, &[], &mut Vec::new())?;
                let raw = deserialize_raw(value, &display)?;
                let name = parameters_path
                    .file_stem()
                    .map_or_else(|| "simulation".to_string(), |s| s.to_string_lossy().to_string());
                scenarios.push(Scenario {
                    name,
                    parameters: resolve(raw, &base_dir)?,
                });
            }
        }
        Ok(Self {
            parameters_path: parameters_path.to_path_buf(),
            scenarios,
        })
    }
}

fn deserialize_raw(value: serde_json::Value, path: &str) -> Result<RawParameters, SchemaError> {
    serde_json::from_value(value).map_err(|source| SchemaError::Json {
        path: path.to_string(),
        source,
    })
}

/// Replaces every `"?"` leaf of the parameters tree from the sweep row.
/// A column may address a leaf either by its dotted path or by the bare
/// key name.
fn substitute(
    value: &mut serde_json::Value,
    row: &[(String, String)],
    path: &mut Vec<String>,
) -> Result<(), SchemaError> {
    match value {
        serde_json::Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                path.push(key.clone());
                substitute(child, row, path)?;
                path.pop();
            }
        }
        serde_json::Value::Array(items) => {
            for child in items.iter_mut() {
                substitute(child, row, path)?;
            }
        }
        serde_json::Value::String(s) if s.as_str() == "?" => {
            let dotted = path.join(".");
            let leaf = path.last().cloned().unwrap_or_default();
            let raw = row
                .iter()
                .find(|(k, _)| *k == dotted || *k == leaf)
                .map(|(_, v)| v.clone())
                .ok_or(SchemaError::MissingSweepColumn { key: dotted })?;
            *value = reparse_cell(&raw);
        }
        _ => {}
    }
    Ok(())
}

/// A sweep cell becomes a number or boolean when it reads as one, and
/// stays a string otherwise.
fn reparse_cell(raw: &str) -> serde_json::Value {
    let trimmed = raw.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return serde_json::Value::from(v);
    }
    if let Ok(v) = trimmed.parse::<f64>() {
        return serde_json::Value::from(v);
    }
    match trimmed.to_lowercase().as_str() {
        "true" => serde_json::Value::Bool(true),
        "false" => serde_json::Value::Bool(false),
        _ => serde_json::Value::String(trimmed.to_string()),
    }
}

fn parse_coordinator(name: &str) -> Result<CoordinatorKind, SchemaError> {
    CoordinatorKind::from_str(name.trim())
        .map_err(|_| SchemaError::UnknownCoordinator(name.to_string()))
}

fn require_positive(key: &str, value: f64) -> Result<f64, SchemaError> {
    if value > 0.0 {
        Ok(value)
    } else {
        Err(SchemaError::BadParameter {
            key: key.to_string(),
            reason: format!("must be positive, got {value}"),
        })
    }
}

fn require_fraction(key: &str, value: f64) -> Result<f64, SchemaError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(SchemaError::BadParameter {
            key: key.to_string(),
            reason: format!("must lie in [0, 1], got {value}"),
        })
    }
}

fn resolve(raw: RawParameters, base_dir: &Path) -> Result<Parameters, SchemaError> {
    let join = |s: &str| base_dir.join(s);

    let prioritisation = raw
        .uavs
        .prioritisation_function
        .as_deref()
        .map(|name| {
            Prioritisation::from_str(name.trim())
                .map_err(|_| SchemaError::UnknownPrioritisation(name.to_string()))
        })
        .transpose()?;

    let uav_coordinator = CoordinatorConfig {
        policy: parse_coordinator(&raw.uav_coordinator)?,
        mean_time_power: require_positive("uav_mean_time_power", raw.uav_mean_time_power)?,
        // Ceilings are configured in hours; the simulation clock runs in
        // minutes.
        target_max_response: raw
            .target_maximum_inspection_time
            .map_or(f64::INFINITY, |h| h * 60.0),
        prioritisation,
    };
    let wb_coordinator = CoordinatorConfig {
        policy: parse_coordinator(&raw.wb_coordinator)?,
        mean_time_power: require_positive("wb_mean_time_power", raw.wb_mean_time_power)?,
        target_max_response: raw
            .target_maximum_suppression_time
            .map_or(f64::INFINITY, |h| h * 60.0),
        prioritisation: None,
    };

    let uav_attributes = UavAttributes {
        flight_speed: require_positive("uavs.flight_speed", raw.uavs.flight_speed)?,
        fuel_refill_time: raw.uavs.fuel_refill_time,
        range: require_positive("uavs.range", raw.uavs.range)?,
        inspection_time: raw.uavs.inspection_time,
        pct_fuel_cutoff: require_fraction("uavs.pct_fuel_cutoff", raw.uavs.pct_fuel_cutoff)?,
    };

    let mut water_bombers = Vec::new();
    for (kind, bomber) in &raw.water_bombers {
        let key = |field: &str| format!("water_bombers.{kind}.{field}");
        if bomber.water_capacity + 1e-9 < bomber.water_per_suppression {
            return Err(SchemaError::BadParameter {
                key: key("water_capacity"),
                reason: "cannot hold one suppression's worth of water".to_string(),
            });
        }
        water_bombers.push(BomberFleet {
            kind: kind.clone(),
            spawn_file: join(&bomber.spawn_loc_file),
            attributes: BomberAttributes {
                flight_speed: require_positive(&key("flight_speed"), bomber.flight_speed)?,
                suppression_time: bomber.suppression_time,
                water_refill_time: bomber.water_refill_time,
                fuel_refill_time: bomber.fuel_refill_time,
                water_per_suppression: bomber.water_per_suppression,
                range_empty: require_positive(&key("range_empty"), bomber.range_empty)?,
                range_under_load: require_positive(
                    &key("range_under_load"),
                    bomber.range_under_load,
                )?,
                water_capacity: bomber.water_capacity,
                pct_fuel_cutoff: require_fraction(
                    &key("pct_fuel_cutoff"),
                    bomber.pct_fuel_cutoff,
                )?,
            },
        });
    }

    let swarm = raw
        .unassigned_uavs
        .map(|s| -> Result<SwarmParameters, SchemaError> {
            Ok(SwarmParameters {
                targets_file: s.targets_filename.as_deref().map(|p| join(p)),
                boundary_file: join(&s.boundary_polygon_filename),
                // Controller period arrives in seconds.
                dt_minutes: require_positive("unassigned_uavs.dt", s.dt)? / 60.0,
                uav_repulsion_const: s.uav_repulsion_const,
                uav_repulsion_power: s.uav_repulsion_power,
                boundary_repulsion_const: s.boundary_repulsion_const,
                boundary_repulsion_power: s.boundary_repulsion_power,
                target_attraction_const: s.target_attraction_const,
                target_attraction_power: s.target_attraction_power,
                centre: Location::new(s.centre_lat, s.centre_lon),
                forecasting: s.forecasting.map(|f| ForecastConfig {
                    radius_km: f.radius,
                    min_in_target: f.min_in_target,
                    // Look-ahead arrives in hours.
                    look_ahead: f.look_ahead * 60.0,
                }),
            })
        })
        .transpose()?;

    Ok(Parameters {
        water_bomber_bases_file: join(&raw.water_bomber_bases_filename),
        uav_bases_file: join(&raw.uav_bases_filename),
        water_tanks_file: join(&raw.water_tanks_filename),
        lightning_file: join(&raw.lightning_filename),
        output_folder: join(&raw.output_folder_name),
        uav_coordinator,
        wb_coordinator,
        ignition_probability: require_fraction(
            "ignition_probability",
            raw.ignition_probability.unwrap_or(0.0),
        )?,
        random_seed: raw.random_seed.unwrap_or(0),
        uav_spawn_file: join(&raw.uavs.spawn_loc_file),
        uav_attributes,
        water_bombers,
        swarm,
    })
}

impl Parameters {
    /// Every tabular file this scenario references, for the
    /// `simulation_input` copy.
    pub fn referenced_files(&self) -> Vec<PathBuf> {
        let mut files = vec![
            self.water_bomber_bases_file.clone(),
            self.uav_bases_file.clone(),
            self.water_tanks_file.clone(),
            self.lightning_file.clone(),
            self.uav_spawn_file.clone(),
        ];
        files.extend(self.water_bombers.iter().map(|b| b.spawn_file.clone()));
        if let Some(swarm) = &self.swarm {
            files.push(swarm.boundary_file.clone());
            if let Some(targets) = &swarm.targets_file {
                files.push(targets.clone());
            }
        }
        files
    }

    /// Reads every input this scenario references and assembles a
    /// ready-to-run simulation over isolated state.
    pub fn build(&self) -> Result<Simulation, SchemaError> {
        let kinds: Vec<String> = self.water_bombers.iter().map(|b| b.kind.clone()).collect();
        let uav_bases = tabular::read_uav_bases(&self.uav_bases_file)?;
        let bomber_bases = tabular::read_bomber_bases(&self.water_bomber_bases_file, &kinds)?;
        let tanks = tabular::read_water_tanks(&self.water_tanks_file)?;
        let sites = SiteRegistry::new(uav_bases, bomber_bases, tanks);

        let mut rng = StdRng::seed_from_u64(self.random_seed);
        let strike_inputs = tabular::read_lightning(&self.lightning_file)?;
        let strikes =
            StrikeArena::materialise(strike_inputs, self.ignition_probability, &mut rng);

        let mut fleet = Vec::new();
        for spawn in tabular::read_spawn_points(&self.uav_spawn_file)? {
            let spec = AircraftSpec::Uav(self.uav_attributes.clone());
            let loc = spawn_location(&spawn, &sites, &AircraftKind::Uav);
            fleet.push(Aircraft::new(fleet.len(), spec, loc, spawn.initial_fuel));
        }
        for bomber in &self.water_bombers {
            let kind = AircraftKind::Bomber(bomber.kind.clone());
            for spawn in tabular::read_spawn_points(&bomber.spawn_file)? {
                let spec = AircraftSpec::Bomber {
                    kind: bomber.kind.clone(),
                    attrs: bomber.attributes.clone(),
                };
                let loc = spawn_location(&spawn, &sites, &kind);
                fleet.push(Aircraft::new(fleet.len(), spec, loc, spawn.initial_fuel));
            }
        }

        let swarm = self
            .swarm
            .as_ref()
            .map(|s| -> Result<SwarmController, SchemaError> {
                let vertices = tabular::read_polygon(&s.boundary_file)?;
                let count = vertices.len();
                let boundary =
                    Boundary::new(vertices).map_err(|_| SchemaError::DegeneratePolygon {
                        path: s.boundary_file.display().to_string(),
                        vertices: count,
                    })?;
                let targets = match &s.targets_file {
                    Some(path) => tabular::read_targets(path)?,
                    None => Vec::new(),
                };
                Ok(SwarmController::new(SwarmConfig {
                    targets,
                    boundary,
                    dt: s.dt_minutes,
                    uav_repulsion_const: s.uav_repulsion_const,
                    uav_repulsion_power: s.uav_repulsion_power,
                    boundary_repulsion_const: s.boundary_repulsion_const,
                    boundary_repulsion_power: s.boundary_repulsion_power,
                    target_attraction_const: s.target_attraction_const,
                    target_attraction_power: s.target_attraction_power,
                    centre: s.centre,
                    forecasting: s.forecasting.clone(),
                }))
            })
            .transpose()?;

        Ok(Simulation::new(
            fleet,
            sites,
            strikes,
            Coordinator::new(self.uav_coordinator.clone(), ServiceKind::Inspection),
            Coordinator::new(self.wb_coordinator.clone(), ServiceKind::Suppression),
            swarm,
        ))
    }
}

/// An aircraft flagged as starting at a base spawns on the nearest base
/// that admits it; otherwise it spawns exactly where the row says.
fn spawn_location(
    spawn: &tabular::SpawnPoint,
    sites: &SiteRegistry,
    kind: &AircraftKind,
) -> Location {
    if spawn.at_base {
        if let Some(i) = sites.nearest_base(&spawn.loc, kind) {
            return *sites.base_for(kind, i).loc();
        }
    }
    spawn.loc
}
