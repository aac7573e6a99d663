use super::SchemaError;
use super::parse::{parse_bool, parse_inf_f64, parse_time_minutes, parse_time_or_inf};
use crate::geo::Location;
use crate::registry::{Base, WaterTank};
use crate::strike::StrikeInput;
use crate::swarm::SwarmTarget;
use std::collections::BTreeSet;
use std::path::Path;

/// An in-memory tabular input addressed by canonical column names; the
/// column order in the file is irrelevant. Headers are normalised to
/// lowercase with single spaces, so `Initial_Fuel` and `initial fuel`
/// are the same column.
struct Table {
    path: String,
    headers: Vec<String>,
    rows: Vec<csv::StringRecord>,
}

fn normalise(header: &str) -> String {
    header.trim().to_lowercase().replace('_', " ")
}

impl Table {
    fn open(path: &Path) -> Result<Self, SchemaError> {
        let display = path.display().to_string();
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(path)
            .map_err(|source| SchemaError::Csv {
                path: display.clone(),
                source,
            })?;
        let headers = reader
            .headers()
            .map_err(|source| SchemaError::Csv {
                path: display.clone(),
                source,
            })?
            .iter()
            .map(normalise)
            .collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record.map_err(|source| SchemaError::Csv {
                path: display.clone(),
                source,
            })?);
        }
        Ok(Self {
            path: display,
            headers,
            rows,
        })
    }

    fn column(&self, name: &str) -> Option<usize> {
        let wanted = normalise(name);
        self.headers.iter().position(|h| *h == wanted)
    }

    fn require(&self, name: &str) -> Result<usize, SchemaError> {
        self.column(name).ok_or_else(|| SchemaError::MissingColumn {
            path: self.path.clone(),
            column: name.to_string(),
        })
    }

    fn cell(&self, row: usize, col: usize) -> &str {
        self.rows[row].get(col).unwrap_or("")
    }

    fn parse_cell<T>(
        &self,
        row: usize,
        col: usize,
        name: &str,
        parser: impl Fn(&str) -> Option<T>,
    ) -> Result<T, SchemaError> {
        let raw = self.cell(row, col);
        parser(raw).ok_or_else(|| SchemaError::BadValue {
            path: self.path.clone(),
            column: name.to_string(),
            row: row + 1,
            value: raw.to_string(),
        })
    }

    fn location(&self, row: usize, lat: usize, lon: usize) -> Result<Location, SchemaError> {
        let lat_v = self.parse_cell(row, lat, "latitude", |s| s.parse::<f64>().ok())?;
        let lon_v = self.parse_cell(row, lon, "longitude", |s| s.parse::<f64>().ok())?;
        Ok(Location::new(lat_v, lon_v))
    }
}

pub fn read_uav_bases(path: &Path) -> Result<Vec<Base>, SchemaError> {
    let table = Table::open(path)?;
    let lat = table.require("latitude")?;
    let lon = table.require("longitude")?;
    (0..table.rows.len())
        .map(|r| Ok(Base::any_kind(table.location(r, lat, lon)?)))
        .collect()
}

/// Water-bomber bases carry admission tags: a base admits a kind when the
/// `all` column or the kind's own column holds a truthy cell.
pub fn read_bomber_bases(path: &Path, kinds: &[String]) -> Result<Vec<Base>, SchemaError> {
    let table = Table::open(path)?;
    let lat = table.require("latitude")?;
    let lon = table.require("longitude")?;
    let all = table.column("all");
    let kind_cols: Vec<(String, Option<usize>)> = kinds
        .iter()
        .map(|k| (k.clone(), table.column(k)))
        .collect();

    let mut bases = Vec::with_capacity(table.rows.len());
    for r in 0..table.rows.len() {
        let loc = table.location(r, lat, lon)?;
        let admits_all = match all {
            Some(col) => table.parse_cell(r, col, "all", parse_bool)?,
            None => false,
        };
        if admits_all {
            bases.push(Base::any_kind(loc));
            continue;
        }
        let mut admitted = BTreeSet::new();
        for (kind, col) in &kind_cols {
            if let Some(col) = col {
                if table.parse_cell(r, *col, kind, parse_bool)? {
                    admitted.insert(kind.clone());
                }
            }
        }
        bases.push(Base::for_kinds(loc, admitted));
    }
    Ok(bases)
}

pub fn read_water_tanks(path: &Path) -> Result<Vec<WaterTank>, SchemaError> {
    let table = Table::open(path)?;
    let lat = table.require("latitude")?;
    let lon = table.require("longitude")?;
    let capacity = table.require("capacity")?;
    (0..table.rows.len())
        .map(|r| {
            let loc = table.location(r, lat, lon)?;
            let cap = table.parse_cell(r, capacity, "capacity", parse_inf_f64)?;
            Ok(WaterTank::new(loc, cap))
        })
        .collect()
}

pub fn read_lightning(path: &Path) -> Result<Vec<StrikeInput>, SchemaError> {
    let table = Table::open(path)?;
    let lat = table.require("latitude")?;
    let lon = table.require("longitude")?;
    let time = table.require("time")?;
    let risk = table.column("risk rating");
    let ignited = table.column("ignited");
    let probability = table.column("ignition probability");

    let mut strikes = Vec::with_capacity(table.rows.len());
    for r in 0..table.rows.len() {
        let loc = table.location(r, lat, lon)?;
        let spawn_time = table.parse_cell(r, time, "time", parse_time_minutes)?;
        let risk_rating = match risk {
            Some(col) if !table.cell(r, col).is_empty() => {
                Some(table.parse_cell(r, col, "risk_rating", |s| {
                    s.parse::<f64>().ok().filter(|v| (0.0..=1.0).contains(v))
                })?)
            }
            _ => None,
        };
        let ignited_flag = match ignited {
            // An empty cell is a valid `false` in the boolean grammar, but
            // here it means "draw the outcome".
            Some(col) if !table.cell(r, col).is_empty() => {
                Some(table.parse_cell(r, col, "ignited", parse_bool)?)
            }
            _ => None,
        };
        let ignition_probability = match probability {
            Some(col) if !table.cell(r, col).is_empty() => {
                Some(table.parse_cell(r, col, "ignition_probability", |s| {
                    s.parse::<f64>().ok().filter(|v| (0.0..=1.0).contains(v))
                })?)
            }
            _ => None,
        };
        strikes.push(StrikeInput {
            loc,
            spawn_time,
            risk_rating,
            ignited: ignited_flag,
            ignition_probability,
        });
    }
    Ok(strikes)
}

/// One aircraft spawn row.
#[derive(Debug, Clone)]
pub struct SpawnPoint {
    pub loc: Location,
    pub at_base: bool,
    pub initial_fuel: f64,
}

pub fn read_spawn_points(path: &Path) -> Result<Vec<SpawnPoint>, SchemaError> {
    let table = Table::open(path)?;
    let lat = table.require("latitude")?;
    let lon = table.require("longitude")?;
    let at_base = table.require("starting at base")?;
    let fuel = table.require("initial fuel")?;
    (0..table.rows.len())
        .map(|r| {
            Ok(SpawnPoint {
                loc: table.location(r, lat, lon)?,
                at_base: table.parse_cell(r, at_base, "starting at base", parse_bool)?,
                initial_fuel: table.parse_cell(r, fuel, "initial fuel", |s| {
                    s.parse::<f64>().ok().filter(|v| (0.0..=1.0).contains(v))
                })?,
            })
        })
        .collect()
}

pub fn read_targets(path: &Path) -> Result<Vec<SwarmTarget>, SchemaError> {
    let table = Table::open(path)?;
    let lat = table.require("latitude")?;
    let lon = table.require("longitude")?;
    let start = table.require("start time")?;
    let finish = table.require("finish time")?;
    (0..table.rows.len())
        .map(|r| {
            Ok(SwarmTarget {
                loc: table.location(r, lat, lon)?,
                start_time: table.parse_cell(r, start, "start_time", parse_time_minutes)?,
                finish_time: table.parse_cell(r, finish, "finish_time", parse_time_or_inf)?,
            })
        })
        .collect()
}

pub fn read_polygon(path: &Path) -> Result<Vec<Location>, SchemaError> {
    let table = Table::open(path)?;
    let lat = table.require("latitude")?;
    let lon = table.require("longitude")?;
    (0..table.rows.len()).map(|r| table.location(r, lat, lon)).collect()
}

/// Reads a scenario sweep file: the first column names each scenario, and
/// every further column can feed a `"?"` placeholder in the base
/// parameters. Headers here address JSON option keys, so they are kept
/// verbatim rather than run through the tabular normalisation.
pub fn read_scenario_rows(
    path: &Path,
) -> Result<Vec<(String, Vec<(String, String)>)>, SchemaError> {
    let display = path.display().to_string();
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|source| SchemaError::Csv {
            path: display.clone(),
            source,
        })?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(|source| SchemaError::Csv {
            path: display.clone(),
            source,
        })?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.is_empty() {
        return Err(SchemaError::MissingColumn {
            path: display,
            column: "scenario name".to_string(),
        });
    }
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| SchemaError::Csv {
            path: display.clone(),
            source,
        })?;
        let name = record.get(0).unwrap_or("").to_string();
        let values = headers
            .iter()
            .enumerate()
            .skip(1)
            .map(|(c, header)| (header.clone(), record.get(c).unwrap_or("").to_string()))
            .collect();
        rows.push((name, values));
    }
    Ok(rows)
}
