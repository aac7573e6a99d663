//! Per-scenario result files: the strike outcome table, per-fleet event
//! update logs, the histogram panel, the `gui.json` index, and the flat
//! copy of every input the run consumed.

mod plot;
#[cfg(test)]
mod tests;

use crate::aircraft::{AircraftKind, EventUpdate};
use crate::dispatch::Simulation;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum OutputError {
    Io(std::io::Error),
    Csv(csv::Error),
    Json(serde_json::Error),
    Image(image::ImageError),
}

impl Display for OutputError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputError::Io(e) => write!(f, "output i/o failed: {e}"),
            OutputError::Csv(e) => write!(f, "csv output failed: {e}"),
            OutputError::Json(e) => write!(f, "json output failed: {e}"),
            OutputError::Image(e) => write!(f, "plot output failed: {e}"),
        }
    }
}

impl std::error::Error for OutputError {}

impl From<std::io::Error> for OutputError {
    fn from(e: std::io::Error) -> Self { OutputError::Io(e) }
}
impl From<csv::Error> for OutputError {
    fn from(e: csv::Error) -> Self { OutputError::Csv(e) }
}
impl From<serde_json::Error> for OutputError {
    fn from(e: serde_json::Error) -> Self { OutputError::Json(e) }
}
impl From<image::ImageError> for OutputError {
    fn from(e: image::ImageError) -> Self { OutputError::Image(e) }
}

/// Ensures the output folder exists and is safe to write into. A
/// non-empty folder asks for confirmation when a prompt is possible and
/// aborts otherwise; the return value says whether to proceed.
pub fn prepare_output_dir(path: &Path, interactive: bool) -> Result<bool, OutputError> {
    if !path.exists() {
        fs::create_dir_all(path)?;
        return Ok(true);
    }
    if fs::read_dir(path)?.next().is_none() {
        return Ok(true);
    }
    if !interactive {
        return Ok(false);
    }
    print!("Output folder {} is not empty. Overwrite? [y/N] ", path.display());
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn fmt_opt_time(t: Option<f64>) -> String {
    t.map_or_else(|| "N/A".to_string(), |v| format!("{v:.2}"))
}

/// The per-scenario output file names, as referenced from `gui.json`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScenarioFiles {
    pub scenario: String,
    pub simulation_output: String,
    pub uav_event_updates: String,
    pub wb_event_updates: String,
    pub inspection_times: String,
}

/// Writes every result file of one finished scenario into `dir` and
/// returns the file names for the gui index.
pub fn write_scenario_outputs(
    scenario: &str,
    dir: &Path,
    sim: &Simulation,
) -> Result<ScenarioFiles, OutputError> {
    let files = ScenarioFiles {
        scenario: scenario.to_string(),
        simulation_output: format!("{scenario}_simulation_output.csv"),
        uav_event_updates: format!("{scenario}_uav_event_updates.csv"),
        wb_event_updates: format!("{scenario}_wb_event_updates.csv"),
        inspection_times: format!("{scenario}_inspection_times.png"),
    };
    write_simulation_output(&dir.join(&files.simulation_output), sim)?;
    write_event_updates(&dir.join(&files.uav_event_updates), sim, false)?;
    write_event_updates(&dir.join(&files.wb_event_updates), sim, true)?;
    plot::write_histograms(&dir.join(&files.inspection_times), sim)?;
    Ok(files)
}

fn write_simulation_output(path: &Path, sim: &Simulation) -> Result<(), OutputError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "id",
        "lat",
        "lon",
        "spawn_time",
        "inspection_time",
        "suppression_time",
    ])?;
    for strike in sim.strikes().iter() {
        writer.write_record([
            strike.id().to_string(),
            format!("{:.6}", strike.loc().lat()),
            format!("{:.6}", strike.loc().lon()),
            format!("{:.2}", strike.spawn_time()),
            fmt_opt_time(strike.inspection_time()),
            fmt_opt_time(strike.suppression_time()),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// All update logs of one fleet merged into global chronological order;
/// per-craft order breaks ties so replays stay byte-identical.
fn merged_updates(sim: &Simulation, bombers: bool) -> Vec<&EventUpdate> {
    let mut rows: Vec<(usize, &EventUpdate)> = sim
        .fleet()
        .iter()
        .filter(|c| matches!(c.kind(), AircraftKind::Bomber(_)) == bombers)
        .flat_map(|c| c.log().iter().enumerate())
        .collect();
    rows.sort_by(|(ia, a), (ib, b)| {
        a.time
            .total_cmp(&b.time)
            .then(a.aircraft_id.cmp(&b.aircraft_id))
            .then(ia.cmp(ib))
    });
    rows.into_iter().map(|(_, u)| u).collect()
}

fn write_event_updates(path: &Path, sim: &Simulation, bombers: bool) -> Result<(), OutputError> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut header = vec![
        "aircraft_id",
        "lat",
        "lon",
        "time_min",
        "distance_travelled_km",
        "distance_hovered_km",
        "fuel_pct",
        "current_range_km",
    ];
    if bombers {
        header.push("water_capacity_L");
    }
    header.extend(["status", "next_updates"]);
    writer.write_record(&header)?;

    for update in merged_updates(sim, bombers) {
        let mut row = vec![
            update.aircraft_id.to_string(),
            format!("{:.6}", update.loc.lat()),
            format!("{:.6}", update.loc.lon()),
            format!("{:.2}", update.time),
            format!("{:.2}", update.distance_travelled),
            format!("{:.2}", update.distance_hovered),
            format!("{:.2}", update.fuel * 100.0),
            format!("{:.2}", update.range_km),
        ];
        if bombers {
            row.push(format!("{:.1}", update.water));
        }
        row.push(update.status.to_string());
        row.push(update.next_updates.clone());
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the `gui.json` index the visual front-end replays from.
pub fn write_gui_index(dir: &Path, scenarios: &[ScenarioFiles]) -> Result<(), OutputError> {
    let body = serde_json::json!({ "scenarios": scenarios });
    fs::write(dir.join("gui.json"), serde_json::to_string_pretty(&body)?)?;
    Ok(())
}

/// Copies the parameters file and every referenced tabular input into
/// `<dir>/simulation_input/`, flattened to bare file names. Paths inside
/// the copied parameters are left untouched.
pub fn copy_inputs(
    dir: &Path,
    parameters_path: &Path,
    referenced: &[PathBuf],
) -> Result<(), OutputError> {
    let input_dir = dir.join("simulation_input");
    fs::create_dir_all(&input_dir)?;
    let mut sources = vec![parameters_path.to_path_buf()];
    sources.extend_from_slice(referenced);
    for source in sources {
        if let Some(name) = source.file_name() {
            fs::copy(&source, input_dir.join(name))?;
        }
    }
    Ok(())
}
