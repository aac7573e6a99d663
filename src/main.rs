#![allow(dead_code)]
#![warn(clippy::shadow_reuse, clippy::shadow_same, clippy::builtin_type_shadow)]

#[macro_use]
mod logger;

mod aircraft;
mod config;
mod dispatch;
mod geo;
mod output;
mod registry;
mod strike;
mod swarm;

use config::RunPlan;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("run-simulation") => {
            let path = args.get(1).map_or("parameters.json", String::as_str);
            run_simulation(Path::new(path))
        }
        None => run_simulation(Path::new("parameters.json")),
        Some("gui") => {
            info!(
                "The map viewer is a separate front-end; point it at an output folder containing gui.json"
            );
            ExitCode::SUCCESS
        }
        Some(other) => {
            error!("Unknown command '{other}'; expected 'run-simulation [parameters_path]' or 'gui'");
            ExitCode::FAILURE
        }
    }
}

fn run_simulation(parameters_path: &Path) -> ExitCode {
    info!("Loading parameters from {}", parameters_path.display());
    let plan = match RunPlan::load(parameters_path) {
        Ok(plan) => plan,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    info!("{} scenario(s) to run", plan.scenarios.len());

    let folders: Vec<PathBuf> = {
        let mut seen = Vec::new();
        for scenario in &plan.scenarios {
            if !seen.contains(&scenario.parameters.output_folder) {
                seen.push(scenario.parameters.output_folder.clone());
            }
        }
        seen
    };
    for folder in &folders {
        match output::prepare_output_dir(folder, true) {
            Ok(true) => {}
            Ok(false) => {
                error!("Output folder {} is not empty; aborting", folder.display());
                return ExitCode::FAILURE;
            }
            Err(e) => {
                error!("{e}");
                return ExitCode::FAILURE;
            }
        }
    }

    let mut gui_entries: BTreeMap<PathBuf, Vec<output::ScenarioFiles>> = BTreeMap::new();
    for scenario in &plan.scenarios {
        info!("Running scenario '{}'", scenario.name);
        let mut sim = match scenario.parameters.build() {
            Ok(sim) => sim,
            Err(e) => {
                error!("{e}");
                return ExitCode::FAILURE;
            }
        };
        sim.run();

        let inspected = sim.strikes().iter().filter(|s| s.inspection_time().is_some()).count();
        let suppressed = sim.strikes().iter().filter(|s| s.suppression_time().is_some()).count();
        info!(
            "Scenario '{}' finished at t={:.1} min: {}/{} inspected, {} suppressed, {} uninspected, {} unsuppressed",
            scenario.name,
            sim.clock(),
            inspected,
            sim.strikes().len(),
            suppressed,
            sim.uninspected().len(),
            sim.unsuppressed().len()
        );

        let dir = &scenario.parameters.output_folder;
        let written = output::write_scenario_outputs(&scenario.name, dir, &sim)
            .and_then(|files| {
                output::copy_inputs(
                    dir,
                    &plan.parameters_path,
                    &scenario.parameters.referenced_files(),
                )?;
                Ok(files)
            });
        match written {
            Ok(files) => gui_entries.entry(dir.clone()).or_default().push(files),
            Err(e) => {
                error!("{e}");
                return ExitCode::FAILURE;
            }
        }
    }

    for (dir, entries) in &gui_entries {
        if let Err(e) = output::write_gui_index(dir, entries) {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    }
    info!("All scenarios complete");
    ExitCode::SUCCESS
}
