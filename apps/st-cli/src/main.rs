use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use st_app::{
    AppResult, ExportRequest, MaintenanceConfig, RunProgressEvent, RunRequest, RunStage, SwmmCli,
    VariationRequest, backup, export_service, run_service, variations,
};
use st_network::{
    NetworkFile, NetworkModel, PollutantProcess, SeparationOptions, build_layers,
    change_buildup_washoff, resolve, separate_junctions,
};

#[derive(Parser)]
#[command(name = "stormtrap")]
#[command(about = "stormtrap - sediment trap placement for stormwater networks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare the network and simulate every scenario
    Run {
        /// Path to the settings file
        settings_path: PathBuf,
        /// Engine executable, called as `<engine> <inp> <rpt> <out>`
        #[arg(long, default_value = st_app::swmm::DEFAULT_EXECUTABLE)]
        engine: PathBuf,
        /// Export the tables once all scenarios are simulated
        #[arg(long)]
        export: bool,
    },
    /// Show the subcatchment topology of a network file
    Inspect {
        /// Path to the network file
        network_path: PathBuf,
    },
    /// Split manholes that mix runoff and conduit inflow
    Separate {
        /// Path to the network file
        network_path: PathBuf,
        #[arg(long, default_value = "_m")]
        suffix: String,
        #[arg(long, default_value_t = 0.0)]
        height_offset: f64,
        #[arg(long, default_value_t = 1.0)]
        coord_offset: f64,
        #[arg(long, default_value_t = 0.1)]
        conduit_length: f64,
        /// Write to this file instead of changing the network in place
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Rank a stored run and write the result tables
    Export {
        /// Path to the settings file
        settings_path: PathBuf,
        /// Stored run, the most recent one by default
        #[arg(long)]
        run_id: Option<String>,
        /// Output directory (defaults to the settings' results_file)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Keep the checkpoints after exporting
        #[arg(long)]
        keep: bool,
    },
    /// Replay a stored run with a finite trap capacity
    Maintenance {
        /// Path to the settings file
        settings_path: PathBuf,
        /// Trap capacity in kg (defaults to max_capacity)
        #[arg(long, requires = "interval")]
        capacity: Option<f64>,
        /// Emptying interval in days (defaults to maintenance_interval)
        #[arg(long, requires = "capacity")]
        interval: Option<f64>,
        #[arg(long)]
        run_id: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        keep: bool,
    },
    /// Run every variation of a scenario definition file
    Variations {
        /// Path to the settings file
        settings_path: PathBuf,
        /// Path to the JSON scenario definition file
        definitions_path: PathBuf,
        #[arg(long, default_value = st_app::swmm::DEFAULT_EXECUTABLE)]
        engine: PathBuf,
        /// Run the maintenance variations instead of the simulation ones
        #[arg(long)]
        maintenance: bool,
    },
    /// Change build-up or wash-off coefficients of a land use
    Coefficients {
        /// Path to the network file
        network_path: PathBuf,
        #[arg(value_enum)]
        process: Process,
        land_use: String,
        coeff1: String,
        coeff2: String,
    },
    /// Write delimited-text GIS layers of a network
    ExportGis {
        /// Path to the network file
        network_path: PathBuf,
        /// Output directory
        output_dir: PathBuf,
    },
    /// Restore every backup in a directory
    RestoreBackups {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Delete engine output, reports and stored runs in a directory
    Clean {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Process {
    Buildup,
    Washoff,
}

fn main() -> AppResult<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            settings_path,
            engine,
            export,
        } => cmd_run(&settings_path, engine, export),
        Commands::Inspect { network_path } => cmd_inspect(&network_path),
        Commands::Separate {
            network_path,
            suffix,
            height_offset,
            coord_offset,
            conduit_length,
            output,
        } => cmd_separate(
            &network_path,
            SeparationOptions {
                suffix,
                height_offset,
                coord_offset,
                conduit_length,
            },
            output.as_deref(),
        ),
        Commands::Export {
            settings_path,
            run_id,
            output,
            keep,
        } => cmd_export(&settings_path, run_id.as_deref(), output.as_deref(), keep),
        Commands::Maintenance {
            settings_path,
            capacity,
            interval,
            run_id,
            output,
            keep,
        } => {
            let maintenance = capacity.zip(interval).map(|(capacity_kg, interval_days)| {
                MaintenanceConfig {
                    capacity_kg,
                    interval_days,
                }
            });
            cmd_maintenance(
                &settings_path,
                maintenance,
                run_id.as_deref(),
                output.as_deref(),
                keep,
            )
        }
        Commands::Variations {
            settings_path,
            definitions_path,
            engine,
            maintenance,
        } => cmd_variations(&settings_path, &definitions_path, engine, maintenance),
        Commands::Coefficients {
            network_path,
            process,
            land_use,
            coeff1,
            coeff2,
        } => cmd_coefficients(&network_path, process, &land_use, &coeff1, &coeff2),
        Commands::ExportGis {
            network_path,
            output_dir,
        } => cmd_export_gis(&network_path, &output_dir),
        Commands::RestoreBackups { dir } => {
            let restored = backup::restore_all_backups(&dir)?;
            println!("✓ Restored {} files", restored.len());
            Ok(())
        }
        Commands::Clean { dir } => {
            let removed = backup::clean_simulation_files(&dir)?;
            println!("✓ Removed {} files", removed.len());
            Ok(())
        }
    }
}

/// Throttled progress printer shared by the run commands.
fn progress_printer() -> impl FnMut(RunProgressEvent) {
    let mut last_emit = Instant::now();
    let mut last_stage: Option<RunStage> = None;
    move |event| {
        let emit_now = last_stage != Some(event.stage) || last_emit.elapsed().as_millis() >= 100;
        if emit_now {
            render_cli_progress(&event);
            last_stage = Some(event.stage);
            last_emit = Instant::now();
        }
    }
}

fn cmd_run(settings_path: &Path, engine: PathBuf, export: bool) -> AppResult<()> {
    println!("Running scenarios from: {}", settings_path.display());

    let mut engine = SwmmCli::new(engine);
    let mut printer = progress_printer();
    let response = run_service::run_scenarios_with_progress(
        &RunRequest { settings_path },
        &mut engine,
        Some(&mut printer),
    )?;
    clear_progress_line();

    if let Some(separation) = &response.separation {
        println!(
            "  Separated {} junctions, renamed {}",
            separation.split.len(),
            separation.renamed.len()
        );
    }
    println!("  Scenarios: {}", response.scenarios.len());

    let Some(run_id) = response.run_id else {
        println!("✓ Network prepared, simulations disabled");
        return Ok(());
    };
    println!("✓ Simulated {} scenarios: {}", response.simulated, run_id);
    print_timing_summary(&response.timing);

    if export {
        cmd_export(settings_path, Some(&run_id), None, false)?;
    }
    Ok(())
}

fn cmd_inspect(network_path: &Path) -> AppResult<()> {
    let file = NetworkFile::load(network_path)?;
    let topology = resolve(&NetworkModel::from_file(&file)?)?;

    println!("Manholes: {}", topology.manholes.len());
    for manhole in &topology.manholes {
        let area = topology.areas.get(manhole);
        let separate = if topology.needs_separation(manhole) {
            "  (needs separation)"
        } else {
            ""
        };
        println!(
            "  {} - {} subcatchments, {:.3} ha{}",
            manhole,
            topology.inlets.get(manhole).map_or(0, Vec::len),
            area.map_or(0.0, |a| a.total),
            separate
        );
    }
    if !topology.land_uses.is_empty() {
        println!("Land uses:");
        for land_use in &topology.land_uses {
            let pool = topology.land_use_pools.get(land_use).map_or(0, Vec::len);
            println!("  {} - {} junctions", land_use, pool);
        }
    }
    Ok(())
}

fn cmd_separate(
    network_path: &Path,
    options: SeparationOptions,
    output: Option<&Path>,
) -> AppResult<()> {
    let mut file = NetworkFile::load(network_path)?;
    let topology = resolve(&NetworkModel::from_file(&file)?)?;
    let separation = separate_junctions(&mut file, &topology, &options)?;
    let target = output.unwrap_or(network_path);
    file.save(target)?;
    println!(
        "✓ Split {} and renamed {} junctions: {}",
        separation.split.len(),
        separation.renamed.len(),
        target.display()
    );
    Ok(())
}

fn cmd_export(
    settings_path: &Path,
    run_id: Option<&str>,
    output: Option<&Path>,
    keep: bool,
) -> AppResult<()> {
    let mut printer = progress_printer();
    let response = export_service::export_results_with_progress(
        &ExportRequest {
            settings_path,
            run_id,
            output_dir: output,
            keep_checkpoints: keep,
        },
        Some(&mut printer),
    )?;
    clear_progress_line();
    println!(
        "✓ Exported {} scenarios of run {}",
        response.scenarios, response.run_id
    );
    for file in &response.files {
        println!("  {}", file.display());
    }
    Ok(())
}

fn cmd_maintenance(
    settings_path: &Path,
    maintenance: Option<MaintenanceConfig>,
    run_id: Option<&str>,
    output: Option<&Path>,
    keep: bool,
) -> AppResult<()> {
    let response = export_service::export_maintenance(
        &ExportRequest {
            settings_path,
            run_id,
            output_dir: output,
            keep_checkpoints: keep,
        },
        maintenance,
    )?;
    println!(
        "✓ Maintenance tables for {} scenarios of run {}",
        response.scenarios, response.run_id
    );
    for file in &response.files {
        println!("  {}", file.display());
    }
    Ok(())
}

fn cmd_variations(
    settings_path: &Path,
    definitions_path: &Path,
    engine: PathBuf,
    maintenance: bool,
) -> AppResult<()> {
    let request = VariationRequest {
        settings_path,
        definitions_path,
    };
    let mut engine = SwmmCli::new(engine);
    let outcomes = if maintenance {
        variations::run_maintenance_variations(&request, &mut engine)?
    } else {
        let mut printer = progress_printer();
        let outcomes =
            variations::run_simulation_variations(&request, &mut engine, Some(&mut printer))?;
        clear_progress_line();
        outcomes
    };

    for outcome in &outcomes {
        println!(
            "✓ {}: {} tables in {}",
            outcome.name,
            outcome.files.len(),
            outcome.output_dir.display()
        );
    }
    Ok(())
}

fn cmd_coefficients(
    network_path: &Path,
    process: Process,
    land_use: &str,
    coeff1: &str,
    coeff2: &str,
) -> AppResult<()> {
    let process = match process {
        Process::Buildup => PollutantProcess::Buildup,
        Process::Washoff => PollutantProcess::Washoff,
    };
    let mut file = NetworkFile::load(network_path)?;
    let changed = change_buildup_washoff(&mut file, process, land_use, coeff1, coeff2)?;
    file.save(network_path)?;
    println!("✓ Updated {} records of {}", changed, land_use);
    Ok(())
}

fn cmd_export_gis(network_path: &Path, output_dir: &Path) -> AppResult<()> {
    let file = NetworkFile::load(network_path)?;
    let layers = build_layers(&file)?;
    layers.write_to_dir(output_dir)?;
    println!("✓ GIS layers written to {}", output_dir.display());
    for (name, _) in layers.files() {
        println!("  {}", name);
    }
    Ok(())
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(120));
    let _ = io::stdout().flush();
}

fn render_cli_progress(event: &RunProgressEvent) {
    match (&event.stage, &event.simulation) {
        (RunStage::Simulating, Some(sim)) => {
            let width = 28usize;
            let fraction = sim.fraction_complete();
            let filled = ((fraction * width as f64).round() as usize).min(width);
            let bar = format!(
                "{}{}",
                "#".repeat(filled),
                "-".repeat(width.saturating_sub(filled))
            );
            print!(
                "\r[{}] {:>6.2}%  scenario={}/{}  elapsed={:.1}s",
                bar,
                fraction * 100.0,
                sim.scenario + 1,
                sim.scenarios,
                event.elapsed_wall_s
            );
            let _ = io::stdout().flush();
        }
        _ => {
            let spinner = ['|', '/', '-', '\\'];
            let spin_idx = ((event.elapsed_wall_s * 10.0) as usize) % spinner.len();
            let mut line = format!(
                "\r{} {}  elapsed={:.2}s",
                spinner[spin_idx],
                event.stage.label(),
                event.elapsed_wall_s
            );
            if let Some(msg) = &event.message {
                line.push_str(&format!("  {}", msg));
            }
            print!("{}", line);
            let _ = io::stdout().flush();
        }
    }
}

fn print_timing_summary(timing: &st_app::RunTimingSummary) {
    let total = timing.total_time_s.max(1.0e-12);
    println!("\nTiming:");
    println!(
        "  prepare:  {:>8.3} s ({:>5.1}%)",
        timing.prepare_time_s,
        100.0 * timing.prepare_time_s / total
    );
    println!(
        "  simulate: {:>8.3} s ({:>5.1}%)",
        timing.simulate_time_s,
        100.0 * timing.simulate_time_s / total
    );
    println!(
        "  save:     {:>8.3} s ({:>5.1}%)",
        timing.save_time_s,
        100.0 * timing.save_time_s / total
    );
    println!("  total:    {:>8.3} s", timing.total_time_s);
}
