use anyhow::{bail, Context, Result};
use plexos_solution::{
    cli::{Cli, Commands},
    filter::resolve_tables,
    model::{AssemblyOptions, SolutionModel},
    ui::{ConsoleUi, Phase, Ui, UiApp},
    writer::convert_to_sqlite,
};
use std::io::{self, Write};
use std::path::Path;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn verbosity_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Logs go to stderr. RUST_LOG wins over -v; the full-screen display keeps
/// only errors so it is not drawn over.
fn init_logging(verbose: u8, tui: bool) {
    let level = if tui { "error" } else { verbosity_level(verbose) };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .compact()
        .init();
}

fn open_model(archive: &Path, options: AssemblyOptions, ui: &mut impl Ui) -> Result<SolutionModel> {
    ui.set_phase(Phase::Reading);
    let model = SolutionModel::open(archive, options)
        .with_context(|| format!("Failed to open solution archive {:?}", archive))?;

    ui.set_phase(Phase::Assembling);
    for outcome in &model.report().steps {
        ui.step(outcome);
    }
    for warning in &model.report().warnings {
        ui.warning(warning);
    }

    Ok(model)
}

fn convert(
    archive: &Path,
    output_db: &Path,
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
    options: AssemblyOptions,
    ui: &mut impl Ui,
) -> Result<u64> {
    let model = open_model(archive, options, ui)?;
    let tables = resolve_tables(&model, include, exclude)?;
    convert_to_sqlite(&model, output_db, &tables, ui)
}

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    let tui = matches!(cli.command, Commands::Convert { tui: true, .. });
    init_logging(cli.verbose, tui);

    match cli.command {
        Commands::Convert {
            archive,
            output_db,
            include,
            exclude,
            tui,
            assembly,
        } => {
            let start = Instant::now();
            let options = assembly.options();

            if tui {
                let mut ui = UiApp::new(&archive)?;
                match convert(&archive, &output_db, include, exclude, options, &mut ui) {
                    Ok(count) => {
                        let summary = format!(
                            "Created {:?} ({} records) in {:.1}s",
                            output_db,
                            count,
                            start.elapsed().as_secs_f64()
                        );
                        ui.finish(&summary)?;
                    }
                    Err(e) => {
                        drop(ui);
                        return Err(e);
                    }
                }
            } else {
                let mut ui = ConsoleUi::new();
                let count = convert(&archive, &output_db, include, exclude, options, &mut ui)?;
                println!(
                    "\nCreated {:?} ({} records) in {:.1}s",
                    output_db,
                    count,
                    start.elapsed().as_secs_f64()
                );
            }
        }

        Commands::ListTables { archive, assembly } => {
            let model = SolutionModel::open(&archive, assembly.options())
                .with_context(|| format!("Failed to open solution archive {:?}", archive))?;
            println!("Available tables:\n");
            for (name, table) in model.named_tables() {
                println!("  {:40} {:>10} rows", name, table.len());
            }
        }

        Commands::Check { archive, assembly } => {
            let mut ui = ConsoleUi::new();
            let model = open_model(&archive, assembly.options(), &mut ui)?;
            ui.set_phase(Phase::Complete);

            let report = model.report();
            println!(
                "{} derived tables built, {} skipped, {} warnings",
                report.built().count(),
                report.skipped().count(),
                report.warnings.len()
            );
            match model.check_consistency() {
                Some(warning) => println!("Consistency: {}", warning),
                None => println!("Consistency: ok"),
            }
        }

        Commands::Dump {
            archive,
            table,
            limit,
            assembly,
        } => {
            let model = SolutionModel::open(&archive, assembly.options())
                .with_context(|| format!("Failed to open solution archive {:?}", archive))?;
            let rows = match model.named_tables().into_iter().find(|(name, _)| *name == table) {
                Some((_, t)) => t.rows(),
                None => bail!("Unknown table: {}", table),
            };

            let stdout = io::stdout();
            let mut out = stdout.lock();
            for row in rows.iter().take(limit.unwrap_or(usize::MAX)) {
                serde_json::to_writer(&mut out, row)?;
                writeln!(out)?;
            }
        }
    }

    Ok(())
}
