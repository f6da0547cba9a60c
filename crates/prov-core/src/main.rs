use anyhow::{anyhow, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use prov_core::{DiffPanel, ProvConfig, ViewOptions};
use prov_export::{
    epoch_report, execution_info, export_provenance, export_provenance_pretty, render_ndiff, version_history,
};
use prov_graph::{CancelFlag, DetachedDocument, GraphBuilder, RenderMode, RenderRequest};
use prov_model::{CellId, Cursor, ProvenanceData};
use prov_store::{JsonFilePersistence, ProvenancePersistence};
use std::path::Path;

fn file_arg() -> Arg {
    Arg::new("file")
        .required(true)
        .help("Provenance JSON document or notebook (.ipynb)")
}

fn epoch_arg(required: bool) -> Arg {
    Arg::new("epoch")
        .long("epoch")
        .required(required)
        .value_parser(value_parser!(usize))
        .help("Epoch index, starting at 0")
}

fn count_arg() -> Arg {
    Arg::new("count")
        .long("count")
        .required(true)
        .value_parser(value_parser!(u32))
        .help("Execution count within the epoch")
}

fn cli() -> Command {
    Command::new("provlab")
        .version(prov_core::VERSION)
        .about("Inspect notebook execution provenance")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .help("TOML configuration file"),
        )
        .subcommand(
            Command::new("export")
                .about("Export the provenance document as JSON")
                .arg(file_arg())
                .arg(
                    Arg::new("pretty")
                        .long("pretty")
                        .action(ArgAction::SetTrue)
                        .help("Indent the output"),
                ),
        )
        .subcommand(
            Command::new("diff")
                .about("Show earlier source versions of a cell")
                .arg(file_arg())
                .arg(Arg::new("cell").long("cell").required(true).help("Cell id"))
                .arg(epoch_arg(true))
                .arg(count_arg())
                .arg(
                    Arg::new("version")
                        .long("version")
                        .value_parser(value_parser!(usize))
                        .help("Version to compare with the target (default: oldest)"),
                ),
        )
        .subcommand(
            Command::new("graph")
                .about("Render the dependency graph as JSON")
                .arg(file_arg())
                .arg(epoch_arg(false))
                .arg(
                    Arg::new("cell")
                        .long("cell")
                        .value_parser(value_parser!(usize))
                        .help("Cursor position within the epoch (default: last)"),
                )
                .arg(
                    Arg::new("last-execution")
                        .long("last-execution")
                        .action(ArgAction::SetTrue)
                        .help("Only the dependencies of the execution at the cursor"),
                )
                .arg(
                    Arg::new("imports")
                        .long("imports")
                        .action(ArgAction::SetTrue)
                        .help("Include import edges"),
                ),
        )
        .subcommand(
            Command::new("info")
                .about("Show recorded symbol descriptions and outputs of an execution")
                .arg(file_arg())
                .arg(epoch_arg(true))
                .arg(count_arg())
                .arg(Arg::new("variable").long("variable").help("Only this symbol")),
        )
        .subcommand(
            Command::new("report")
                .about("Summarize environment, imports and data sources of an epoch")
                .arg(file_arg())
                .arg(epoch_arg(false)),
        )
}

async fn load_document(args: &ArgMatches) -> Result<ProvenanceData> {
    let file = args
        .get_one::<String>("file")
        .ok_or_else(|| anyhow!("missing file argument"))?;
    let path = Path::new(file);
    let persistence = if path.extension().is_some_and(|ext| ext == "ipynb") {
        JsonFilePersistence::notebook(path)
    } else {
        JsonFilePersistence::new(path)
    };
    persistence
        .load()
        .await
        .with_context(|| format!("failed to read {file}"))?
        .ok_or_else(|| anyhow!("{file} does not exist"))
}

fn load_config(matches: &ArgMatches) -> Result<ProvConfig> {
    match matches.get_one::<String>("config") {
        Some(path) => Ok(ProvConfig::load(path)?),
        None => {
            let mut config = ProvConfig::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }
}

fn required<'a, T: Clone + Send + Sync + 'static>(args: &'a ArgMatches, name: &str) -> Result<&'a T> {
    args.get_one::<T>(name).ok_or_else(|| anyhow!("missing --{name}"))
}

async fn run(matches: ArgMatches) -> Result<()> {
    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("export", args)) => {
            let data = load_document(args).await?;
            let json = if args.get_flag("pretty") {
                export_provenance_pretty(&data)?
            } else {
                export_provenance(&data)?
            };
            println!("{json}");
        }
        Some(("diff", args)) => {
            let data = load_document(args).await?;
            let cell_id = CellId::new(required::<String>(args, "cell")?.as_str());
            let epoch = *required::<usize>(args, "epoch")?;
            let count = *required::<u32>(args, "count")?;

            let versions = version_history(&data, &cell_id, epoch, count)?;
            let mut panel = DiffPanel::new(cell_id, versions)?;
            let diff = panel.select(args.get_one::<usize>("version").copied().unwrap_or(0))?;
            println!(
                "# epoch {} execution {} -> epoch {} execution {}",
                diff.old.epoch, diff.old.execution_count, diff.current.epoch, diff.current.execution_count
            );
            print!("{}", render_ndiff(&diff.lines));
        }
        Some(("graph", args)) => {
            let data = load_document(args).await?;
            let latest = Cursor::latest(&data).ok_or_else(|| anyhow!("no executions recorded"))?;
            let epoch = args.get_one::<usize>("epoch").copied().unwrap_or(latest.epoch);
            let cursor = match args.get_one::<usize>("cell") {
                Some(&cell) => Cursor::new(epoch, cell),
                None => Cursor::end_of_epoch(&data, epoch).unwrap_or(latest),
            };

            let options = ViewOptions::from(&config);
            let mode = if args.get_flag("last-execution") {
                RenderMode::LastExecution
            } else {
                options.render_mode()
            };
            let request = RenderRequest::new(cursor)
                .with_mode(mode)
                .with_imports(options.render_imports || args.get_flag("imports"));
            let (graph, outcome) =
                GraphBuilder::new().render(&data, request, &DetachedDocument, &CancelFlag::new())?;
            tracing::info!(
                "Rendered {} executions, {} edges",
                outcome.displayed_executions.len(),
                outcome.edges
            );
            println!("{}", serde_json::to_string_pretty(&graph.snapshot())?);
        }
        Some(("info", args)) => {
            let data = load_document(args).await?;
            let epoch = *required::<usize>(args, "epoch")?;
            let count = *required::<u32>(args, "count")?;
            let variable = args.get_one::<String>("variable").map(String::as_str);

            let info = execution_info(&data, epoch, count, variable)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Some(("report", args)) => {
            let data = load_document(args).await?;
            let epoch = match args.get_one::<usize>("epoch") {
                Some(&epoch) => epoch,
                None => data
                    .epochs
                    .len()
                    .checked_sub(1)
                    .ok_or_else(|| anyhow!("no epochs recorded"))?,
            };
            println!("{}", serde_json::to_string_pretty(&epoch_report(&data, epoch)?)?);
        }
        Some((other, _)) => anyhow::bail!("unknown subcommand {other}"),
        None => anyhow::bail!("no subcommand given"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    run(cli().get_matches()).await
}
