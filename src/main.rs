mod cli;

use anyhow::{bail, Context};
use cheatstore::config::{default_config_path, load_config};
use cheatstore::services::exec::is_destructive;
use cheatstore::services::renderer::unresolved;
use cheatstore::{
    ArchiveFetcher, CheatstoreError, Config, Example, ExecOutcome, Executor, InitOutcome, Page,
    Platform, PluginRegistry, Store,
};
use clap::Parser;
use cli::{Cli, Commands, ExecArgs, InitArgs, LintArgs, PageArgs, RenderArgs, SearchArgs, StatusArgs};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let result = run(&cli);

    if let Err(e) = result {
        error!("Operation failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?
        .config;
    if !cli.platforms.is_empty() {
        config.platforms = parse_platforms(&cli.platforms)?;
    }

    match &cli.command {
        Commands::Config => {
            print!("{}", config.to_toml()?);
            return Ok(());
        }
        Commands::Plugins => {
            handle_plugins_command();
            return Ok(());
        }
        _ => {}
    }

    let store = Store::open(&config, Box::new(ArchiveFetcher::from_config(&config)))
        .with_context(|| format!("Failed to open cache at {}", config.cache_dir.display()))?;
    // Explicit --platform flags restrict page lookups instead of ranking them
    let only = (!cli.platforms.is_empty()).then_some(config.platforms.as_slice());

    match &cli.command {
        Commands::Init(args) => handle_init_command(&store, args),
        Commands::Update => handle_update_command(&store),
        Commands::Status(args) => handle_status_command(&store, args),
        Commands::Search(args) => handle_search_command(&store, &config, args),
        Commands::Show(args) => handle_show_command(&store, only, args),
        Commands::Render(args) => handle_render_command(&store, only, args),
        Commands::Exec(args) => handle_exec_command(&store, &config, only, args),
        Commands::Lint(args) => handle_lint_command(&store, only, args),
        Commands::Config | Commands::Plugins => Ok(()),
    }
}

fn parse_platforms(values: &[String]) -> anyhow::Result<Vec<Platform>> {
    values
        .iter()
        .map(|value| match Platform::parse(value) {
            Some(platform) => Ok(platform),
            None => bail!(
                "Unknown platform '{}' (expected one of: {})",
                value,
                Platform::ALL.map(Platform::as_str).join(", ")
            ),
        })
        .collect()
}

/// Serve whatever is cached; only fetch when nothing is.
fn ensure_ready(store: &Store) -> anyhow::Result<()> {
    if store.is_initialized() {
        if store.is_stale() {
            warn!("Page cache is stale; run `cheatstore update` to refresh");
        }
        return Ok(());
    }
    info!("No cached pages yet, fetching the corpus");
    store.initialize().context("Failed to initialize page cache")?;
    Ok(())
}

fn handle_init_command(store: &Store, args: &InitArgs) -> anyhow::Result<()> {
    if args.strict {
        let report = store.initialize_strict()?;
        info!("Cached {} pages (generation {})", report.pages, report.generation);
        return Ok(());
    }

    match store.initialize()? {
        InitOutcome::AlreadyFresh => info!("Page cache is already fresh"),
        InitOutcome::Committed(report) => {
            info!("Cached {} pages (generation {})", report.pages, report.generation)
        }
        InitOutcome::KeptStale(reason) => warn!("Refresh failed, keeping stale cache: {}", reason),
    }
    Ok(())
}

fn handle_update_command(store: &Store) -> anyhow::Result<()> {
    let report = store.update()?;
    info!(
        "Updated {} pages, {} skipped (generation {})",
        report.pages, report.skipped, report.generation
    );
    Ok(())
}

fn handle_status_command(store: &Store, args: &StatusArgs) -> anyhow::Result<()> {
    let stats = store.stats();

    if args.json {
        let json = serde_json::to_string_pretty(&stats).context("Failed to serialize status")?;
        println!("{}", json);
        return Ok(());
    }

    println!("\n=== Cache Status ===");
    println!("Location: {}", stats.cache_dir);
    println!("Pages: {}", stats.pages);
    for (platform, count) in &stats.by_platform {
        println!("  {}: {}", platform, count);
    }
    match stats.updated_at {
        Some(updated_at) => println!("Last updated: {}", updated_at.to_rfc3339()),
        None => println!("Last updated: never"),
    }
    println!("Stale: {}", if stats.stale { "yes" } else { "no" });
    println!("Disk usage: {} bytes", stats.disk_bytes);
    Ok(())
}

fn handle_search_command(store: &Store, config: &Config, args: &SearchArgs) -> anyhow::Result<()> {
    ensure_ready(store)?;

    let results = store.search_pages(&args.query, &config.platforms);
    if results.is_empty() {
        println!("No pages match '{}'", args.query);
        return Ok(());
    }

    for page in results.iter().take(args.limit) {
        println!("{:<24} [{}] {}", page.name, page.platform, page.description);
    }
    if results.len() > args.limit {
        println!("... and {} more", results.len() - args.limit);
    }
    Ok(())
}

/// Look up a page, offering close names when it is missing. With `only`
/// set, pages on other platforms are not considered.
fn lookup(store: &Store, only: Option<&[Platform]>, name: &str) -> anyhow::Result<Arc<Page>> {
    ensure_ready(store)?;

    let found = match only {
        Some(platforms) => store.find_page_among(name, platforms),
        None => store.find_page(name),
    };
    match found {
        Ok(page) => Ok(page),
        Err(e @ CheatstoreError::NotFound { .. }) => {
            let suggestions = store.suggest(name, 5);
            if suggestions.is_empty() {
                Err(e.into())
            } else {
                Err(anyhow::Error::new(e).context(format!("Did you mean: {}?", suggestions.join(", "))))
            }
        }
        Err(e) => Err(e.into()),
    }
}

fn best_example<'a>(page: &'a Page, query: &str) -> anyhow::Result<&'a Example> {
    page.find_best_example(query).ok_or_else(|| {
        CheatstoreError::NoExample {
            page: page.name.clone(),
        }
        .into()
    })
}

fn handle_show_command(store: &Store, only: Option<&[Platform]>, args: &PageArgs) -> anyhow::Result<()> {
    let page = lookup(store, only, &args.name)?;

    println!("\n=== {} ({}) ===", page.name, page.platform);
    if !page.description.is_empty() {
        println!("{}", page.description);
    }
    for (idx, example) in page.examples.iter().enumerate() {
        println!("\n{}. {}", idx + 1, example.description);
        println!("   {}", example.command);
        for placeholder in &example.placeholders {
            println!("     {} ({})", placeholder.token(), placeholder.kind.as_str());
        }
    }
    Ok(())
}

fn render_selected(store: &Store, only: Option<&[Platform]>, args: &RenderArgs) -> anyhow::Result<String> {
    let page = lookup(store, only, &args.name)?;
    let example = best_example(&page, &args.example)?;
    let vars: HashMap<String, String> = args.vars.iter().cloned().collect();

    for placeholder in unresolved(example, &vars) {
        warn!("No value for {}; using its name", placeholder.token());
    }
    Ok(example.render(&vars))
}

fn handle_render_command(store: &Store, only: Option<&[Platform]>, args: &RenderArgs) -> anyhow::Result<()> {
    println!("{}", render_selected(store, only, args)?);
    Ok(())
}

fn handle_exec_command(
    store: &Store,
    config: &Config,
    only: Option<&[Platform]>,
    args: &ExecArgs,
) -> anyhow::Result<()> {
    let command = render_selected(store, only, &args.render)?;
    let executor = Executor::new(config.confirm_destructive && !args.yes, config.audit_log.clone());

    let outcome = executor.run(&command, &mut prompt_confirm)?;
    match outcome {
        ExecOutcome::Declined => info!("Not running: {}", command),
        ExecOutcome::Exited(Some(0)) => {}
        ExecOutcome::Exited(Some(code)) => bail!("Command exited with status {}", code),
        ExecOutcome::Exited(None) => bail!("Command was terminated by a signal"),
    }
    Ok(())
}

fn prompt_confirm(command: &str) -> bool {
    let kind = if is_destructive(command) { "destructive " } else { "" };
    eprint!("Run {}command `{}`? [y/N] ", kind, command);
    if io::stderr().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn handle_lint_command(store: &Store, only: Option<&[Platform]>, args: &LintArgs) -> anyhow::Result<()> {
    let page = lookup(store, only, &args.name)?;
    let registry = PluginRegistry::with_builtins();

    let examples: Vec<&Example> = match &args.example {
        Some(query) => vec![best_example(&page, query)?],
        None => page.examples.iter().collect(),
    };
    if examples.is_empty() {
        return Err(CheatstoreError::NoExample {
            page: page.name.clone(),
        }
        .into());
    }

    let mut total = 0;
    for example in examples {
        let issues = registry.run("lint", example)?;
        if issues.is_empty() {
            continue;
        }
        println!("{}", example.command);
        for issue in &issues {
            println!("  - {}", issue);
        }
        total += issues.len();
    }

    if total > 0 {
        bail!("{} style issues in '{}'", total, page.name);
    }
    println!("No style issues in '{}'", page.name);
    Ok(())
}

fn handle_plugins_command() {
    let registry = PluginRegistry::with_builtins();
    for plugin in registry.plugins() {
        println!("{:<12} {}", plugin.name(), plugin.description());
    }
}
