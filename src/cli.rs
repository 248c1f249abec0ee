use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cheatstore")]
#[command(about = "An offline store of command-line cheat sheets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (defaults to $CHEATSTORE_CONFIG or the user config dir)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Restrict searches and page lookups to a platform (repeatable). Without
    /// it, the configured platforms are searched, and a page missing from
    /// them is looked up on any platform
    #[arg(short, long = "platform", global = true, value_name = "PLATFORM")]
    pub platforms: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the page corpus unless a fresh cache exists
    Init(InitArgs),

    /// Re-fetch the page corpus unconditionally
    Update,

    /// Show cache location, size and freshness
    Status(StatusArgs),

    /// Search pages by name or description
    Search(SearchArgs),

    /// Print a page with all of its examples
    Show(PageArgs),

    /// Print the best example of a page with placeholders filled in
    Render(RenderArgs),

    /// Render an example and run it through the shell
    Exec(ExecArgs),

    /// Check a page's examples against the style guide
    Lint(LintArgs),

    /// List registered plugins
    Plugins,

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Args)]
pub struct InitArgs {
    /// Fail if a fresh cache already exists
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Print the status as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Text matched against page names and descriptions
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Maximum number of results to print
    #[arg(short, long, default_value = "20")]
    pub limit: usize,
}

#[derive(Args)]
pub struct PageArgs {
    /// Page name, e.g. `tar`
    #[arg(value_name = "NAME")]
    pub name: String,
}

#[derive(Args)]
pub struct RenderArgs {
    /// Page name, e.g. `tar`
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Pick the first example whose description contains this text
    #[arg(short, long, value_name = "QUERY", default_value = "")]
    pub example: String,

    /// Placeholder value as KEY=VALUE (repeatable)
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,
}

#[derive(Args)]
pub struct ExecArgs {
    #[command(flatten)]
    pub render: RenderArgs,

    /// Skip the confirmation prompt for destructive commands
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct LintArgs {
    /// Page name, e.g. `tar`
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Only lint the best example for this text
    #[arg(short, long, value_name = "QUERY")]
    pub example: Option<String>,
}

fn parse_var(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, val)) if !key.trim().is_empty() => Ok((key.trim().to_string(), val.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", value)),
    }
}
