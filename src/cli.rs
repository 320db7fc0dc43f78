//! Command-line options.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};

#[derive(Parser)]
#[command(name = "crm", version, about = "Machine-readable manipulation of conda recipe files")]
pub struct App {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging; repeat for more, pass `-q` for less. Defaults to WARN.
    #[command(flatten)]
    pub verbose: Verbosity<WarnLevel>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Renders a v0 or v1 recipe to the v1 format.
    Convert(ConvertOpts),

    /// Bumps a recipe to a new version, or its build number.
    BumpRecipe(BumpRecipeOpts),

    /// Prints a recipe's dependency graph. Not implemented by this tool.
    Graph(GraphOpts),
}

#[derive(Parser, Debug, Clone)]
pub struct ConvertOpts {
    /// Path to the target recipe file.
    pub recipe: PathBuf,

    /// Write the converted recipe to this file instead of standard output.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct BumpRecipeOpts {
    /// Path to the target recipe file.
    pub recipe: PathBuf,

    /// Reset the build number to a custom value. Requires `--target-version`.
    #[arg(short = 'o', long, value_name = "N")]
    pub override_build_num: Option<u32>,

    /// Bump the build number by 1.
    #[arg(short = 'b', long)]
    pub build_num: bool,

    /// Print the recipe to standard output instead of saving it.
    #[arg(short = 'd', long)]
    pub dry_run: bool,

    /// New project version to bump to. Required unless `--build-num` is given.
    #[arg(short = 't', long, value_name = "VERSION")]
    pub target_version: Option<String>,

    /// Retry interval in seconds for network requests; scales with failed attempt count.
    #[arg(short = 'i', long, default_value_t = crm_fetcher::DEFAULT_RETRY_INTERVAL)]
    pub retry_interval: f64,

    /// Save the current state of the recipe file even if the bump fails partway through.
    #[arg(short = 's', long)]
    pub save_on_failure: bool,

    /// Omit the trailing newline from the saved recipe file.
    #[arg(long)]
    pub omit_trailing_newline: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct GraphOpts {
    /// Path to the target recipe file.
    pub path: PathBuf,
}
