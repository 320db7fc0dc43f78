mod cli;
mod commands;
mod exit_code;

use clap::Parser;
use tracing_subscriber::filter::LevelFilter;

use cli::{App, Commands};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let app = App::parse();
    init_logging(&app);

    let exit_code = match &app.command {
        Commands::Convert(opts) => commands::convert::run(opts),
        Commands::BumpRecipe(opts) => commands::bump_recipe::run(opts).await,
        Commands::Graph(opts) => commands::graph::run(opts),
    };

    std::process::ExitCode::from(i32::from(exit_code) as u8)
}

fn init_logging(app: &App) {
    let default_directive: LevelFilter = app.verbose.log_level_filter().to_string().parse().unwrap_or(LevelFilter::WARN);
    let env_filter = tracing_subscriber::EnvFilter::builder().with_default_directive(default_directive.into()).from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(env_filter).with_writer(std::io::stderr).without_time().init();
}
