use crate::cli::GraphOpts;
use crate::exit_code::ExitCode;

/// `crm graph PATH` — explicitly out of scope for this tool's core; parses its argument and
/// reports that the dependency-graph view isn't implemented, rather than silently doing nothing.
pub fn run(opts: &GraphOpts) -> ExitCode {
    tracing::error!("`crm graph` is not implemented by this tool (requested for {})", opts.path.display());
    ExitCode::IllegalOperation
}
