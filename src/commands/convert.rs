use crate::cli::ConvertOpts;
use crate::exit_code::ExitCode;

/// `crm convert RECIPE` — writes a v1 rendering to standard output (or `--output FILE`).
/// The converter itself always completes once parsed; only an unrecoverable parse failure
/// produces a non-zero exit.
pub fn run(opts: &ConvertOpts) -> ExitCode {
    let content = match fs_err::read_to_string(&opts.recipe) {
        Ok(content) => content,
        Err(err) => {
            tracing::error!("couldn't read {}: {err}", opts.recipe.display());
            return ExitCode::Io;
        }
    };

    let output = match crm_convert::Converter::convert(&content) {
        Ok(output) => output,
        Err(err) => {
            tracing::error!("failed to convert {}: {err}", opts.recipe.display());
            return ExitCode::Parse;
        }
    };

    for message in &output.messages.warnings {
        tracing::warn!("{}", message.text);
    }
    for message in &output.messages.errors {
        tracing::error!("{}", message.text);
    }

    match &opts.output {
        Some(path) => {
            if let Err(err) = fs_err::write(path, &output.recipe_text) {
                tracing::error!("couldn't write {}: {err}", path.display());
                return ExitCode::Io;
            }
        }
        None => println!("{}", output.recipe_text),
    }

    ExitCode::Success
}
