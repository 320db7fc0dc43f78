use std::sync::Arc;

use crm_bumper::{BumpError, VersionBumper, VersionBumperOptions};
use crm_fetcher::DEFAULT_RETRIES;
use crm_parser::Parser;

use crate::cli::BumpRecipeOpts;
use crate::exit_code::ExitCode;

/// Flags that interact with each other in ways that are only valid in certain combinations.
/// Mirrors the CLI-level validation performed before a `VersionBumper` is constructed.
fn validate_interop_flags(opts: &BumpRecipeOpts) -> Result<(), String> {
    if opts.override_build_num.is_some() && opts.target_version.is_none() {
        return Err("`--target-version` must be provided when using `--override-build-num`".to_string());
    }
    if !opts.build_num && opts.target_version.is_none() {
        return Err("`--target-version` must be provided if `--build-num` is not provided".to_string());
    }
    if opts.build_num && opts.override_build_num.is_some() {
        return Err("`--build-num` and `--override-build-num` cannot be used together".to_string());
    }
    if opts.build_num && opts.target_version.is_some() {
        return Err("`--build-num` and `--target-version` cannot be used together".to_string());
    }
    Ok(())
}

fn bump_error_exit_code(err: &BumpError) -> ExitCode {
    match err {
        BumpError::InvalidState(_) => ExitCode::IllegalOperation,
        BumpError::Patch(_) => ExitCode::Patch,
        BumpError::Fetch(_) => ExitCode::Http,
        BumpError::Io(_) => ExitCode::Io,
    }
}

/// Performs a full version bump: updates `/package/version`, then fetches the (possibly
/// PyPI-corrected) source artifacts and patches their URLs/hashes in. The version must be
/// updated before fetching, so that the previous version's artifacts aren't fetched by mistake.
async fn full_version_bump(vb: &mut VersionBumper, target_version: &str, retry_interval: f64) -> Result<(), BumpError> {
    vb.update_version(target_version)?;

    let client = Arc::new(crm_fetcher::http::build_client()?);
    let version_path: crm_parser::Path = "/package/version".parse().expect("static path");
    let package_name = vb.recipe_reader().get_recipe_name().unwrap_or_default();
    let package_version = vb.recipe_reader().get_value(&version_path).ok().and_then(|v| v.as_str().map(str::to_string)).unwrap_or_default();

    let outcomes = crm_fetcher::fetch_all_corrected_artifacts_with_retry(
        vb.recipe_reader(),
        client,
        retry_interval,
        DEFAULT_RETRIES,
        &package_name,
        &package_version,
    )
    .await?;

    vb.update_http_urls(&outcomes)?;
    vb.update_sha256(&outcomes)?;
    Ok(())
}

/// `crm bump-recipe` — bumps a recipe's build number and/or version, corrects source URLs and
/// hashes, and writes the result back (or to standard output in `--dry-run` mode).
pub async fn run(opts: &BumpRecipeOpts) -> ExitCode {
    if let Err(message) = validate_interop_flags(opts) {
        tracing::error!("{message}");
        return ExitCode::ClickUsage;
    }

    let content = match fs_err::read_to_string(&opts.recipe) {
        Ok(content) => content,
        Err(err) => {
            tracing::error!("couldn't read {}: {err}", opts.recipe.display());
            return ExitCode::Io;
        }
    };
    let parser = match Parser::new(&content) {
        Ok(parser) => parser,
        Err(err) => {
            tracing::error!("failed to parse {}: {err}", opts.recipe.display());
            return ExitCode::Parse;
        }
    };

    let options = VersionBumperOptions {
        dry_run: opts.dry_run,
        commit_on_failure: opts.save_on_failure,
        omit_trailing_newline: opts.omit_trailing_newline,
    };
    let mut vb = match VersionBumper::from_parser(&opts.recipe, parser, options) {
        Ok(vb) => vb,
        Err(err) => {
            tracing::error!("failed to prepare {}: {err}", opts.recipe.display());
            return bump_error_exit_code(&err);
        }
    };

    let build_num_value = if opts.build_num { None } else { Some(i64::from(opts.override_build_num.unwrap_or(0))) };
    if let Err(err) = vb.update_build_num(build_num_value) {
        tracing::error!("failed to update `/build/number`: {err}");
        return bump_error_exit_code(&err);
    }

    if let Some(target_version) = &opts.target_version {
        if let Err(err) = full_version_bump(&mut vb, target_version, opts.retry_interval).await {
            tracing::error!("failed to bump to version `{target_version}`: {err}");
            return bump_error_exit_code(&err);
        }
    }

    if let Err(err) = vb.commit_changes() {
        tracing::error!("failed to save {}: {err}", opts.recipe.display());
        return ExitCode::Io;
    }

    ExitCode::Success
}
