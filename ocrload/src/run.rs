use std::sync::Arc;

use anyhow::Context as _;

use ocrload_core::{HttpClient, HttpOcrApi, OcrApi, RunOptions};

use crate::cli::RunArgs;
use crate::config_file;
use crate::exit_codes::ExitCode;
use crate::output;
use crate::run_error::RunError;

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    let out = output::formatter(args.output);

    let base = match &args.config {
        Some(path) => config_file::load_run_options(path)
            .await
            .map_err(RunError::InvalidInput)?,
        None => RunOptions::default(),
    };
    let overrides = args.run_options();

    let cfg = ocrload_core::run_config_from_options(&base, &overrides)
        .context("invalid run configuration")
        .map_err(RunError::InvalidInput)?;
    let thresholds = ocrload_core::thresholds_from_options(&base, &overrides)
        .context("invalid thresholds")
        .map_err(RunError::InvalidInput)?;

    let api: Arc<dyn OcrApi> = Arc::new(
        HttpOcrApi::new(HttpClient::default(), &cfg.target, cfg.per_request_timeout)
            .context("failed to build OCR client")
            .map_err(RunError::InvalidInput)?,
    );

    tracing::debug!(?cfg, "resolved run configuration");
    out.print_header(&cfg, &thresholds);

    let summary = ocrload_core::run(&cfg, api, out.progress())
        .await
        .context("load run failed")
        .map_err(RunError::RuntimeError)?;

    let verdicts = ocrload_core::evaluate_thresholds(&thresholds, &summary)
        .context("invalid thresholds")
        .map_err(RunError::InvalidInput)?;

    out.print_summary(&summary, &verdicts)
        .map_err(RunError::RuntimeError)?;

    let passed = ocrload_core::all_passed(&verdicts);
    tracing::debug!(passed, verdicts = verdicts.len(), "thresholds evaluated");
    Ok(ExitCode::from_thresholds(passed))
}
