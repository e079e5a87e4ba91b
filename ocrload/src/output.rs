use crate::cli::OutputFormat;

mod human;
mod json;

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, config: &ocrload_core::RunConfig, thresholds: &[ocrload_core::ThresholdSet]);
    fn progress(&self) -> Option<ocrload_core::ProgressFn>;
    fn print_summary(
        &self,
        summary: &ocrload_core::RunSummary,
        verdicts: &[ocrload_core::ThresholdVerdict],
    ) -> anyhow::Result<()>;
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput::new()),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}
