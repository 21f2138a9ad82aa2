use crate::renderer::ArchiveSummaryRenderer;
use recap_cache::{run_worker, WorkerRequest};
use recap_core::ExitStatus;

/// Run one report generation in this process and return the exit status
pub async fn execute(args: Vec<String>) -> ExitStatus {
    let request = match WorkerRequest::from_args_and_env(&args, |var| std::env::var(var).ok()) {
        Ok(request) => request,
        Err(e) => {
            tracing::error!("invalid worker request: {e}");
            return ExitStatus::Other;
        }
    };
    tracing::debug!(
        locator = %request.locator,
        transformers = ?request.transformers,
        "report worker started"
    );

    run_worker(request, &ArchiveSummaryRenderer).await
}
