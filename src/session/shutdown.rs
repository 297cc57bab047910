use tokio::select;
use tokio_util::sync::CancellationToken;

/// Detects signals sent to the process. A session always runs attached to
/// its console, so ctrl-c is the whole teardown story.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            cancelation.cancel();
        },
    };
}
