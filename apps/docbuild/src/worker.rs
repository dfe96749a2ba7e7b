//! Worker loop for one build instruction

use docbuild_builder::{BuildInstructionController, Claim};
use std::sync::Arc;
use std::time::Duration;

/// How long a worker backs off when nothing is open but units are still
/// building elsewhere.
const IDLE_BACKOFF: Duration = Duration::from_millis(50);

/// Claim and execute work units until the queue is drained.
///
/// Any number of these may run against the same controller; the claim
/// queue guarantees each unit is built exactly once. A unit whose build
/// command cannot be spawned is reported as failed rather than retried.
pub async fn run(controller: Arc<BuildInstructionController>) {
    loop {
        match controller.claim_next() {
            Claim::Ready(deliverable) => {
                let success = match deliverable.build().await {
                    Ok(output) => output.success,
                    Err(error) => {
                        tracing::warn!(
                            deliverable = %deliverable.id(),
                            %error,
                            "failed to spawn build command"
                        );
                        false
                    }
                };
                controller.complete(deliverable.id(), success);
            }
            Claim::InFlight => tokio::time::sleep(IDLE_BACKOFF).await,
            Claim::Finished => break,
        }
    }
}
