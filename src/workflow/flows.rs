use log::error;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tokio::task::spawn_blocking;

use crate::models::event::ProgressEvent;
use crate::models::request::BatchRequest;
use crate::operations::imaging::ImageBackend;
use crate::workflow::batch::process_batch;

/// Start a batch on the blocking pool and hand back its event stream.
///
/// The receiver yields events in emission order and ends with exactly one terminal
/// event, even if the batch thread panics. Must be called inside a Tokio runtime.
pub fn process_workflow(
    backend: Arc<dyn ImageBackend>,
    request: BatchRequest,
) -> UnboundedReceiver<ProgressEvent> {
    let (tx, rx) = unbounded_channel();

    tokio::spawn(async move {
        let mut sink = tx.clone();
        let outcome = spawn_blocking(move || {
            // The summary is already on the stream as the terminal event.
            let _ = process_batch(&*backend, &request, &mut sink);
        })
        .await;

        if let Err(join_error) = outcome {
            error!("Batch worker crashed: {}", join_error);
            let _ = tx.send(ProgressEvent::error(format!(
                "Batch aborted unexpectedly: {join_error}"
            )));
        }
    });

    rx
}
