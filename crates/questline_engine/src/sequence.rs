//! Ordered optimistic update application with rollback.
//!
//! A sequence is a caller-declared ordered list of data futures,
//! typically an immediate optimistic value followed by a slower
//! server-confirmed one. Results apply strictly in declared order with
//! all-or-nothing semantics: the first rejection reverts every earlier
//! application back to the pre-sequence snapshot.

use crate::resolver::DataFuture;
use crate::state::DriverCtx;
use questline_core::{QuestFailure, RecordStore, Settlement};
use tracing::{debug, trace};

/// Drives an optimistic sequence for `key` to settlement.
///
/// Every step is spawned up front, so a later-declared step runs
/// concurrently with earlier ones; its result is buffered in its task
/// until it is that step's turn to apply. Steps after a rejection run
/// to settlement (there is no cancellation) but are never applied.
pub(crate) async fn drive<T, S>(
    ctx: DriverCtx<T, S>,
    key: String,
    generation: u64,
    steps: Vec<DataFuture<T>>,
) where
    T: Clone + Send + Sync + 'static,
    S: RecordStore<T> + 'static,
{
    if steps.is_empty() {
        ctx.commit(
            &key,
            generation,
            Settlement::Failure(QuestFailure::sequence(0, "empty optimistic sequence")),
        );
        ctx.inflight.remove(&key);
        return;
    }

    let snapshot = ctx.store.data(&key);
    let handles: Vec<_> = steps.into_iter().map(tokio::spawn).collect();

    for (step, handle) in handles.into_iter().enumerate() {
        let result = match handle.await {
            Ok(result) => result,
            // A panicked step counts as a rejection of that step.
            Err(join_error) => Err(join_error.to_string()),
        };

        match result {
            Ok(value) => {
                trace!(key = %key, step, "optimistic step applied");
                if !ctx.commit(&key, generation, Settlement::Success(value)) {
                    // Generation moved on; later steps are moot.
                    break;
                }
            }
            Err(reason) => {
                debug!(key = %key, step, reason = %reason, "optimistic step rejected, rolling back");
                ctx.commit(
                    &key,
                    generation,
                    Settlement::Rollback {
                        data: snapshot.clone(),
                        failure: QuestFailure::sequence(step, reason),
                    },
                );
                break;
            }
        }
    }

    ctx.inflight.remove(&key);
}
