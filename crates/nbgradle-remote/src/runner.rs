use crate::issue::{IssueKind, IssueScope, ModelIssue, TransferredError};
use nbgradle_model::MultiKey;
use nbgradle_transfer::{BuilderHandle, BuilderKind, ModelResult, PartitionedMap};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Results and issues of running a set of handles against one target.
pub(crate) struct Collected {
    pub(crate) results: PartitionedMap<MultiKey>,
    pub(crate) issues: Vec<ModelIssue>,
}

/// Runs every handle against the same target, one at a time.
///
/// Each failure is confined to its key: it becomes a [`ModelIssue`] and the
/// remaining handles still run. Builders that report nothing leave no entry.
pub(crate) fn run_handles<'a, B>(
    handles: impl IntoIterator<Item = (&'a MultiKey, &'a BuilderHandle<B>)>,
    scope: &IssueScope,
    invoke: impl Fn(&B) -> ModelResult,
) -> Collected
where
    B: ?Sized + BuilderKind + 'a,
{
    let mut collected = Collected {
        results: PartitionedMap::new(),
        issues: Vec::new(),
    };

    for (key, handle) in handles {
        let issue = |kind, error| ModelIssue {
            key: key.clone(),
            scope: scope.clone(),
            kind,
            builder: handle.describe(),
            error,
        };

        let builder = match handle.resolve() {
            Ok(builder) => builder,
            Err(err) => {
                tracing::warn!(
                    target = "nbgradle.remote",
                    key = %key,
                    scope = %scope,
                    builder = %handle.describe(),
                    error = %err,
                    "failed to resolve model builder"
                );
                collected
                    .issues
                    .push(issue(IssueKind::Resolution, TransferredError::from_resolve(&err)));
                continue;
            }
        };

        let value = match catch_unwind(AssertUnwindSafe(|| invoke(&*builder))) {
            Ok(Ok(Some(value))) => value,
            Ok(Ok(None)) => {
                tracing::trace!(
                    target = "nbgradle.remote",
                    key = %key,
                    scope = %scope,
                    "model builder reported nothing"
                );
                continue;
            }
            Ok(Err(err)) => {
                tracing::warn!(
                    target = "nbgradle.remote",
                    key = %key,
                    scope = %scope,
                    builder = %handle.describe(),
                    error = ?err,
                    "model builder failed"
                );
                collected
                    .issues
                    .push(issue(IssueKind::Execution, TransferredError::from_anyhow(&err)));
                continue;
            }
            Err(payload) => {
                let error = TransferredError::from_panic(&*payload);
                tracing::error!(
                    target = "nbgradle.remote",
                    key = %key,
                    scope = %scope,
                    builder = %handle.describe(),
                    panic = %error.message,
                    "model builder panicked"
                );
                collected.issues.push(issue(IssueKind::Panic, error));
                continue;
            }
        };

        if let Err(err) = collected.results.insert(key.clone(), &[value]) {
            tracing::warn!(
                target = "nbgradle.remote",
                key = %key,
                scope = %scope,
                error = %err,
                "failed to encode model value"
            );
            collected.issues.push(issue(
                IssueKind::Encoding,
                TransferredError::from_error("TransferError", &err),
            ));
        }
    }

    collected
}
