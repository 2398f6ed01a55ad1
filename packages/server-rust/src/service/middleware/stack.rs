//! Stack composition: wraps the dispatcher with its middleware layers.

use tower::ServiceBuilder;

use super::metrics::{MetricsLayer, MetricsService};
use crate::service::dispatcher::CommandDispatcher;

/// Dispatcher wrapped with every middleware layer, as used by the pipeline.
pub type DispatchStack = MetricsService<CommandDispatcher>;

/// Build the dispatch stack around a `CommandDispatcher`.
///
/// No timeout or load-shedding layer: a started unit of work runs to
/// completion and the worker pool is the only concurrency limit.
#[must_use]
pub fn build_dispatch_stack(dispatcher: CommandDispatcher) -> DispatchStack {
    ServiceBuilder::new().layer(MetricsLayer).service(dispatcher)
}
