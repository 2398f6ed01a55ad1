//! Command dispatch: maps a decoded `Command` onto exactly one store call.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use itemq_core::{Command, CommandType, TraceContext};
use tower::Service;
use tracing::info;

use super::operation::{DispatchError, DispatchRequest, DispatchResponse};
use crate::storage::StorageEngine;

type BoxedFuture = Pin<Box<dyn Future<Output = Result<DispatchResponse, DispatchError>> + Send>>;

// ---------------------------------------------------------------------------
// CommandDispatcher
// ---------------------------------------------------------------------------

/// Stateless router from command type to store operation.
///
/// | command type  | store call         |
/// |---------------|--------------------|
/// | `AddItem`     | `add(item)`        |
/// | `RemoveItem`  | `remove(id)`       |
/// | `GetItem`     | `get(id)`          |
/// | `GetAllItems` | `get_all()`        |
/// | anything else | none, `UnknownCommand` |
///
/// No validation is performed on `item_id` or `item_payload`. Cloning is
/// cheap: clones share the same store.
#[derive(Clone)]
pub struct CommandDispatcher {
    store: Arc<dyn StorageEngine>,
}

impl CommandDispatcher {
    #[must_use]
    pub fn new(store: Arc<dyn StorageEngine>) -> Self {
        Self { store }
    }

    /// The store this dispatcher applies commands to.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn StorageEngine> {
        &self.store
    }

    /// Apply one command to the store.
    ///
    /// Read results are logged under the trace id and returned for
    /// observation; they are never sent back to the command's originator.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::UnknownCommand` for unrecognized command types.
    /// The store is not touched in that case.
    pub fn dispatch(
        &self,
        command: &Command,
        trace: &TraceContext,
    ) -> Result<DispatchResponse, DispatchError> {
        let trace_id = trace.trace_id();
        info!(trace_id, command = %command, "start processing command");

        match command.command_type() {
            CommandType::AddItem => {
                let id = command.item_id();
                let replaced = self.store.add(command.to_item()).is_some();
                info!(trace_id, item_id = id, replaced, "item was added");
                Ok(DispatchResponse::Added { id, replaced })
            }
            CommandType::RemoveItem => {
                let id = command.item_id();
                let existed = self.store.remove(id).is_some();
                info!(trace_id, item_id = id, existed, "item was removed");
                Ok(DispatchResponse::Removed { id, existed })
            }
            CommandType::GetItem => {
                let id = command.item_id();
                let item = self.store.get(id);
                match &item {
                    Some(found) => info!(trace_id, item = %found, "item was retrieved"),
                    None => info!(trace_id, item_id = id, "item not found"),
                }
                Ok(DispatchResponse::Item { id, item })
            }
            CommandType::GetAllItems => {
                let items = self.store.get_all();
                info!(trace_id, count = items.len(), items = ?items, "all items retrieved");
                Ok(DispatchResponse::Items(items))
            }
            CommandType::Unknown(raw_type) => Err(DispatchError::UnknownCommand { raw_type }),
        }
    }
}

impl fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("items", &self.store.len())
            .finish()
    }
}

/// Lets the dispatcher sit at the bottom of a tower middleware stack.
///
/// The store call runs when the returned future is polled, not in `call`,
/// so wrapping layers observe it inside their spans.
impl Service<DispatchRequest> for CommandDispatcher {
    type Response = DispatchResponse;
    type Error = DispatchError;
    type Future = BoxedFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: DispatchRequest) -> Self::Future {
        let dispatcher = self.clone();
        Box::pin(async move { dispatcher.dispatch(&req.command, &req.trace) })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use itemq_core::Item;
    use tower::ServiceExt;

    use super::*;
    use crate::storage::OrderedStorage;

    fn dispatcher() -> CommandDispatcher {
        CommandDispatcher::new(Arc::new(OrderedStorage::new()))
    }

    fn trace() -> TraceContext {
        TraceContext::new("trace-1")
    }

    #[test]
    fn add_item_stores_item() {
        let d = dispatcher();
        let resp = d.dispatch(&Command::add_item(1, "A"), &trace()).unwrap();
        assert_eq!(resp, DispatchResponse::Added { id: 1, replaced: false });
        assert_eq!(d.store().get(1), Some(Item::new(1, "A")));

        let resp = d.dispatch(&Command::add_item(1, "B"), &trace()).unwrap();
        assert_eq!(resp, DispatchResponse::Added { id: 1, replaced: true });
    }

    #[test]
    fn remove_item_reports_whether_it_existed() {
        let d = dispatcher();
        d.dispatch(&Command::add_item(1, "A"), &trace()).unwrap();

        let resp = d.dispatch(&Command::remove_item(1), &trace()).unwrap();
        assert_eq!(resp, DispatchResponse::Removed { id: 1, existed: true });

        let resp = d.dispatch(&Command::remove_item(1), &trace()).unwrap();
        assert_eq!(resp, DispatchResponse::Removed { id: 1, existed: false });
    }

    #[test]
    fn get_item_signals_not_found() {
        let d = dispatcher();
        let resp = d.dispatch(&Command::get_item(5), &trace()).unwrap();
        assert_eq!(resp, DispatchResponse::Item { id: 5, item: None });

        d.dispatch(&Command::add_item(5, ""), &trace()).unwrap();
        let resp = d.dispatch(&Command::get_item(5), &trace()).unwrap();
        assert_eq!(
            resp,
            DispatchResponse::Item {
                id: 5,
                item: Some(Item::new(5, ""))
            }
        );
    }

    #[test]
    fn add_add_remove_then_get_all() {
        let d = dispatcher();
        d.dispatch(&Command::add_item(1, "A"), &trace()).unwrap();
        d.dispatch(&Command::add_item(2, "B"), &trace()).unwrap();
        d.dispatch(&Command::remove_item(1), &trace()).unwrap();

        let resp = d.dispatch(&Command::get_all_items(), &trace()).unwrap();
        assert_eq!(resp, DispatchResponse::Items(vec![Item::new(2, "B")]));
    }

    #[test]
    fn unknown_command_leaves_store_untouched() {
        let d = dispatcher();
        d.dispatch(&Command::add_item(1, "A"), &trace()).unwrap();

        let err = d
            .dispatch(&Command::new(CommandType::Unknown(9), 2, "X"), &trace())
            .unwrap_err();
        assert_eq!(err, DispatchError::UnknownCommand { raw_type: 9 });
        assert_eq!(d.store().get_all(), vec![Item::new(1, "A")]);
    }

    #[tokio::test]
    async fn service_call_dispatches() {
        let d = dispatcher();
        let store = Arc::clone(d.store());

        let req = DispatchRequest::new(Command::add_item(7, "G"), TraceContext::empty());
        let resp = d.oneshot(req).await.unwrap();
        assert_eq!(resp, DispatchResponse::Added { id: 7, replaced: false });
        assert_eq!(store.len(), 1);
    }
}
