//! Command dispatch and execution framework.
//!
//! 1. **Operation types** (`operation`): dispatch request, response and errors
//! 2. **Dispatcher** (`dispatcher`): maps a `Command` onto one store call
//! 3. **Middleware** (`middleware`): tower layers around the dispatcher
//! 4. **Worker pool** (`worker`): fixed set of workers running units of work

pub mod config;
pub mod dispatcher;
pub mod middleware;
pub mod operation;
pub mod worker;

pub use config::ServerConfig;
pub use dispatcher::CommandDispatcher;
pub use middleware::{build_dispatch_stack, DispatchStack};
pub use operation::{DispatchError, DispatchRequest, DispatchResponse};
pub use worker::{PoolError, PoolState, PoolStats, UnitOfWork, WorkerPool};
