//! Daemon side: control socket, gesture pipeline and binding dispatch.

mod dispatch;
mod pipeline;
mod runtime;
mod server;

pub use dispatch::dispatch_swipe;
pub use runtime::socket_path;
pub use server::{DaemonEvent, client_request, run_daemon};
