//! Mail drop watching and per-event dispatch.

pub mod dispatch;
pub mod watcher;

pub use dispatch::Dispatcher;
pub use watcher::MailDropWatcher;
