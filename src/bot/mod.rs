//! Chat front-end: command routing, reply cards and CSV export.

pub mod command;
pub mod dispatcher;
pub mod export;
pub mod reply;

pub use command::Command;
pub use dispatcher::Dispatcher;
pub use reply::Reply;
