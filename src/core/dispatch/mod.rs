//! Command delivery over HTTP, with connectivity probing and health
//! statistics.

pub mod dispatcher;
pub mod target;

pub use dispatcher::{CommandResult, ConnectionState, DispatchStatistics, NetworkDispatcher};
pub use target::{
    CONSOLE_PORT, DEFAULT_DISPATCH_TIMEOUT, NetworkTarget, TESTING_GUI_PORT, TargetType,
};
