//! Backends used when the worker runs under the CLI host

use chrono::{Local, NaiveDateTime};

pub mod clients;
pub mod network;
pub mod notifier;

pub use clients::StdoutClients;
pub use network::HttpNetwork;
pub use notifier::TerminalNotifier;

use crate::worker::Clock;

/// Local wall clock of the machine
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}
