//! Central error reporting and success notification
//!
//! Unsolicited transport errors have no caller to return to, so they go to an
//! [`ErrorReporter`]. Command successes go to a [`Notifier`]. Both default to
//! the log facade.

use crate::commands::CommandKind;
use log::{error, info};
use tradedesk_core::ErrorNotice;

pub trait ErrorReporter: Send + Sync {
    fn report(&self, notice: &ErrorNotice);
}

pub trait Notifier: Send + Sync {
    fn success(&self, kind: CommandKind, message: &str);
}

/// Reports errors at `error` level
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, notice: &ErrorNotice) {
        error!("Transport error: {}", notice);
    }
}

/// Announces command successes at `info` level
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn success(&self, kind: CommandKind, message: &str) {
        info!("{} succeeded: {}", kind, message);
    }
}
