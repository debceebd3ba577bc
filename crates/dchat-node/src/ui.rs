//! UI-facing logging hooks (spec.md §4.G `ui_log`/`ui_fatal`): the seam a
//! host application (CLI, desktop shell, ...) can use to surface node events
//! without the node crate depending on any particular presentation layer.

use crate::logging::{log, Severity};

/// Presentation seam for node events. The default [`TracingUi`] just routes
/// through the [`crate::logging`] sink; a host application can supply its
/// own implementation (status bar, admin console, ...).
pub trait NodeUi: Send + Sync {
    fn ui_log(&self, level: Severity, message: &str);

    /// Logs `message` at `Emerg` and terminates the process. Never returns
    /// (spec.md §4.G: "ui_fatal... terminates the process after flushing").
    fn ui_fatal(&self, message: &str) -> ! {
        self.ui_log(Severity::Emerg, message);
        std::process::exit(1);
    }
}

/// Default [`NodeUi`] that routes every call through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingUi;

impl NodeUi for TracingUi {
    fn ui_log(&self, level: Severity, message: &str) {
        log(level, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracing_ui_log_does_not_panic() {
        TracingUi.ui_log(Severity::Info, "node started");
    }
}
