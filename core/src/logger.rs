//! Narrow logging seam used by the engine components.
//!
//! Components hold an `Arc<dyn Logger>` so the messages they emit for the user
//! (missing samples, unknown drums, stretch failures) can be observed in tests.
//! In production they end up in the `log` facade.

use std::fmt;
use std::sync::Arc;

use log::{error, info, warn};

const TARGET: &str = "tab_sampler";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
  Info,
  Warning,
  Error,
}

impl fmt::Display for Severity {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Severity::Info => write!(f, "info"),
      Severity::Warning => write!(f, "warning"),
      Severity::Error => write!(f, "error"),
    }
  }
}

pub trait Logger: Send + Sync {
  fn log(&self, severity: Severity, message: &str);
}

pub type LoggerRef = Arc<dyn Logger>;

pub struct LogFacade;

impl LogFacade {
  pub fn new_ref() -> LoggerRef {
    Arc::new(LogFacade)
  }
}

impl Logger for LogFacade {
  fn log(&self, severity: Severity, message: &str) {
    match severity {
      Severity::Info => info!(target: TARGET, "{}", message),
      Severity::Warning => warn!(target: TARGET, "{}", message),
      Severity::Error => error!(target: TARGET, "{}", message),
    }
  }
}
