use std::error::Error;

use log::{debug, error, info, warn};

pub trait Logger: Send + Sync {

  fn debug(&self, message: &str);
  fn info(&self, message: &str);
  fn warn(&self, message: &str);
  fn error(&self, message: &str, backtrace: Option<&dyn Error>);
}

/// Default logger that forwards to the `log` facade.
pub struct ConsoleLogger {}

impl Logger for ConsoleLogger {
  fn debug(&self, message: &str) {
    debug!("{}", message);
  }

  fn info(&self, message: &str) {
    info!("{}", message);
  }

  fn warn(&self, message: &str) {
    warn!("{}", message);
  }

  fn error(&self, message: &str, _error: Option<&dyn Error>)
  {
    error!("{}", message);
  }
}
