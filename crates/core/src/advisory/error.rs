use crate::advisory::Provider;
use std::fmt;

/// Failure from the advisory service, keeping whatever the provider sent back.
#[derive(Debug, Clone)]
pub struct AdvisoryDiagnosticsError {
    pub provider: Provider,
    pub stage: &'static str,
    pub detail: String,
    pub raw_output: Option<String>,
}

impl fmt::Display for AdvisoryDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "advisory error (provider={:?}, stage={}): {}",
            self.provider, self.stage, self.detail
        )
    }
}

impl std::error::Error for AdvisoryDiagnosticsError {}
