//! Turning library errors and ingestion warnings into terminal diagnostics.

use miette::{MietteDiagnostic, Report};
use rollcall_extract::models::ParseWarning;
use std::error::Error as StdError;

pub(crate) trait IntoReport<T> {
    fn into_report(self) -> miette::Result<T>;
}

impl<T, E> IntoReport<T> for Result<T, exn::Exn<E>>
where
    E: StdError + Send + Sync + 'static,
{
    fn into_report(self) -> miette::Result<T> {
        self.map_err(|err| {
            // The full tree, with locations, is only interesting when debugging.
            tracing::debug!(error = ?err, "Command failed");
            miette::miette!("{}", *err)
        })
    }
}

pub(crate) fn warning_line(warning: &ParseWarning) -> String {
    match &warning.fix {
        Some(fix) => format!("[{}] {}: {} ({fix})", warning.severity, warning.code, warning.message),
        None => format!("[{}] {}: {}", warning.severity, warning.code, warning.message),
    }
}

/// Diagnostic for the warning that made an ingestion fail.
pub(crate) fn failure(warning: &ParseWarning) -> Report {
    let mut diagnostic = MietteDiagnostic::new(warning.message.clone()).with_code(warning.code.as_str());
    if let Some(fix) = &warning.fix {
        diagnostic = diagnostic.with_help(fix.clone());
    }
    Report::new(diagnostic)
}
