//! Reporting of request failures back to the originating session.

use crate::session::Session;

/// How a failed request is surfaced.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Severity {
    /// The user sent something we refuse; shown as a warning, nothing was mutated.
    Warning,
    /// Something on our side failed; logged, the user gets a generic error.
    Error,
    /// The request should not have been possible; logged only.
    Internal,
}

/// Errors that can be shown to the user who caused them.
pub trait UserFacing: std::fmt::Display {
    fn severity(&self) -> Severity;

    /// Get a client-safe message that doesn't leak internal detail
    fn client_message(&self) -> String {
        self.to_string()
    }
}

/// Deliver `err` to `session` according to its severity.
///
/// Requests without a session (server triggered) are only logged.
pub fn report<E: UserFacing>(session: Option<&Session>, err: &E) {
    match err.severity() {
        Severity::Warning => match session {
            Some(session) => session.warning(err.client_message()),
            None => log::debug!("Dropping warning with no session to address: {}", err),
        },
        Severity::Error => {
            log::error!("{}", err);
            if let Some(session) = session {
                session.error(err.client_message());
            }
        }
        Severity::Internal => log::error!("{}", err),
    }
}
