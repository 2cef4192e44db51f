use crate::api::{Navigator, Route};
use tracing::debug;

/// Tells the terminal user where the session went after a failed request.
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalNavigator;

impl TerminalNavigator {
    #[must_use]
    pub const fn hint(route: Route) -> &'static str {
        match route {
            Route::Login => "Session ended. Run `sesame login` to sign in again.",
            Route::Forbidden => "The current account is not allowed to do this.",
            Route::NotFound => "The requested resource does not exist.",
        }
    }
}

impl Navigator for TerminalNavigator {
    fn navigate(&self, route: Route) {
        debug!("navigate to {}", route.path());
        eprintln!("{}", Self::hint(route));
    }
}
