//! Terminal "navigation": the login URL is printed for the user to open.

use qlik_embed_core::{NavigationError, Navigator};
use url::Url;

pub struct TerminalNavigator {
    quiet: bool,
}

impl TerminalNavigator {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    fn announce(&self, url: &Url) {
        if !self.quiet {
            eprintln!("Log in to the tenant by opening:\n  {url}");
        }
    }
}

impl Navigator for TerminalNavigator {
    fn navigate_top(&self, url: &Url) -> Result<(), NavigationError> {
        self.announce(url);
        Ok(())
    }

    fn navigate_self(&self, url: &Url) {
        self.announce(url);
    }
}
