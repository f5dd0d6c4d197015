//! Page identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// The views the application can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageName {
    #[default]
    Home,
    About,
    Contact,
    Login,
    User,
    Admin,
}

impl PageName {
    pub const ALL: [PageName; 6] = [
        PageName::Home,
        PageName::About,
        PageName::Contact,
        PageName::Login,
        PageName::User,
        PageName::Admin,
    ];

    /// Look up a page by identifier. Unknown identifiers yield `None`.
    pub fn parse(id: &str) -> Option<Self> {
        match id {
            "home" => Some(PageName::Home),
            "about" => Some(PageName::About),
            "contact" => Some(PageName::Contact),
            "login" => Some(PageName::Login),
            "user" => Some(PageName::User),
            "admin" => Some(PageName::Admin),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PageName::Home => "home",
            PageName::About => "about",
            PageName::Contact => "contact",
            PageName::Login => "login",
            PageName::User => "user",
            PageName::Admin => "admin",
        }
    }

    /// Path the page is served under
    pub fn path(self) -> &'static str {
        match self {
            PageName::Home => "/",
            PageName::About => "/about",
            PageName::Contact => "/contact",
            PageName::Login => "/login",
            PageName::User => "/user",
            PageName::Admin => "/admin",
        }
    }

    /// Template file rendering this page
    pub fn template(self) -> &'static str {
        match self {
            PageName::Home => "home.html",
            PageName::About => "about.html",
            PageName::Contact => "contact.html",
            PageName::Login => "login.html",
            PageName::User => "user.html",
            PageName::Admin => "admin.html",
        }
    }
}

impl fmt::Display for PageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_pages() {
        for page in PageName::ALL {
            assert_eq!(PageName::parse(page.as_str()), Some(page));
        }
    }

    #[test]
    fn test_parse_unknown_page() {
        assert_eq!(PageName::parse("dashboard"), None);
        assert_eq!(PageName::parse("Home"), None);
        assert_eq!(PageName::parse(""), None);
    }
}
