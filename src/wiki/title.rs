#![forbid(unsafe_code)]

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

use crate::utils::errors::WikiError;

// ***************************************************************************
//                             Static Variables
// ***************************************************************************
// The only request paths the wiki serves.  The title is the second capture.
lazy_static! {
    static ref VALID_PATH: Regex =
        Regex::new("^/(edit|save|view)/([a-zA-Z0-9]+)$").expect("valid path regex");
    static ref VALID_TITLE: Regex =
        Regex::new("^[a-zA-Z0-9]+$").expect("valid title regex");
}

// ***************************************************************************
//                                Enums
// ***************************************************************************
/// The three page operations, named by the first path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WikiOp {
    View,
    Edit,
    Save,
}

impl WikiOp {
    #[cfg(test)]
    pub const ALL: [WikiOp; 3] = [WikiOp::View, WikiOp::Edit, WikiOp::Save];

    fn from_segment(s: &str) -> Option<WikiOp> {
        match s {
            "view" => Some(WikiOp::View),
            "edit" => Some(WikiOp::Edit),
            "save" => Some(WikiOp::Save),
            _ => None,
        }
    }

    /// Path of this operation applied to a title, e.g. /edit/FrontPage.
    pub fn path(&self, title: &Title) -> String {
        format!("/{}/{}", self, title)
    }
}

// Convert enum to it's path segment.
impl fmt::Display for WikiOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WikiOp::View => write!(f, "view"),
            WikiOp::Edit => write!(f, "edit"),
            WikiOp::Save => write!(f, "save"),
        }
    }
}

// ***************************************************************************
//                                 Title
// ***************************************************************************
/// A page title known to match [a-zA-Z0-9]+.  There is no way to build one
/// from an unchecked string, so any filename derived from it stays inside the
/// pages directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Title(String);

impl Title {
    /// Validate a bare title.
    pub fn parse(s: &str) -> Result<Title, WikiError> {
        if VALID_TITLE.is_match(s) {
            Ok(Title(s.to_string()))
        } else {
            Err(WikiError::InvalidPath)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Title {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// validate_path:
// ---------------------------------------------------------------------------
/** Accept only /view/<title>, /edit/<title> and /save/<title> where the title
 * is one or more ASCII letters or digits.  Anything else is InvalidPath and
 * the caller must answer 404 without touching the page store.
 */
pub fn validate_path(path: &str) -> Result<(WikiOp, Title), WikiError> {
    let caps = VALID_PATH.captures(path).ok_or(WikiError::InvalidPath)?;
    let op = caps
        .get(1)
        .and_then(|m| WikiOp::from_segment(m.as_str()))
        .ok_or(WikiError::InvalidPath)?;
    let title = caps.get(2).ok_or(WikiError::InvalidPath)?;
    Ok((op, Title(title.as_str().to_string())))
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_each_operation() {
        let (op, title) = validate_path("/view/FrontPage").unwrap();
        assert_eq!(op, WikiOp::View);
        assert_eq!(title.as_str(), "FrontPage");

        let (op, title) = validate_path("/edit/Page2").unwrap();
        assert_eq!(op, WikiOp::Edit);
        assert_eq!(title.as_str(), "Page2");

        let (op, title) = validate_path("/save/42").unwrap();
        assert_eq!(op, WikiOp::Save);
        assert_eq!(title.as_str(), "42");
    }

    #[test]
    fn rejects_malformed_paths() {
        let bad = [
            "/",
            "",
            "/view",
            "/view/",
            "/view/My Page!",
            "/view/My%20Page",
            "/view/a/b",
            "/view/../etc/passwd",
            "/view/..",
            "/delete/Page",
            "/VIEW/Page",
            "view/Page",
            "/view/Page/",
            "/view/Page.txt",
            "/view/Page\n",
            "/view/Pagé",
            "//view/Page",
        ];
        for path in bad {
            assert!(
                matches!(validate_path(path), Err(WikiError::InvalidPath)),
                "path should be rejected: {:?}",
                path
            );
        }
    }

    #[test]
    fn parse_bare_title() {
        assert_eq!(Title::parse("TestPage").unwrap().to_string(), "TestPage");
        assert!(Title::parse("").is_err());
        assert!(Title::parse("../x").is_err());
        assert!(Title::parse("two words").is_err());
    }

    #[test]
    fn op_paths() {
        let title = Title::parse("FrontPage").unwrap();
        assert_eq!(WikiOp::View.path(&title), "/view/FrontPage");
        assert_eq!(WikiOp::Edit.path(&title), "/edit/FrontPage");
        assert_eq!(WikiOp::Save.path(&title), "/save/FrontPage");
    }
}
