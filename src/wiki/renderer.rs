#![forbid(unsafe_code)]

use std::path::Path;

use anyhow::{anyhow, Result};
use log::info;
use tera::{Context, Tera};

use crate::utils::errors::{Errors, WikiError};
use crate::utils::wiki_utils::error_text;
use crate::wiki::page_store::Page;

// ***************************************************************************
//                                Constants
// ***************************************************************************
pub const VIEW_TEMPLATE : &str = "view.html";
pub const EDIT_TEMPLATE : &str = "edit.html";

// Shipped copies written by --create-dirs-only.
pub const DEFAULT_VIEW_TEMPLATE : &str = include_str!("../../resources/tmpl/view.html");
pub const DEFAULT_EDIT_TEMPLATE : &str = include_str!("../../resources/tmpl/edit.html");

// ***************************************************************************
//                                  Traits
// ***************************************************************************
/// Produces the HTML for a page using one of the named templates.
pub trait PageRenderer: Send + Sync {
    fn render(&self, template_name: &str, page: &Page) -> Result<String, WikiError>;
}

// ***************************************************************************
//                               TeraRenderer
// ***************************************************************************
/// The view and edit templates, parsed once at startup and read-only after.
pub struct TeraRenderer {
    tera: Tera,
    site_title: String,
}

impl TeraRenderer {
    // ---------------------------------------------------------------------------
    // load:
    // ---------------------------------------------------------------------------
    /** Parse view.html and edit.html from the template directory.  A missing
     * or malformed file is an error; the server must not start without both.
     */
    pub fn load(tmpl_dir: &str, site_title: &str) -> Result<Self> {
        let files = vec![
            (Path::new(tmpl_dir).join(VIEW_TEMPLATE), Some(VIEW_TEMPLATE)),
            (Path::new(tmpl_dir).join(EDIT_TEMPLATE), Some(EDIT_TEMPLATE)),
        ];

        let mut tera = Tera::default();
        if let Err(e) = tera.add_template_files(files) {
            return Err(anyhow!(Errors::TemplateLoad(tmpl_dir.to_string(), error_text(&e))));
        }

        info!("Loaded templates {} and {} from {}.", VIEW_TEMPLATE, EDIT_TEMPLATE, tmpl_dir);
        Ok(TeraRenderer { tera, site_title: site_title.to_string() })
    }

    /// Build from in-memory template sources.
    #[cfg(test)]
    pub fn from_sources(view: &str, edit: &str, site_title: &str) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![(VIEW_TEMPLATE, view), (EDIT_TEMPLATE, edit)])
            .map_err(|e| anyhow!(Errors::TemplateLoad("<memory>".to_string(), error_text(&e))))?;
        Ok(TeraRenderer { tera, site_title: site_title.to_string() })
    }
}

impl PageRenderer for TeraRenderer {
    fn render(&self, template_name: &str, page: &Page) -> Result<String, WikiError> {
        let mut context = Context::new();
        context.insert("site_title", &self.site_title);
        context.insert("title", page.title.as_str());
        context.insert("body", &String::from_utf8_lossy(&page.body));
        Ok(self.tera.render(template_name, &context)?)
    }
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;
    use crate::wiki::title::Title;

    fn page(title: &str, body: &str) -> Page {
        Page::new(Title::parse(title).unwrap(), body.as_bytes().to_vec())
    }

    fn write_templates(dir: &Path, view: &str, edit: &str) {
        std::fs::write(dir.join(VIEW_TEMPLATE), view).unwrap();
        std::fs::write(dir.join(EDIT_TEMPLATE), edit).unwrap();
    }

    #[test]
    fn shipped_templates_render() {
        let r = TeraRenderer::from_sources(DEFAULT_VIEW_TEMPLATE, DEFAULT_EDIT_TEMPLATE, "Wiki").unwrap();

        let html = r.render(VIEW_TEMPLATE, &page("FrontPage", "Hello wiki")).unwrap();
        assert!(html.contains("<h1>FrontPage</h1>"));
        assert!(html.contains("href=\"/edit/FrontPage\""));
        assert!(html.contains("Hello wiki"));

        let html = r.render(EDIT_TEMPLATE, &page("FrontPage", "")).unwrap();
        assert!(html.contains("<h1>Editing FrontPage</h1>"));
        assert!(html.contains("action=\"/save/FrontPage\""));
        assert!(html.contains("name=\"body\""));
    }

    #[test]
    fn body_is_escaped() {
        let r = TeraRenderer::from_sources(DEFAULT_VIEW_TEMPLATE, DEFAULT_EDIT_TEMPLATE, "Wiki").unwrap();
        let html = r.render(VIEW_TEMPLATE, &page("Xss", "<script>alert(1)</script>")).unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_templates(dir.path(), "V:{{ title }}", "E:{{ title }}:{{ body }}");
        let r = TeraRenderer::load(dir.path().to_str().unwrap(), "Wiki").unwrap();
        assert_eq!(r.render(VIEW_TEMPLATE, &page("A1", "b")).unwrap(), "V:A1");
        assert_eq!(r.render(EDIT_TEMPLATE, &page("A1", "b")).unwrap(), "E:A1:b");
    }

    #[test]
    fn missing_template_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(VIEW_TEMPLATE), "{{ title }}").unwrap();
        assert!(TeraRenderer::load(dir.path().to_str().unwrap(), "Wiki").is_err());
    }

    #[test]
    fn malformed_template_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        write_templates(dir.path(), "{{ title ", "{{ title }}");
        assert!(TeraRenderer::load(dir.path().to_str().unwrap(), "Wiki").is_err());
    }

    #[test]
    fn execution_failure_is_render_error() {
        let r = TeraRenderer::from_sources("{{ missing_var }}", "{{ title }}", "Wiki").unwrap();
        let result = r.render(VIEW_TEMPLATE, &page("A", "b"));
        assert!(matches!(result, Err(WikiError::RenderError(_))));
    }
}
