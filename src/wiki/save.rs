#![forbid(unsafe_code)]

use log::info;
use async_trait::async_trait;

use crate::utils::config::RuntimeCtx;
use crate::utils::wiki_utils::error_text;
use crate::wiki::dispatch::{make_http_302, make_http_500, PageHandler, WikiRequest, WikiResponse};
use crate::wiki::page_store::Page;
use crate::wiki::title::WikiOp;

// ***************************************************************************
//                                Save Page
// ***************************************************************************
/// Stores the submitted body, replacing any previous content, then sends the
/// client to the view page.  A missing body field saves an empty page.
pub struct SavePage;

#[async_trait]
impl PageHandler for SavePage {
    async fn handle(&self, ctx: &RuntimeCtx, req: &WikiRequest) -> WikiResponse {
        let body = req.form_body.clone().unwrap_or_default();
        let page = Page::new(req.title.clone(), body.into_bytes());

        match ctx.store.save(&page).await {
            Ok(()) => {
                info!("Saved page {} ({} bytes).", page.title, page.body.len());
                make_http_302(WikiOp::View.path(&page.title))
            }
            Err(e) => make_http_500(error_text(&e)),
        }
    }
}
