#![forbid(unsafe_code)]

use log::debug;
use async_trait::async_trait;

use crate::utils::config::RuntimeCtx;
use crate::utils::wiki_utils::error_text;
use crate::wiki::dispatch::{make_http_302, render_page, PageHandler, WikiRequest, WikiResponse};
use crate::wiki::renderer::VIEW_TEMPLATE;
use crate::wiki::title::WikiOp;

// ***************************************************************************
//                                View Page
// ***************************************************************************
/// Shows a stored page.  A page that can't be read sends the client to the
/// edit form for the same title instead.
pub struct ViewPage;

#[async_trait]
impl PageHandler for ViewPage {
    async fn handle(&self, ctx: &RuntimeCtx, req: &WikiRequest) -> WikiResponse {
        match ctx.store.load(&req.title).await {
            Ok(page) => render_page(ctx, VIEW_TEMPLATE, &page),
            Err(e) => {
                debug!("{}; redirecting to the edit form.", error_text(&e));
                make_http_302(WikiOp::Edit.path(&req.title))
            }
        }
    }
}
