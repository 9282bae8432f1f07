#![forbid(unsafe_code)]

use async_trait::async_trait;

use crate::utils::config::RuntimeCtx;
use crate::wiki::dispatch::{render_page, PageHandler, WikiRequest, WikiResponse};
use crate::wiki::page_store::Page;
use crate::wiki::renderer::EDIT_TEMPLATE;

// ***************************************************************************
//                                Edit Page
// ***************************************************************************
/// Shows the edit form, blank when the page doesn't exist yet.
pub struct EditPage;

#[async_trait]
impl PageHandler for EditPage {
    async fn handle(&self, ctx: &RuntimeCtx, req: &WikiRequest) -> WikiResponse {
        let page = match ctx.store.load(&req.title).await {
            Ok(page) => page,
            Err(_) => Page::empty(req.title.clone()),
        };
        render_page(ctx, EDIT_TEMPLATE, &page)
    }
}
