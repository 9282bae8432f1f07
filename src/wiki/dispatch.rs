#![forbid(unsafe_code)]

use std::sync::Arc;

use async_trait::async_trait;
use log::error;
use poem::error::BadRequest;
use poem::http::{header, Method, StatusCode};
use poem::web::{Data, Form, Html, Multipart};
use poem::{handler, Endpoint, EndpointExt, FromRequest, IntoResponse, Request, RequestBody,
           Response, Route};
use serde::Deserialize;

use crate::utils::config::RuntimeCtx;
use crate::utils::errors::WikiError;
use crate::utils::wiki_utils::{debug_request, error_text, RequestDebug};
use crate::wiki::edit::EditPage;
use crate::wiki::page_store::Page;
use crate::wiki::save::SavePage;
use crate::wiki::title::{validate_path, Title, WikiOp};
use crate::wiki::view::ViewPage;

// ***************************************************************************
//                          Request/Response Definitions
// ***************************************************************************
/// A request that passed path validation.
#[derive(Debug)]
pub struct WikiRequest {
    pub op: WikiOp,
    pub title: Title,
    /// The submitted `body` form field, if the request carried a form.
    pub form_body: Option<String>,
}

// Implement the debug record trait for logging.
impl RequestDebug for WikiRequest {
    fn get_request_info(&self) -> String {
        let mut s = String::with_capacity(255);
        s.push_str("  Wiki request:");
        s.push_str("\n    op: ");
        s.push_str(&self.op.to_string());
        s.push_str("\n    title: ");
        s.push_str(self.title.as_str());
        if let Some(body) = &self.form_body {
            s.push_str("\n    body bytes: ");
            s.push_str(&body.len().to_string());
        }
        s.push('\n');
        s
    }
}

// ***************************************************************************
//                                Constants
// ***************************************************************************
const FORM_URLENCODED : &str = "application/x-www-form-urlencoded";
const FORM_MULTIPART  : &str = "multipart/form-data";
const BODY_FIELD      : &str = "body";

/// Form fields posted by the edit page.
#[derive(Debug, Deserialize)]
pub struct SaveForm {
    #[serde(default)]
    body: Option<String>,
}

// ---------------------------------------------------------------------------
// SubmittedBody:
// ---------------------------------------------------------------------------
/** The `body` form value.  A url-encoded or multipart request body is
 * searched first, then the query string.  A body that claims to be a form
 * but can't be decoded is an error, so a save never stores what a parse
 * failure left behind.
 */
pub struct SubmittedBody(pub Option<String>);

impl<'a> FromRequest<'a> for SubmittedBody {
    async fn from_request(req: &'a Request, body: &mut RequestBody) -> poem::Result<Self> {
        let content_type = req.content_type().unwrap_or_default().to_ascii_lowercase();

        let mut value = None;
        if *req.method() != Method::GET && content_type.starts_with(FORM_URLENCODED) {
            let Form(form) = Form::<SaveForm>::from_request(req, body).await?;
            value = form.body;
        } else if content_type.starts_with(FORM_MULTIPART) {
            let mut multipart = Multipart::from_request(req, body).await?;
            while let Some(field) = multipart.next_field().await.map_err(BadRequest)? {
                if field.name() == Some(BODY_FIELD) {
                    value = Some(field.text().await.map_err(BadRequest)?);
                    break;
                }
            }
        }

        // Fall back to the query string.
        if value.is_none() {
            value = req.params::<SaveForm>().ok().and_then(|f| f.body);
        }
        Ok(SubmittedBody(value))
    }
}

// ------------------- HTTP Status Codes -------------------
#[derive(Debug)]
pub enum WikiResponse {
    Http200(String),
    Http302(String),
    Http400(String),
    Http404,
    Http500(String),
}

impl IntoResponse for WikiResponse {
    fn into_response(self) -> Response {
        match self {
            WikiResponse::Http200(html) => Html(html).into_response(),
            WikiResponse::Http302(location) => Response::builder()
                .status(StatusCode::FOUND)
                .header(header::LOCATION, location)
                .finish(),
            WikiResponse::Http400(msg) => Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .content_type("text/plain; charset=utf-8")
                .body(msg + "\n"),
            WikiResponse::Http404 => Response::builder()
                .status(StatusCode::NOT_FOUND)
                .content_type("text/plain; charset=utf-8")
                .body("404 page not found\n"),
            WikiResponse::Http500(msg) => Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .content_type("text/plain; charset=utf-8")
                .body(msg + "\n"),
        }
    }
}

pub fn make_http_200(html: String) -> WikiResponse {
    WikiResponse::Http200(html)
}
pub fn make_http_302(location: String) -> WikiResponse {
    WikiResponse::Http302(location)
}
pub fn make_http_400(msg: String) -> WikiResponse {
    error!("{}", msg);
    WikiResponse::Http400(msg)
}
pub fn make_http_404() -> WikiResponse {
    WikiResponse::Http404
}
pub fn make_http_500(msg: String) -> WikiResponse {
    error!("{}", msg);
    WikiResponse::Http500(msg)
}

// ***************************************************************************
//                                  Traits
// ***************************************************************************
/// One page operation.  Handlers never fail: every outcome, errors
/// included, is already a response.
#[async_trait]
pub trait PageHandler: Send + Sync {
    async fn handle(&self, ctx: &RuntimeCtx, req: &WikiRequest) -> WikiResponse;
}

// ---------------------------------------------------------------------------
// render_page:
// ---------------------------------------------------------------------------
/** Render a page with a named template.  Template failures become a 500
 * carrying the error text.
 */
pub fn render_page(ctx: &RuntimeCtx, template_name: &str, page: &Page) -> WikiResponse {
    match ctx.renderer.render(template_name, page) {
        Ok(html) => make_http_200(html),
        Err(e) => make_http_500(error_text(&e)),
    }
}

// ***************************************************************************
//                                 Routing
// ***************************************************************************
// ---------------------------------------------------------------------------
// build_routes:
// ---------------------------------------------------------------------------
/** The whole HTTP surface.  The catch-all also matches /, so a single
 * handler owns the front page redirect, validation and the operation table.
 */
pub fn build_routes(ctx: Arc<RuntimeCtx>) -> impl Endpoint {
    Route::new()
        .at("/", wiki_dispatch)
        .at("/*path", wiki_dispatch)
        .data(ctx)
}

// ---------------------------------------------------------------------------
// handler_for:
// ---------------------------------------------------------------------------
fn handler_for(op: WikiOp) -> &'static dyn PageHandler {
    match op {
        WikiOp::View => &ViewPage,
        WikiOp::Edit => &EditPage,
        WikiOp::Save => &SavePage,
    }
}

// ---------------------------------------------------------------------------
// dispatch:
// ---------------------------------------------------------------------------
pub async fn dispatch(ctx: &RuntimeCtx, req: &WikiRequest) -> WikiResponse {
    handler_for(req.op).handle(ctx, req).await
}

#[handler]
async fn wiki_dispatch(
    http_req: &Request,
    submitted: poem::Result<SubmittedBody>,
    Data(ctx): Data<&Arc<RuntimeCtx>>,
) -> WikiResponse {
    let path = http_req.uri().path();
    if path == "/" {
        return make_http_302(WikiOp::View.path(&ctx.front_page));
    }

    // Invalid paths are answered without logging or touching the store.
    let (op, title) = match decode_and_validate(path) {
        Ok(v) => v,
        Err(_) => return make_http_404(),
    };

    // Only a save cares about the form; a broken one must not clear the page.
    let form_body = match (op, submitted) {
        (WikiOp::Save, Err(e)) => return make_http_400(format!("unreadable form data: {}", e)),
        (_, Ok(SubmittedBody(body))) => body,
        (_, Err(_)) => None,
    };

    let req = WikiRequest { op, title, form_body };
    debug_request(http_req, &req);
    dispatch(ctx, &req).await
}

// ---------------------------------------------------------------------------
// decode_and_validate:
// ---------------------------------------------------------------------------
/** Percent-decode the request path and run it through the validator, so
 * /edit/%46rontPage names FrontPage.  Undecodable paths are invalid.
 */
fn decode_and_validate(path: &str) -> Result<(WikiOp, Title), WikiError> {
    let decoded = urlencoding::decode(path).map_err(|_| WikiError::InvalidPath)?;
    validate_path(&decoded)
}
