#![forbid(unsafe_code)]

use std::sync::Arc;

use anyhow::{anyhow, Result};
use log::{error, info};
use poem::listener::{Listener, RustlsCertificate, RustlsConfig, TcpListener};
use structopt::StructOpt;

// Wiki Utilities
use crate::utils::config::{init_log, init_runtime_context, init_wiki_dirs, seed_default_files,
                           RuntimeCtx, WikiArgs, WikiDirs};
use crate::utils::errors::Errors;
use crate::wiki::dispatch::build_routes;

// Modules
mod utils;
mod wiki;

// ***************************************************************************
//                                Constants
// ***************************************************************************
const SERVER_NAME : &str = "WikiServer"; // for poem logging
const TLS_KEY_FILE  : &str = "/key.pem";  // relative to certs dir
const TLS_CERT_FILE : &str = "/cert.pem"; // relative to certs dir

// ---------------------------------------------------------------------------
// main:
// ---------------------------------------------------------------------------
#[tokio::main]
async fn main() -> Result<()> {
    // --------------- Initialize Wiki ----------------
    // Announce ourselves.
    println!("Starting wiki_server!");

    // Directories come first; everything else lives in them.
    let args = WikiArgs::from_args();
    let dirs = init_wiki_dirs(&args)?;
    if args.create_dirs_only {
        let written = seed_default_files(&dirs)?;
        println!("Data directories ready under {} ({} files created).", dirs.root_dir, written);
        return Ok(());
    }

    // Load configuration and templates.  The context is immutable from here on.
    let ctx = match wiki_init(&dirs) {
        Ok(ctx) => Arc::new(ctx),
        Err(e) => {
            error!("{}", e);
            return Err(e);
        }
    };

    // --------------- Main Loop Set Up ---------------
    let config = &ctx.parms.config;
    let wiki_url = format!("{}:{}", config.http_addr, config.http_port);
    let addr = format!("{}{}", "0.0.0.0:", config.http_port);
    let tls_enabled = config.tls_enabled;
    info!("Serving wiki pages from {} at {}.", ctx.store.pages_dir().display(), wiki_url);
    let app = build_routes(ctx);

    // ------------------ Main Loop -------------------
    let server = poem::Server::new(
        if tls_enabled {
            TcpListener::bind(addr).rustls(
                RustlsConfig::new().fallback(
                    RustlsCertificate::new()
                        .key(std::fs::read(dirs.certs_dir.clone() + TLS_KEY_FILE)?)
                        .cert(std::fs::read(dirs.certs_dir.clone() + TLS_CERT_FILE)?),
                ),
            ).boxed()
        } else {
            TcpListener::bind(addr).boxed()
        }
    );

    server
        .name(SERVER_NAME)
        .run(app)
        .await
        .map_err(|e| anyhow!(Errors::IOError(e)))
}

// ***************************************************************************
//                             Private Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// wiki_init:
// ---------------------------------------------------------------------------
/** Initialize logging, read the parameters and load the templates.  Any
 * failure here aborts the process before it serves a request.
 */
fn wiki_init(dirs: &WikiDirs) -> Result<RuntimeCtx> {
    // Configure our log.
    init_log(dirs)?;

    // Read input parameters and build the runtime context.
    let ctx = init_runtime_context(dirs)?;
    info!("{}", Errors::InputParms(format!("{:#?}", ctx)));

    // Log build info.
    print_version_info();

    Ok(ctx)
}

// ---------------------------------------------------------------------------
// print_version_info:
// ---------------------------------------------------------------------------
fn print_version_info() {
    info!("\n*** Running {}.", version_info());
}

// The git values are missing when building outside a checkout.
fn version_info() -> String {
    format!("WIKI={}, BRANCH={}, COMMIT={}, DIRTY={}, SRC_TS={}, RUSTC={}",
            env!("CARGO_PKG_VERSION"),
            option_env!("GIT_BRANCH").unwrap_or("unknown"),
            option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
            option_env!("GIT_DIRTY").unwrap_or("unknown"),
            option_env!("SOURCE_TIMESTAMP").unwrap_or("unknown"),
            option_env!("RUSTC_VERSION").unwrap_or("unknown"))
}
