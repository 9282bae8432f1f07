#![forbid(unsafe_code)]

use thiserror::Error;

/// Errors enumerates the startup and infrastructure errors of this application.
#[derive(Error, Debug)]
pub enum Errors {
    /// Input parameter logging.
    #[error("wiki_server input parameters:\n{}", .0)]
    InputParms(String),

    /// Represents all other cases of `std::io::Error`.
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Inaccessible logger configuration file.
    #[error("Unable to access the Log4rs configuration file: {}", .0)]
    Log4rsInitialization(String),

    #[error("Reading application configuration file: {}", .0)]
    ReadingConfigFile(String),

    #[error("Unable to parse TOML file: {}", .0)]
    TOMLParseError(String),

    #[error("Invalid wiki directory {}: {}", .0, .1)]
    WikiDirectory(String, String),

    #[error("Unable to load page templates from {}: {}", .0, .1)]
    TemplateLoad(String, String),

    #[error("Configuration Error: {}", .0)]
    Config(String),
}

/// WikiError enumerates the outcomes of a single page request that are not
/// a rendered page or a redirect.
#[derive(Error, Debug)]
pub enum WikiError {
    /// The request path is not /view|edit|save/<alphanumeric title>.
    #[error("Invalid Page Title")]
    InvalidPath,

    /// Any failure reading the page file, absence included.  The
    /// underlying error is kept for callers that need to tell them apart.
    #[error("page {} not found", .title)]
    NotFound {
        title: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing the page file failed.
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Template execution failed.
    #[error(transparent)]
    RenderError(#[from] tera::Error),
}
