#![forbid(unsafe_code)]

use anyhow::{Result, anyhow};
use log::{info, error};
use serde::Deserialize;
use std::{env, fs, path::Path};
use fs_mistrust::Mistrust;
use std::os::unix::fs::PermissionsExt;
use structopt::StructOpt;

// Wiki Utilities
use crate::utils::{errors::Errors, wiki_utils::get_absolute_path};
use crate::wiki::page_store::PageStore;
use crate::wiki::renderer::{PageRenderer, TeraRenderer, DEFAULT_EDIT_TEMPLATE,
                            DEFAULT_VIEW_TEMPLATE, EDIT_TEMPLATE, VIEW_TEMPLATE};
use crate::wiki::title::Title;

// ***************************************************************************
//                                Constants
// ***************************************************************************
// Directory and file locations. Unless otherwise noted, all files and directories
// are relative to the root directory.
const ENV_WIKI_ROOT_DIR    : &str = "WIKI_ROOT_DIR";
const DEFAULT_ROOT_DIR     : &str = "~/.wiki";
const CONFIG_DIR           : &str = "/config";
const LOGS_DIR             : &str = "/logs";
const PAGES_DIR            : &str = "/pages";
const TMPL_DIR             : &str = "/tmpl";
const CERTS_DIR            : &str = "/certs";
const LOG4RS_CONFIG_FILE   : &str = "/log4rs.yml"; // relative to config dir
const WIKI_CONFIG_FILE     : &str = "/wiki.toml";  // relative to config dir

// Seeded by --create-dirs-only.  The log config names its files relative to
// the logs directory, substituted when written.
const DEFAULT_LOG4RS_CONFIG : &str = include_str!("../../resources/config/log4rs.yml");
const DEFAULT_WIKI_CONFIG   : &str = include_str!("../../resources/config/wiki.toml");
const LOGS_DIR_PLACEHOLDER  : &str = "@LOGS_DIR@";

// Networking.
const DEFAULT_HTTP_ADDR    : &str = "http://localhost";
const DEFAULT_HTTP_PORT    : u16  = 8080;

// Content.
const DEFAULT_SITE_TITLE   : &str = "Wiki";
const DEFAULT_FRONT_PAGE   : &str = "FrontPage";

// ***************************************************************************
//                             Directory Structs
// ***************************************************************************
// ---------------------------------------------------------------------------
// WikiDirs:
// ---------------------------------------------------------------------------
#[derive(Debug, Clone)]
pub struct WikiDirs {
    pub root_dir: String,
    pub config_dir: String,
    pub logs_dir: String,
    pub pages_dir: String,
    pub tmpl_dir: String,
    pub certs_dir: String,
}

// ***************************************************************************
//                               Config Structs
// ***************************************************************************
// ---------------------------------------------------------------------------
// WikiArgs:
// ---------------------------------------------------------------------------
#[derive(Debug, StructOpt)]
#[structopt(name = "wiki_args", about = "Command line arguments for the wiki server.")]
pub struct WikiArgs {
    /// Specify the wiki's root data directory.
    ///
    /// This directory contains the pages, templates, configuration and logs
    /// the server uses during execution.
    #[structopt(short, long)]
    pub root_dir: Option<String>,

    /// Create the data directories, write default templates and configuration
    /// files where none exist, and then exit.
    ///
    /// The data directories will be rooted at a root directory calculated
    /// using the following priority order:
    ///
    ///   1. If set, the value of the WIKI_ROOT_DIR environment,
    ///
    ///   2. Otherwise, if set, the value of the --root-dir command line argument,
    ///
    ///   3. Otherwise, ~/.wiki
    ///
    #[structopt(short, long)]
    pub create_dirs_only: bool,
}

// ---------------------------------------------------------------------------
// Parms:
// ---------------------------------------------------------------------------
#[derive(Debug)]
#[allow(dead_code)]
pub struct Parms {
    pub config_file: String,
    pub config: Config,
}

// ---------------------------------------------------------------------------
// Config:
// ---------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub title: String,
    pub http_addr: String,
    pub http_port: u16,
    pub front_page: String,
    pub tls_enabled: bool,
}

impl Config {
    pub fn new() -> Self {
        Config::default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: DEFAULT_SITE_TITLE.to_string(),
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            front_page: DEFAULT_FRONT_PAGE.to_string(),
            tls_enabled: false,
        }
    }
}

// ---------------------------------------------------------------------------
// RuntimeCtx:
// ---------------------------------------------------------------------------
/** Everything a request needs, built once before the server starts and
 * shared read-only by every handler.
 */
pub struct RuntimeCtx {
    pub parms: Parms,
    pub front_page: Title,
    pub store: PageStore,
    pub renderer: Box<dyn PageRenderer>,
}

impl RuntimeCtx {
    pub fn new(parms: Parms, store: PageStore, renderer: Box<dyn PageRenderer>) -> Result<Self> {
        // The front page is a redirect target, so it has to be a servable title.
        let front_page = Title::parse(&parms.config.front_page)
            .map_err(|_| anyhow!(Errors::Config(format!(
                "{}: front_page must be alphanumeric: {:?}",
                parms.config_file, parms.config.front_page))))?;
        Ok(RuntimeCtx { parms, front_page, store, renderer })
    }
}

// The renderer holds compiled templates, so only the parameters are dumped.
impl std::fmt::Debug for RuntimeCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeCtx")
            .field("parms", &self.parms)
            .field("front_page", &self.front_page)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

// ***************************************************************************
//                            Directory Functions
// ***************************************************************************
impl WikiDirs {
    /** Lay out the data directories under a root without touching the disk. */
    pub fn new(root_dir: &str) -> Self {
        let root_dir = root_dir.to_string();
        WikiDirs {
            config_dir: root_dir.clone() + CONFIG_DIR,
            logs_dir: root_dir.clone() + LOGS_DIR,
            pages_dir: root_dir.clone() + PAGES_DIR,
            tmpl_dir: root_dir.clone() + TMPL_DIR,
            certs_dir: root_dir.clone() + CERTS_DIR,
            root_dir,
        }
    }

    fn all(&self) -> [(&String, &'static str); 6] {
        [
            (&self.root_dir, "root directory"),
            (&self.config_dir, "config directory"),
            (&self.logs_dir, "logs directory"),
            (&self.pages_dir, "pages directory"),
            (&self.tmpl_dir, "templates directory"),
            (&self.certs_dir, "certs directory"),
        ]
    }
}

// ---------------------------------------------------------------------------
// init_wiki_dirs:
// ---------------------------------------------------------------------------
/** Calculate the external data directories and make sure each one exists
 * with owner-only permissions.
 */
pub fn init_wiki_dirs(args: &WikiArgs) -> Result<WikiDirs> {
    // Initialize the mistrust object.
    let mistrust = get_mistrust()?;

    // Check that each path is absolute and is a directory with the
    // proper permission assign if it exists.  If it doesn't exist,
    // create it.
    let root_dir = resolve_root_dir(env::var(ENV_WIKI_ROOT_DIR).ok(), args.root_dir.clone());
    let dirs = WikiDirs::new(&root_dir);
    for (dir, msgname) in dirs.all() {
        check_wiki_dir(dir, msgname, &mistrust)?;
    }

    Ok(dirs)
}

// ---------------------------------------------------------------------------
// check_wiki_dir:
// ---------------------------------------------------------------------------
/** Check that the path is absolute and, if it exists, that is has the proper
 * permissions assigned.  If it doesn't exist, create it.  The mistrust package
 * creates directories with 0o700 permissions.
 */
fn check_wiki_dir(dir: &str, msgname: &str, mistrust: &Mistrust) -> Result<()> {
    // Get the path object.
    let path = Path::new(dir);
    if !path.is_absolute() {
        return Err(anyhow!(Errors::WikiDirectory(dir.to_string(),
                   format!("the {} path must be absolute", msgname))));
    }
    if path.exists() {
        // Make sure the path represents a directory.
        if !path.is_dir() {
            return Err(anyhow!(Errors::WikiDirectory(dir.to_string(),
                       format!("the {} path must be a directory", msgname))));
        }

        // Make sure the directory had rwx for owner only.
        let perm = path.metadata()?.permissions().mode();
        if perm & 0o777 != 0o700 {
            return Err(anyhow!(Errors::WikiDirectory(dir.to_string(),
                       format!("the {} path must have 0o700 permissions", msgname))));
        }
    } else {
        // Create the directory with the correct permissions.
        mistrust.make_directory(path).map_err(|e| {
            anyhow!(Errors::WikiDirectory(dir.to_string(), format!("make directory error: {}", e)))
        })?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// get_mistrust:
// ---------------------------------------------------------------------------
/** Configure a new mistrust object for initial directory processing. */
fn get_mistrust() -> Result<Mistrust> {
    Mistrust::builder()
        .ignore_prefix(get_absolute_path("~"))
        .trust_group(0)
        .build()
        .map_err(|e| anyhow!("Mistrust configuration error: {}", e))
}

// ---------------------------------------------------------------------------
// resolve_root_dir:
// ---------------------------------------------------------------------------
fn resolve_root_dir(env_root: Option<String>, arg_root: Option<String>) -> String {
    // Order of precedence:
    //  1. Environment variable
    //  2. Command line --root-dir argument
    //  3. Default location
    //
    let root_dir = env_root
        .or(arg_root)
        .unwrap_or_else(|| DEFAULT_ROOT_DIR.to_string());

    // Canonicalize the path.
    get_absolute_path(&root_dir)
}

// ---------------------------------------------------------------------------
// seed_default_files:
// ---------------------------------------------------------------------------
/** Write the shipped templates and configuration files into the data
 * directories.  Existing files are never overwritten.  Returns the number
 * of files written.
 */
pub fn seed_default_files(dirs: &WikiDirs) -> Result<usize> {
    let log4rs = DEFAULT_LOG4RS_CONFIG.replace(LOGS_DIR_PLACEHOLDER, &dirs.logs_dir);
    let files = [
        (dirs.tmpl_dir.clone() + "/" + VIEW_TEMPLATE, DEFAULT_VIEW_TEMPLATE),
        (dirs.tmpl_dir.clone() + "/" + EDIT_TEMPLATE, DEFAULT_EDIT_TEMPLATE),
        (dirs.config_dir.clone() + LOG4RS_CONFIG_FILE, log4rs.as_str()),
        (dirs.config_dir.clone() + WIKI_CONFIG_FILE, DEFAULT_WIKI_CONFIG),
    ];

    let mut written = 0;
    for (file, contents) in files {
        if Path::new(&file).exists() {
            println!("Keeping existing file {}", file);
            continue;
        }
        fs::write(&file, contents).map_err(Errors::IOError)?;
        println!("Created {}", file);
        written += 1;
    }
    Ok(written)
}

// ***************************************************************************
//                               Log Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_log:
// ---------------------------------------------------------------------------
pub fn init_log(dirs: &WikiDirs) -> Result<()> {
    // Initialize log4rs logging.
    let logconfig = dirs.config_dir.clone() + LOG4RS_CONFIG_FILE;
    if let Err(e) = log4rs::init_file(&logconfig, Default::default()) {
        println!("{}", e);
        return Err(anyhow!(Errors::Log4rsInitialization(logconfig)));
    }
    info!("Log4rs initialized using: {}", logconfig);
    Ok(())
}

// ***************************************************************************
//                             Parms Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// get_parms:
// ---------------------------------------------------------------------------
/** Retrieve the application parameters from the configuration file in the
 * config directory.  A missing file means default values; a file that
 * cannot be parsed is an error.
 */
pub fn get_parms(dirs: &WikiDirs) -> Result<Parms> {
    // Get the config file path from its data directory.
    let config_file = dirs.config_dir.clone() + WIKI_CONFIG_FILE;

    // Read the configuration file.
    info!("{}", Errors::ReadingConfigFile(config_file.clone()));
    let contents = match fs::read_to_string(&config_file) {
        Ok(c) => c,
        Err(_) => {
            info!("Unable to read configuration at {}. Using default values.", config_file);
            return Ok(Parms { config_file: Default::default(), config: Config::new() });
        }
    };

    let config = parse_config(&contents, &config_file)?;
    Ok(Parms { config_file, config })
}

// ---------------------------------------------------------------------------
// parse_config:
// ---------------------------------------------------------------------------
fn parse_config(contents: &str, config_file: &str) -> Result<Config> {
    // Parse the toml configuration.
    let config : Config = match toml::from_str(contents) {
        Ok(c)  => c,
        Err(e) => {
            let msg = format!("{}\n   {}", Errors::TOMLParseError(config_file.to_string()), e);
            error!("{}", msg);
            return Result::Err(anyhow!(msg));
        }
    };

    Ok(config)
}

// ***************************************************************************
//                             Config Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_runtime_context:
// ---------------------------------------------------------------------------
/** Read the parameters and load the templates.  Either failing stops the
 * server before it accepts a connection.
 */
pub fn init_runtime_context(dirs: &WikiDirs) -> Result<RuntimeCtx> {
    let parms = get_parms(dirs)?;
    let renderer = TeraRenderer::load(&dirs.tmpl_dir, &parms.config.title)?;
    let store = PageStore::new(&dirs.pages_dir);
    RuntimeCtx::new(parms, store, Box::new(renderer))
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;

    fn mode(path: &str, mode: u32) {
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
    }

    fn temp_dirs() -> (tempfile::TempDir, WikiDirs) {
        let root = tempfile::Builder::new().prefix("wiki-root").tempdir().unwrap();
        let dirs = WikiDirs::new(root.path().to_str().unwrap());
        for (dir, _) in dirs.all() {
            if !Path::new(dir).exists() {
                fs::create_dir(dir).unwrap();
            }
            mode(dir, 0o700);
        }
        (root, dirs)
    }

    #[test]
    fn default_config() {
        let config = Config::new();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.front_page, "FrontPage");
        assert!(!config.tls_enabled);
    }

    #[test]
    fn partial_config_uses_defaults() {
        let config = parse_config("http_port = 9090\ntitle = \"Notes\"\n", "wiki.toml").unwrap();
        assert_eq!(config.http_port, 9090);
        assert_eq!(config.title, "Notes");
        assert_eq!(config.front_page, "FrontPage");
        assert_eq!(config.http_addr, "http://localhost");
    }

    #[test]
    fn shipped_config_parses() {
        let config = parse_config(DEFAULT_WIKI_CONFIG, "wiki.toml").unwrap();
        assert_eq!(config.http_port, DEFAULT_HTTP_PORT);
        assert_eq!(config.front_page, DEFAULT_FRONT_PAGE);
    }

    #[test]
    fn bad_front_page_rejected() {
        for front_page in ["../etc", "", "Two Words"] {
            // Parsing only reads the toml; the title check happens once, here.
            let config = parse_config(&format!("front_page = {:?}\n", front_page), "wiki.toml").unwrap();
            let parms = Parms { config_file: "wiki.toml".to_string(), config };
            let renderer = TeraRenderer::from_sources("v", "e", "Wiki").unwrap();
            let err = RuntimeCtx::new(parms, PageStore::new("/tmp"), Box::new(renderer)).unwrap_err();
            assert!(err.to_string().contains("front_page must be alphanumeric"), "{}", err);
        }
    }

    #[test]
    fn malformed_config_rejected() {
        assert!(parse_config("http_port = \"not a port\"\n", "wiki.toml").is_err());
        assert!(parse_config("title = ", "wiki.toml").is_err());
    }

    #[test]
    fn root_dir_precedence() {
        let from_env = resolve_root_dir(Some("/srv/env".into()), Some("/srv/arg".into()));
        assert_eq!(from_env, "/srv/env");
        let from_arg = resolve_root_dir(None, Some("/srv/arg".into()));
        assert_eq!(from_arg, "/srv/arg");
        let default = resolve_root_dir(None, None);
        assert!(default.ends_with("/.wiki"));
    }

    #[test]
    fn dir_layout() {
        let dirs = WikiDirs::new("/srv/wiki");
        assert_eq!(dirs.pages_dir, "/srv/wiki/pages");
        assert_eq!(dirs.tmpl_dir, "/srv/wiki/tmpl");
        assert_eq!(dirs.config_dir, "/srv/wiki/config");
    }

    #[test]
    fn check_dir_rules() {
        let (_root, dirs) = temp_dirs();
        let mistrust = Mistrust::new();

        assert!(check_wiki_dir(&dirs.pages_dir, "pages directory", &mistrust).is_ok());
        assert!(check_wiki_dir("relative/pages", "pages directory", &mistrust).is_err());

        mode(&dirs.pages_dir, 0o755);
        assert!(check_wiki_dir(&dirs.pages_dir, "pages directory", &mistrust).is_err());

        let file = dirs.root_dir.clone() + "/plain.txt";
        fs::write(&file, "x").unwrap();
        assert!(check_wiki_dir(&file, "pages directory", &mistrust).is_err());
    }

    #[test]
    fn seeding_writes_missing_files_once() {
        let (_root, dirs) = temp_dirs();
        assert_eq!(seed_default_files(&dirs).unwrap(), 4);
        assert_eq!(seed_default_files(&dirs).unwrap(), 0);

        let log4rs = fs::read_to_string(dirs.config_dir.clone() + LOG4RS_CONFIG_FILE).unwrap();
        assert!(!log4rs.contains(LOGS_DIR_PLACEHOLDER));
        assert!(log4rs.contains(&dirs.logs_dir));
    }

    #[test]
    fn runtime_context_from_seeded_dirs() {
        let (_root, dirs) = temp_dirs();
        seed_default_files(&dirs).unwrap();
        let ctx = init_runtime_context(&dirs).unwrap();
        assert_eq!(ctx.front_page.as_str(), "FrontPage");
        assert_eq!(ctx.store.pages_dir(), Path::new(&dirs.pages_dir));
    }

    #[test]
    fn runtime_context_requires_templates() {
        let (_root, dirs) = temp_dirs();
        assert!(init_runtime_context(&dirs).is_err());
    }
}
