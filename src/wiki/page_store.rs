#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use log::debug;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::utils::errors::WikiError;
use crate::wiki::title::Title;

// ***************************************************************************
//                                Constants
// ***************************************************************************
const PAGE_SUFFIX    : &str = ".txt";
const PAGE_FILE_MODE : u32  = 0o600;

// ***************************************************************************
//                                  Page
// ***************************************************************************
/// A wiki entry as held for the duration of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub title: Title,
    pub body: Vec<u8>,
}

impl Page {
    pub fn new(title: Title, body: Vec<u8>) -> Self {
        Page { title, body }
    }

    /// A page with no content, used to offer a blank edit form.
    pub fn empty(title: Title) -> Self {
        Page { title, body: vec!() }
    }
}

// ***************************************************************************
//                                PageStore
// ***************************************************************************
/// Maps titles to <pages_dir>/<title>.txt.  The store is the only component
/// that touches page files.  No locking: concurrent saves of one title race
/// and the last writer wins.
#[derive(Debug, Clone)]
pub struct PageStore {
    pages_dir: PathBuf,
}

impl PageStore {
    pub fn new(pages_dir: impl Into<PathBuf>) -> Self {
        PageStore { pages_dir: pages_dir.into() }
    }

    pub fn pages_dir(&self) -> &Path {
        &self.pages_dir
    }

    // ---------------------------------------------------------------------------
    // page_file:
    // ---------------------------------------------------------------------------
    /** The file backing a title.  Titles are alphanumeric, so the result is
     * always a direct child of the pages directory.
     */
    pub fn page_file(&self, title: &Title) -> PathBuf {
        self.pages_dir.join(title.to_string() + PAGE_SUFFIX)
    }

    // ---------------------------------------------------------------------------
    // load:
    // ---------------------------------------------------------------------------
    /** Read the whole page file.  Every read failure, absence included, is
     * reported as NotFound with the io error attached as its source.
     */
    pub async fn load(&self, title: &Title) -> Result<Page, WikiError> {
        let filename = self.page_file(title);
        match fs::read(&filename).await {
            Ok(body) => {
                debug!("Loaded {} bytes from {:?}.", body.len(), filename);
                Ok(Page::new(title.clone(), body))
            }
            Err(source) => Err(WikiError::NotFound { title: title.to_string(), source }),
        }
    }

    // ---------------------------------------------------------------------------
    // save:
    // ---------------------------------------------------------------------------
    /** Replace the page file's content with the page body.  A new file is
     * created with owner read/write permissions only.  The write is not
     * atomic with respect to concurrent readers.
     */
    pub async fn save(&self, page: &Page) -> Result<(), WikiError> {
        let filename = self.page_file(&page.title);
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(PAGE_FILE_MODE)
            .open(&filename)
            .await?;
        file.write_all(&page.body).await?;
        file.flush().await?;
        debug!("Wrote {} bytes to {:?}.", page.body.len(), filename);
        Ok(())
    }
}
