use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::Result;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::window::{Window, WindowBuilder};

/// Produces windows that share a fetcher and a main directory.
///
/// Cloning is cheap; clones share the fetcher.
#[derive(Clone)]
pub struct Browser {
    main_directory: PathBuf,
    fetcher: Rc<dyn Fetcher>,
}

impl Browser {
    /// Browser backed by the network.
    pub fn new() -> Result<Self> {
        Ok(Self::with_fetcher(Rc::new(HttpFetcher::new()?)))
    }

    pub fn with_fetcher(fetcher: Rc<dyn Fetcher>) -> Self {
        let main_directory = std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join("headless-browser");
        Self {
            main_directory,
            fetcher,
        }
    }

    pub fn main_directory(&self) -> &Path {
        &self.main_directory
    }

    /// Only affects windows created afterwards.
    pub fn set_main_directory(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.main_directory = dir.into();
        self
    }

    pub fn fetcher(&self) -> &dyn Fetcher {
        self.fetcher.as_ref()
    }

    pub fn open_window(&self) -> Result<Window> {
        self.open_custom_window().build()
    }

    pub fn open_window_and_load(&self, url: &str) -> Result<Window> {
        let mut window = self.open_window()?;
        window.load(url)?;
        Ok(window)
    }

    pub fn open_custom_window(&self) -> WindowBuilder {
        WindowBuilder::new(self.clone())
    }

    pub fn close_window(&self, mut window: Window) {
        window.close();
    }
}

impl fmt::Debug for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Browser")
            .field("main_directory", &self.main_directory)
            .finish()
    }
}
