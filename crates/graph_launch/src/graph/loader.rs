//! Loading referenced launch graphs

use crate::config::{LaunchFile, LaunchFileError, LaunchGraph};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// A graph together with the identity used for cycle detection
#[derive(Debug, Clone)]
pub struct LoadedGraph {
    /// Stable identity; two sources naming the same graph share it
    pub id: String,
    /// Directory relative includes and `$(dirname)` resolve against
    pub base_dir: Option<PathBuf>,
    pub graph: LaunchGraph,
}

/// Capability to turn an include reference into a launch graph
pub trait GraphLoader {
    /// Load `source`, as referenced from `parent` (None for the root)
    fn load(&self, source: &str, parent: Option<&LoadedGraph>)
        -> Result<LoadedGraph, LaunchFileError>;
}

impl<L: GraphLoader + ?Sized> GraphLoader for &L {
    fn load(
        &self,
        source: &str,
        parent: Option<&LoadedGraph>,
    ) -> Result<LoadedGraph, LaunchFileError> {
        (**self).load(source, parent)
    }
}

/// Loads YAML launch files from disk
#[derive(Debug, Clone, Default)]
pub struct FileLoader;

impl FileLoader {
    pub fn new() -> Self {
        Self
    }

    fn locate(source: &str, parent: Option<&LoadedGraph>) -> PathBuf {
        let path = Path::new(source);
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match parent.and_then(|p| p.base_dir.as_ref()) {
            Some(dir) => dir.join(path),
            None => path.to_path_buf(),
        }
    }
}

impl GraphLoader for FileLoader {
    fn load(
        &self,
        source: &str,
        parent: Option<&LoadedGraph>,
    ) -> Result<LoadedGraph, LaunchFileError> {
        let path = Self::locate(source, parent);
        let canonical = path.canonicalize().map_err(|e| LaunchFileError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        log::debug!("Loading launch file: {}", canonical.display());
        let graph = LaunchFile::from_file(&canonical)?.to_graph()?;

        Ok(LoadedGraph {
            id: canonical.display().to_string(),
            base_dir: canonical.parent().map(Path::to_path_buf),
            graph,
        })
    }
}

/// Serves graphs registered by name; sources are looked up verbatim
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    graphs: IndexMap<String, LaunchGraph>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_graph(mut self, name: impl Into<String>, graph: LaunchGraph) -> Self {
        self.graphs.insert(name.into(), graph);
        self
    }
}

impl GraphLoader for MemoryLoader {
    fn load(
        &self,
        source: &str,
        _parent: Option<&LoadedGraph>,
    ) -> Result<LoadedGraph, LaunchFileError> {
        let graph = self
            .graphs
            .get(source)
            .cloned()
            .ok_or_else(|| LaunchFileError::NotFound(source.to_string()))?;
        Ok(LoadedGraph {
            id: source.to_string(),
            base_dir: None,
            graph,
        })
    }
}
