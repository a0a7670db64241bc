use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use depbundle_platform::Platform;
use depbundle_process::ProcessRunner;

use crate::Error;
use crate::inspect::{InspectionStatus, LinkageInspector};

/// A library in the closure, identified by its canonical path.
#[derive(Debug)]
pub struct LibraryNode {
    path: PathBuf,
    name: String,
    platform: Platform,
    size: OnceLock<u64>,
    unresolved: Vec<String>,
    status: InspectionStatus,
}

impl LibraryNode {
    fn new(path: PathBuf, platform: Platform) -> Self {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            name,
            platform,
            size: OnceLock::new(),
            unresolved: Vec::new(),
            status: InspectionStatus::Pending,
        }
    }

    /// The canonical, absolute path of the library.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file name of the library.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// The size of the library on disk, in bytes.
    ///
    /// Read on first access; a file that can no longer be read counts as empty.
    pub fn size(&self) -> u64 {
        *self.size.get_or_init(|| {
            fs_err::metadata(&self.path)
                .map(|metadata| metadata.len())
                .unwrap_or(0)
        })
    }

    /// Declared references that could not be resolved to a file.
    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }

    pub fn status(&self) -> &InspectionStatus {
        &self.status
    }
}

/// The transitive shared-library closure of a root library.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: DiGraph<LibraryNode, ()>,
    index: FxHashMap<PathBuf, NodeIndex>,
    root: NodeIndex,
}

impl DependencyGraph {
    pub fn root(&self) -> &LibraryNode {
        &self.graph[self.root]
    }

    /// All libraries, in discovery order, starting with the root.
    pub fn libraries(&self) -> impl Iterator<Item = &LibraryNode> {
        self.graph.node_weights()
    }

    /// The library at the given canonical path.
    pub fn get(&self, path: &Path) -> Option<&LibraryNode> {
        self.index.get(path).map(|index| &self.graph[*index])
    }

    /// The direct dependencies of the library at the given canonical path, sorted by name.
    pub fn dependencies(&self, path: &Path) -> Vec<&LibraryNode> {
        let Some(index) = self.index.get(path) else {
            return Vec::new();
        };
        let mut dependencies: Vec<_> = self
            .graph
            .neighbors_directed(*index, Direction::Outgoing)
            .map(|dependency| &self.graph[dependency])
            .collect();
        dependencies.sort_by(|a, b| a.name().cmp(b.name()));
        dependencies
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// The number of dependency edges in the closure.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// The combined size of every library in the closure, in bytes.
    pub fn total_size(&self) -> u64 {
        self.libraries().map(LibraryNode::size).sum()
    }
}

/// Walks the linkage of a root library into its full [`DependencyGraph`].
///
/// Each library is inspected at most once, however many times and by however many paths it is
/// referenced. Independent branches are inspected concurrently.
pub struct GraphBuilder<'a, R> {
    inspector: &'a LinkageInspector<'a, R>,
    concurrency: usize,
}

impl<'a, R: ProcessRunner> GraphBuilder<'a, R> {
    pub fn new(inspector: &'a LinkageInspector<'a, R>) -> Self {
        Self {
            inspector,
            concurrency: 1,
        }
    }

    /// Set the maximum number of libraries inspected at once.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn build(&self, root: &Path) -> Result<DependencyGraph, Error> {
        let platform = self.inspector.platform();
        if !root.is_file() {
            return Err(Error::NotFound {
                library: root.display().to_string(),
                platform,
            });
        }
        let root = dunce::canonicalize(root)?;
        debug!("Building the dependency closure of `{}`", root.display());

        let mut graph = DiGraph::new();
        let mut index = FxHashMap::default();

        let root_index = graph.add_node(LibraryNode::new(root.clone(), platform));
        index.insert(root.clone(), root_index);

        let mut queue = VecDeque::from([(root_index, root)]);
        let mut futures = FuturesUnordered::new();

        loop {
            while futures.len() < self.concurrency {
                let Some((node, path)) = queue.pop_front() else {
                    break;
                };
                let inspector = self.inspector;
                futures.push(async move {
                    let inspection = inspector.dependencies_of(&path).await;
                    (node, inspection)
                });
            }

            let Some((node, inspection)) = futures.next().await else {
                break;
            };

            for reference in inspection.references {
                let canonical = reference
                    .path
                    .filter(|path| path.exists())
                    .and_then(|path| dunce::canonicalize(path).ok());
                let Some(canonical) = canonical else {
                    trace!("Unresolved reference `{}`", reference.declared);
                    let unresolved = &mut graph[node].unresolved;
                    if !unresolved.contains(&reference.declared) {
                        unresolved.push(reference.declared);
                    }
                    continue;
                };

                if canonical == graph[node].path {
                    continue;
                }

                let dependency = if let Some(dependency) = index.get(&canonical) {
                    *dependency
                } else {
                    trace!("Discovered `{}`", canonical.display());
                    let dependency =
                        graph.add_node(LibraryNode::new(canonical.clone(), platform));
                    index.insert(canonical.clone(), dependency);
                    queue.push_back((dependency, canonical));
                    dependency
                };
                graph.update_edge(node, dependency, ());
            }

            graph[node].status = inspection.status;
        }

        debug!(
            "Found {} libraries with {} dependency edges",
            graph.node_count(),
            graph.edge_count()
        );

        Ok(DependencyGraph {
            graph,
            index,
            root: root_index,
        })
    }
}
