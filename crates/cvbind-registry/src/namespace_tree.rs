//! Namespace Tree - hierarchical storage for host-visible functions and
//! constants.
//!
//! Uses `petgraph::DiGraph` with:
//! - Nodes: `NamespaceData` (functions and constants at that level)
//! - Edges: `Contains(name)` from a namespace to each child namespace

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use cvbind_dispatch::OverloadSet;

use crate::error::RegistrationError;
use crate::module::{ConstantVisibility, Module, constant_visibility};

/// Edge types in the namespace graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceEdge {
    /// Parent namespace contains child namespace.
    /// The String is the child's simple name.
    Contains(String),
}

/// Data stored in each namespace node.
#[derive(Debug, Default)]
pub struct NamespaceData {
    pub functions: FxHashMap<String, OverloadSet>,
    pub constants: FxHashMap<String, i64>,
}

/// Counts of what one [`NamespaceTree::install`] added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InstallSummary {
    pub functions: usize,
    pub constants: usize,
    /// Constants left out by the naming rules.
    pub skipped_constants: usize,
}

/// The namespace graph.
#[derive(Debug)]
pub struct NamespaceTree {
    graph: DiGraph<NamespaceData, NamespaceEdge>,
    root: NodeIndex,
}

impl Default for NamespaceTree {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceTree {
    /// Create a new namespace tree with an empty root.
    pub fn new() -> Self {
        let mut graph = DiGraph::new();
        let root = graph.add_node(NamespaceData::default());
        Self { graph, root }
    }

    /// The top-level module.
    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn namespace(&self, node: NodeIndex) -> Option<&NamespaceData> {
        self.graph.node_weight(node)
    }

    /// Find a child namespace by name.
    pub fn find_child(&self, parent: NodeIndex, name: &str) -> Option<NodeIndex> {
        self.graph.edges(parent).find_map(|edge| match edge.weight() {
            NamespaceEdge::Contains(child) if child == name => Some(edge.target()),
            _ => None,
        })
    }

    /// Names of the direct children of `parent`, sorted.
    pub fn children(&self, parent: NodeIndex) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .graph
            .edges(parent)
            .map(|edge| match edge.weight() {
                NamespaceEdge::Contains(name) => name.as_str(),
            })
            .collect();
        names.sort_unstable();
        names
    }

    /// Get or create a child namespace.
    pub fn get_or_create_child(&mut self, parent: NodeIndex, name: &str) -> NodeIndex {
        if let Some(child) = self.find_child(parent, name) {
            return child;
        }

        let child = self.graph.add_node(NamespaceData::default());
        self.graph
            .add_edge(parent, child, NamespaceEdge::Contains(name.to_string()));
        child
    }

    /// Get or create a namespace path from root.
    pub fn get_or_create_path<S: AsRef<str>>(&mut self, path: &[S]) -> NodeIndex {
        let mut current = self.root;
        for segment in path {
            current = self.get_or_create_child(current, segment.as_ref());
        }
        current
    }

    /// Get an existing namespace by path, or None if it doesn't exist.
    pub fn get_path<S: AsRef<str>>(&self, path: &[S]) -> Option<NodeIndex> {
        let mut current = self.root;
        for segment in path {
            current = self.find_child(current, segment.as_ref())?;
        }
        Some(current)
    }

    /// Full path of a node, as host namespace names.
    pub fn namespace_path(&self, node: NodeIndex) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = node;
        while let Some(edge) = self
            .graph
            .edges_directed(current, Direction::Incoming)
            .next()
        {
            let NamespaceEdge::Contains(name) = edge.weight();
            path.push(name.clone());
            current = edge.source();
        }
        path.reverse();
        path
    }

    fn display_path(&self, node: NodeIndex) -> String {
        display(&self.namespace_path(node))
    }

    fn data_mut(&mut self, node: NodeIndex) -> &mut NamespaceData {
        &mut self.graph[node]
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register a function in the namespace at `node`.
    pub fn register_function(
        &mut self,
        node: NodeIndex,
        set: OverloadSet,
    ) -> Result<(), RegistrationError> {
        if set.name().is_empty() {
            return Err(RegistrationError::InvalidName(String::new()));
        }
        if self.graph[node].functions.contains_key(set.name()) {
            return Err(RegistrationError::DuplicateFunction {
                namespace: self.display_path(node),
                name: set.name().to_string(),
            });
        }
        self.data_mut(node)
            .functions
            .insert(set.name().to_string(), set);
        Ok(())
    }

    /// Register a constant in the namespace at `node`, bypassing the naming
    /// rules.
    pub fn register_constant(
        &mut self,
        node: NodeIndex,
        name: &str,
        value: i64,
    ) -> Result<(), RegistrationError> {
        if self.graph[node].constants.contains_key(name) {
            return Err(RegistrationError::DuplicateConstant {
                namespace: self.display_path(node),
                name: name.to_string(),
            });
        }
        self.data_mut(node).constants.insert(name.to_string(), value);
        Ok(())
    }

    /// Install every function and exposed constant of `module`.
    ///
    /// `_`-prefixed constants are never installed; other lowercase-leading
    /// names are skipped. Either the whole module is installed or, on error,
    /// the tree is left untouched.
    pub fn install(&mut self, module: &Module) -> Result<InstallSummary, RegistrationError> {
        let path = module.host_path();
        self.check_install(path.as_slice(), module)?;
        let node = self.get_or_create_path(path.as_slice());
        let mut summary = InstallSummary::default();

        for set in module.functions() {
            self.register_function(node, set.clone())?;
            summary.functions += 1;
        }

        for (name, value) in module.constants() {
            match constant_visibility(name) {
                ConstantVisibility::Exposed => {
                    self.register_constant(node, name, *value)?;
                    summary.constants += 1;
                }
                visibility => {
                    debug!(module = module.native_path(), %name, ?visibility, "constant not installed");
                    summary.skipped_constants += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Every name `module` would add must be free in the tree and unique
    /// within the module.
    fn check_install(&self, path: &[String], module: &Module) -> Result<(), RegistrationError> {
        let existing = self.get_path(path).map(|node| &self.graph[node]);

        let mut functions = FxHashSet::default();
        for set in module.functions() {
            let name = set.name();
            if name.is_empty() {
                return Err(RegistrationError::InvalidName(String::new()));
            }
            let taken = existing.is_some_and(|data| data.functions.contains_key(name));
            if taken || !functions.insert(name) {
                return Err(RegistrationError::DuplicateFunction {
                    namespace: display(path),
                    name: name.to_string(),
                });
            }
        }

        let mut constants = FxHashSet::default();
        for (name, _) in module.constants() {
            if constant_visibility(name) != ConstantVisibility::Exposed {
                continue;
            }
            let taken = existing.is_some_and(|data| data.constants.contains_key(name));
            if taken || !constants.insert(name.as_str()) {
                return Err(RegistrationError::DuplicateConstant {
                    namespace: display(path),
                    name: name.clone(),
                });
            }
        }
        Ok(())
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    pub fn function<S: AsRef<str>>(&self, path: &[S], name: &str) -> Option<&OverloadSet> {
        let node = self.get_path(path)?;
        self.graph[node].functions.get(name)
    }

    pub fn constant<S: AsRef<str>>(&self, path: &[S], name: &str) -> Option<i64> {
        let node = self.get_path(path)?;
        self.graph[node].constants.get(name).copied()
    }

    /// Total number of namespaces, including the root.
    pub fn namespace_count(&self) -> usize {
        self.graph.node_count()
    }
}

fn display(path: &[String]) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.join("::")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvbind_core::Value;
    use cvbind_dispatch::Signature;

    fn function(name: &str) -> OverloadSet {
        OverloadSet::new(name).overload(Signature::new(name, []), |_| Ok(Value::Nil))
    }

    #[test]
    fn paths_are_created_once() {
        let mut tree = NamespaceTree::new();
        let a = tree.get_or_create_path(&["Aruco"]);
        let again = tree.get_or_create_path(&["Aruco"]);
        assert_eq!(a, again);
        assert_eq!(tree.namespace_count(), 2);
        assert_eq!(tree.namespace_path(a), ["Aruco"]);
        assert!(tree.get_path(&["Dnn"]).is_none());
    }

    #[test]
    fn install_applies_naming_rules() {
        let module = Module::new("cv.aruco")
            .function(function("detectMarkers"))
            .constant("DICT_4X4_50", 0)
            .constant("_PRIVATE", 1)
            .constant("lowercase_flag", 2);

        let mut tree = NamespaceTree::new();
        let summary = tree.install(&module).unwrap();
        assert_eq!(
            summary,
            InstallSummary {
                functions: 1,
                constants: 1,
                skipped_constants: 2,
            }
        );
        assert_eq!(tree.children(tree.root()), ["Aruco"]);
        assert!(tree.function(&["Aruco"], "detectMarkers").is_some());
        assert_eq!(tree.constant(&["Aruco"], "DICT_4X4_50"), Some(0));
        assert_eq!(tree.constant(&["Aruco"], "_PRIVATE"), None);
        assert_eq!(tree.constant(&["Aruco"], "lowercase_flag"), None);
    }

    #[test]
    fn root_module_installs_at_root() {
        let mut tree = NamespaceTree::new();
        tree.install(&Module::new("cv").constant("CV_8U", 0)).unwrap();
        assert_eq!(tree.constant::<&str>(&[], "CV_8U"), Some(0));
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut tree = NamespaceTree::new();
        let base = Module::new("cv").function(function("blur")).constant("A", 1);
        tree.install(&base).unwrap();

        let err = tree
            .install(&Module::new("cv").function(function("blur")))
            .unwrap_err();
        assert_eq!(
            err,
            RegistrationError::DuplicateFunction {
                namespace: "<root>".to_string(),
                name: "blur".to_string(),
            }
        );

        let err = tree.install(&Module::new("cv").constant("A", 2)).unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateConstant { .. }));
    }

    #[test]
    fn failed_install_leaves_tree_untouched() {
        let mut tree = NamespaceTree::new();
        tree.install(&Module::new("cv").constant("B", 1)).unwrap();

        let clashing = Module::new("cv")
            .function(function("erode"))
            .constant("A", 0)
            .constant("B", 2);
        let err = tree.install(&clashing).unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateConstant { .. }));
        assert!(tree.function::<&str>(&[], "erode").is_none());
        assert_eq!(tree.constant::<&str>(&[], "A"), None);
        assert_eq!(tree.constant::<&str>(&[], "B"), Some(1));

        tree.install(&Module::new("cv").constant("A", 0)).unwrap();
        assert_eq!(tree.constant::<&str>(&[], "A"), Some(0));
    }

    #[test]
    fn duplicates_within_one_module_are_rejected_up_front() {
        let mut tree = NamespaceTree::new();
        let module = Module::new("cv.dnn")
            .function(function("readNet"))
            .constant("DNN_BACKEND_DEFAULT", 0)
            .constant("DNN_BACKEND_DEFAULT", 1);
        let err = tree.install(&module).unwrap_err();
        assert_eq!(
            err,
            RegistrationError::DuplicateConstant {
                namespace: "Dnn".to_string(),
                name: "DNN_BACKEND_DEFAULT".to_string(),
            }
        );
        assert!(tree.get_path(&["Dnn"]).is_none());
        assert_eq!(tree.namespace_count(), 1);
    }
}
