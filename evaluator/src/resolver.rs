use std::collections::{BTreeMap, BTreeSet, VecDeque};

use notes::parse_front_matter;

use crate::error::ResolveError;
use crate::vault::{FileHandle, Vault};

/// The documents to evaluate for one root, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    /// Dependencies before dependents; the root is last.
    pub order: Vec<String>,
    /// `(dependency, dependent)` pairs.
    pub edges: BTreeSet<(String, String)>,
}

impl ExecutionPlan {
    pub fn root(&self) -> &str {
        self.order.last().map_or("", String::as_str)
    }

    /// Every transitive dependency of the root, in execution order.
    pub fn dependencies(&self) -> &[String] {
        &self.order[..self.order.len().saturating_sub(1)]
    }
}

/// Builds execution plans from the `require` front matter of documents.
pub struct DependencyResolver<'a> {
    vault: &'a dyn Vault,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(vault: &'a dyn Vault) -> Self {
        DependencyResolver { vault }
    }

    /// The documents `file` directly requires, in declaration order.
    pub async fn requirements(&self, file: &FileHandle) -> Result<Vec<FileHandle>, ResolveError> {
        let content = self.vault.read(file).await?;
        let front_matter = parse_front_matter(&content).map_err(|error| ResolveError::FrontMatter {
            path: file.path.clone(),
            error,
        })?;

        front_matter
            .require
            .iter()
            .map(|link| {
                self.vault
                    .resolve_link(link, &file.path)
                    .ok_or_else(|| ResolveError::UnresolvedLink {
                        link: link.clone(),
                        from: file.path.clone(),
                    })
            })
            .collect()
    }

    /// Walk the requirements of `root` and order every reachable document.
    pub async fn resolve(&self, root: &str) -> Result<ExecutionPlan, ResolveError> {
        let root_file = self
            .vault
            .file_by_path(root)
            .ok_or_else(|| ResolveError::NotFound(root.to_string()))?;

        let mut nodes: BTreeSet<String> = BTreeSet::new();
        let mut edges: BTreeSet<(String, String)> = BTreeSet::new();
        let mut queue: VecDeque<FileHandle> = VecDeque::new();

        nodes.insert(root_file.path.clone());
        queue.push_back(root_file);

        while let Some(file) = queue.pop_front() {
            for dependency in self.requirements(&file).await? {
                edges.insert((dependency.path.clone(), file.path.clone()));
                if nodes.insert(dependency.path.clone()) {
                    queue.push_back(dependency);
                }
            }
        }

        let order = topological_order(&nodes, &edges)?;
        log::debug!("execution order for {}: {:?}", root, order);
        Ok(ExecutionPlan { order, edges })
    }
}

/// Order `nodes` so that every edge's dependency precedes its dependent.
///
/// Ties are broken by name, so the result is deterministic. Fails with
/// [`ResolveError::Cycle`] naming every node that could not be ordered.
pub fn topological_order(
    nodes: &BTreeSet<String>,
    edges: &BTreeSet<(String, String)>,
) -> Result<Vec<String>, ResolveError> {
    let mut in_degree: BTreeMap<&str, usize> = nodes.iter().map(|n| (n.as_str(), 0)).collect();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (dependency, dependent) in edges {
        *in_degree.entry(dependent.as_str()).or_default() += 1;
        in_degree.entry(dependency.as_str()).or_default();
        dependents
            .entry(dependency.as_str())
            .or_default()
            .push(dependent.as_str());
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(node, _)| *node)
        .collect();

    let mut ordered: Vec<String> = Vec::with_capacity(in_degree.len());
    while let Some(node) = ready.pop_first() {
        ordered.push(node.to_string());
        for dependent in dependents.get(node).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(dependent);
                }
            }
        }
    }

    if ordered.len() < in_degree.len() {
        let remaining = in_degree
            .keys()
            .filter(|node| !ordered.iter().any(|o| o == *node))
            .map(|node| node.to_string())
            .collect();
        return Err(ResolveError::Cycle { nodes: remaining });
    }

    Ok(ordered)
}
