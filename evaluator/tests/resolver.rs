use std::collections::BTreeSet;
use std::fs;

use futures::executor::block_on;
use quickcheck_macros::quickcheck;

use evaluator::{
    DependencyResolver, FileHandle, FsVault, MemoryVault, ResolveError, Vault, VaultError,
    topological_order,
};

fn plan(vault: &MemoryVault, root: &str) -> Result<Vec<String>, ResolveError> {
    block_on(DependencyResolver::new(vault).resolve(root)).map(|plan| plan.order)
}

fn requiring(links: &[&str]) -> String {
    let list: Vec<String> = links.iter().map(|l| format!("\"[[{}]]\"", l)).collect();
    format!("---\nrequire: [{}]\n---\nbody\n", list.join(", "))
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn edges(pairs: &[(&str, &str)]) -> BTreeSet<(String, String)> {
    pairs
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect()
}

#[test]
fn document_without_requirements_is_alone() {
    let vault = MemoryVault::new();
    vault.insert("a.md", "# A\n");
    assert_eq!(plan(&vault, "a.md").unwrap(), vec!["a.md"]);
}

#[test]
fn require_accepts_a_single_link() {
    let vault = MemoryVault::new();
    vault.insert("a.md", "---\nrequire: b\n---\n");
    vault.insert("b.md", "");
    assert_eq!(plan(&vault, "a.md").unwrap(), vec!["b.md", "a.md"]);
}

#[test]
fn unquoted_wiki_links_are_understood() {
    let vault = MemoryVault::new();
    vault.insert("a.md", "---\nrequire:\n  - [[b]]\n  - \"[[c|the c note]]\"\n---\n");
    vault.insert("b.md", "");
    vault.insert("c.md", "");
    assert_eq!(plan(&vault, "a.md").unwrap(), vec!["b.md", "c.md", "a.md"]);
}

#[test]
fn diamond_is_ordered_with_shared_dependency_once() {
    let vault = MemoryVault::new();
    vault.insert("root.md", &requiring(&["left", "right"]));
    vault.insert("left.md", &requiring(&["base"]));
    vault.insert("right.md", &requiring(&["base"]));
    vault.insert("base.md", "");

    let resolved = block_on(DependencyResolver::new(&vault).resolve("root.md")).unwrap();
    assert_eq!(resolved.order, vec!["base.md", "left.md", "right.md", "root.md"]);
    assert_eq!(resolved.root(), "root.md");
    assert_eq!(resolved.dependencies(), ["base.md", "left.md", "right.md"]);
    assert_eq!(
        resolved.edges,
        edges(&[
            ("base.md", "left.md"),
            ("base.md", "right.md"),
            ("left.md", "root.md"),
            ("right.md", "root.md"),
        ])
    );
}

#[test]
fn cycle_names_its_members() {
    let vault = MemoryVault::new();
    vault.insert("a.md", &requiring(&["b"]));
    vault.insert("b.md", &requiring(&["c"]));
    vault.insert("c.md", &requiring(&["a"]));
    assert_eq!(
        plan(&vault, "a.md"),
        Err(ResolveError::Cycle {
            nodes: vec!["a.md".to_string(), "b.md".to_string(), "c.md".to_string()]
        })
    );
}

#[test]
fn topological_order_breaks_ties_by_name() {
    let order = topological_order(&set(&["c", "b", "a"]), &BTreeSet::new()).unwrap();
    assert_eq!(order, vec!["a", "b", "c"]);

    let order = topological_order(&set(&["a", "b", "z"]), &edges(&[("z", "a")])).unwrap();
    assert_eq!(order, vec!["b", "z", "a"]);
}

#[quickcheck]
fn dependencies_always_precede_dependents(requires: Vec<Vec<u8>>) -> bool {
    // Document i may only require documents with a larger index, so the
    // graph is acyclic.
    let count = requires.len().min(12);
    let name = |i: usize| format!("n{:02}", i);
    let vault = MemoryVault::new();
    for i in 0..count {
        let links: Vec<String> = requires[i]
            .iter()
            .map(|r| i + 1 + (*r as usize) % (count.max(i + 2) - i - 1))
            .filter(|j| *j < count)
            .map(name)
            .collect();
        let links: Vec<&str> = links.iter().map(String::as_str).collect();
        vault.insert(&format!("{}.md", name(i)), &requiring(&links));
    }
    if count == 0 {
        return true;
    }

    let root = format!("{}.md", name(0));
    let Ok(resolved) = block_on(DependencyResolver::new(&vault).resolve(&root)) else {
        return false;
    };
    let position = |path: &str| resolved.order.iter().position(|p| p == path);
    let unique: BTreeSet<&String> = resolved.order.iter().collect();

    resolved.order.last() == Some(&root)
        && unique.len() == resolved.order.len()
        && resolved
            .edges
            .iter()
            .all(|(dep, dependent)| position(dep) < position(dependent))
}

#[quickcheck]
fn topological_order_respects_every_edge(pairs: Vec<(u8, u8)>) -> bool {
    let nodes: BTreeSet<String> = (0..16).map(|i| format!("{}", i)).collect();
    // Orient every edge from the smaller to the larger node: no cycles.
    let graph: BTreeSet<(String, String)> = pairs
        .iter()
        .map(|(a, b)| (a % 16, b % 16))
        .filter(|(a, b)| a != b)
        .map(|(a, b)| (a.min(b).to_string(), a.max(b).to_string()))
        .collect();

    let Ok(order) = topological_order(&nodes, &graph) else {
        return false;
    };
    let position = |n: &String| order.iter().position(|o| o == n);
    order.len() == nodes.len() && graph.iter().all(|(a, b)| position(a) < position(b))
}

// ---------------------------------------------------------------------------
// Vaults
// ---------------------------------------------------------------------------

#[test]
fn memory_vault_resolves_links() {
    let vault = MemoryVault::new();
    vault.insert("notes/a.md", "");
    vault.insert("notes/b.md", "");
    vault.insert("other/b.md", "");
    vault.insert("top.md", "");

    let resolve = |link: &str, from: &str| vault.resolve_link(link, from).map(|f| f.path);
    assert_eq!(resolve("top", "notes/a.md").as_deref(), Some("top.md"));
    assert_eq!(resolve("notes/a.md", "top.md").as_deref(), Some("notes/a.md"));
    assert_eq!(resolve("b", "other/x.md").as_deref(), Some("other/b.md"));
    assert_eq!(resolve("b", "top.md").as_deref(), Some("notes/b.md"));
    assert_eq!(resolve("missing", "top.md"), None);
}

#[test]
fn memory_vault_reads_and_counts() {
    let vault = MemoryVault::new();
    vault.insert("a.md", "hello");
    let file = vault.file_by_path("a.md").unwrap();
    assert_eq!(block_on(vault.read(&file)), Ok("hello".to_string()));
    assert_eq!(vault.read_count(), 1);

    vault.remove("a.md");
    assert!(vault.file_by_path("a.md").is_none());
    assert_eq!(
        block_on(vault.read(&file)),
        Err(VaultError::NotFound("a.md".to_string()))
    );
}

#[test]
fn fs_vault_indexes_a_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("lib")).unwrap();
    fs::write(dir.path().join("main.md"), requiring(&["helpers"])).unwrap();
    fs::write(dir.path().join("lib/helpers.md"), "```clojure\n(def x 1)\n```\n").unwrap();
    fs::write(dir.path().join("lib/ignored.txt"), "").unwrap();

    let vault = FsVault::new(dir.path());
    assert_eq!(vault.file_by_path("main.md"), Some(FileHandle::new("main.md")));
    assert_eq!(
        vault.resolve_link("helpers", "main.md"),
        Some(FileHandle::new("lib/helpers.md"))
    );
    assert!(vault.resolve_link("ignored", "main.md").is_none());

    let content = block_on(vault.read(&FileHandle::new("lib/helpers.md"))).unwrap();
    assert!(content.contains("(def x 1)"));
    assert_eq!(
        block_on(vault.read(&FileHandle::new("nope.md"))),
        Err(VaultError::NotFound("nope.md".to_string()))
    );

    let resolved = block_on(DependencyResolver::new(&vault).resolve("main.md")).unwrap();
    assert_eq!(resolved.order, vec!["lib/helpers.md", "main.md"]);
    assert_eq!(
        vault.relative_path(&dir.path().join("lib/helpers.md")).as_deref(),
        Some("lib/helpers.md")
    );
}
