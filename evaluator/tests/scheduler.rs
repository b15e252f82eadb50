mod common;

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::time::Duration;

use futures::executor::block_on;
use futures::future::join;

use evaluator::{ContentHash, Element, EvalError, LineRange, ResolveError};

use common::{harness, note};

#[test]
fn evaluates_a_document() {
    let h = harness();
    h.vault.insert("a.md", &note(&[], &["1", "2"]));

    let result = block_on(h.scheduler.evaluate("a.md", false)).unwrap();
    assert!(!result.from_cache);
    let outputs: Vec<&str> = result.evaluation.blocks().iter().map(|b| b.output()).collect();
    assert_eq!(outputs, vec!["1", "2"]);
    assert!(Rc::ptr_eq(&h.scheduler.cached("a.md").unwrap(), &result.evaluation));
}

#[test]
fn unchanged_content_is_served_from_cache() {
    let h = harness();
    h.vault.insert("a.md", &note(&[], &["1"]));

    let first = block_on(h.scheduler.evaluate("a.md", false)).unwrap();
    let calls = h.backend.eval_count();
    let second = block_on(h.scheduler.evaluate("a.md", false)).unwrap();

    assert!(second.from_cache);
    assert!(Rc::ptr_eq(&first.evaluation, &second.evaluation));
    assert_eq!(h.backend.eval_count(), calls);
}

#[test]
fn forced_evaluation_replaces_and_detaches_once() {
    let h = harness();
    h.vault.insert("a.md", &note(&[], &["tick:10"]));

    let first = block_on(h.scheduler.evaluate("a.md", false)).unwrap();
    let section = Element::new("div");
    first.evaluation.attach(&section, LineRange::new(1, 3));
    assert!(first.evaluation.blocks()[0].is_attached());

    let second = block_on(h.scheduler.evaluate("a.md", true)).unwrap();
    assert!(!second.from_cache);
    assert!(!Rc::ptr_eq(&first.evaluation, &second.evaluation));
    assert!(!first.evaluation.blocks()[0].is_attached());
    assert_eq!(h.intervals.cleared_count(), 1);
    assert_eq!(h.backend.eval_count(), 2);
}

#[test]
fn changed_content_cancels_old_intervals_before_new_version() {
    let h = harness();
    h.vault.insert("a.md", &note(&[], &["tick:10"]));
    let first = block_on(h.scheduler.evaluate("a.md", false)).unwrap();
    h.intervals.advance(Duration::from_millis(20));
    assert_eq!(h.backend.ticks.get(), 2);

    let active_when_rebuilt = Rc::new(RefCell::new(Vec::new()));
    let intervals = h.intervals.clone();
    let seen = active_when_rebuilt.clone();
    h.scheduler
        .on_document_evaluated(move |_| seen.borrow_mut().push(intervals.active_count()));

    h.vault.insert("a.md", &note(&[], &["changed"]));
    let second = block_on(h.scheduler.evaluate("a.md", false)).unwrap();

    assert_eq!(second.evaluation.blocks()[0].output(), "changed");
    assert_eq!(first.evaluation.blocks()[0].active_intervals(), 0);
    assert_eq!(*active_when_rebuilt.borrow(), vec![0]);
    h.intervals.advance(Duration::from_millis(100));
    assert_eq!(h.backend.ticks.get(), 2);
}

#[test]
fn dependencies_run_first_and_root_last() {
    let h = harness();
    h.vault.insert("root.md", &note(&["b", "c"], &["root"]));
    h.vault.insert("b.md", &note(&["d"], &["b"]));
    h.vault.insert("c.md", &note(&["d"], &["c"]));
    h.vault.insert("d.md", &note(&[], &["d"]));

    let order = Rc::new(RefCell::new(Vec::new()));
    let seen = order.clone();
    h.scheduler
        .on_document_evaluated(move |evaluation| seen.borrow_mut().push(evaluation.path().to_string()));

    block_on(h.scheduler.evaluate("root.md", false)).unwrap();
    assert_eq!(*order.borrow(), vec!["d.md", "b.md", "c.md", "root.md"]);
    assert_eq!(h.backend.evaluated(), vec!["d", "b", "c", "root"]);
}

#[test]
fn forcing_the_root_does_not_force_dependencies() {
    let h = harness();
    h.vault.insert("root.md", &note(&["dep"], &["root"]));
    h.vault.insert("dep.md", &note(&[], &["dep"]));

    block_on(h.scheduler.evaluate("root.md", false)).unwrap();
    let dep = h.scheduler.cached("dep.md").unwrap();

    block_on(h.scheduler.evaluate("root.md", true)).unwrap();
    assert!(Rc::ptr_eq(&dep, &h.scheduler.cached("dep.md").unwrap()));
    assert_eq!(h.backend.evaluated(), vec!["dep", "root", "root"]);
}

#[test]
fn changed_dependency_is_reevaluated_without_its_dependent() {
    let h = harness();
    h.vault.insert("root.md", &note(&["dep"], &["root"]));
    h.vault.insert("dep.md", &note(&[], &["dep"]));
    block_on(h.scheduler.evaluate("root.md", false)).unwrap();

    h.vault.insert("dep.md", &note(&[], &["dep2"]));
    let root = block_on(h.scheduler.evaluate("root.md", false)).unwrap();
    assert!(root.from_cache);
    assert_eq!(h.backend.evaluated(), vec!["dep", "root", "dep2"]);
}

#[test]
fn mutual_requirement_is_a_cycle() {
    let h = harness();
    h.vault.insert("A.md", &note(&["B"], &["a"]));
    h.vault.insert("B.md", &note(&["A"], &["b"]));

    let err = block_on(h.scheduler.evaluate("A.md", false)).unwrap_err();
    assert_eq!(
        err,
        EvalError::Resolve(ResolveError::Cycle {
            nodes: vec!["A.md".to_string(), "B.md".to_string()]
        })
    );
    assert_eq!(h.backend.eval_count(), 0);
    assert!(h.scheduler.cached("A.md").is_none());
}

#[test]
fn documents_reaching_a_cycle_fail() {
    let h = harness();
    h.vault.insert("top.md", &note(&["A"], &["top"]));
    h.vault.insert("A.md", &note(&["B"], &["a"]));
    h.vault.insert("B.md", &note(&["A"], &["b"]));
    h.vault.insert("fine.md", &note(&[], &["fine"]));

    let err = block_on(h.scheduler.evaluate("top.md", false)).unwrap_err();
    assert!(matches!(err, EvalError::Resolve(ResolveError::Cycle { .. })));

    // Unrelated documents are unaffected.
    assert!(block_on(h.scheduler.evaluate("fine.md", false)).is_ok());
}

#[test]
fn self_requirement_is_a_cycle() {
    let h = harness();
    h.vault.insert("a.md", &note(&["a"], &["a"]));
    let err = block_on(h.scheduler.evaluate("a.md", false)).unwrap_err();
    assert!(matches!(err, EvalError::Resolve(ResolveError::Cycle { .. })));
}

#[test]
fn concurrent_identical_requests_share_one_evaluation() {
    let h = harness();
    h.vault.insert("a.md", &note(&[], &["1"]));

    let first = h.scheduler.evaluate("a.md", false);
    let second = h.scheduler.evaluate("a.md", false);
    assert!(h.scheduler.is_in_flight("a.md"));

    let (a, b) = block_on(join(first, second));
    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(Rc::ptr_eq(&a.evaluation, &b.evaluation));
    assert!(!a.from_cache && !b.from_cache);
    assert_eq!(h.backend.eval_count(), 1);
    assert!(!h.scheduler.is_in_flight("a.md"));
}

#[test]
fn forced_and_unforced_requests_are_separate() {
    let h = harness();
    h.vault.insert("a.md", &note(&[], &["1"]));

    let plain = h.scheduler.evaluate("a.md", false);
    let forced = h.scheduler.evaluate("a.md", true);
    let (plain, forced) = block_on(join(plain, forced));
    assert!(!Rc::ptr_eq(&plain.unwrap().evaluation, &forced.unwrap().evaluation));
    assert_eq!(h.backend.eval_count(), 2);
}

#[test]
fn dependents_lists_documents_that_required_a_path() {
    let h = harness();
    h.vault.insert("root.md", &note(&["mid"], &["root"]));
    h.vault.insert("mid.md", &note(&["leaf"], &["mid"]));
    h.vault.insert("leaf.md", &note(&[], &["leaf"]));
    block_on(h.scheduler.evaluate("root.md", false)).unwrap();

    assert_eq!(h.scheduler.dependents("leaf.md"), vec!["mid.md", "root.md"]);
    assert_eq!(h.scheduler.dependents("mid.md"), vec!["root.md"]);
    assert!(h.scheduler.dependents("root.md").is_empty());
}

#[test]
fn clear_detaches_and_empties_the_cache() {
    let h = harness();
    h.vault.insert("a.md", &note(&[], &["tick:10"]));
    let first = block_on(h.scheduler.evaluate("a.md", false)).unwrap();

    h.scheduler.clear();
    assert!(h.scheduler.cached("a.md").is_none());
    assert_eq!(first.evaluation.blocks()[0].active_intervals(), 0);

    let again = block_on(h.scheduler.evaluate("a.md", false)).unwrap();
    assert!(!again.from_cache);
}

#[test]
fn evaluations_finishing_after_clear_are_not_cached() {
    let h = harness();
    h.vault.insert("a.md", &note(&[], &["tick:10"]));

    let pending = h.scheduler.evaluate("a.md", false);
    h.scheduler.clear();
    let result = block_on(pending).unwrap();

    assert!(h.scheduler.cached("a.md").is_none());
    assert_eq!(result.evaluation.blocks()[0].active_intervals(), 0);
    assert_eq!(h.intervals.active_count(), 0);
}

#[test]
fn listeners_are_not_called_for_cache_hits() {
    let h = harness();
    h.vault.insert("a.md", &note(&[], &["1"]));
    let calls = Rc::new(RefCell::new(0));
    let counter = calls.clone();
    h.scheduler.on_document_evaluated(move |_| *counter.borrow_mut() += 1);

    block_on(h.scheduler.evaluate("a.md", false)).unwrap();
    block_on(h.scheduler.evaluate("a.md", false)).unwrap();
    assert_eq!(*calls.borrow(), 1);
}

#[test]
fn missing_documents_and_links_are_errors() {
    let h = harness();
    let err = block_on(h.scheduler.evaluate("nope.md", false)).unwrap_err();
    assert_eq!(err, EvalError::Resolve(ResolveError::NotFound("nope.md".to_string())));

    h.vault.insert("a.md", &note(&["ghost"], &["a"]));
    let err = block_on(h.scheduler.evaluate("a.md", false)).unwrap_err();
    assert_eq!(
        err,
        EvalError::Resolve(ResolveError::UnresolvedLink {
            link: "ghost".to_string(),
            from: "a.md".to_string(),
        })
    );
}

#[test]
fn malformed_front_matter_is_reported_with_its_path() {
    let h = harness();
    h.vault.insert("a.md", "---\nrequire: [unclosed\n---\n");
    let err = block_on(h.scheduler.evaluate("a.md", false)).unwrap_err();
    assert!(matches!(
        err,
        EvalError::Resolve(ResolveError::FrontMatter { ref path, .. }) if path == "a.md"
    ));
}

#[test]
fn block_errors_do_not_fail_the_document() {
    let h = harness();
    h.vault.insert("a.md", &note(&[], &["fail:x", "ok"]));
    let result = block_on(h.scheduler.evaluate("a.md", false)).unwrap();
    let blocks = result.evaluation.blocks();
    assert!(blocks[0].is_error());
    assert_eq!(blocks[1].output(), "ok");
}

#[test]
fn injected_hasher_decides_what_changed() {
    fn constant(_: &str) -> ContentHash {
        ContentHash(7)
    }

    let h = harness();
    let scheduler = h.scheduler.clone().with_hasher(constant);
    h.vault.insert("a.md", &note(&[], &["1"]));
    block_on(scheduler.evaluate("a.md", false)).unwrap();

    h.vault.insert("a.md", &note(&[], &["2"]));
    let result = block_on(scheduler.evaluate("a.md", false)).unwrap();
    assert!(result.from_cache);
    assert_eq!(result.evaluation.blocks()[0].output(), "1");
    assert_eq!(result.evaluation.content_hash(), ContentHash(7));
}

#[test]
fn each_document_evaluates_once_per_request() {
    let h = harness();
    h.vault.insert("root.md", &note(&["a", "b"], &["root"]));
    h.vault.insert("a.md", &note(&["shared"], &["a"]));
    h.vault.insert("b.md", &note(&["shared"], &["b"]));
    h.vault.insert("shared.md", &note(&[], &["shared"]));

    block_on(h.scheduler.evaluate("root.md", false)).unwrap();
    let unique: BTreeSet<String> = h.backend.evaluated().into_iter().collect();
    assert_eq!(unique.len(), h.backend.eval_count());
}
