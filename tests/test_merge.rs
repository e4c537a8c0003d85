use std::collections::VecDeque;
use std::fs;
use std::io;

use bibbuilder::bib::{BibEntry, Bibliography};
use bibbuilder::merge::{
    merge_files, merge_into, Clobber, ConflictPolicy, ExclusionMap, MergeRequest, PolicyDecider,
};
use bibbuilder::config::RunContext;
use bibbuilder::prompt::Prompter;
use bibbuilder::BibError;
use tempfile::tempdir;

/// Replays canned answers; fails the test if asked more than it was told.
#[derive(Default)]
struct ScriptedPrompter {
    choices: VecDeque<usize>,
    inputs: VecDeque<String>,
    confirms: VecDeque<bool>,
    shown: Vec<String>,
}

impl ScriptedPrompter {
    fn choosing(choices: &[usize]) -> Self {
        Self {
            choices: choices.iter().copied().collect(),
            ..Self::default()
        }
    }

    fn typing(mut self, input: &str) -> Self {
        self.inputs.push_back(input.to_string());
        self
    }

    fn confirming(answer: bool) -> Self {
        Self {
            confirms: VecDeque::from([answer]),
            ..Self::default()
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn show(&mut self, text: &str) -> io::Result<()> {
        self.shown.push(text.to_string());
        Ok(())
    }

    fn choose(&mut self, _question: &str, _options: &[String]) -> io::Result<usize> {
        Ok(self.choices.pop_front().expect("unexpected choice prompt"))
    }

    fn input(&mut self, _question: &str) -> io::Result<String> {
        Ok(self.inputs.pop_front().expect("unexpected input prompt"))
    }

    fn confirm(&mut self, _question: &str, _default: bool) -> io::Result<bool> {
        Ok(self.confirms.pop_front().expect("unexpected confirm prompt"))
    }
}

fn article(key: &str, title: &str) -> BibEntry {
    BibEntry::builder(key, "article")
        .field("author", "Smith, John")
        .field("title", title)
        .field("year", "2020")
        .build()
}

fn store(label: &str, entries: Vec<BibEntry>) -> Bibliography {
    Bibliography::from_entries(label, entries).unwrap()
}

fn merge_with(
    policy: ConflictPolicy,
    base: &mut Bibliography,
    aux: &[Bibliography],
    exclusions: &ExclusionMap,
) -> bibbuilder::Result<bibbuilder::merge::MergeReport> {
    let mut decider = PolicyDecider::new(policy, ScriptedPrompter::default());
    merge_into(base, aux, exclusions, &mut decider, false)
}

#[test]
fn test_merge_into_itself_with_first_is_unchanged() {
    let a = store("a.bib", vec![article("K1", "One"), article("K2", "Two")]);
    let mut base = a.clone();
    let report = merge_with(ConflictPolicy::First, &mut base, &[a.clone()], &ExclusionMap::new()).unwrap();
    assert_eq!(base, a);
    assert!(report.added.is_empty());
}

#[test]
fn test_new_keys_are_appended_in_order() {
    let mut base = store("a.bib", vec![article("K1", "One")]);
    let b = store("b.bib", vec![article("K3", "Three"), article("K2", "Two")]);
    merge_with(ConflictPolicy::Error, &mut base, &[b], &ExclusionMap::new()).unwrap();
    assert_eq!(base.keys(), vec!["K1", "K3", "K2"]);
}

#[test]
fn test_excluded_key_is_removed() {
    let mut base = store("a.bib", vec![article("K1", "One"), article("K2", "Two")]);
    let excluded = store("old.bib", vec![article("K1", "Whatever")]);
    let exclusions = ExclusionMap::from_stores(&[excluded]);

    let report = merge_with(ConflictPolicy::First, &mut base, &[], &exclusions).unwrap();
    assert!(!base.contains_key("K1"));
    assert_eq!(report.removed, vec!["K1"]);
    assert_eq!(exclusions.source("K1"), Some("old.bib"));
}

#[test]
fn test_excluded_conflict_is_not_asked() {
    let mut base = store("a.bib", vec![article("K1", "One")]);
    let b = store("b.bib", vec![article("K1", "Other")]);
    let exclusions = ExclusionMap::from_stores(&[store("x.bib", vec![article("K1", "X")])]);

    // Would fail under `error` if the conflict reached the decider.
    merge_with(ConflictPolicy::Error, &mut base, &[b], &exclusions).unwrap();
    assert!(base.is_empty());
}

#[test]
fn test_last_replaces_in_place() {
    let mut base = store("a.bib", vec![article("K1", "One"), article("K2", "Two")]);
    let b = store("b.bib", vec![article("K1", "One, revised")]);
    let report = merge_with(ConflictPolicy::Last, &mut base, &[b], &ExclusionMap::new()).unwrap();
    assert_eq!(base.keys(), vec!["K1", "K2"]);
    assert_eq!(base.get("K1").unwrap().title(), Some("One, revised"));
    assert_eq!(report.replaced, vec!["K1"]);
}

#[test]
fn test_rename_keeps_both() {
    let mut base = store("a.bib", vec![article("SmithJ20", "One"), article("SmithJ20A", "Two")]);
    let b = store("b.bib", vec![article("SmithJ20", "Three")]);
    merge_with(ConflictPolicy::Rename, &mut base, &[b], &ExclusionMap::new()).unwrap();
    assert_eq!(base.keys(), vec!["SmithJ20", "SmithJ20A", "SmithJ20B"]);
    assert_eq!(base.get("SmithJ20").unwrap().title(), Some("One"));
    assert_eq!(base.get("SmithJ20B").unwrap().title(), Some("Three"));
}

#[test]
fn test_error_policy_aborts() {
    let mut base = store("a.bib", vec![article("K1", "One")]);
    let b = store("b.bib", vec![article("K1", "Two")]);
    let result = merge_with(ConflictPolicy::Error, &mut base, &[b], &ExclusionMap::new());
    match result {
        Err(BibError::MergeAborted { key, base, incoming }) => {
            assert_eq!(key, "K1");
            assert_eq!(base, "a.bib");
            assert_eq!(incoming, "b.bib");
        }
        other => panic!("expected MergeAborted, got {:?}", other),
    }
}

#[test]
fn test_ask_keep_both_with_typed_key() {
    let mut base = store("a.bib", vec![article("K1", "One")]);
    let b = store("b.bib", vec![article("K1", "Two")]);
    // Keep both; the first typed key is taken, the second is free.
    let prompter = ScriptedPrompter::choosing(&[2]).typing("K1").typing("K1new");
    let mut decider = PolicyDecider::new(ConflictPolicy::Ask, prompter);

    merge_into(&mut base, &[b], &ExclusionMap::new(), &mut decider, false).unwrap();
    assert_eq!(base.keys(), vec!["K1", "K1new"]);

    let prompter = decider.into_prompter();
    assert!(prompter.shown.iter().any(|s| s.contains("Conflicting key \"K1\"")));
    assert!(prompter.shown.iter().any(|s| s.contains("title = {Two}")));
}

#[test]
fn test_ask_abort_is_user_abort() {
    let mut base = store("a.bib", vec![article("K1", "One")]);
    let b = store("b.bib", vec![article("K1", "Two")]);
    let mut decider = PolicyDecider::new(ConflictPolicy::Ask, ScriptedPrompter::choosing(&[3]));
    let result = merge_into(&mut base, &[b], &ExclusionMap::new(), &mut decider, false);
    assert!(matches!(result, Err(BibError::UserAbort)));
}

#[test]
fn test_interactive_remove_can_rename() {
    let mut base = store("a.bib", vec![article("K1", "One")]);
    let exclusions = ExclusionMap::from_stores(&[store("x.bib", vec![article("K1", "X")])]);
    let prompter = ScriptedPrompter::choosing(&[1]).typing("K1keep");
    let mut decider = PolicyDecider::new(ConflictPolicy::First, prompter);

    let report = merge_into(&mut base, &[], &exclusions, &mut decider, true).unwrap();
    assert_eq!(base.keys(), vec!["K1keep"]);
    assert_eq!(report.renamed, vec![("K1".to_string(), "K1keep".to_string())]);
}

#[test]
fn test_merge_files_writes_output() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.bib");
    let b = dir.path().join("b.bib");
    let x = dir.path().join("x.bib");
    let out = dir.path().join("merged.bib");
    fs::write(&a, "@article{K1, title = {One}}\n@article{K2, title = {Two}}\n").unwrap();
    fs::write(&b, "@article{K3, title = {Three}}\n").unwrap();
    fs::write(&x, "@article{K2, title = {Two}}\n").unwrap();

    let request = MergeRequest {
        bib_files: vec![a, b],
        output: out.clone(),
        exclude_files: vec![x],
        policy: ConflictPolicy::Error,
        interactive_remove: false,
        clobber: Clobber::Refuse,
    };
    let report = merge_files(&request, &RunContext::new(-1), ScriptedPrompter::default()).unwrap().unwrap();
    assert_eq!(report.added, vec!["K3"]);
    assert_eq!(report.removed, vec!["K2"]);

    let merged = Bibliography::load(&out).unwrap();
    assert_eq!(merged.keys(), vec!["K1", "K3"]);
}

#[test]
fn test_merge_files_respects_clobber() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.bib");
    let out = dir.path().join("merged.bib");
    fs::write(&a, "@article{K1, title = {One}}\n").unwrap();
    fs::write(&out, "existing").unwrap();

    let mut request = MergeRequest {
        bib_files: vec![a],
        output: out.clone(),
        exclude_files: Vec::new(),
        policy: ConflictPolicy::First,
        interactive_remove: false,
        clobber: Clobber::Refuse,
    };
    let result = merge_files(&request, &RunContext::new(-1), ScriptedPrompter::default());
    assert!(matches!(result, Err(BibError::OutputExists(_))));

    request.clobber = Clobber::Ask;
    let declined = merge_files(&request, &RunContext::new(-1), ScriptedPrompter::confirming(false)).unwrap();
    assert!(declined.is_none());
    assert_eq!(fs::read_to_string(&out).unwrap(), "existing");

    request.clobber = Clobber::Overwrite;
    merge_files(&request, &RunContext::new(-1), ScriptedPrompter::default()).unwrap();
    assert!(fs::read_to_string(&out).unwrap().contains("@article{K1"));
}
