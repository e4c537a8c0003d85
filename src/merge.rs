//! Reconcile several bibliographies into one.
//!
//! Auxiliary stores are folded into a base store key by key. Collisions are
//! settled by a [`DecisionProvider`], and keys listed in exclude-stores are
//! dropped from the result once everything has been merged.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use log::{debug, info, warn};

use crate::bib::normalize::make_key_unique;
use crate::bib::{BibEntry, Bibliography};
use crate::config::RunContext;
use crate::error::{BibError, Result};
use crate::prompt::{ask_new_key, Prompter};

/// Keys that must not survive a merge, with the label of the store that listed them.
#[derive(Debug, Clone, Default)]
pub struct ExclusionMap {
    keys: HashMap<String, String>,
}

impl ExclusionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every key of every store; the first store listing a key names it.
    pub fn from_stores(stores: &[Bibliography]) -> Self {
        let mut map = Self::new();
        for store in stores {
            for key in store.keys() {
                map.keys.entry(key).or_insert_with(|| store.label().to_string());
            }
        }
        map
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains_key(key)
    }

    /// Label of the store that excluded `key`.
    pub fn source(&self, key: &str) -> Option<&str> {
        self.keys.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.keys.keys()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// How to settle two different entries under the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ConflictPolicy {
    /// Ask on the terminal.
    Ask,
    /// Keep the entry already in the base store.
    First,
    /// Replace it with the incoming entry.
    Last,
    /// Keep both, giving the incoming entry the next free suffixed key.
    Rename,
    /// Stop the merge.
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    KeepBase,
    KeepIncoming,
    KeepBoth { new_key: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionAction {
    Remove,
    Rename(String),
}

/// Two different entries sharing `key`.
pub struct Conflict<'a> {
    pub key: &'a str,
    pub base: &'a Bibliography,
    pub incoming: &'a Bibliography,
    /// Keys a renamed entry may not take.
    pub taken: &'a HashSet<String>,
}

/// An entry of the merged store whose key is excluded.
pub struct Excluded<'a> {
    pub key: &'a str,
    pub entry: &'a BibEntry,
    pub excluded_by: &'a str,
    pub taken: &'a HashSet<String>,
}

/// Settles conflicts and exclusions during a merge.
///
/// Returning an error stops the merge; nothing is saved.
pub trait DecisionProvider {
    fn on_conflict(&mut self, conflict: &Conflict<'_>) -> Result<Resolution>;
    fn on_excluded(&mut self, excluded: &Excluded<'_>) -> Result<ExclusionAction>;
}

/// Applies a [`ConflictPolicy`], asking `prompter` when the policy is `ask`
/// and for every excluded entry.
pub struct PolicyDecider<P> {
    policy: ConflictPolicy,
    prompter: P,
}

impl<P: Prompter> PolicyDecider<P> {
    pub fn new(policy: ConflictPolicy, prompter: P) -> Self {
        Self { policy, prompter }
    }

    pub fn into_prompter(self) -> P {
        self.prompter
    }

    fn ask_conflict(&mut self, conflict: &Conflict<'_>) -> Result<Resolution> {
        let (key, base, incoming) = (conflict.key, conflict.base, conflict.incoming);
        self.prompter.show(&format!(
            "Conflicting key \"{}\" in {} and {}.",
            key,
            base.label(),
            incoming.label()
        ))?;
        self.prompter
            .show(&format!("Entry in {}:\n{}", base.label(), base.entry_as_string(key)?))?;
        self.prompter.show(&format!(
            "Entry in {}:\n{}",
            incoming.label(),
            incoming.entry_as_string(key)?
        ))?;

        let options = vec![
            format!("Keep entry from {}", base.label()),
            format!("Keep entry from {}", incoming.label()),
            "Keep both, with a new key for the second".to_string(),
            "Abort".to_string(),
        ];
        match self.prompter.choose("What action to take?", &options)? {
            0 => Ok(Resolution::KeepBase),
            1 => Ok(Resolution::KeepIncoming),
            2 => {
                let new_key = ask_new_key(&mut self.prompter, conflict.taken)?;
                Ok(Resolution::KeepBoth { new_key })
            }
            _ => Err(BibError::UserAbort),
        }
    }
}

impl<P: Prompter> DecisionProvider for PolicyDecider<P> {
    fn on_conflict(&mut self, conflict: &Conflict<'_>) -> Result<Resolution> {
        match self.policy {
            ConflictPolicy::First => Ok(Resolution::KeepBase),
            ConflictPolicy::Last => Ok(Resolution::KeepIncoming),
            ConflictPolicy::Rename => {
                let new_key = make_key_unique(conflict.key, |k| conflict.taken.contains(k))?;
                Ok(Resolution::KeepBoth { new_key })
            }
            ConflictPolicy::Error => Err(BibError::MergeAborted {
                key: conflict.key.to_string(),
                base: conflict.base.label().to_string(),
                incoming: conflict.incoming.label().to_string(),
            }),
            ConflictPolicy::Ask => self.ask_conflict(conflict),
        }
    }

    fn on_excluded(&mut self, excluded: &Excluded<'_>) -> Result<ExclusionAction> {
        self.prompter.show(&format!(
            "Entry \"{}\" is listed in {}:\n{}",
            excluded.key,
            excluded.excluded_by,
            crate::bib::entry_to_bibtex(excluded.entry)
        ))?;
        let options = vec!["Remove it".to_string(), "Keep it under a new key".to_string()];
        match self.prompter.choose("What action to take?", &options)? {
            0 => Ok(ExclusionAction::Remove),
            _ => Ok(ExclusionAction::Rename(ask_new_key(
                &mut self.prompter,
                excluded.taken,
            )?)),
        }
    }
}

/// What a merge did to the base store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub added: Vec<String>,
    pub replaced: Vec<String>,
    /// `(old key, new key)` for entries kept under another key.
    pub renamed: Vec<(String, String)>,
    pub removed: Vec<String>,
}

fn taken_keys(base: &Bibliography, aux: &[Bibliography], exclusions: &ExclusionMap) -> HashSet<String> {
    base.keys()
        .into_iter()
        .chain(aux.iter().flat_map(Bibliography::keys))
        .chain(exclusions.keys().cloned())
        .collect()
}

/// Fold `aux` into `base`, then drop the keys in `exclusions`.
///
/// With `interactive_remove`, excluded entries go through
/// [`DecisionProvider::on_excluded`] instead of being removed outright.
pub fn merge_into(
    base: &mut Bibliography,
    aux: &[Bibliography],
    exclusions: &ExclusionMap,
    decider: &mut dyn DecisionProvider,
    interactive_remove: bool,
) -> Result<MergeReport> {
    let mut report = MergeReport::default();

    for incoming in aux {
        debug!("Merging {} into {}", incoming.label(), base.label());
        for entry in incoming.iter() {
            let key = entry.key.as_str();
            if !base.contains_key(key) {
                base.add(entry.clone())?;
                report.added.push(key.to_string());
                continue;
            }
            if base.get(key)? == entry {
                continue;
            }
            if exclusions.contains(key) && !interactive_remove {
                debug!("Conflict on excluded key {}, leaving it for removal", key);
                continue;
            }

            let taken = taken_keys(&*base, std::slice::from_ref(incoming), exclusions);
            let conflict = Conflict {
                key,
                base: &*base,
                incoming,
                taken: &taken,
            };
            match decider.on_conflict(&conflict)? {
                Resolution::KeepBase => {
                    info!("Keeping {} from {}", key, base.label());
                }
                Resolution::KeepIncoming => {
                    info!("Replacing {} with the entry from {}", key, incoming.label());
                    base.replace(key, entry.clone())?;
                    report.replaced.push(key.to_string());
                }
                Resolution::KeepBoth { new_key } => {
                    info!("Adding {} from {} as {}", key, incoming.label(), new_key);
                    let mut renamed = entry.clone();
                    renamed.key = new_key.clone();
                    base.add(renamed)?;
                    report.renamed.push((key.to_string(), new_key));
                }
            }
        }
    }

    remove_excluded(base, aux, exclusions, decider, interactive_remove, &mut report)?;
    Ok(report)
}

fn remove_excluded(
    base: &mut Bibliography,
    aux: &[Bibliography],
    exclusions: &ExclusionMap,
    decider: &mut dyn DecisionProvider,
    interactive_remove: bool,
    report: &mut MergeReport,
) -> Result<()> {
    for key in base.keys() {
        let Some(excluded_by) = exclusions.source(&key) else {
            continue;
        };
        let action = if interactive_remove {
            let taken = taken_keys(&*base, aux, exclusions);
            let excluded = Excluded {
                key: &key,
                entry: base.get(&key)?,
                excluded_by,
                taken: &taken,
            };
            decider.on_excluded(&excluded)?
        } else {
            ExclusionAction::Remove
        };

        match action {
            ExclusionAction::Remove => {
                warn!("Removing entry \"{}\" (listed in {})", key, excluded_by);
                base.remove(&key)?;
                report.removed.push(key);
            }
            ExclusionAction::Rename(new_key) => {
                info!("Keeping excluded entry {} as {}", key, new_key);
                base.rename(&key, &new_key)?;
                report.renamed.push((key, new_key));
            }
        }
    }
    Ok(())
}

/// What to do when the merge output already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Clobber {
    #[default]
    Ask,
    Overwrite,
    Refuse,
}

/// Everything `merge_files` needs besides the prompter.
#[derive(Debug, Clone)]
pub struct MergeRequest {
    pub bib_files: Vec<PathBuf>,
    pub output: PathBuf,
    pub exclude_files: Vec<PathBuf>,
    pub policy: ConflictPolicy,
    pub interactive_remove: bool,
    pub clobber: Clobber,
}

/// Load the stores named in `request`, merge them in order and save the result.
///
/// The first file is the base. Returns `Ok(None)` if the user declined to
/// overwrite an existing output.
pub fn merge_files<P: Prompter>(
    request: &MergeRequest,
    ctx: &RunContext,
    prompter: P,
) -> Result<Option<MergeReport>> {
    let mut decider = PolicyDecider::new(request.policy, prompter);

    if request.output.exists() {
        match request.clobber {
            Clobber::Overwrite => {}
            Clobber::Refuse => return Err(BibError::OutputExists(request.output.clone())),
            Clobber::Ask => {
                let question = format!("{} exists. Overwrite?", request.output.display());
                if !decider.prompter.confirm(&question, false)? {
                    info!("Leaving {} untouched", request.output.display());
                    return Ok(None);
                }
            }
        }
    }

    let mut stores = load_all(&request.bib_files)?;
    if stores.is_empty() {
        return Ok(Some(MergeReport::default()));
    }
    let mut base = stores.remove(0);
    let exclusions = ExclusionMap::from_stores(&load_all(&request.exclude_files)?);

    let report = merge_into(
        &mut base,
        &stores,
        &exclusions,
        &mut decider,
        request.interactive_remove,
    )?;
    base.save(&request.output)?;
    ctx.report(&format!(
        "Merged into {}: {} added, {} replaced, {} renamed, {} removed",
        request.output.display(),
        report.added.len(),
        report.replaced.len(),
        report.renamed.len(),
        report.removed.len()
    ));
    Ok(Some(report))
}

fn load_all(paths: &[PathBuf]) -> Result<Vec<Bibliography>> {
    paths.iter().map(|path| Bibliography::load(path)).collect()
}
