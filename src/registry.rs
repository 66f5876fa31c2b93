use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, OnceLock};

use log::trace;

use crate::tid::Tid;

/// Process-wide map from human-readable names to thread ids, with the
/// inverse map used for de-registration on thread termination.
///
/// Every name maps to at most one mailbox; one mailbox can hold several
/// names. All operations are serialized behind one mutex, so a successful
/// `register` happens-before any later `locate` observing it.
struct Registry {
    by_name: HashMap<String, Tid>,
    by_tid: HashMap<Tid, BTreeSet<String>>,
}

static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();

fn registry() -> MutexGuard<'static, Registry> {
    REGISTRY
        .get_or_init(|| {
            Mutex::new(Registry {
                by_name: HashMap::new(),
                by_tid: HashMap::new(),
            })
        })
        .lock()
        .expect("registry lock poisoned")
}

/// Claims `name` for `tid`.
///
/// Returns `false` if the name is already taken or the mailbox is closed.
pub fn register(name: &str, tid: &Tid) -> bool {
    let mut reg = registry();
    if reg.by_name.contains_key(name) || tid.is_closed() {
        return false;
    }
    reg.by_name.insert(name.to_owned(), tid.clone());
    reg.by_tid
        .entry(tid.clone())
        .or_default()
        .insert(name.to_owned());
    trace!("registered '{name}' for {tid}");
    true
}

/// Releases `name`. Returns whether anything was removed.
pub fn unregister(name: &str) -> bool {
    let mut reg = registry();
    let Some(tid) = reg.by_name.remove(name) else {
        return false;
    };
    if let Some(names) = reg.by_tid.get_mut(&tid) {
        names.remove(name);
        if names.is_empty() {
            reg.by_tid.remove(&tid);
        }
    }
    trace!("unregistered '{name}'");
    true
}

/// Looks up the thread currently registered under `name`.
pub fn locate(name: &str) -> Option<Tid> {
    registry().by_name.get(name).cloned()
}

/// Lists the names currently claimed by `tid`.
pub fn names(tid: &Tid) -> Vec<String> {
    registry()
        .by_tid
        .get(tid)
        .map(|names| names.iter().cloned().collect())
        .unwrap_or_default()
}

/// Releases every name claimed by `tid`. Called from thread cleanup.
pub(crate) fn unregister_all(tid: &Tid) {
    let mut reg = registry();
    let Some(names) = reg.by_tid.remove(tid) else {
        return;
    };
    trace!("releasing {} names held by {tid}", names.len());
    for name in names {
        reg.by_name.remove(&name);
    }
}
