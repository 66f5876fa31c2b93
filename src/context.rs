use std::cell::RefCell;
use std::collections::BTreeSet;
use std::thread;

use log::trace;

use crate::error::Error;
use crate::message::Message;
use crate::registry;
use crate::tid::Tid;

thread_local! {
    static CONTEXT: RefCell<ThreadContext> = RefCell::new(ThreadContext::empty());
}

/// Per-thread identity: own id, owning thread and linked peers.
///
/// Created lazily on first self-reference or by `spawn`. Dropping it (the
/// thread's own termination hook, including unwinding) runs the cleanup
/// protocol: close the mailbox, notify peers, release registered names.
struct ThreadContext {
    ident: Option<Tid>,
    owner: Option<Tid>,
    links: BTreeSet<Tid>,
}

/// How a termination notice relates to the thread that dequeued it.
pub(crate) enum LinkNotice {
    Owner,
    Link,
    Stale,
}

impl ThreadContext {
    fn empty() -> Self {
        ThreadContext {
            ident: None,
            owner: None,
            links: BTreeSet::new(),
        }
    }

    fn cleanup(&mut self) {
        let Some(ident) = self.ident.take() else {
            return;
        };
        // Settle notices still queued in our own mailbox before fanning
        // out, so a peer that already terminated is not notified back.
        let drained = ident.mailbox().close();
        for peer in &drained {
            if self.owner.as_ref() == Some(peer) {
                self.owner = None;
            }
            self.links.remove(peer);
        }
        trace!("{ident} terminating, notifying {} links", self.links.len());
        let owner = self.owner.take();
        for peer in &self.links {
            if owner.as_ref() == Some(peer) {
                continue;
            }
            peer.mailbox().submit_detached(Message::LinkDead(ident.clone()));
        }
        if let Some(owner) = owner {
            owner.mailbox().submit_detached(Message::LinkDead(ident.clone()));
        }
        self.links.clear();
        registry::unregister_all(&ident);
    }
}

impl Drop for ThreadContext {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Returns the calling thread's id, allocating its mailbox on first use.
pub fn this_tid() -> Tid {
    CONTEXT.with(|ctx| {
        let mut ctx = ctx.borrow_mut();
        ctx.ident.get_or_insert_with(Tid::fresh).clone()
    })
}

/// Returns the id of the thread that spawned the calling thread.
///
/// Fails with [`Error::TidMissing`] on threads that were not spawned
/// through this crate, or whose owner already terminated.
pub fn owner_tid() -> Result<Tid, Error> {
    CONTEXT.with(|ctx| ctx.borrow().owner.clone().ok_or(Error::TidMissing))
}

/// Snapshot of the calling thread's linked peers.
pub fn links() -> Vec<Tid> {
    CONTEXT.with(|ctx| ctx.borrow().links.iter().cloned().collect())
}

/// Applies a dequeued termination notice to the calling thread's context.
pub(crate) fn note_link_dead(peer: &Tid) -> LinkNotice {
    CONTEXT.with(|ctx| {
        let mut ctx = ctx.borrow_mut();
        if ctx.owner.as_ref() == Some(peer) {
            ctx.owner = None;
            ctx.links.remove(peer);
            LinkNotice::Owner
        } else if ctx.links.remove(peer) {
            LinkNotice::Link
        } else {
            LinkNotice::Stale
        }
    })
}

/// Spawns a new linked thread and returns its id.
///
/// The new thread gets a fresh mailbox, records the caller as its owner,
/// and the caller records it as a link. On termination (return or panic)
/// each side delivers a termination notice to the other.
///
/// `capture` is moved into the new thread; the `Send` bound keeps
/// references to the caller's unshared state out of the argument pack.
pub fn spawn<C, F>(capture: C, entry: F) -> Tid
where
    C: Send + 'static,
    F: FnOnce(C) + Send + 'static,
{
    let child = Tid::fresh();
    let owner = this_tid();
    CONTEXT.with(|ctx| ctx.borrow_mut().links.insert(child.clone()));
    trace!("spawning {child} owned by {owner}");

    let ident = child.clone();
    let result = thread::Builder::new()
        .name(format!("localrpc-{child}"))
        .spawn(move || {
            CONTEXT.with(|ctx| {
                let mut ctx = ctx.borrow_mut();
                ctx.ident = Some(ident);
                ctx.owner = Some(owner);
            });
            entry(capture);
        });
    match result {
        Ok(_detached) => child,
        Err(err) => panic!("failed to spawn a thread: {err}"),
    }
}
