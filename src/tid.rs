use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::mailbox::MessageBox;

/// Handle to a logical thread, identified by its mailbox.
///
/// A `Tid` is cheap to clone and safe to pass between threads. Holding one
/// keeps the peer's mailbox allocation alive so submissions can always be
/// answered with a failure envelope, but it does not keep the peer thread
/// itself running.
///
/// Two `Tid`s are equal when they refer to the same mailbox. The textual
/// form printed by `Display` is derived from the mailbox address; after a
/// thread terminates its textual id may be reused by a later thread.
#[derive(Clone)]
pub struct Tid {
    mbox: Arc<MessageBox>,
}

impl Tid {
    pub(crate) fn fresh() -> Self {
        Tid {
            mbox: Arc::new(MessageBox::new()),
        }
    }

    /// Returns the mailbox this id refers to.
    pub fn mailbox(&self) -> &MessageBox {
        &self.mbox
    }

    /// Returns `true` once the owning thread has terminated and closed the
    /// mailbox.
    pub fn is_closed(&self) -> bool {
        self.mbox.is_closed()
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.mbox) as usize
    }
}

impl PartialEq for Tid {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.mbox, &other.mbox)
    }
}

impl Eq for Tid {}

impl PartialOrd for Tid {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tid {
    fn cmp(&self, other: &Self) -> Ordering {
        self.addr().cmp(&other.addr())
    }
}

impl Hash for Tid {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tid({:#x})", self.addr())
    }
}

impl fmt::Debug for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tid")
            .field("mailbox", &format_args!("{:#x}", self.addr()))
            .field("closed", &self.is_closed())
            .finish()
    }
}
