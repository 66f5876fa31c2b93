use thiserror::Error;

use crate::tid::Tid;

/// Context-level failures surfaced to the thread that observes them.
///
/// Mailbox-level failures never take this shape. A submission to a closed
/// mailbox, or a request the processor refuses, comes back in-band as a
/// [`Response`](crate::Response) with a [`Failed`](crate::Status::Failed) or
/// [`Timeout`](crate::Status::Timeout) status.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// `owner_tid` was called on a thread that was not spawned through this
    /// crate, or whose owner already terminated.
    #[error("calling thread has no owner")]
    TidMissing,
    /// The owner thread terminated and the handler left the notice
    /// unconsumed.
    #[error("owner thread {0} terminated")]
    OwnerTerminated(Tid),
    /// A linked thread terminated and the handler left the notice
    /// unconsumed.
    #[error("linked thread {0} terminated")]
    LinkTerminated(Tid),
}
