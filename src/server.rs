use std::thread;
use std::time::Duration;

use log::warn;

use crate::context::this_tid;
use crate::error::Error;
use crate::mailbox::Step;
use crate::message::{Request, Response};
use crate::registry;
use crate::tid::Tid;

/// The processing side of a mailbox.
///
/// One processing step dequeues the next submission and dispatches it to
/// the matching method. Only [`handle`](Handler::handle) has no default:
/// a minimal processor answers requests and accepts the default shutdown
/// acknowledgement.
///
/// The two termination callbacks return whether the notice was consumed.
/// An unconsumed notice escalates out of the processing step as an
/// [`Error`], after the sending side was already woken.
pub trait Handler {
    /// Answers a user request.
    fn handle(&mut self, request: &Request) -> Response;

    /// Acknowledges a shutdown notice. The processing step reports
    /// [`Step::Shutdown`] afterwards, which ends a [`serve`] loop.
    fn on_shutdown(&mut self, _target: &Tid) -> Response {
        Response::success("")
    }

    /// A linked peer terminated. Return `true` to consume the notice.
    fn on_link_dead(&mut self, _peer: &Tid) -> bool {
        false
    }

    /// The owner terminated. Return `true` to consume the notice.
    fn on_owner_terminated(&mut self, _owner: &Tid) -> bool {
        false
    }

    /// A plain value arrived via [`send`](crate::send).
    fn on_value(&mut self, _value: &[u8]) {}

    /// A user error value arrived.
    fn on_error(&mut self, _description: &str) {}
}

/// Settings for a [`serve`] loop.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    idle_wait: Duration,
    name: Option<String>,
}

impl ServeConfig {
    pub fn new() -> Self {
        ServeConfig {
            idle_wait: Duration::from_millis(1),
            name: None,
        }
    }

    /// How long the loop sleeps when the mailbox is empty.
    pub fn with_idle_wait(mut self, idle_wait: Duration) -> Self {
        self.idle_wait = idle_wait;
        self
    }

    /// Registers the serving thread under `name` for the duration of the
    /// loop.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs one processing step on `target`'s mailbox.
///
/// Must be called by the thread owning `target`; see
/// [`MessageBox::process`](crate::MessageBox::process).
pub fn process<H>(target: &Tid, handler: &mut H) -> Result<Step, Error>
where
    H: Handler + ?Sized,
{
    target.mailbox().process(handler)
}

/// Drives the calling thread's mailbox until a shutdown notice is
/// acknowledged, or an unconsumed termination notice escalates.
///
/// If `config` carries a name, it is claimed in the registry before the
/// first step and released when the loop exits.
pub fn serve<H>(handler: &mut H, config: ServeConfig) -> Result<(), Error>
where
    H: Handler + ?Sized,
{
    let tid = this_tid();
    let claimed = match &config.name {
        Some(name) => {
            let claimed = registry::register(name, &tid);
            if !claimed {
                warn!("name '{name}' is already taken, serving unnamed");
            }
            claimed
        }
        None => false,
    };
    let outcome = loop {
        match tid.mailbox().process(handler) {
            Ok(Step::Shutdown) => break Ok(()),
            Ok(Step::Handled) => {}
            Ok(Step::Empty) => thread::sleep(config.idle_wait),
            Err(err) => break Err(err),
        }
    };
    if claimed {
        if let Some(name) = &config.name {
            registry::unregister(name);
        }
    }
    outcome
}
