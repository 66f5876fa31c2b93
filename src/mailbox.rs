use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;

use log::{debug, warn};

use crate::context::{self, LinkNotice};
use crate::error::Error;
use crate::message::{Message, Payload, Response};
use crate::server::Handler;
use crate::tid::Tid;

/// The mailbox of a logical thread.
///
/// Each thread spawned through this crate gets one dedicated mailbox,
/// reachable through its [`Tid`]. Submissions from other threads queue up
/// here until the owning thread's processor answers them one by one.
///
/// ## Ordering
///
/// Within one mailbox, submissions are served strictly in the order they
/// were enqueued. Nothing is guaranteed across distinct mailboxes.
///
/// ## Closing
///
/// A mailbox closes exactly once, when its owning thread terminates. The
/// transition is one-way: every queued sender is drained and woken with a
/// [`Failed`](crate::Status::Failed) envelope, and later submissions are
/// refused with the same envelope without being enqueued.
pub struct MessageBox {
    chest: Mutex<Chest>,
}

struct Chest {
    closed: bool,
    queue: VecDeque<PendingSend>,
}

/// A queued sender: the submitted message, the slot the processor answers
/// into, and the handle used to wake the sender afterwards.
struct PendingSend {
    req: Message,
    slot: Arc<ReplySlot>,
    wake: WakeHandle,
}

enum WakeHandle {
    /// The sender blocks on its slot's condvar; fulfilling the slot is the
    /// wakeup.
    Blocking,
    /// A cooperative caller parked a task and polls its [`ReplyHandle`];
    /// the callback tells its scheduler to resume the task.
    Callback(Box<dyn FnOnce() + Send>),
    /// Nobody waits for the answer.
    Detached,
}

impl WakeHandle {
    fn wake(self) {
        match self {
            WakeHandle::Blocking | WakeHandle::Detached => {}
            WakeHandle::Callback(resume) => resume(),
        }
    }
}

/// One-shot result slot shared between a sender and the processor.
struct ReplySlot {
    state: Mutex<SlotState>,
    cond: Condvar,
}

struct SlotState {
    done: bool,
    reply: Option<Message>,
}

impl ReplySlot {
    fn new() -> Self {
        ReplySlot {
            state: Mutex::new(SlotState {
                done: false,
                reply: None,
            }),
            cond: Condvar::new(),
        }
    }

    /// Writes the answer. `None` marks a drained submission; the sender
    /// turns it into a failure envelope.
    fn fulfill(&self, reply: Option<Message>) {
        let mut state = self.state.lock().expect("reply slot lock poisoned");
        state.reply = reply;
        state.done = true;
        self.cond.notify_all();
    }

    fn wait_take(&self) -> Option<Message> {
        let state = self.state.lock().expect("reply slot lock poisoned");
        let mut state = self
            .cond
            .wait_while(state, |state| !state.done)
            .expect("reply slot lock poisoned");
        state.reply.take()
    }

    fn ready(&self) -> bool {
        self.state.lock().expect("reply slot lock poisoned").done
    }
}

/// The sender side of a cooperative submission, returned by
/// [`MessageBox::submit_with_wake`].
///
/// The processor's answer can be collected exactly once, either by blocking
/// on [`wait`](ReplyHandle::wait) or by polling
/// [`try_wait`](ReplyHandle::try_wait) after the wake callback fired.
pub struct ReplyHandle {
    slot: Arc<ReplySlot>,
}

impl ReplyHandle {
    /// Whether the processor already answered.
    pub fn ready(&self) -> bool {
        self.slot.ready()
    }

    /// Blocks until the answer is in and takes it.
    pub fn wait(self) -> Message {
        self.slot
            .wait_take()
            .unwrap_or_else(Message::failure_envelope)
    }

    /// Takes the answer if it is already in, or hands the handle back.
    pub fn try_wait(self) -> Result<Message, ReplyHandle> {
        if self.slot.ready() {
            Ok(self.wait())
        } else {
            Err(self)
        }
    }
}

/// What one processing step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The mailbox was empty (or already closed); nothing was dequeued.
    Empty,
    /// One submission was answered.
    Handled,
    /// A shutdown notice was acknowledged; the processing loop should
    /// exit.
    Shutdown,
}

impl MessageBox {
    pub(crate) fn new() -> Self {
        MessageBox {
            chest: Mutex::new(Chest {
                closed: false,
                queue: VecDeque::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Chest> {
        self.chest.lock().expect("mailbox lock poisoned")
    }

    /// Submits a message and blocks until the owning thread's processor
    /// answers it.
    ///
    /// On a closed mailbox this returns a `Failed` envelope immediately,
    /// without enqueuing anything.
    pub fn submit(&self, msg: Message) -> Message {
        let slot = {
            let mut chest = self.lock();
            if chest.closed {
                return Message::failure_envelope();
            }
            let slot = Arc::new(ReplySlot::new());
            chest.queue.push_back(PendingSend {
                req: msg,
                slot: Arc::clone(&slot),
                wake: WakeHandle::Blocking,
            });
            slot
        };
        slot.wait_take().unwrap_or_else(Message::failure_envelope)
    }

    /// Submits a message without blocking the calling thread.
    ///
    /// This is the seam for cooperative schedulers: the caller parks its
    /// task, the processor invokes `wake` after writing the answer, and the
    /// resumed task collects it from the returned [`ReplyHandle`].
    ///
    /// On a closed mailbox the handle is ready immediately with a `Failed`
    /// envelope and `wake` is never invoked.
    pub fn submit_with_wake(
        &self,
        msg: Message,
        wake: impl FnOnce() + Send + 'static,
    ) -> ReplyHandle {
        let slot = Arc::new(ReplySlot::new());
        let refused = {
            let mut chest = self.lock();
            if chest.closed {
                true
            } else {
                chest.queue.push_back(PendingSend {
                    req: msg,
                    slot: Arc::clone(&slot),
                    wake: WakeHandle::Callback(Box::new(wake)),
                });
                false
            }
        };
        if refused {
            slot.fulfill(None);
        }
        ReplyHandle { slot }
    }

    /// Fire-and-forget enqueue, used for termination notices. Delivery to
    /// a closed mailbox is silently dropped.
    pub(crate) fn submit_detached(&self, msg: Message) {
        let mut chest = self.lock();
        if chest.closed {
            debug!("dropping notice for a closed mailbox");
            return;
        }
        chest.queue.push_back(PendingSend {
            req: msg,
            slot: Arc::new(ReplySlot::new()),
            wake: WakeHandle::Detached,
        });
    }

    /// Runs one processing step on behalf of the owning thread.
    ///
    /// Dequeues the next submission, interprets control messages, hands
    /// user traffic to `handler`, writes the answer into the sender's slot
    /// and wakes the sender. The handler runs outside the queue lock.
    ///
    /// Termination notices the handler refuses to consume come back as
    /// [`Error::OwnerTerminated`] / [`Error::LinkTerminated`], after the
    /// sender was woken.
    ///
    /// Must only be called from the thread owning this mailbox; link
    /// bookkeeping is applied to the calling thread's context.
    pub fn process<H>(&self, handler: &mut H) -> Result<Step, Error>
    where
        H: Handler + ?Sized,
    {
        let PendingSend { req, slot, wake } = {
            let mut chest = self.lock();
            if chest.closed {
                return Ok(Step::Empty);
            }
            match chest.queue.pop_front() {
                Some(pending) => pending,
                None => return Ok(Step::Empty),
            }
        };
        match req {
            Message::LinkDead(peer) => {
                slot.fulfill(None);
                wake.wake();
                match context::note_link_dead(&peer) {
                    LinkNotice::Owner => {
                        if handler.on_owner_terminated(&peer) {
                            Ok(Step::Handled)
                        } else {
                            Err(Error::OwnerTerminated(peer))
                        }
                    }
                    LinkNotice::Link => {
                        if handler.on_link_dead(&peer) {
                            Ok(Step::Handled)
                        } else {
                            Err(Error::LinkTerminated(peer))
                        }
                    }
                    LinkNotice::Stale => {
                        debug!("ignoring termination notice from unrelated thread {peer}");
                        Ok(Step::Handled)
                    }
                }
            }
            Message::Shutdown(target) => {
                // Only standard-wrapped shutdown notices stop a processor.
                debug!("ignoring control-typed shutdown for {target}");
                slot.fulfill(None);
                wake.wake();
                Ok(Step::Handled)
            }
            Message::Standard(payload) => {
                let step = match payload {
                    Payload::Request(request) => {
                        if request.expired() {
                            debug!("request '{}' expired before processing", request.method());
                            let timeout = Response::timeout(format!(
                                "request '{}' timed out",
                                request.method()
                            ));
                            slot.fulfill(Some(Message::Standard(Payload::Response(timeout))));
                        } else {
                            if !request.delay().is_zero() {
                                thread::sleep(request.delay());
                            }
                            let response = handler.handle(&request);
                            slot.fulfill(Some(Message::Standard(Payload::Response(response))));
                        }
                        Step::Handled
                    }
                    Payload::Shutdown(target) => {
                        let ack = handler.on_shutdown(&target);
                        slot.fulfill(Some(Message::Standard(Payload::Response(ack))));
                        Step::Shutdown
                    }
                    Payload::Error(description) => {
                        handler.on_error(&description);
                        slot.fulfill(Some(Message::Standard(Payload::Response(
                            Response::success(""),
                        ))));
                        Step::Handled
                    }
                    Payload::Value(value) => {
                        handler.on_value(&value);
                        slot.fulfill(Some(Message::Standard(Payload::Response(
                            Response::success(""),
                        ))));
                        Step::Handled
                    }
                    Payload::Response(_) => {
                        // Responses only travel inside reply envelopes.
                        warn!("discarding a response submitted as a request");
                        slot.fulfill(None);
                        Step::Handled
                    }
                };
                wake.wake();
                Ok(step)
            }
        }
    }

    /// Closes the mailbox and drains the queue in FIFO order, waking every
    /// queued sender with its slot unwritten.
    ///
    /// Termination notices still in the queue are returned so the caller
    /// can settle its link bookkeeping before notifying peers.
    pub(crate) fn close(&self) -> Vec<Tid> {
        let drained = {
            let mut chest = self.lock();
            chest.closed = true;
            std::mem::take(&mut chest.queue)
        };
        let mut dead_peers = Vec::new();
        for PendingSend { req, slot, wake } in drained {
            if let Message::LinkDead(peer) = req {
                dead_peers.push(peer);
            }
            slot.fulfill(None);
            wake.wake();
        }
        dead_peers
    }

    /// Snapshot of the closed flag.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    #[cfg(test)]
    fn queued(&self) -> usize {
        self.lock().queue.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use super::{MessageBox, Step};
    use crate::message::{Message, Payload, Request, Response, Status};
    use crate::server::Handler;

    struct Recorder {
        methods: Vec<String>,
    }

    impl Handler for Recorder {
        fn handle(&mut self, request: &Request) -> Response {
            self.methods.push(request.method().to_string());
            Response::success(request.args().to_vec())
        }
    }

    fn request(method: &str, args: &str) -> Message {
        Message::Standard(Payload::Request(Request::new(method, args)))
    }

    #[test]
    fn closed_mailbox_refuses_without_enqueuing() {
        let mbox = MessageBox::new();
        mbox.close();
        let reply = mbox.submit(request("echo", "x"));
        let response = reply.into_response().unwrap();
        assert_eq!(response.status(), Status::Failed);
        assert!(response.data().is_empty());
        assert_eq!(mbox.queued(), 0);
    }

    #[test]
    fn submissions_are_served_in_fifo_order() {
        let mbox = MessageBox::new();
        let woke_a = Arc::new(AtomicBool::new(false));
        let woke_b = Arc::new(AtomicBool::new(false));
        let wa = Arc::clone(&woke_a);
        let wb = Arc::clone(&woke_b);
        let a = mbox.submit_with_wake(request("a", "1"), move || wa.store(true, Ordering::SeqCst));
        let b = mbox.submit_with_wake(request("b", "2"), move || wb.store(true, Ordering::SeqCst));

        let mut recorder = Recorder {
            methods: Vec::new(),
        };
        assert_eq!(mbox.process(&mut recorder).unwrap(), Step::Handled);
        assert!(woke_a.load(Ordering::SeqCst));
        assert!(!woke_b.load(Ordering::SeqCst));
        assert_eq!(mbox.process(&mut recorder).unwrap(), Step::Handled);
        assert_eq!(mbox.process(&mut recorder).unwrap(), Step::Empty);

        assert_eq!(recorder.methods, vec!["a", "b"]);
        assert_eq!(a.wait().into_response().unwrap().text(), "1");
        assert_eq!(b.wait().into_response().unwrap().text(), "2");
    }

    #[test]
    fn close_wakes_every_drained_sender() {
        let mbox = Arc::new(MessageBox::new());
        let senders: Vec<_> = (0..4)
            .map(|i| {
                let mbox = Arc::clone(&mbox);
                thread::spawn(move || {
                    mbox.submit(request("pending", &i.to_string()))
                        .into_response()
                        .unwrap()
                        .status()
                })
            })
            .collect();
        while mbox.queued() < 4 {
            thread::sleep(Duration::from_millis(1));
        }
        mbox.close();
        for sender in senders {
            assert_eq!(sender.join().unwrap(), Status::Failed);
        }
    }

    #[test]
    fn expired_requests_are_answered_without_the_handler() {
        let mbox = MessageBox::new();
        let mut late = Request::new("slow", "").with_timeout(Duration::from_millis(1));
        late.request_time = Some(Instant::now());
        thread::sleep(Duration::from_millis(5));
        let handle = mbox.submit_with_wake(Message::Standard(Payload::Request(late)), || {});

        let mut recorder = Recorder {
            methods: Vec::new(),
        };
        assert_eq!(mbox.process(&mut recorder).unwrap(), Step::Handled);
        assert!(recorder.methods.is_empty());
        let response = handle.wait().into_response().unwrap();
        assert_eq!(response.status(), Status::Timeout);
        assert_eq!(response.text(), "request 'slow' timed out");
    }

    #[test]
    fn submitted_responses_are_refused() {
        let mbox = MessageBox::new();
        let handle = mbox.submit_with_wake(
            Message::Standard(Payload::Response(Response::success("stray"))),
            || {},
        );
        let mut recorder = Recorder {
            methods: Vec::new(),
        };
        assert_eq!(mbox.process(&mut recorder).unwrap(), Step::Handled);
        assert!(recorder.methods.is_empty());
        let response = handle.wait().into_response().unwrap();
        assert_eq!(response.status(), Status::Failed);
    }

    #[test]
    fn control_typed_shutdown_is_ignored() {
        let mbox = MessageBox::new();
        let target = crate::this_tid();
        let handle = mbox.submit_with_wake(Message::Shutdown(target), || {});
        let mut recorder = Recorder {
            methods: Vec::new(),
        };
        assert_eq!(mbox.process(&mut recorder).unwrap(), Step::Handled);
        // The sender is woken with a failure envelope, not an ack.
        let response = handle.wait().into_response().unwrap();
        assert_eq!(response.status(), Status::Failed);
    }
}
