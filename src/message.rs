use std::borrow::Cow;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::context;
use crate::tid::Tid;

/// Everything that travels through a mailbox.
///
/// `Standard` messages carry user traffic. The other variants are control
/// messages, interpreted by the processor itself before any handler runs.
#[derive(Debug, Clone)]
pub enum Message {
    /// User traffic, dispatched to the processing handler.
    Standard(Payload),
    /// The named thread terminated. Emitted by its cleanup towards every
    /// linked peer and the owner.
    LinkDead(Tid),
    /// Control-typed shutdown. Reserved on the wire; the processor ignores
    /// it. The shutdown path that actually stops a processor is
    /// [`Payload::Shutdown`] travelling as a `Standard` message.
    Shutdown(Tid),
}

impl Message {
    /// The envelope a sender observes when its submission was refused or
    /// drained without an answer.
    pub(crate) fn failure_envelope() -> Message {
        Message::Standard(Payload::Response(Response::failed("")))
    }

    /// Extracts the response carried by a `Standard` message, if any.
    pub fn into_response(self) -> Option<Response> {
        match self {
            Message::Standard(Payload::Response(response)) => Some(response),
            _ => None,
        }
    }
}

/// The user-level payload of a [`Message::Standard`].
#[derive(Debug, Clone)]
pub enum Payload {
    /// A method call awaiting a [`Response`].
    Request(Request),
    /// The answer to a request.
    Response(Response),
    /// Asks the receiving processor to stop its loop and acknowledge.
    Shutdown(Tid),
    /// A user error value.
    Error(String),
    /// An opaque user value, packed by a
    /// [`Serializer`](crate::serializer::Serializer).
    Value(Vec<u8>),
}

/// A method call submitted to another thread's mailbox.
///
/// `args` is an opaque blob; both sides must agree on the encoding. The
/// core never looks inside it.
#[derive(Debug, Clone)]
pub struct Request {
    sender: Tid,
    method: String,
    args: Vec<u8>,
    pub(crate) request_time: Option<Instant>,
    delay: Duration,
    timeout: Duration,
}

impl Request {
    /// Creates a request originating from the calling thread.
    pub fn new(method: impl Into<String>, args: impl Into<Vec<u8>>) -> Self {
        Request {
            sender: context::this_tid(),
            method: method.into(),
            args: args.into(),
            request_time: None,
            delay: Duration::ZERO,
            timeout: Duration::ZERO,
        }
    }

    /// Sets the deadline the processor enforces, measured from submission.
    ///
    /// A zero timeout (the default) means the request never expires.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets an artificial processing latency. The processor sleeps for
    /// this long before invoking the handler, which lets tests exercise
    /// deadline behaviour deterministically.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// The thread that submitted this request.
    pub fn sender(&self) -> &Tid {
        &self.sender
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn args(&self) -> &[u8] {
        &self.args
    }

    pub(crate) fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether the deadline passed. Unstamped requests never expire.
    pub(crate) fn expired(&self) -> bool {
        !self.timeout.is_zero()
            && self
                .request_time
                .map_or(false, |start| start.elapsed() > self.timeout)
    }
}

/// Outcome of a request.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The mailbox was closed, the submission was drained, or the handler
    /// reported a failure.
    Failed,
    /// The processor found the request past its deadline.
    Timeout,
    Success,
}

/// The answer a processor writes into the sender's result slot.
///
/// On `Success`, `data` holds the serialized return value. Otherwise it
/// holds a human-readable description of the failure, possibly empty.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: Status,
    data: Vec<u8>,
}

impl Response {
    pub fn success(data: impl Into<Vec<u8>>) -> Self {
        Response {
            status: Status::Success,
            data: data.into(),
        }
    }

    pub fn failed(description: impl Into<Vec<u8>>) -> Self {
        Response {
            status: Status::Failed,
            data: description.into(),
        }
    }

    pub fn timeout(description: impl Into<Vec<u8>>) -> Self {
        Response {
            status: Status::Timeout,
            data: description.into(),
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The payload as text. Lossy for non-UTF-8 data.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}
