/*!
In-process request/response messaging between threads over per-thread
mailboxes.

# Main concepts

The main abstraction in this crate is a logical thread that owns a
[`Mailbox`](MessageBox) and is addressed through an opaque [`Tid`]. Any
interface implemented by one thread becomes a call-able API from other
threads: a caller submits a [`Request`] naming a method and carrying
opaque serialized arguments, the callee's [`Handler`] interprets it and
emits a [`Response`], and the caller receives that response as the return
value of the submission.

* **[`spawn`]** starts a new linked thread with a fresh mailbox.
* **[`query`]** submits a request and blocks until the processor answers.
* **[`send`]** submits a plain value, packed by a
  [`Serializer`](serializer::Serializer).
* **[`serve`]** drives a thread's mailbox until a [`shutdown`] notice is
  acknowledged.
* **[`register`]** / **[`locate`]** map human-readable names to ids so
  threads can find each other without sharing handles.

Failures stay in-band: a submission to a terminated thread comes back as
a `Failed` [`Response`], never as a panic or an error type.

### Linking

`spawn` records the new thread as a link of the caller and the caller as
the new thread's owner. When a thread terminates — by returning or by
unwinding — every linked peer and the owner receive a termination notice
in their mailbox. The processor turns it into a
[`Handler::on_link_dead`] or [`Handler::on_owner_terminated`] callback;
notices the handler refuses to consume escalate as an [`Error`].

### Cooperative callers

A caller running inside a task scheduler can avoid blocking an OS thread:
[`MessageBox::submit_with_wake`] enqueues the submission together with a
wake callback and returns a [`ReplyHandle`] the parked task collects the
answer from. The scheduler itself is out of scope here; only the seam is
provided.

# Example

```
use localrpc::{query, serve, shutdown, spawn, Handler, Request, Response, ServeConfig};

struct Pow;

impl Handler for Pow {
    fn handle(&mut self, request: &Request) -> Response {
        let base: u64 = String::from_utf8_lossy(request.args()).parse().unwrap();
        Response::success((base * base).to_string())
    }
}

let worker = spawn((), |_| {
    serve(&mut Pow, ServeConfig::default()).unwrap();
});

let response = query(&worker, Request::new("pow", "7"));
assert_eq!(response.text(), "49");
shutdown(&worker);
```
*/

mod context;
mod error;
mod mailbox;
mod message;
mod registry;
mod request;
mod server;
pub mod serializer;
mod tid;

pub use context::{links, owner_tid, spawn, this_tid};
pub use error::Error;
pub use mailbox::{MessageBox, ReplyHandle, Step};
pub use message::{Message, Payload, Request, Response, Status};
pub use registry::{locate, names, register, unregister};
pub use request::{query, send, send_with, shutdown};
pub use server::{process, serve, Handler, ServeConfig};
pub use tid::Tid;
