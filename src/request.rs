use std::time::Instant;

use log::trace;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::message::{Message, Payload, Request, Response};
use crate::serializer::{Bincode, EncodeError, Serializer};
use crate::tid::Tid;

/// Submits `request` to `target` and blocks until its processor answers.
///
/// The request is stamped with the submission time, which is what the
/// processor measures any timeout against. A `query` always comes back as
/// a [`Response`]: a closed mailbox or a drained submission yields a
/// `Failed` one with empty data.
pub fn query(target: &Tid, mut request: Request) -> Response {
    request.request_time = Some(Instant::now());
    let reply = target
        .mailbox()
        .submit(Message::Standard(Payload::Request(request)));
    reply.into_response().unwrap_or_else(|| Response::failed(""))
}

/// Packs `value` with the default [`Bincode`] serializer and submits it to
/// `target` as a plain value message.
///
/// Values carry no response; the call returns once the processor has run
/// its value handler. Pack several values as a tuple.
pub fn send<M>(target: &Tid, value: &M) -> Result<(), EncodeError>
where
    M: Serialize + DeserializeOwned,
{
    send_with::<Bincode, M>(target, value)
}

/// Like [`send`], with an explicit [`Serializer`].
pub fn send_with<S, M>(target: &Tid, value: &M) -> Result<(), EncodeError>
where
    S: Serializer<M>,
{
    let packed = S::encode(value)?;
    let _ack = target
        .mailbox()
        .submit(Message::Standard(Payload::Value(packed)));
    Ok(())
}

/// Asks `target`'s processor to stop its loop.
///
/// Fire-and-forget from the caller's perspective: the call returns once
/// the processor acknowledged (or the mailbox was already closed), and the
/// acknowledgement itself is discarded.
pub fn shutdown(target: &Tid) {
    trace!("requesting shutdown of {target}");
    let _ack = target
        .mailbox()
        .submit(Message::Standard(Payload::Shutdown(target.clone())));
}
