//! Wire envelopes exchanged across a remote boundary.

/// A call that can be proxied across a boundary.
///
/// Implementors are closed enums of supported calls; `Reply` is the payload
/// carried back on success.
pub trait RemoteCall: Send + 'static {
    /// Payload of a successful response.
    type Reply: Send + 'static;

    /// Method name (for logs).
    fn method(&self) -> &'static str;
}

/// Outbound call tagged with its response id.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest<C> {
    /// Fresh id allocated by the sending proxy.
    pub id: u64,
    /// The call itself.
    pub call: C,
}

/// Inbound response correlated by id.
///
/// `result` is `Err` when the responder's handler failed; the message is
/// propagated to the caller as a rejection.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse<R> {
    /// Id of the request being answered.
    pub id: u64,
    /// Handler outcome.
    pub result: Result<R, String>,
}

impl<R> RemoteResponse<R> {
    /// Successful response.
    pub fn ok(id: u64, reply: R) -> Self {
        Self {
            id,
            result: Ok(reply),
        }
    }

    /// Failed response.
    pub fn err(id: u64, reason: impl Into<String>) -> Self {
        Self {
            id,
            result: Err(reason.into()),
        }
    }
}
