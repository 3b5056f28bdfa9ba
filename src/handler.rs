/// What a reader or the wake-up slot wants to happen to its registration after
/// being dispatched.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Control {
    /// Leave the registration in place.
    Continue,
    /// Unregister the socket before the next event in this batch is processed.
    Remove,
}

/// A user-supplied handler for datagrams received on a registered socket.
///
/// `on_read` is called once per received datagram, in kernel-reported order, with
/// the buffer readable for the duration of the call only — the reactor reuses the
/// underlying storage on the very next `recvmmsg`. `on_remove` is called exactly
/// once per successful `register`, after the socket has been deregistered, whether
/// that happened via the returned cancellation capability, the reader itself
/// returning `Control::Remove`, or reactor shutdown.
pub trait DatagramReader: Send {
    fn on_read(&mut self, buf: &[u8]) -> Control;

    fn on_remove(&mut self) {}
}
