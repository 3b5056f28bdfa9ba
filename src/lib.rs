//! A single-threaded, `epoll`-backed reactor for batched UDP datagram reception.
//!
//! A [`Reactor`] owns one `epoll` instance and a dedicated loop thread. Sockets
//! are registered with a user-supplied [`DatagramReader`]; the loop thread drains
//! readiness events with `epoll_wait`, pulls datagrams off each ready socket in a
//! single `recvmmsg` batch, and dispatches them to the matching reader in kernel-
//! reported order. Foreign threads interact with a running reactor only through
//! [`Reactor::execute`] (run an arbitrary closure on the loop thread) and
//! [`Reactor::register`]/[`Cancel::cancel`] (add or remove a socket); all mutable
//! reactor state — the slot table, the fd registry, the epoll instance itself — is
//! touched exclusively by the loop thread.

mod config;
mod driver;
mod handler;
mod inner;
mod reactor;
mod slot;
mod socket;
mod submission;
mod sys;

pub use config::Config;
pub use handler::{Control, DatagramReader};
pub use reactor::{Cancel, Reactor};
pub use socket::SocketHandle;
