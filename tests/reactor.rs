use std::net::UdpSocket;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dgram_reactor::{Config, Control, DatagramReader, Reactor};

/// Installs `env_logger` against `RUST_LOG` so `log::warn!` output from the
/// reactor (e.g. a failed `epoll_ctl`) surfaces when a test is run with logging
/// enabled. `try_init` rather than `init`: every test in this binary calls it,
/// and only the first call may actually install the logger.
fn init_logging() {
    let _ = env_logger::try_init();
}

fn bound_socket() -> UdpSocket {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.set_nonblocking(true).unwrap();
    socket
}

struct CountingReader {
    count: Arc<AtomicUsize>,
    last: Arc<Mutex<Vec<u8>>>,
}

impl DatagramReader for CountingReader {
    fn on_read(&mut self, buf: &[u8]) -> Control {
        self.count.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = buf.to_vec();
        Control::Continue
    }
}

#[test]
fn dispatches_each_datagram_to_the_registered_reader() {
    init_logging();
    let reactor = Reactor::new(Config::default()).unwrap();
    reactor.start().unwrap();

    let socket = bound_socket();
    let addr = socket.local_addr().unwrap();
    let sender = UdpSocket::bind("127.0.0.1:0").unwrap();

    let count = Arc::new(AtomicUsize::new(0));
    let last = Arc::new(Mutex::new(Vec::new()));
    let reader = CountingReader {
        count: count.clone(),
        last: last.clone(),
    };

    let _cancel = reactor.register(&socket, reader).unwrap();

    for _ in 0..5 {
        sender.send_to(b"hello", addr).unwrap();
    }

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while count.load(Ordering::SeqCst) < 5 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(count.load(Ordering::SeqCst), 5);
    assert_eq!(&*last.lock().unwrap(), b"hello");

    reactor.close().unwrap();
}

struct RemoveAfterOne {
    removed: Arc<AtomicUsize>,
}

impl DatagramReader for RemoveAfterOne {
    fn on_read(&mut self, _buf: &[u8]) -> Control {
        Control::Remove
    }

    fn on_remove(&mut self) {
        self.removed.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn reader_can_remove_its_own_registration() {
    init_logging();
    let reactor = Reactor::new(Config::default()).unwrap();
    reactor.start().unwrap();

    let socket = bound_socket();
    let addr = socket.local_addr().unwrap();
    let sender = UdpSocket::bind("127.0.0.1:0").unwrap();

    let removed = Arc::new(AtomicUsize::new(0));
    let reader = RemoveAfterOne {
        removed: removed.clone(),
    };

    let _cancel = reactor.register(&socket, reader).unwrap();

    sender.send_to(b"one", addr).unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while removed.load(Ordering::SeqCst) < 1 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(removed.load(Ordering::SeqCst), 1);

    // A second datagram to the now-unregistered socket should never be dispatched.
    sender.send_to(b"two", addr).unwrap();
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(removed.load(Ordering::SeqCst), 1);

    reactor.close().unwrap();
}

#[test]
fn executed_tasks_run_in_submission_order_across_threads() {
    init_logging();
    let reactor = Arc::new(Reactor::new(Config::default()).unwrap());
    reactor.start().unwrap();

    let (tx, rx) = mpsc::channel();

    let mut threads = Vec::new();
    for i in 0..8 {
        let reactor = reactor.clone();
        let tx = tx.clone();
        threads.push(std::thread::spawn(move || {
            reactor
                .execute(move || {
                    tx.send(i).unwrap();
                })
                .unwrap();
        }));
    }
    for t in threads {
        t.join().unwrap();
    }
    drop(tx);

    let mut seen: Vec<i32> = rx.iter().collect();
    seen.sort();
    assert_eq!(seen, (0..8).collect::<Vec<_>>());

    reactor.close().unwrap();
}

#[test]
fn close_before_start_is_a_harmless_no_op() {
    init_logging();
    let reactor = Reactor::new(Config::default()).unwrap();
    reactor.close().unwrap();
    // Closing twice, or starting after close, should not panic or deadlock.
    reactor.close().unwrap();
}

#[test]
fn close_after_start_runs_on_remove_for_live_registrations() {
    init_logging();
    let reactor = Reactor::new(Config::default()).unwrap();
    reactor.start().unwrap();

    let socket = bound_socket();
    let removed = Arc::new(AtomicUsize::new(0));
    let reader = RemoveAfterOne {
        removed: removed.clone(),
    };

    let _cancel = reactor.register(&socket, reader).unwrap();

    reactor.close().unwrap();

    assert_eq!(removed.load(Ordering::SeqCst), 1);
}

#[test]
fn stale_cancel_does_not_alias_a_reused_slot() {
    init_logging();
    let reactor = Reactor::new(Config::default()).unwrap();
    reactor.start().unwrap();

    let socket_a = bound_socket();
    let addr_a = socket_a.local_addr().unwrap();
    let sender = UdpSocket::bind("127.0.0.1:0").unwrap();

    let removed_a = Arc::new(AtomicUsize::new(0));
    let cancel_a = reactor
        .register(
            &socket_a,
            RemoveAfterOne {
                removed: removed_a.clone(),
            },
        )
        .unwrap();

    sender.send_to(b"one", addr_a).unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while removed_a.load(Ordering::SeqCst) < 1 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(removed_a.load(Ordering::SeqCst), 1);

    // Register a second socket. With an index-keyed `Cancel`, this could reuse
    // socket_a's now-freed slab slot.
    let socket_b = bound_socket();
    let removed_b = Arc::new(AtomicUsize::new(0));
    let _cancel_b = reactor
        .register(
            &socket_b,
            RemoveAfterOne {
                removed: removed_b.clone(),
            },
        )
        .unwrap();

    // A stale cancel on the already-removed registration must be a no-op, not
    // an accidental unregistration of socket_b's live one.
    cancel_a.cancel().unwrap();
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(removed_a.load(Ordering::SeqCst), 1);
    assert_eq!(removed_b.load(Ordering::SeqCst), 0);

    reactor.close().unwrap();
}

#[test]
fn register_from_inside_a_task_does_not_deadlock() {
    init_logging();
    let reactor = Arc::new(Reactor::new(Config::default()).unwrap());
    reactor.start().unwrap();

    let socket = bound_socket();
    let registered = Arc::new(AtomicUsize::new(0));
    let registered_in_task = registered.clone();
    let reactor_in_task = reactor.clone();

    reactor
        .execute(move || {
            let reader = CountingReader {
                count: Arc::new(AtomicUsize::new(0)),
                last: Arc::new(Mutex::new(Vec::new())),
            };
            // Registering from the loop thread itself must return rather than
            // wait for a task that only the loop thread could ever run.
            let _cancel = reactor_in_task.register(&socket, reader).unwrap();
            registered_in_task.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while registered.load(Ordering::SeqCst) < 1 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(registered.load(Ordering::SeqCst), 1);

    reactor.close().unwrap();
}
