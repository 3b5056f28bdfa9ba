use std::io;

/// Tunables for a `Reactor`.
///
/// `Reactor::new` rejects a config that fails `validate`; there are no defaults
/// weaker than the constraints below, so `Config::default()` already passes.
#[derive(Clone, Debug)]
pub struct Config {
    /// Debug label for the loop thread (`std::thread::Builder::name`).
    pub thread_name: String,
    /// Capacity of the `epoll_wait` event-output array, i.e. the maximum number
    /// of ready sockets dispatched per iteration of the loop.
    pub max_selected_events: usize,
    /// Maximum number of datagrams read back by a single `recvmmsg` call, and the
    /// size of the preallocated receive-buffer pool.
    pub max_datagrams_per_batch: usize,
    /// Size, in bytes, of each pooled receive buffer. Must be at least as large
    /// as the largest datagram a registered socket is expected to receive —
    /// anything beyond that is silently truncated by the kernel.
    pub datagram_buffer_len: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            thread_name: "dgram-reactor".to_string(),
            max_selected_events: 64,
            max_datagrams_per_batch: 64,
            datagram_buffer_len: 65_536,
        }
    }
}

impl Config {
    pub(crate) fn validate(&self) -> io::Result<()> {
        if self.thread_name.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "thread_name must not be empty",
            ));
        }
        if self.max_selected_events == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "max_selected_events must be at least 1",
            ));
        }
        if self.max_datagrams_per_batch == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "max_datagrams_per_batch must be at least 1",
            ));
        }
        if self.datagram_buffer_len == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "datagram_buffer_len must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_config_validates() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn empty_thread_name_is_rejected() {
        let config = Config {
            thread_name: String::new(),
            ..Config::default()
        };
        assert_eq!(config.validate().unwrap_err().kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn zero_max_selected_events_is_rejected() {
        let config = Config {
            max_selected_events: 0,
            ..Config::default()
        };
        assert_eq!(config.validate().unwrap_err().kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn zero_max_datagrams_per_batch_is_rejected() {
        let config = Config {
            max_datagrams_per_batch: 0,
            ..Config::default()
        };
        assert_eq!(config.validate().unwrap_err().kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn zero_datagram_buffer_len_is_rejected() {
        let config = Config {
            datagram_buffer_len: 0,
            ..Config::default()
        };
        assert_eq!(config.validate().unwrap_err().kind(), io::ErrorKind::InvalidInput);
    }
}
