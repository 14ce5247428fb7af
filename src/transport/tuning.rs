//! Socket tuning: keep-alive cadence and fast-open
//!
//! Every option is a separate `setsockopt` call and its outcome is recorded.
//! A kernel that lacks one of these knobs leaves the socket on default TCP
//! timeouts; it never stops the connection attempt.

use std::fmt;
use std::io;
use std::os::fd::AsRawFd;
use std::time::Duration;

use socket2::Socket;

use crate::config::RetryPolicy;

/// Fixed `TCP_USER_TIMEOUT` value (the kernel takes milliseconds)
pub const USER_TIMEOUT: Duration = Duration::from_millis(5);

/// Socket options touched by [`configure`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketOption {
    KeepAlive,
    UserTimeout,
    KeepAliveCount,
    KeepAliveIdle,
    KeepAliveInterval,
    FastOpen,
}

impl SocketOption {
    pub fn name(&self) -> &'static str {
        match self {
            SocketOption::KeepAlive => "SO_KEEPALIVE",
            SocketOption::UserTimeout => "TCP_USER_TIMEOUT",
            SocketOption::KeepAliveCount => "TCP_KEEPCNT",
            SocketOption::KeepAliveIdle => "TCP_KEEPIDLE",
            SocketOption::KeepAliveInterval => "TCP_KEEPINTVL",
            SocketOption::FastOpen => "TCP_FASTOPEN",
        }
    }

    /// `(level, optname)` for setsockopt, if this platform has the option
    fn sockopt(&self) -> Option<(libc::c_int, libc::c_int)> {
        match self {
            SocketOption::KeepAlive => Some((libc::SOL_SOCKET, libc::SO_KEEPALIVE)),
            #[cfg(any(target_os = "linux", target_os = "android"))]
            SocketOption::UserTimeout => Some((libc::IPPROTO_TCP, libc::TCP_USER_TIMEOUT)),
            #[cfg(any(target_os = "linux", target_os = "android"))]
            SocketOption::KeepAliveCount => Some((libc::IPPROTO_TCP, libc::TCP_KEEPCNT)),
            #[cfg(any(target_os = "linux", target_os = "android"))]
            SocketOption::KeepAliveIdle => Some((libc::IPPROTO_TCP, libc::TCP_KEEPIDLE)),
            #[cfg(any(target_os = "linux", target_os = "android"))]
            SocketOption::KeepAliveInterval => Some((libc::IPPROTO_TCP, libc::TCP_KEEPINTVL)),
            #[cfg(any(target_os = "linux", target_os = "android"))]
            SocketOption::FastOpen => Some((libc::IPPROTO_TCP, libc::TCP_FASTOPEN)),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }
}

impl fmt::Display for SocketOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Anything that can take one integer socket option at a time
pub trait SetOption {
    fn set_option(&self, option: SocketOption, value: u32) -> io::Result<()>;
}

impl SetOption for Socket {
    fn set_option(&self, option: SocketOption, value: u32) -> io::Result<()> {
        let (level, name) = option.sockopt().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::Unsupported,
                format!("{} is not available on this platform", option),
            )
        })?;
        let value = libc::c_int::try_from(value).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} value {} out of range", option, value),
            )
        })?;

        // SAFETY: the fd is owned by `self` for the duration of the call and
        // the option value is a properly sized c_int.
        let ret = unsafe {
            libc::setsockopt(
                self.as_raw_fd(),
                level,
                name,
                &value as *const _ as *const libc::c_void,
                std::mem::size_of_val(&value) as libc::socklen_t,
            )
        };
        if ret != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

/// Per-option outcome of one tuning pass
#[derive(Debug, Default)]
pub struct TuningReport {
    outcomes: Vec<(SocketOption, io::Result<()>)>,
}

impl TuningReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, option: SocketOption, result: io::Result<()>) {
        self.outcomes.push((option, result));
    }

    /// Options in the order they were attempted
    pub fn attempted(&self) -> impl Iterator<Item = SocketOption> + '_ {
        self.outcomes.iter().map(|(option, _)| *option)
    }

    pub fn failures(&self) -> impl Iterator<Item = (SocketOption, &io::Error)> + '_ {
        self.outcomes
            .iter()
            .filter_map(|(option, result)| result.as_ref().err().map(|e| (*option, e)))
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    pub fn is_clean(&self) -> bool {
        self.failure_count() == 0
    }
}

/// Apply keep-alive and fast-open options to a fresh stream socket
pub fn configure<S: SetOption + ?Sized>(socket: &S, policy: &RetryPolicy) -> TuningReport {
    let mut report = TuningReport::new();
    let mut set = |option, value| report.record(option, socket.set_option(option, value));

    set(SocketOption::KeepAlive, 1);
    set(SocketOption::UserTimeout, USER_TIMEOUT.as_millis() as u32);

    if policy.keepalive_count > 0 {
        set(SocketOption::KeepAliveCount, policy.keepalive_count);
    }

    if !policy.interval.is_zero() {
        let secs = u32::try_from(policy.interval.as_secs()).unwrap_or(u32::MAX);
        set(SocketOption::KeepAliveIdle, secs);
        set(SocketOption::KeepAliveInterval, secs);
    }

    set(SocketOption::FastOpen, 1);

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use socket2::{Domain, Protocol, Type};

    fn stream_socket() -> Socket {
        Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP)).unwrap()
    }

    fn full_policy() -> RetryPolicy {
        RetryPolicy {
            keepalive_count: 4,
            interval: Duration::from_secs(7),
        }
    }

    /// Records every option it is given and rejects one of them
    struct Rejecting {
        rejected: SocketOption,
        applied: RefCell<Vec<(SocketOption, u32)>>,
    }

    impl Rejecting {
        fn new(rejected: SocketOption) -> Self {
            Self {
                rejected,
                applied: RefCell::new(Vec::new()),
            }
        }
    }

    impl SetOption for Rejecting {
        fn set_option(&self, option: SocketOption, value: u32) -> io::Result<()> {
            if option == self.rejected {
                return Err(io::Error::from(io::ErrorKind::PermissionDenied));
            }
            self.applied.borrow_mut().push((option, value));
            Ok(())
        }
    }

    #[test]
    fn test_full_policy_attempts_every_option() {
        let socket = stream_socket();
        let report = configure(&socket, &full_policy());
        let attempted: Vec<_> = report.attempted().collect();
        assert_eq!(
            attempted,
            vec![
                SocketOption::KeepAlive,
                SocketOption::UserTimeout,
                SocketOption::KeepAliveCount,
                SocketOption::KeepAliveIdle,
                SocketOption::KeepAliveInterval,
                SocketOption::FastOpen,
            ]
        );
        assert!(report.failures().all(|(option, _)| option != SocketOption::KeepAlive));
        assert!(socket.keepalive().unwrap());
    }

    #[test]
    fn test_keepalive_failure_does_not_stop_other_options() {
        let socket = Rejecting::new(SocketOption::KeepAlive);
        let report = configure(&socket, &full_policy());

        let failed: Vec<_> = report.failures().map(|(option, _)| option).collect();
        assert_eq!(failed, vec![SocketOption::KeepAlive]);
        assert_eq!(
            *socket.applied.borrow(),
            vec![
                (SocketOption::UserTimeout, 5),
                (SocketOption::KeepAliveCount, 4),
                (SocketOption::KeepAliveIdle, 7),
                (SocketOption::KeepAliveInterval, 7),
                (SocketOption::FastOpen, 1),
            ]
        );
    }

    #[test]
    fn test_each_failure_is_reported_against_its_own_option() {
        for rejected in [
            SocketOption::UserTimeout,
            SocketOption::KeepAliveCount,
            SocketOption::KeepAliveIdle,
            SocketOption::FastOpen,
        ] {
            let socket = Rejecting::new(rejected);
            let report = configure(&socket, &full_policy());

            assert_eq!(report.failure_count(), 1);
            assert_eq!(report.failures().next().unwrap().0, rejected);
            assert_eq!(socket.applied.borrow().len(), 5);
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_keepalive_values_applied() {
        let socket = stream_socket();
        configure(&socket, &full_policy());

        assert_eq!(socket.keepalive_retries().unwrap(), 4);
        assert_eq!(socket.keepalive_time().unwrap(), Duration::from_secs(7));
        assert_eq!(socket.keepalive_interval().unwrap(), Duration::from_secs(7));
        assert_eq!(socket.tcp_user_timeout().unwrap(), Some(USER_TIMEOUT));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_cadence_options_do_not_touch_keepalive_flag() {
        let socket = stream_socket();
        socket.set_option(SocketOption::KeepAliveCount, 6).unwrap();
        socket.set_option(SocketOption::KeepAliveIdle, 11).unwrap();

        assert!(!socket.keepalive().unwrap());
        assert_eq!(socket.keepalive_retries().unwrap(), 6);
        assert_eq!(socket.keepalive_time().unwrap(), Duration::from_secs(11));
    }

    #[test]
    fn test_zero_policy_skips_cadence() {
        let socket = stream_socket();
        let policy = RetryPolicy {
            keepalive_count: 0,
            interval: Duration::ZERO,
        };

        let report = configure(&socket, &policy);
        let attempted: Vec<_> = report.attempted().collect();
        assert_eq!(
            attempted,
            vec![
                SocketOption::KeepAlive,
                SocketOption::UserTimeout,
                SocketOption::FastOpen,
            ]
        );
    }

    #[test]
    fn test_report_failures() {
        let mut report = TuningReport::new();
        report.record(SocketOption::KeepAlive, Ok(()));
        assert!(report.is_clean());

        report.record(
            SocketOption::FastOpen,
            Err(io::Error::from(io::ErrorKind::PermissionDenied)),
        );

        assert!(!report.is_clean());
        assert_eq!(report.failure_count(), 1);
        let (option, err) = report.failures().next().unwrap();
        assert_eq!(option, SocketOption::FastOpen);
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert_eq!(option.to_string(), "TCP_FASTOPEN");
    }
}
