// Readiness multiplexing system calls
// select and poll over every descriptor kind, answered by one substrate poll_oneoff

use super::net_constants::*;
use crate::interface;
use crate::interface::errnos::{substrate_error, syscall_error, Errno};
use crate::interface::substrate::{Interest, Subscription, SubstrateError};
use crate::interface::types::{FdSet, PollStruct};
use crate::safeposix::process::Process;

const POLL_READ: i16 = POLLIN | POLLRDNORM;
const POLL_WRITE: i16 = POLLOUT | POLLWRNORM;

impl Process {
    // One substrate query for every subscription. Anything already known to
    // be ready turns the wait into a single check. With no subscriptions the
    // substrate just sleeps, forever when there is no timeout.
    fn wait_for_readiness(
        &self,
        subscriptions: &[Subscription],
        already_ready: bool,
        timeout: Option<interface::RustDuration>,
        syscall: &str,
    ) -> Result<Vec<interface::Event>, i32> {
        if subscriptions.is_empty() && already_ready {
            return Ok(Vec::new());
        }
        let wait = if already_ready {
            Some(interface::RustDuration::ZERO)
        } else {
            timeout
        };
        match self.substrate().poll_oneoff(subscriptions, wait) {
            Ok(events) => Ok(events),
            Err(SubstrateError::Interrupted) => Err(syscall_error(Errno::EINTR, syscall, "interrupted while waiting")),
            Err(e) => Err(substrate_error(e, syscall)),
        }
    }

    /// ## ------------------POLL SYSCALL------------------
    /// ### Description
    ///
    /// Waits until one of `fds` is ready for what it asks about, or until
    /// `timeout_ms` passes. Pipes, sockets and event counters are asked about
    /// through the substrate. Regular files, directories and other streams
    /// have no readiness to ask about and are always reported ready for
    /// reading and writing, as POSIX specifies for regular files.
    ///
    /// ### Function Arguments
    ///
    /// * `fds` - the descriptors and their requested events. Negative fds are
    ///   skipped. `revents` is rewritten for every entry.
    /// * `timeout_ms` - milliseconds to wait, 0 to check once, negative to
    ///   wait until something is ready. With nothing to watch a negative
    ///   timeout waits until the substrate interrupts the call.
    ///
    /// ### Returns
    ///
    /// The number of entries with a non-zero `revents`, 0 on timeout.
    /// Descriptors that are not open get POLLNVAL, substrate errors POLLERR
    /// and hung up peers POLLHUP.
    ///
    /// ### Errors
    ///
    /// * EINTR - the substrate reported an interrupted wait
    ///
    /// [poll(2)](https://man7.org/linux/man-pages/man2/poll.2.html)
    pub fn poll_syscall(&self, fds: &mut [PollStruct], timeout_ms: i32) -> i32 {
        let timeout = interface::duration_from_millis(timeout_ms);
        let mut subscriptions = Vec::new();
        let mut already_ready = false;

        for (index, pollfd) in fds.iter_mut().enumerate() {
            pollfd.revents = 0;
            if pollfd.fd < 0 {
                continue;
            }
            let entry = match self.fdtable.resolve(pollfd.fd) {
                Ok(entry) => entry,
                Err(_) => {
                    pollfd.revents = POLLNVAL;
                    already_ready = true;
                    continue;
                }
            };

            if !self.substrate().has_readiness(entry.handle_kind()) {
                pollfd.revents = pollfd.events & (POLL_READ | POLL_WRITE);
                already_ready |= pollfd.revents != 0;
                continue;
            }
            let handle = entry.handle().handle();
            if pollfd.events & (POLL_READ | POLLPRI) != 0 {
                subscriptions.push(Subscription {
                    userdata: index as u64,
                    handle: handle,
                    interest: Interest::Read,
                });
            }
            if pollfd.events & POLL_WRITE != 0 {
                subscriptions.push(Subscription {
                    userdata: index as u64,
                    handle: handle,
                    interest: Interest::Write,
                });
            }
        }

        let events = match self.wait_for_readiness(&subscriptions, already_ready, timeout, "poll") {
            Ok(events) => events,
            Err(e) => return e,
        };
        for event in events {
            let pollfd = match fds.get_mut(event.userdata as usize) {
                Some(pollfd) => pollfd,
                None => continue,
            };
            if event.error.is_some() {
                pollfd.revents |= POLLERR;
                continue;
            }
            pollfd.revents |= match event.interest {
                Interest::Read => pollfd.events & POLL_READ,
                Interest::Write => pollfd.events & POLL_WRITE,
            };
            if event.hangup {
                pollfd.revents |= POLLHUP;
            }
        }

        fds.iter().filter(|pollfd| pollfd.revents != 0).count() as i32
    }

    /// ## ------------------SELECT SYSCALL------------------
    /// ### Description
    ///
    /// Waits until a descriptor in `readfds` is readable or one in
    /// `writefds` is writable, looking only at descriptors below `nfds`.
    /// Readiness follows poll: kinds the substrate cannot poll are always
    /// ready. On return every given set is rewritten in place to hold only
    /// the ready descriptors; `exceptfds` is accepted and always comes back
    /// empty.
    ///
    /// ### Function Arguments
    ///
    /// * `nfds` - one more than the highest descriptor to look at
    /// * `readfds`, `writefds`, `exceptfds` - optional descriptor sets
    /// * `timeout` - how long to wait, `None` to wait until something is
    ///   ready, or until the substrate interrupts the call when the sets are
    ///   empty
    ///
    /// ### Returns
    ///
    /// Total number of bits set across the returned sets, 0 on timeout.
    ///
    /// ### Errors
    ///
    /// * EINVAL - `nfds` is negative or above FD_SETSIZE
    /// * EBADF - a set names a descriptor that is not open
    /// * EINTR - the substrate reported an interrupted wait
    ///
    /// [select(2)](https://man7.org/linux/man-pages/man2/select.2.html)
    pub fn select_syscall(
        &self,
        nfds: i32,
        readfds: Option<&mut FdSet>,
        writefds: Option<&mut FdSet>,
        exceptfds: Option<&mut FdSet>,
        timeout: Option<interface::RustDuration>,
    ) -> i32 {
        if nfds < 0 || nfds > FD_SETSIZE {
            return syscall_error(Errno::EINVAL, "select", "Number of FDs is wrong");
        }

        let wanted_read = readfds.as_ref().map(|set| set.members(nfds)).unwrap_or_default();
        let wanted_write = writefds.as_ref().map(|set| set.members(nfds)).unwrap_or_default();

        let mut ready_read = FdSet::new();
        let mut ready_write = FdSet::new();
        let mut subscriptions = Vec::new();
        let mut already_ready = false;

        let requests = wanted_read
            .iter()
            .map(|fd| (*fd, Interest::Read))
            .chain(wanted_write.iter().map(|fd| (*fd, Interest::Write)));
        for (fd, interest) in requests {
            let entry = match self.fdtable.resolve(fd) {
                Ok(entry) => entry,
                Err(_) => return syscall_error(Errno::EBADF, "select", "invalid file descriptor in a set"),
            };
            if self.substrate().has_readiness(entry.handle_kind()) {
                subscriptions.push(Subscription {
                    userdata: fd as u64,
                    handle: entry.handle().handle(),
                    interest: interest,
                });
                continue;
            }
            match interest {
                Interest::Read => ready_read.set(fd),
                Interest::Write => ready_write.set(fd),
            }
            already_ready = true;
        }

        let events = match self.wait_for_readiness(&subscriptions, already_ready, timeout, "select") {
            Ok(events) => events,
            Err(e) => return e,
        };
        // an error condition counts as ready, the next call on the fd reports it
        for event in events {
            let fd = event.userdata as i32;
            match event.interest {
                Interest::Read => ready_read.set(fd),
                Interest::Write => ready_write.set(fd),
            }
        }

        let count = ready_read.count() + ready_write.count();
        if let Some(readfds) = readfds {
            *readfds = ready_read;
        }
        if let Some(writefds) = writefds {
            *writefds = ready_write;
        }
        if let Some(exceptfds) = exceptfds {
            exceptfds.zero();
        }
        count as i32
    }
}
