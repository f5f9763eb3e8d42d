//! Forwarding of termination signals from the wrapper to the container runtime.
//!
//! While a child runs, SIGINT, SIGTERM and SIGHUP are recorded instead of
//! terminating the wrapper; the wait loop relays them to the child and keeps
//! waiting for it to exit. Previous dispositions are restored when the guard
//! drops.

#[cfg(unix)]
mod imp {
    use std::sync::atomic::{AtomicI32, Ordering};

    const FORWARDED: [libc::c_int; 3] = [libc::SIGINT, libc::SIGTERM, libc::SIGHUP];

    static PENDING: AtomicI32 = AtomicI32::new(0);

    extern "C" fn record(signal: libc::c_int) {
        PENDING.store(signal, Ordering::SeqCst);
    }

    pub struct ForwardingGuard {
        previous: Vec<(libc::c_int, libc::sighandler_t)>,
    }

    impl ForwardingGuard {
        pub fn install() -> Self {
            PENDING.store(0, Ordering::SeqCst);
            let handler = record as extern "C" fn(libc::c_int) as libc::sighandler_t;
            let previous = FORWARDED
                .iter()
                .map(|&signal| {
                    // SAFETY: the handler only performs an atomic store.
                    let prev = unsafe { libc::signal(signal, handler) };
                    (signal, prev)
                })
                .collect();
            Self { previous }
        }
    }

    impl Drop for ForwardingGuard {
        fn drop(&mut self) {
            for &(signal, prev) in &self.previous {
                if prev != libc::SIG_ERR {
                    unsafe {
                        libc::signal(signal, prev);
                    }
                }
            }
        }
    }

    pub fn take_pending() -> Option<i32> {
        match PENDING.swap(0, Ordering::SeqCst) {
            0 => None,
            signal => Some(signal),
        }
    }

    pub fn forward(pid: u32, signal: i32) {
        unsafe {
            libc::kill(pid as libc::pid_t, signal);
        }
    }
}

#[cfg(not(unix))]
mod imp {
    pub struct ForwardingGuard;

    impl ForwardingGuard {
        pub fn install() -> Self {
            ForwardingGuard
        }
    }

    pub fn take_pending() -> Option<i32> {
        None
    }

    pub fn forward(_pid: u32, _signal: i32) {}
}

pub(crate) use imp::{forward, take_pending, ForwardingGuard};
