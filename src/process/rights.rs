// ── Access-right tiers ────────────────────────────────────────────────────────
//
// Opening a process or thread first asks for the caller's rights plus the
// standard set.  When that is refused (typically a process in another
// security context, or one that has just exited), the same object is opened
// again with the query-limited set, which still allows reading the image
// name and exit code.  The tiers are an ordered list; the first success wins.

use tracing::debug;

use crate::error::Result;

/// `STANDARD_RIGHTS_REQUIRED`: delete, read-control, write-DAC, write-owner.
pub const STANDARD_RIGHTS_REQUIRED: u32 = 0x000F_0000;

/// `SYNCHRONIZE`: wait on the object.
pub const SYNCHRONIZE: u32 = 0x0010_0000;

/// `PROCESS_QUERY_LIMITED_INFORMATION`.
pub const PROCESS_QUERY_LIMITED_INFORMATION: u32 = 0x0000_1000;

/// `THREAD_QUERY_LIMITED_INFORMATION`.
pub const THREAD_QUERY_LIMITED_INFORMATION: u32 = 0x0000_0800;

/// `PROCESS_TERMINATE`.
pub const PROCESS_TERMINATE: u32 = 0x0000_0001;

/// Rights added to every first-tier request.
pub const STANDARD_RIGHTS: u32 = STANDARD_RIGHTS_REQUIRED | SYNCHRONIZE;

/// Second-tier base for processes.
pub const PROCESS_LIMITED_RIGHTS: u32 = PROCESS_QUERY_LIMITED_INFORMATION | SYNCHRONIZE;

/// Second-tier base for threads.
pub const THREAD_LIMITED_RIGHTS: u32 = THREAD_QUERY_LIMITED_INFORMATION | SYNCHRONIZE;

/// Ordered access-right sets to try when opening one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RightsTiers {
    tiers: [u32; 2],
}

impl RightsTiers {
    /// `[desired | standard, (desired - standard) | limited]`.
    pub const fn with_base(desired: u32, limited: u32) -> Self {
        Self {
            tiers: [
                desired | STANDARD_RIGHTS,
                (desired & !STANDARD_RIGHTS) | limited,
            ],
        }
    }

    pub const fn process(desired: u32) -> Self {
        Self::with_base(desired, PROCESS_LIMITED_RIGHTS)
    }

    pub const fn thread(desired: u32) -> Self {
        Self::with_base(desired, THREAD_LIMITED_RIGHTS)
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.tiers
    }

    /// Call `open` with each tier in order and return the first success.
    ///
    /// Failures are logged and swallowed; `None` means every tier failed.
    pub fn open_first<T>(&self, mut open: impl FnMut(u32) -> Result<T>) -> Option<T> {
        for &rights in &self.tiers {
            match open(rights) {
                Ok(opened) => return Some(opened),
                Err(e) => debug!(rights, error = %e, "rights tier refused"),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const PROCESS_VM_READ: u32 = 0x0010;

    fn denied() -> Error {
        Error::Win32 {
            function: "OpenProcess",
            code: 5,
        }
    }

    #[test]
    fn process_tiers_add_standard_then_limited() {
        let tiers = RightsTiers::process(PROCESS_VM_READ);
        assert_eq!(
            tiers.as_slice(),
            &[
                PROCESS_VM_READ | STANDARD_RIGHTS,
                PROCESS_VM_READ | PROCESS_LIMITED_RIGHTS
            ]
        );
    }

    #[test]
    fn second_tier_drops_standard_rights_from_request() {
        let tiers = RightsTiers::process(STANDARD_RIGHTS_REQUIRED | PROCESS_VM_READ);
        assert_eq!(tiers.as_slice()[1] & STANDARD_RIGHTS_REQUIRED, 0);
        assert_eq!(tiers.as_slice()[1] & PROCESS_VM_READ, PROCESS_VM_READ);
    }

    #[test]
    fn thread_tiers_use_thread_limited_set() {
        let tiers = RightsTiers::thread(0);
        assert_eq!(tiers.as_slice(), &[STANDARD_RIGHTS, THREAD_LIMITED_RIGHTS]);
    }

    #[test]
    fn first_success_wins() {
        let mut tried = Vec::new();
        let opened = RightsTiers::process(0).open_first(|rights| {
            tried.push(rights);
            Ok(rights)
        });
        assert_eq!(opened, Some(STANDARD_RIGHTS));
        assert_eq!(tried.len(), 1);
    }

    #[test]
    fn falls_back_when_standard_refused() {
        let opened = RightsTiers::process(0).open_first(|rights| {
            if rights & STANDARD_RIGHTS_REQUIRED != 0 {
                Err(denied())
            } else {
                Ok(rights)
            }
        });
        assert_eq!(opened, Some(PROCESS_LIMITED_RIGHTS));
    }

    #[test]
    fn all_tiers_failing_is_none() {
        let mut calls = 0;
        let opened: Option<()> = RightsTiers::process(0).open_first(|_| {
            calls += 1;
            Err(denied())
        });
        assert!(opened.is_none());
        assert_eq!(calls, 2);
    }
}
