use std::fmt;

/// Identifier of a tracked job. Unique among active jobs; assigned
/// monotonically and never reused while the job remains in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct JobId(u32);

impl JobId {
    pub fn new(raw: u32) -> Self {
        JobId(raw)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An OS process id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessId(libc::pid_t);

impl ProcessId {
    pub fn from_raw(raw: libc::pid_t) -> Self {
        ProcessId(raw)
    }

    pub fn as_raw(self) -> libc::pid_t {
        self.0
    }

    /// The process group a pipeline leader establishes is keyed by its
    /// own pid.
    pub fn as_group(self) -> GroupId {
        GroupId(self.0)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An OS process-group id. Kept distinct from [`ProcessId`] so a pid is
/// never passed where a pgid belongs (or vice versa) by accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupId(libc::pid_t);

impl GroupId {
    pub fn from_raw(raw: libc::pid_t) -> Self {
        GroupId(raw)
    }

    pub fn as_raw(self) -> libc::pid_t {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
