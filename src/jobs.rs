use std::fmt;

use crate::ids::{GroupId, JobId};

/// Most jobs the shell will track at once. A full table rejects new
/// launches rather than growing.
pub const MAX_JOBS: usize = 128;

/// The lifecycle state of a tracked job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Stopped,
    Done,
}

impl JobStatus {
    /// Label used by `jobs` output.
    pub fn label(self) -> &'static str {
        match self {
            JobStatus::Running => "Running",
            JobStatus::Stopped => "Stopped",
            JobStatus::Done => "Done",
        }
    }
}

/// A single tracked job: one pipeline's worth of processes sharing a
/// process group. Plain data — child processes are reaped through
/// `waitpid`, so no handle is retained here.
#[derive(Debug)]
pub struct Job {
    pub id: JobId,
    pub pgid: GroupId,
    pub cmdline: String,
    pub status: JobStatus,
    pub background: bool,
}

/// Returned by [`JobTable::insert`] when every slot is occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableFull;

impl fmt::Display for TableFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job table full ({MAX_JOBS} jobs)")
    }
}

impl std::error::Error for TableFull {}

/// The shell's job table — a fixed-capacity arena of job records.
///
/// Slots freed by `remove` are reused by later inserts, so `list` order
/// is slot order, not launch order; job ids stay unique regardless.
pub struct JobTable {
    slots: Vec<Option<Job>>,
    next_id: u32,
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTable {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            next_id: 1,
        }
    }

    /// True when no further job can be registered.
    pub fn is_full(&self) -> bool {
        self.slots.len() >= MAX_JOBS && self.slots.iter().all(|s| s.is_some())
    }

    /// Register a freshly launched job as Running. Fails when the table
    /// is at capacity; nothing is overwritten.
    pub fn insert(
        &mut self,
        pgid: GroupId,
        cmdline: String,
        background: bool,
    ) -> Result<JobId, TableFull> {
        let id = JobId::new(self.next_id);
        let job = Job {
            id,
            pgid,
            cmdline,
            status: JobStatus::Running,
            background,
        };

        let slot = match self.slots.iter().position(|s| s.is_none()) {
            Some(index) => &mut self.slots[index],
            None if self.slots.len() < MAX_JOBS => {
                self.slots.push(None);
                self.slots.last_mut().unwrap()
            }
            None => return Err(TableFull),
        };

        *slot = Some(job);
        self.next_id += 1;
        Ok(id)
    }

    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.slots.iter().flatten().find(|job| job.id == id)
    }

    pub fn get_mut(&mut self, id: JobId) -> Option<&mut Job> {
        self.slots.iter_mut().flatten().find(|job| job.id == id)
    }

    pub fn get_by_group(&self, pgid: GroupId) -> Option<&Job> {
        self.slots.iter().flatten().find(|job| job.pgid == pgid)
    }

    pub fn get_by_group_mut(&mut self, pgid: GroupId) -> Option<&mut Job> {
        self.slots.iter_mut().flatten().find(|job| job.pgid == pgid)
    }

    pub fn remove(&mut self, id: JobId) -> Option<Job> {
        self.slots
            .iter_mut()
            .find(|s| s.as_ref().is_some_and(|job| job.id == id))
            .and_then(Option::take)
    }

    /// All active jobs in slot order.
    pub fn list(&self) -> impl Iterator<Item = &Job> {
        self.slots.iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with(n: usize) -> JobTable {
        let mut table = JobTable::new();
        for i in 0..n {
            table
                .insert(
                    GroupId::from_raw(1000 + i as libc::pid_t),
                    format!("cmd {i}"),
                    false,
                )
                .unwrap();
        }
        table
    }

    #[test]
    fn ids_are_monotonic_and_unique() {
        let table = table_with(5);
        let ids: Vec<u32> = table.list().map(|j| j.id.as_u32()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn new_jobs_start_running() {
        let table = table_with(1);
        let job = table.list().next().unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert!(!job.background);
    }

    #[test]
    fn lookup_by_id_and_group() {
        let table = table_with(3);
        let job = table.get(JobId::new(2)).unwrap();
        assert_eq!(job.pgid, GroupId::from_raw(1001));
        let job = table.get_by_group(GroupId::from_raw(1002)).unwrap();
        assert_eq!(job.id, JobId::new(3));
    }

    #[test]
    fn removed_slot_is_reused_but_id_is_not() {
        let mut table = table_with(3);
        table.remove(JobId::new(2)).unwrap();
        let id = table
            .insert(GroupId::from_raw(2000), "replacement".into(), true)
            .unwrap();
        assert_eq!(id, JobId::new(4));

        // Slot order: the new job fills the freed middle slot.
        let ids: Vec<u32> = table.list().map(|j| j.id.as_u32()).collect();
        assert_eq!(ids, vec![1, 4, 3]);
    }

    #[test]
    fn remove_unknown_id_is_none() {
        let mut table = table_with(1);
        assert!(table.remove(JobId::new(99)).is_none());
        assert_eq!(table.list().count(), 1);
    }

    #[test]
    fn insert_past_capacity_fails_and_preserves_entries() {
        let mut table = table_with(MAX_JOBS);
        assert!(table.is_full());
        let err = table
            .insert(GroupId::from_raw(9999), "one too many".into(), false)
            .unwrap_err();
        assert_eq!(err, TableFull);
        assert_eq!(table.list().count(), MAX_JOBS);
        assert!(table.get_by_group(GroupId::from_raw(9999)).is_none());
    }

    #[test]
    fn capacity_recovers_after_remove() {
        let mut table = table_with(MAX_JOBS);
        table.remove(JobId::new(1)).unwrap();
        assert!(!table.is_full());
        assert!(
            table
                .insert(GroupId::from_raw(9999), "again".into(), false)
                .is_ok()
        );
    }
}
