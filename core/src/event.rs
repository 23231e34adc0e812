use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, TryRecvError};

use crate::{error::MitmResult, table::Table};

/// An event to track the progress of the construction of a table.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Overall progress of the construction in percent.
    Progress(f64),
    /// A shard of the table is finished.
    ShardDone {
        shard: usize,
        shard_count: usize,
        entries: usize,
    },
}

/// A handle to a table being built on another thread.
pub struct TableHandle {
    pub(crate) thread_handle: JoinHandle<MitmResult<Table>>,
    pub(crate) receiver: Receiver<Event>,
}

impl TableHandle {
    /// Returns the built table.
    /// Blocks until the table is finished.
    pub fn join(self) -> MitmResult<Table> {
        match self.thread_handle.join() {
            Ok(table) => table,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    /// Blocks until an event is received.
    /// Returns `None` if the table is finished.
    pub fn recv(&self) -> Option<Event> {
        self.receiver.recv().ok()
    }

    /// Returns an event if one is pending.
    /// Returns `Err(TryRecvError::Disconnected)` if the table is finished.
    pub fn try_recv(&self) -> Result<Event, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Returns true if the construction is over.
    pub fn is_finished(&self) -> bool {
        self.thread_handle.is_finished()
    }
}
