use std::sync::Arc;
use std::thread::JoinHandle;
use std::{io, thread};

use tracing::warn;

use crate::process::ProcessShared;

/// Thread handle that joins the thread when dropped
pub struct AutoJoinHandle {
    pub(crate) join_handle: Option<JoinHandle<()>>,
}

impl AutoJoinHandle {
    pub fn spawn<F>(name: String, f: F) -> io::Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        Ok(Self::from(thread::Builder::new().name(name).spawn(f)?))
    }
}

impl From<JoinHandle<()>> for AutoJoinHandle {
    fn from(value: JoinHandle<()>) -> Self {
        Self {
            join_handle: Some(value),
        }
    }
}

impl Drop for AutoJoinHandle {
    fn drop(&mut self) {
        let Some(join_handle) = self.join_handle.take() else { return; };
        let name = join_handle.thread().name().unwrap_or("unnamed").to_owned();
        // the panic was already reported by `PanicGuard`, don't double-panic in drop
        if join_handle.join().is_err() {
            warn!(task = %name, "Task thread panicked");
        }
    }
}

/// Marks the process dead if the task unwinds before calling [`Self::done`]
pub struct PanicGuard {
    name: &'static str,
    process: Arc<ProcessShared>,
    done: bool,
}

impl PanicGuard {
    pub fn new(name: &'static str, process: Arc<ProcessShared>) -> Self {
        Self {
            name,
            process,
            done: false,
        }
    }

    pub fn done(mut self) {
        self.done = true;
    }
}

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if !self.done {
            warn!(
                id = %self.process.id(),
                "Task {} panic detected via PanicGuard", self.name
            );
            self.process.mark_dead();
        }
    }
}
