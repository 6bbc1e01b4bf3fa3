use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use photoedit_contracts::{EditorError, EditorResult};

use crate::session::{EditOutcome, EditorSession};

const EDIT_THREAD_NAME: &str = "photoedit-ai-edit";

/// A session shared between a UI loop and a background AI edit.
///
/// The lock is held only to admit an edit and to apply its result; the
/// provider call itself runs unlocked, so previews and filter changes keep
/// working while the request is outstanding.
#[derive(Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<EditorSession>>,
}

impl SharedSession {
    pub fn new(session: EditorSession) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut EditorSession) -> R) -> R {
        f(&mut self.lock())
    }

    /// Admits an edit and runs the provider call on a worker thread. Fails
    /// immediately (with `Busy` among others) when admission fails.
    pub fn spawn_edit(
        &self,
        instruction: &str,
    ) -> EditorResult<thread::JoinHandle<EditorResult<EditOutcome>>> {
        let ticket = self.with(|session| session.begin_edit(instruction))?;
        let ticket_id = ticket.id();
        let shared = self.clone();
        let spawned = thread::Builder::new()
            .name(EDIT_THREAD_NAME.to_string())
            .spawn(move || {
                let result = ticket.run();
                shared.with(|session| session.complete_edit(ticket, result))
            });
        match spawned {
            Ok(handle) => Ok(handle),
            Err(err) => {
                let err = EditorError::Io(format!("AI edit thread spawn failed: {err}"));
                Err(self.with(|session| session.fail_edit(ticket_id, err)))
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, EditorSession> {
        // Session mutations are whole-field assignments; a poisoned lock still
        // guards a consistent session.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
