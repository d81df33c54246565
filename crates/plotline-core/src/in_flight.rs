use std::collections::HashSet;

use crate::SessionError;

/// Entity ids with a mutation awaiting its response. A UI disables the
/// triggering control while [`InFlight::is_busy`] holds.
#[derive(Debug, Default)]
pub struct InFlight {
    ids: HashSet<String>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, id: &str) -> Result<(), SessionError> {
        if self.ids.insert(id.to_string()) {
            Ok(())
        } else {
            Err(SessionError::Busy { id: id.to_string() })
        }
    }

    pub fn finish(&mut self, id: &str) {
        self.ids.remove(id);
    }

    pub fn is_busy(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn is_idle(&self) -> bool {
        self.ids.is_empty()
    }
}
