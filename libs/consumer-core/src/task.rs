use std::fmt;

/// Identity of a unit of work announced by the coordinator.
///
/// Two `Task` values with the same id refer to the same work item; the id must be
/// non-empty and unique within the coordinator's namespace, but this type does not
/// itself enforce uniqueness — that is the coordinator's job.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Task {
    id: String,
}

impl Task {
    /// Builds a `Task` from any string-like id.
    ///
    /// # Panics
    /// Panics if `id` is empty — an empty id can never be distinguished from "no task"
    /// by a coordinator, so constructing one is always a caller bug.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        assert!(!id.is_empty(), "Task id must not be empty");
        Self { id }
    }

    /// The task's id.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn into_id(self) -> String {
        self.id
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl From<&str> for Task {
    fn from(id: &str) -> Self {
        Task::new(id)
    }
}

impl From<String> for Task {
    fn from(id: String) -> Self {
        Task::new(id)
    }
}
