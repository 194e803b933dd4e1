use serde::{Deserialize, Serialize};

/// A named collection of holdings. Owned by the backend; the client keeps a
/// read-through copy in the query cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: String,
    pub name: String,
}

impl Portfolio {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}
