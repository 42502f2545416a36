//! ID generation utilities.

use ulid::Ulid;
use uuid::Uuid;

/// Length of the public identifier shown in post and comment URLs.
pub const PUBLIC_ID_LEN: usize = 8;

/// ID generator for entities.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new ULID-based primary key.
    ///
    /// ULIDs are lexicographically sortable, so ordering rows by ID
    /// follows creation order.
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Generate a short public identifier for posts and comments.
    ///
    /// Taken from the random half of a UUID v4 so that identifiers do not
    /// leak creation time.
    #[must_use]
    pub fn generate_public_id(&self) -> String {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(PUBLIC_ID_LEN);
        id
    }
}
