//! redb table definitions for the object store.

use redb::TableDefinition;

/// Root-level objects keyed by name, values JSON-encoded.
pub const OBJECTS: TableDefinition<&str, &[u8]> = TableDefinition::new("objects");
