//! redb table definitions for the dusk state store.
//!
//! Keys are `&str`, values are JSON-serialized records. The token table's
//! name is configurable (`token_store_name`), so it is built per call
//! rather than declared as a constant.

use redb::TableDefinition;

/// Local instance registry keyed by instance id.
pub const INSTANCES: TableDefinition<&str, &[u8]> = TableDefinition::new("instances");

/// Postponement tokens keyed by the token string.
pub fn tokens(name: &str) -> TableDefinition<'_, &'static str, &'static [u8]> {
    TableDefinition::new(name)
}
