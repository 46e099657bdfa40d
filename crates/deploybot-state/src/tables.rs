//! redb table definitions for the deploy state store.

use redb::TableDefinition;

/// Active deployment records keyed by channel identifier.
pub const DEPLOYMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("deployments");
