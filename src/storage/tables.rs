use redb::TableDefinition;

/// Config file records: record id -> ConfigFileRecord (msgpack)
pub const CONFIG_FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("config_files");

/// URI index: public uri -> record id
pub const CONFIG_FILE_URIS: TableDefinition<&str, &str> = TableDefinition::new("config_file_uris");

/// Managed file entities: file uuid -> ManagedFile (msgpack)
pub const MANAGED_FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("managed_files");

/// URI index: uri -> file uuid
pub const MANAGED_FILE_URIS: TableDefinition<&str, &str> =
    TableDefinition::new("managed_file_uris");

/// Prefix of the per-bin cache tables: key -> CacheEntry (msgpack)
pub const CACHE_TABLE_PREFIX: &str = "cache_";
