mod vault_fs;

pub use vault_fs::{sanitize_file_name, LocalFs, Result, StorageError, VaultFs};
