/// Largest dataset file the loader will read.
pub const MAX_SNAPSHOT_BYTES: u64 = 64 * 1024 * 1024;

/// Most records a single dataset file may hold.
pub const MAX_RECORDS: usize = 200_000;

/// Longest accepted search string, in bytes.
pub const MAX_SEARCH_LEN: usize = 256;

/// Largest page a single query returns.
pub const MAX_PAGE_SIZE: usize = 10_000;

pub const MAX_TENANTS: usize = 1024;

pub const MAX_TENANT_NAME_LEN: usize = 64;
