//! The stock build: the crawl engine over a single SQLite file.

/// Long crawls churn through a lot of small allocations; jemalloc keeps the
/// fragmentation in check.
#[cfg(not(target_env = "musl"))]
#[global_allocator]
static ALLOCATOR: jemallocator::Jemalloc = jemallocator::Jemalloc;

lib_rastro::main! { sqlite_rastro::SqliteBackend }
