use std::fs;
use std::path::Path;

/// Counts `.st` sorted-table files directly inside `dir` (ignores the WAL
/// and any stray `.st.tmp` file).
pub fn count_st_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .map(|ext| ext == "st")
                .unwrap_or(false)
        })
        .count()
}

/// A config whose `mem_max_bytes` is so small that every write triggers a
/// flush, with auto-compaction effectively disabled by a high
/// `level0_max_files`.
pub fn tiny_flush_config() -> config::Config {
    config::Config {
        mem_max_bytes: 1,
        level0_max_files: 1000,
        ..config::Config::default()
    }
}
