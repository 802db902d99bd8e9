//! # CLI — RiptideKV Interactive Shell
//!
//! A REPL-style command-line interface for the RiptideKV storage engine.
//! Reads commands from stdin, executes them against the engine, and prints
//! results to stdout. Designed for both interactive use and scripted testing
//! (pipe commands via stdin).
//!
//! ## Commands
//!
//! ```text
//! SET key value      Insert or update a key-value pair
//! GET key            Look up a key (prints value or "(nil)")
//! DEL key            Delete a key (writes a tombstone)
//! SCAN [lo] [hi]      Range scan, both bounds inclusive (defaults to full scan)
//! FLUSH              Force flush the memtable to a new level-0 sorted table
//! COMPACT            Trigger manual compaction of level 0 into level 1
//! STATS              Print engine debug info
//! EXIT / QUIT        Shut down gracefully
//! ```
//!
//! ## Configuration
//!
//! All settings are controlled via environment variables:
//!
//! ```text
//! RIPTIDE_DATA_DIR        Engine data directory      (default: "data")
//! RIPTIDE_MEM_MAX_BYTES   Memtable flush threshold   (default: 4194304)
//! RIPTIDE_L0_MAX_FILES    Level-0 compaction trigger (default: 4)
//! RIPTIDE_LEVELS_MAX      Number of levels           (default: 7)
//! RIPTIDE_BLOCK_SIZE      Sorted-table block target  (default: 4096)
//! ```
//!
//! ## Example
//!
//! ```text
//! $ cargo run -p cli
//! RiptideKV opened data (next_seq=0, mem_max_bytes=4194304, level0_max_files=4, levels_max=7)
//! > SET name Alice
//! OK
//! > GET name
//! Alice
//! > SCAN
//! name -> Alice
//! (1 entries)
//! > EXIT
//! bye
//! ```
use anyhow::{Context, Result};
use config::Config;
use engine::Engine;
use std::io::{self, BufRead, Write};

/// Reads a configuration value from the environment, falling back to `default`.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_usize(key: &str, default: usize) -> usize {
    env_or(key, &default.to_string())
        .parse()
        .unwrap_or(default)
}

fn config_from_env() -> Config {
    let defaults = Config::default();
    Config {
        mem_max_bytes: env_usize("RIPTIDE_MEM_MAX_BYTES", defaults.mem_max_bytes),
        level0_max_files: env_usize("RIPTIDE_L0_MAX_FILES", defaults.level0_max_files),
        levels_max: env_usize("RIPTIDE_LEVELS_MAX", defaults.levels_max),
        block_size_bytes: env_usize("RIPTIDE_BLOCK_SIZE", defaults.block_size_bytes),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let data_dir = env_or("RIPTIDE_DATA_DIR", "data");
    let config = config_from_env().validated().context("invalid configuration")?;

    let mut engine = Engine::open(&data_dir, config)?;

    println!(
        "RiptideKV opened {} (next_seq={}, mem_max_bytes={}, level0_max_files={}, levels_max={})",
        data_dir,
        engine.next_seq(),
        config.mem_max_bytes,
        config.level0_max_files,
        config.levels_max
    );
    println!("Commands: SET key value | GET key | DEL key | SCAN [lo] [hi]");
    println!("          COMPACT | FLUSH | STATS | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        if let Some(cmd) = parts.next() {
            match cmd.to_uppercase().as_str() {
                "SET" => {
                    if let Some(k) = parts.next() {
                        let v: String = parts.collect::<Vec<&str>>().join(" ");
                        if v.is_empty() {
                            println!("ERR usage: SET key value");
                        } else {
                            match engine.set(k, v.into_bytes()) {
                                Ok(()) => println!("OK"),
                                Err(e) => println!("ERR set failed: {}", e),
                            }
                        }
                    } else {
                        println!("ERR usage: SET key value");
                    }
                }
                "GET" => {
                    if let Some(k) = parts.next() {
                        match engine.get(k) {
                            Ok(Some(v)) => println!("{}", String::from_utf8_lossy(&v)),
                            Ok(None) => println!("(nil)"),
                            Err(e) => println!("ERR read failed: {}", e),
                        }
                    } else {
                        println!("ERR usage: GET key");
                    }
                }
                "DEL" => {
                    if let Some(k) = parts.next() {
                        match engine.delete(k) {
                            Ok(()) => println!("OK"),
                            Err(e) => println!("ERR del failed: {}", e),
                        }
                    } else {
                        println!("ERR usage: DEL key");
                    }
                }
                "SCAN" => {
                    let lo = parts.next().unwrap_or("").to_string();
                    let hi = parts.next().unwrap_or("\u{10FFFF}").to_string();
                    match engine.range(&lo, &hi) {
                        Ok(results) => {
                            if results.is_empty() {
                                println!("(empty)");
                            } else {
                                for (k, v) in &results {
                                    println!("{} -> {}", k, String::from_utf8_lossy(v));
                                }
                                println!("({} entries)", results.len());
                            }
                        }
                        Err(e) => println!("ERR scan failed: {}", e),
                    }
                }
                "COMPACT" => match engine.compact_level(0) {
                    Ok(()) => {
                        let stats = engine.stats();
                        println!("OK (per_level_file_counts={:?})", stats.per_level_file_counts);
                    }
                    Err(e) => println!("ERR compact failed: {}", e),
                },
                "FLUSH" => match engine.force_flush() {
                    Ok(()) => {
                        let stats = engine.stats();
                        println!("OK (per_level_file_counts={:?})", stats.per_level_file_counts);
                    }
                    Err(e) => println!("ERR flush failed: {}", e),
                },
                "STATS" => {
                    println!("{:?}", engine);
                }
                "EXIT" | "QUIT" => {
                    println!("bye");
                    break;
                }
                other => {
                    println!("unknown command: {}", other);
                }
            }
        }

        print!("> ");
        io::stdout().flush().ok();
    }

    engine.close()?;
    Ok(())
}
