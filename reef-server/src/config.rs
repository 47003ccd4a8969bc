//! Server configuration, parsed from the command line.

use std::path::PathBuf;

use clap::Parser;

use reef_engine::EngineKind;
use reef_store::DEFAULT_SHARD_COUNT;

/// Persistent Redis-protocol key-value server.
#[derive(Debug, Clone, Parser)]
#[command(name = "reef-server", version, about)]
pub struct Config {
    /// Listen address.
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Listen port.
    #[arg(short = 'p', long, default_value_t = 6380)]
    pub port: u16,

    /// Data directory; shards live under `<dir>/<engine>/<shard>/`.
    #[arg(short = 'd', long, default_value = "./data/")]
    pub dir: PathBuf,

    /// Storage backend: `sled` or `redb`.
    #[arg(short = 's', long = "store", default_value = "sled")]
    pub engine: EngineKind,

    /// Engine shards per data directory. Changing this invalidates
    /// previously written data.
    #[arg(long, default_value_t = DEFAULT_SHARD_COUNT)]
    pub shards: usize,

    /// Worker pool size as a power of two (3 means 8 workers).
    #[arg(long, default_value_t = 3)]
    pub worker_power: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::parse_from(["reef-server"]);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 6380);
        assert_eq!(config.dir, PathBuf::from("./data/"));
        assert_eq!(config.engine, EngineKind::Sled);
        assert_eq!(config.shards, 16);
        assert_eq!(config.worker_power, 3);
    }

    #[test]
    fn engine_flag_selects_backend() {
        let config = Config::parse_from(["reef-server", "-s", "redb", "-p", "7000"]);
        assert_eq!(config.engine, EngineKind::Redb);
        assert_eq!(config.port, 7000);
    }

    #[test]
    fn unknown_engine_is_rejected() {
        assert!(Config::try_parse_from(["reef-server", "-s", "leveldb"]).is_err());
    }
}
