//! Command-line arguments.

use std::{net::Ipv4Addr, path::PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use sitcp_core::{
    ResyncPolicy,
    config::{DEFAULT_BOARD_IP, DEFAULT_FEED_PORT, DEFAULT_RBCP_PORT},
};
use sitcp_proto::hexfmt::parse_hex_bytes;

/// SiTCP register access (RBCP over UDP) and data acquisition (TCP).
#[derive(Debug, Parser)]
#[command(name = "sitcp", version, about)]
pub struct Cli {
    /// Board IPv4 address
    #[arg(long, global = true, default_value_t = DEFAULT_BOARD_IP)]
    pub target: Ipv4Addr,

    /// RBCP UDP port
    #[arg(long, global = true, default_value_t = DEFAULT_RBCP_PORT)]
    pub port: u16,

    /// Per-attempt reply timeout in milliseconds
    #[arg(long, global = true, default_value_t = 300, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_ms: u64,

    /// Attempts per RBCP transaction
    #[arg(long, global = true, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    pub retries: u32,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Read registers and print a hexdump
    Read {
        /// Start address (e.g. 0xFFFFFC18)
        #[arg(long, value_parser = parse_address)]
        addr: u32,

        /// Bytes to read (1..255)
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..=255))]
        len: u16,

        /// Print bytes as one hex string
        #[arg(long)]
        raw_hex: bool,
    },

    /// Write registers
    Write {
        /// Start address (e.g. 0xFFFFFC18)
        #[arg(long, value_parser = parse_address)]
        addr: u32,

        /// Hex bytes: "00", "C0A80A14" or "C0:A8:0A:14"
        #[arg(long, value_parser = parse_data)]
        data: HexBytes,

        /// Read back and verify
        #[arg(long)]
        verify: bool,

        /// No stdout on success
        #[arg(long)]
        quiet: bool,
    },

    /// Store a new board IP address in EEPROM
    SetIp {
        /// New IPv4 address (e.g. 192.168.10.20)
        #[arg(long)]
        new_ip: Ipv4Addr,

        /// No stdout on success
        #[arg(long)]
        quiet: bool,
    },

    /// Record good frames from the TCP data feed
    Acquire {
        /// TCP port of the data feed
        #[arg(long, default_value_t = DEFAULT_FEED_PORT)]
        feed_port: u16,

        /// Record file
        #[arg(long, default_value = "sitcp_data.dat")]
        out: PathBuf,

        /// Good frames to collect
        #[arg(long, default_value_t = 1000)]
        events: u64,

        /// Behavior after a bad header
        #[arg(long, value_enum, default_value_t = Resync::Fixed)]
        resync: Resync,

        /// Connect timeout in milliseconds
        #[arg(long, default_value_t = 3000, value_parser = clap::value_parser!(u64).range(1..))]
        connect_timeout_ms: u64,
    },

    /// Time-difference statistics of a record file
    Analyze {
        /// Record file written by `acquire`
        file: PathBuf,

        /// Nanoseconds per timestamp count
        #[arg(long, default_value_t = 2.0)]
        lsb_ns: f64,

        /// Histogram bins over [0, --max-ns)
        #[arg(long, default_value_t = 1000)]
        bins: usize,

        /// Upper histogram edge in ns
        #[arg(long, default_value_t = 1000.0)]
        max_ns: f64,
    },
}

/// Framing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Resync {
    /// Every 12-byte window is a frame
    Fixed,
    /// Skip to the next header marker after a bad header
    Scan,
}

impl From<Resync> for ResyncPolicy {
    fn from(resync: Resync) -> Self {
        match resync {
            Resync::Fixed => Self::FixedOffset,
            Resync::Scan => Self::ScanForHeader,
        }
    }
}

/// Parsed `--data` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

fn parse_data(s: &str) -> Result<HexBytes, String> {
    parse_hex_bytes(s).map(HexBytes).map_err(|e| e.to_string())
}

/// Decimal, or hex with a `0x` prefix. Underscores are ignored.
fn parse_address(s: &str) -> Result<u32, String> {
    let cleaned = s.trim().replace('_', "");
    let parsed = match cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => cleaned.parse(),
    };
    parsed.map_err(|e| format!("invalid address {s:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn read_with_globals() {
        let cli = Cli::try_parse_from([
            "sitcp", "--target", "10.0.0.5", "--retries", "5", "read", "--addr", "0xFFFF_FC18",
            "--len", "4",
        ])
        .unwrap();

        assert_eq!(cli.target, Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(cli.retries, 5);
        assert_eq!(cli.port, 4660);
        assert!(matches!(cli.command, Command::Read { addr: 0xFFFF_FC18, len: 4, raw_hex: false }));
    }

    #[test]
    fn write_data_formats() {
        for data in ["C0A80A14", "C0:A8:0A:14", "c0 a8 0a 14"] {
            let cli =
                Cli::try_parse_from(["sitcp", "write", "--addr", "16", "--data", data]).unwrap();
            let Command::Write { addr, data, .. } = cli.command else {
                panic!("expected write");
            };
            assert_eq!(addr, 16);
            assert_eq!(data, HexBytes(vec![0xC0, 0xA8, 0x0A, 0x14]));
        }
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Cli::try_parse_from(["sitcp", "read", "--addr", "0x10", "--len", "0"]).is_err());
        assert!(Cli::try_parse_from(["sitcp", "read", "--addr", "0x10", "--len", "256"]).is_err());
        assert!(Cli::try_parse_from(["sitcp", "write", "--addr", "zz", "--data", "00"]).is_err());
        assert!(Cli::try_parse_from(["sitcp", "write", "--addr", "1", "--data", "ABC"]).is_err());
        assert!(Cli::try_parse_from(["sitcp", "--timeout-ms", "0", "set-ip", "--new-ip", "1.2.3.4"]).is_err());
    }

    #[test]
    fn acquire_defaults() {
        let cli = Cli::try_parse_from(["sitcp", "acquire", "--resync", "scan"]).unwrap();
        let Command::Acquire { feed_port, events, resync, out, .. } = cli.command else {
            panic!("expected acquire");
        };
        assert_eq!(feed_port, 24);
        assert_eq!(events, 1000);
        assert_eq!(ResyncPolicy::from(resync), ResyncPolicy::ScanForHeader);
        assert_eq!(out, PathBuf::from("sitcp_data.dat"));
    }
}
