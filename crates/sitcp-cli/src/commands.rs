//! Subcommand implementations.
//!
//! Each command builds its own client or connection, so sockets are closed
//! when the command returns, on success and on error alike.

use std::{
    fs::File,
    io::{BufWriter, Write},
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    num::NonZeroU32,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use sitcp_core::{
    Acquisition, AcquisitionConfig, AnalysisConfig, DecoderConfig, RbcpClient, RbcpConfig,
    RetryPolicy, Termination, TimingAnalysis,
    transport::{TcpFeed, UdpLink},
};
use sitcp_proto::hexfmt::{hexdump, to_hex};

use crate::{
    cli::{Cli, Command},
    error::{CliError, Result},
};

/// Feed reads time out this often so a Ctrl-C is noticed promptly.
const FEED_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Run the parsed command line.
pub fn run(cli: Cli) -> Result<()> {
    let endpoint = SocketAddr::V4(SocketAddrV4::new(cli.target, cli.port));
    let rbcp = RbcpConfig {
        timeout: Duration::from_millis(cli.timeout_ms),
        retry: RetryPolicy::attempts(NonZeroU32::new(cli.retries).unwrap_or(NonZeroU32::MIN)),
        ..RbcpConfig::new(endpoint)
    };

    match cli.command {
        Command::Read { addr, len, raw_hex } => {
            let data = connect(rbcp)?.read(addr, usize::from(len))?;
            if raw_hex {
                println!("{}", to_hex(&data));
            } else {
                println!("{}", hexdump(&data, addr));
            }
        },
        Command::Write { addr, data, verify, quiet } => {
            let mut client = connect(rbcp)?;
            let ack = client.write(addr, &data.0)?;
            if verify {
                client.verify(addr, &data.0)?;
            }
            if !quiet {
                println!("WROTE {} bytes to 0x{addr:08X}", data.0.len());
                println!("ACK : {}", to_hex(&ack));
            }
        },
        Command::SetIp { new_ip, quiet } => {
            connect(rbcp)?.set_device_ip(new_ip)?;
            if !quiet {
                println!("EEPROM IP set to {new_ip} (FC18-1B = {})", to_hex(&new_ip.octets()));
                println!("Power-cycle the board, then ping the new IP.");
            }
        },
        Command::Acquire { feed_port, out, events, resync, connect_timeout_ms } => {
            let addr = SocketAddr::V4(SocketAddrV4::new(cli.target, feed_port));
            let config = AcquisitionConfig {
                decoder: DecoderConfig { target_good_frames: events, resync: resync.into() },
                ..AcquisitionConfig::default()
            };
            acquire(addr, &out, config, Duration::from_millis(connect_timeout_ms))?;
        },
        Command::Analyze { file, lsb_ns, bins, max_ns } => {
            let config = AnalysisConfig { lsb_ns, bins, low_ns: 0.0, high_ns: max_ns };
            analyze(&file, config)?;
        },
    }

    Ok(())
}

fn connect(config: RbcpConfig) -> Result<RbcpClient<UdpLink>> {
    let local = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));
    let link = UdpLink::bind(local).map_err(|e| CliError::Setup(format!("bind UDP socket: {e}")))?;
    Ok(RbcpClient::new(link, config))
}

fn acquire(
    addr: SocketAddr,
    out: &Path,
    config: AcquisitionConfig,
    connect_timeout: Duration,
) -> Result<()> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        tracing::info!("received interrupt, stopping");
        flag.store(true, Ordering::Relaxed);
    })
    .map_err(|e| CliError::Setup(format!("install Ctrl-C handler: {e}")))?;

    let feed = TcpFeed::connect(addr, connect_timeout)
        .map_err(|source| CliError::Connect { addr, source })?;
    feed.set_read_timeout(Some(FEED_POLL_INTERVAL))
        .map_err(|source| CliError::Connect { addr, source })?;

    let file =
        File::create(out).map_err(|source| CliError::File { path: out.to_path_buf(), source })?;
    let mut sink = BufWriter::new(file);

    let report = Acquisition::new(config).run(feed, &mut sink, &cancel)?;
    sink.flush().map_err(|source| CliError::File { path: out.to_path_buf(), source })?;

    let summary = report.summary;
    println!("==== Summary ====");
    println!("Termination               : {:?}", report.termination);
    println!("Total frames (12B parsed) : {}", summary.total_frames);
    println!("Good frames (used)        : {}", summary.good_frames);
    println!("Frames with bad header    : {}", summary.bad_header);
    println!("Frames with bad footer    : {}", summary.bad_footer);
    println!("Invalid frames            : {}", summary.invalid_frames());
    if summary.skipped_bytes > 0 {
        println!("Bytes skipped (resync)    : {}", summary.skipped_bytes);
    }
    println!("Binary data written to    : {}", out.display());
    match summary.loss_rate() {
        Some(rate) => println!("Loss rate (invalid/total) : {:.3}%", rate * 100.0),
        None => println!("No frames were parsed; loss rate is undefined."),
    }

    if report.termination == Termination::PeerClosed
        && summary.good_frames < config.decoder.target_good_frames
    {
        tracing::warn!(
            good_frames = summary.good_frames,
            target = config.decoder.target_good_frames,
            "peer closed before the target was reached"
        );
    }
    Ok(())
}

fn analyze(path: &Path, config: AnalysisConfig) -> Result<()> {
    let file =
        File::open(path).map_err(|source| CliError::File { path: path.to_path_buf(), source })?;
    let analysis = TimingAnalysis::from_reader(config, std::io::BufReader::new(file))
        .map_err(|source| CliError::File { path: path.to_path_buf(), source })?;

    print!("{}", render_analysis(&analysis));
    Ok(())
}

/// Text report of an analysis: totals, Δt statistics, busiest channels with
/// their most common Δt, and the non-empty histogram bins.
fn render_analysis(analysis: &TimingAnalysis) -> String {
    use std::fmt::Write as _;

    let mut out = String::new();
    let _ = writeln!(out, "Total events  : {}", analysis.event_count());
    let _ = writeln!(out, "Used pairs    : {}", analysis.used_pairs());
    if analysis.trailing_bytes() > 0 {
        let _ = writeln!(out, "Ignored tail  : {} bytes", analysis.trailing_bytes());
    }

    if let (Some(min), Some(max), Some(mean)) =
        (analysis.min_dt_ns(), analysis.max_dt_ns(), analysis.mean_dt_ns())
    {
        let _ = writeln!(out, "Δt min/mean/max [ns] : {min:.1} / {mean:.1} / {max:.1}");
    }

    let mut channels: Vec<(usize, u64)> = analysis
        .channel_counts()
        .iter()
        .copied()
        .enumerate()
        .filter(|&(_, count)| count > 0)
        .collect();
    channels.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    if !channels.is_empty() {
        let _ = writeln!(out, "Channels (id: count):");
        for &(id, count) in channels.iter().take(16) {
            let peak = u8::try_from(id)
                .ok()
                .and_then(|channel| analysis.channel_histogram(channel))
                .and_then(|h| h.peak().map(|(bin, _)| h.bin_low(bin)));
            match peak {
                Some(peak_ns) => {
                    let _ = writeln!(out, "  {id:3}: {count}  (Δt peak {peak_ns:.1} ns)");
                },
                None => {
                    let _ = writeln!(out, "  {id:3}: {count}");
                },
            }
        }
    }

    let histogram = analysis.histogram();
    let _ = writeln!(
        out,
        "Δt histogram: {} bins of {:.3} ns, underflow {}, overflow {}",
        histogram.bins().len(),
        histogram.bin_width(),
        histogram.underflow(),
        histogram.overflow()
    );
    for (i, &count) in histogram.bins().iter().enumerate().filter(|(_, c)| **c > 0) {
        let _ = writeln!(out, "  [{:9.1}, {:9.1}) {count}", histogram.bin_low(i), histogram.bin_low(i + 1));
    }
    out
}
