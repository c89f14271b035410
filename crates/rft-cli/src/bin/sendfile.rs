//! `sendfile` — sends a single file to a listening `recvfile` over UDP.

use std::fs::File;
use std::io::BufReader;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;

use clap::Parser;
use quanta::Instant;
use rft_cli::adapter::DatagramChannel;
use rft_transport::sender::{Sender, SenderConfig};
use rft_transport::TransportError;

/// Send a single file to a listening `recvfile` instance.
#[derive(Parser, Debug)]
#[command(name = "sendfile", about = "Send a file over the rft transfer protocol")]
struct Cli {
    /// Receiver address as `host:port`.
    #[arg(short = 'r', long)]
    receiver: String,

    /// Path of the file to send.
    #[arg(short = 'f', long)]
    file: PathBuf,

    /// Static window size when congestion control is disabled, or the
    /// starting window otherwise.
    #[arg(long, default_value_t = 16)]
    window: u32,

    /// Disable AIMD congestion control and hold the window fixed at `--window`.
    #[arg(long, default_value_t = false)]
    no_congestion_control: bool,
}

fn main() -> anyhow::Result<()> {
    rft_cli::init_tracing();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        tracing::error!(error = %e, "sendfile failed");
        std::process::exit(1);
    }
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let peer = resolve_peer(&cli.receiver)?;
    let file_name = cli
        .file
        .file_name()
        .ok_or_else(|| TransportError::BadArgument(format!("not a file path: {}", cli.file.display())))?
        .to_string_lossy()
        .into_owned();

    let config = SenderConfig {
        window: cli.window,
        congestion_control: !cli.no_congestion_control,
        ..SenderConfig::default()
    };
    let poll_interval = config.recv_poll_interval;
    let mut reader = BufReader::new(File::open(&cli.file).map_err(TransportError::LocalIo)?);
    let mut sender = Sender::new(config);

    let channel = DatagramChannel::unbound().map_err(TransportError::LocalIo)?;
    channel
        .set_deadline(Some(poll_interval))
        .map_err(TransportError::LocalIo)?;

    let now = Instant::now();
    let start = sender.begin(&file_name, now);
    channel.send_to(&start, peer).map_err(TransportError::LocalIo)?;
    tracing::info!(file = %file_name, receiver = %peer, "sendfile started");

    loop {
        let now = Instant::now();

        if let Some((bytes, _)) = channel.recv().map_err(TransportError::LocalIo)? {
            let outcome = sender.on_datagram(&bytes, now);
            for wire in outcome.retransmits {
                channel.send_to(&wire, peer).map_err(TransportError::LocalIo)?;
            }
            if outcome.closed {
                break;
            }
        }

        for wire in sender.fill_window(&mut reader, now).map_err(TransportError::LocalIo)? {
            channel.send_to(&wire, peer).map_err(TransportError::LocalIo)?;
        }

        for wire in sender.check_timeouts(now) {
            channel.send_to(&wire, peer).map_err(TransportError::LocalIo)?;
        }
        if sender.is_failed() {
            return Err(TransportError::PeerUnreachable.into());
        }

        if let Some(end) = sender.try_close(now) {
            channel.send_to(&end, peer).map_err(TransportError::LocalIo)?;
        }
        if sender.is_done() {
            break;
        }
    }

    tracing::info!(
        packets = sender.stats().packets_sent,
        bytes = sender.stats().bytes_sent,
        retransmissions = sender.stats().retransmissions,
        "transfer complete"
    );
    Ok(())
}

fn resolve_peer(receiver: &str) -> anyhow::Result<SocketAddr> {
    let addr = receiver
        .to_socket_addrs()
        .map_err(|e| TransportError::BadArgument(format!("invalid receiver address {receiver:?}: {e}")))?
        .next()
        .ok_or_else(|| TransportError::BadArgument(format!("invalid receiver address {receiver:?}")))?;
    Ok(addr)
}
