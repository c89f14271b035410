//! `recvfile` — receives a single file sent by `sendfile` over UDP.

use std::fs::File;
use std::io::Write;
use std::net::SocketAddr;

use clap::Parser;
use rft_cli::adapter::DatagramChannel;
use rft_cli::paths;
use rft_transport::receiver::{Receiver, ReceiverConfig};
use rft_transport::TransportError;

/// Receive a single file sent by `sendfile`, writing it to
/// `<transmitted name>.recv`.
#[derive(Parser, Debug)]
#[command(name = "recvfile", about = "Receive a file over the rft transfer protocol")]
struct Cli {
    /// UDP port to listen on, in [18000, 18200].
    #[arg(short = 'p', long)]
    port: u16,

    /// Admissible receive window (matches the teacher's tunable-default practice).
    #[arg(long, default_value_t = 64)]
    window: u32,
}

fn main() -> anyhow::Result<()> {
    rft_cli::init_tracing();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        tracing::error!(error = %e, "recvfile failed");
        std::process::exit(1);
    }
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if !(rft_cli::MIN_PORT..=rft_cli::MAX_PORT).contains(&cli.port) {
        return Err(TransportError::BadArgument(format!(
            "port must be between {} and {}, got {}",
            rft_cli::MIN_PORT,
            rft_cli::MAX_PORT,
            cli.port
        ))
        .into());
    }

    let bind_addr: SocketAddr = ([0, 0, 0, 0], cli.port).into();
    let channel = DatagramChannel::bind(bind_addr).map_err(TransportError::LocalIo)?;
    tracing::info!(port = cli.port, "recvfile listening");

    let mut receiver = Receiver::new(ReceiverConfig { window: cli.window });
    let mut file: Option<File> = None;
    let mut peer: Option<SocketAddr> = None;

    loop {
        let (bytes, from) = match channel.recv().map_err(TransportError::LocalIo)? {
            Some(pair) => pair,
            None => continue,
        };
        peer.get_or_insert(from);
        let outcome = receiver.on_datagram(&bytes);

        if let Some(name) = outcome.started {
            let recv_path = paths::derive_recv_path(&name);
            paths::ensure_parent_dir(&recv_path).map_err(TransportError::LocalIo)?;
            tracing::info!(filename = %name, path = %recv_path.display(), "start received");
            file = Some(File::create(&recv_path).map_err(TransportError::LocalIo)?);
        }

        if !outcome.delivered.is_empty() {
            let f = file
                .as_mut()
                .expect("DATA cannot be delivered before a START opens the output file");
            for chunk in &outcome.delivered {
                f.write_all(chunk).map_err(TransportError::LocalIo)?;
            }
        }

        if let (Some(ack), Some(addr)) = (outcome.ack, peer) {
            channel.send_to(&ack, addr).map_err(TransportError::LocalIo)?;
        }

        if outcome.closed {
            tracing::info!(
                packets = receiver.stats().packets_delivered,
                bytes = receiver.stats().bytes_delivered,
                duplicates = receiver.stats().duplicates,
                "transfer complete"
            );
            break;
        }
    }

    Ok(())
}
