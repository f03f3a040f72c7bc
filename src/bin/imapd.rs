#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! IMAP4rev1 server over the in-memory demo mail store
//!
//! Log in with `username` / `password`. Useful for protocol
//! experiments and as a template for wiring a real backend.

use clap::Parser;
use imapd::{MemStore, Server, ServerConfig, Transcript};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "imapd")]
#[command(about = "IMAP4rev1 server backed by an in-memory mail store")]
struct Args {
    /// Listen address (overrides IMAPD_ADDR)
    #[arg(long)]
    addr: Option<String>,

    /// Protocol transcript file, "-" for stderr
    /// (overrides IMAPD_TRANSCRIPT)
    #[arg(long)]
    transcript: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = ServerConfig::from_env()?;
    if let Some(addr) = args.addr {
        config.addr = addr;
    }
    if let Some(transcript) = args.transcript {
        config.transcript = Some(transcript);
    }

    let mut server = Server::new(Arc::new(MemStore::demo()));
    server.set_addr(config.addr);

    if let Some(path) = &config.transcript {
        if path.as_os_str() == "-" {
            server.set_transcript(Transcript::to_writer(std::io::stderr()));
        } else {
            server.set_transcript(Transcript::to_writer(File::create(path)?));
        }
    }

    server.listen_and_serve().await?;
    Ok(())
}
