//! Tether CLI tools: key generation, node ids, connect and listen.

#![forbid(unsafe_code)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use tether_common::NodeConfig;
use tether_crypto::frame::DATA_MAX_SIZE;
use tether_crypto::{
    handshake, CryptoProvider, DefaultProvider, HandshakeConfig, IdentityKeypair, PublicIdentity,
    SecureChannel,
};

#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(about = "Tether secret-handshake tools", version)]
struct Args {
    /// JSON node config file
    #[arg(long, global = true, env = "TETHER_CONFIG")]
    config: Option<PathBuf>,

    /// Private identity key file (overrides the config)
    #[arg(long, global = true, env = "TETHER_IDENTITY")]
    identity: Option<PathBuf>,

    /// Node id the peer must present
    #[arg(long, global = true, env = "TETHER_EXPECT")]
    expect: Option<String>,

    /// Socket read/write timeout in seconds
    #[arg(long, global = true, env = "TETHER_TIMEOUT")]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new Ed25519 identity keypair
    Keygen {
        /// Output file path (without extension)
        #[arg(short, long, default_value = "tether")]
        output: String,
    },

    /// Show the node id of a public key file
    ShowId {
        /// Public key file path
        #[arg(short, long)]
        key: PathBuf,
    },

    /// Dial a peer and run the handshake
    Connect {
        /// Peer address (host:port)
        #[arg(short, long)]
        server: String,

        /// Send this text and print the echoed reply
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Accept peers one at a time and echo what they send
    Listen {
        /// Listen address (overrides the config)
        #[arg(short, long)]
        addr: Option<String>,
    },
}

/// Config file values with command-line overrides applied.
fn resolve_config(args: &Args) -> Result<NodeConfig> {
    let mut config = match &args.config {
        Some(path) => NodeConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => NodeConfig::default(),
    };

    if let Some(identity) = &args.identity {
        config.identity_key = identity.clone();
    }
    if let Some(expect) = &args.expect {
        config.expected_peer = Some(expect.clone());
    }
    if let Some(timeout) = args.timeout {
        config.io_timeout_secs = Some(timeout);
    }
    if let Command::Listen { addr: Some(addr) } = &args.command {
        config.listen_addr = addr.clone();
    }

    config.validate()?;
    Ok(config)
}

struct Node {
    config: NodeConfig,
    identity: IdentityKeypair,
    handshake: HandshakeConfig,
    provider: Arc<dyn CryptoProvider>,
}

impl Node {
    fn from_config(config: NodeConfig) -> Result<Self> {
        let provider: Arc<dyn CryptoProvider> = Arc::new(DefaultProvider);
        let identity = IdentityKeypair::load(provider.as_ref(), &config.identity_key)
            .with_context(|| {
                format!(
                    "failed to load identity key {}",
                    config.identity_key.display()
                )
            })?;

        let mut handshake = HandshakeConfig::new();
        if let Some(expected) = config.expected_peer_bytes()? {
            handshake = handshake.expect_peer(expected);
        }

        info!(node_id = %identity.node_id(), "identity loaded");
        Ok(Self {
            config,
            identity,
            handshake,
            provider,
        })
    }

    fn secure(
        &self,
        stream: TcpStream,
    ) -> Result<(SecureChannel<TcpStream, TcpStream>, PublicIdentity)> {
        stream.set_read_timeout(self.config.io_timeout())?;
        stream.set_write_timeout(self.config.io_timeout())?;
        let reader = stream.try_clone()?;

        let (channel, peer) = handshake(
            reader,
            stream,
            &self.identity,
            Arc::clone(&self.provider),
            &self.handshake,
        )
        .context("handshake failed")?;
        Ok((channel, peer))
    }

    fn connect(&self, server: &str, message: Option<&str>) -> Result<()> {
        let stream =
            TcpStream::connect(server).with_context(|| format!("failed to connect to {}", server))?;
        let (mut channel, peer) = self.secure(stream)?;
        println!("Connected to {}", server);
        println!("Peer node id: {}", peer.node_id());

        if let Some(message) = message {
            channel.send(message.as_bytes())?;
            let reply = channel.receive(message.len())?;
            println!("Reply: {}", String::from_utf8_lossy(&reply));
        }

        channel.close()?;
        Ok(())
    }

    fn listen(&self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.listen_addr)
            .with_context(|| format!("failed to bind {}", self.config.listen_addr))?;
        println!("Listening on {}", listener.local_addr()?);

        for stream in listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("accept failed: {}", e);
                    continue;
                }
            };
            let remote = stream
                .peer_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "unknown".into());

            match self.serve(stream) {
                Ok(bytes) => info!(%remote, bytes, "peer disconnected"),
                Err(e) => warn!(%remote, "session ended: {:#}", e),
            }
        }
        Ok(())
    }

    /// Echo decrypted data until the peer hangs up. Returns bytes echoed.
    fn serve(&self, stream: TcpStream) -> Result<usize> {
        let (mut channel, peer) = self.secure(stream)?;
        info!(peer = %peer.node_id(), "peer authenticated");

        let mut buf = [0u8; DATA_MAX_SIZE];
        let mut total = 0;
        loop {
            let n = channel.read(&mut buf)?;
            if n == 0 {
                break;
            }
            channel.write_all(&buf[..n])?;
            total += n;
        }
        Ok(total)
    }
}

fn main() -> Result<()> {
    tether_common::init_tracing();

    let args = Args::parse();

    match &args.command {
        Command::Keygen { output } => {
            println!("Generating Ed25519 keypair...");

            let keypair = IdentityKeypair::generate(&DefaultProvider);
            let private_path = format!("{}.key", output);
            let public_path = format!("{}.pub", output);

            keypair.save(&private_path, &public_path)?;

            println!("Private key: {}", private_path);
            println!("Public key:  {}", public_path);
            println!("Node ID:     {}", keypair.node_id());
        }
        Command::ShowId { key } => {
            let public = IdentityKeypair::load_public(key)
                .with_context(|| format!("failed to read {}", key.display()))?;
            println!("{}", public.node_id());
        }
        Command::Connect { server, message } => {
            let node = Node::from_config(resolve_config(&args)?)?;
            node.connect(server, message.as_deref())?;
        }
        Command::Listen { .. } => {
            let node = Node::from_config(resolve_config(&args)?)?;
            node.listen()?;
        }
    }

    Ok(())
}
