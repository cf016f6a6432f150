use tracing::{event, Level};
use tracing_subscriber::EnvFilter;

use courier::keypair::Keypair;
use courier::networking::network::{Network, Relay};

const DEFAULT_PORT: u16 = 8080;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut settings = config::Config::default();
    if let Err(err) = settings.merge(config::Environment::new()) {
        event!(Level::ERROR, "failed to read environment: {}", err);
        std::process::exit(1);
    }
    let port = settings.get::<u16>("port").unwrap_or(DEFAULT_PORT);

    let seed_peers = parse_seed_peers(std::env::args().collect());

    let keypair = Keypair::new();
    event!(Level::INFO, "node identity {}", keypair.get_publickey_hex());

    let listen_url = format!("ws://127.0.0.1:{}", port);
    let relay = Relay::new(keypair, listen_url);
    let network = Network::new(relay, port, seed_peers);
    if let Err(err) = network.run().await {
        event!(Level::ERROR, "startup failed: {}", err);
        std::process::exit(1);
    }
}

/// Every value following a `--connect` flag is a seed peer URL.
fn parse_seed_peers(args: Vec<String>) -> Vec<String> {
    let mut seed_peers = vec![];
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        if arg == "--connect" {
            match iter.next() {
                Some(address) => seed_peers.push(address),
                None => eprintln!("--connect requires a peer URL"),
            }
        }
    }
    seed_peers
}
