//! ICT Inventory server
//!
//! Starts the Axum app over the sled store.
//!
//! Usage:
//!   cargo run --bin import_csv       # load a spreadsheet first
//!   cargo run --bin ict-inventory    # start the dashboard

use std::net::SocketAddr;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ict_inventory::permissions::EmptyGrantPolicy;
use ict_inventory::rest::create_router;
use ict_inventory::storage::Storage;
use ict_inventory::tunnel;

#[derive(Parser, Debug)]
#[command(name = "ict-inventory", about = "Inventory dashboard server")]
struct Options {
    /// Port to listen on
    #[arg(long, default_value_t = 5000)]
    port: u16,

    /// Directory for the sled store
    #[arg(long, env = "INVENTORY_DATA", default_value = "inventory_data")]
    data_dir: String,

    /// Skip the ngrok tunnel and serve on the LAN only
    #[arg(long)]
    no_tunnel: bool,

    /// Treat declared-but-empty location grants as "see nothing"
    /// instead of the default "see everything"
    #[arg(long)]
    strict_empty_grants: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let options = Options::parse();
    let policy = if options.strict_empty_grants {
        EmptyGrantPolicy::MatchNone
    } else {
        EmptyGrantPolicy::MatchAll
    };

    let storage = Storage::open(&options.data_dir)?;
    info!(
        data_dir = %options.data_dir,
        records = storage.record_count(),
        "store opened"
    );

    let app = create_router(storage, policy);

    let addr: SocketAddr = ([0, 0, 0, 0], options.port).into();
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "listening");

    if options.no_tunnel {
        tunnel::print_banner(options.port, None);
    } else {
        let port = options.port;
        tokio::spawn(async move {
            tunnel::launch(port).await;
        });
    }

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
