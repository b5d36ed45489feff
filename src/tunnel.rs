//! Optional ngrok tunnel so the dashboard can be reached from outside the
//! LAN. Best effort only: if the binary is missing or the local API never
//! answers, the server keeps running on the LAN address.

use std::net::UdpSocket;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

/// Local API ngrok exposes once a tunnel is up.
const NGROK_API: &str = "http://127.0.0.1:4040/api/tunnels";
const POLL_ATTEMPTS: u32 = 10;
const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Deserialize)]
struct TunnelsResponse {
    tunnels: Vec<TunnelInfo>,
}

#[derive(Deserialize)]
struct TunnelInfo {
    public_url: String,
    proto: String,
}

/// Find an ngrok binary: a copy next to the server first, then PATH.
pub fn find_ngrok() -> Option<PathBuf> {
    let local = PathBuf::from("./ngrok");
    if local.is_file() {
        return Some(local);
    }
    let on_path = Command::new("ngrok")
        .arg("version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false);
    on_path.then(|| PathBuf::from("ngrok"))
}

/// Spawn `ngrok http <port>` detached from our stdio.
pub fn spawn_ngrok(binary: &PathBuf, port: u16) -> std::io::Result<Child> {
    Command::new(binary)
        .arg("http")
        .arg(port.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
}

/// Poll the local ngrok API until it reports an https (or any) tunnel.
pub async fn wait_for_public_url(client: &reqwest::Client) -> Option<String> {
    for _ in 0..POLL_ATTEMPTS {
        tokio::time::sleep(POLL_INTERVAL).await;
        let response = match client.get(NGROK_API).send().await {
            Ok(r) => r,
            Err(_) => continue, // API not up yet
        };
        let parsed: TunnelsResponse = match response.json().await {
            Ok(p) => p,
            Err(_) => continue,
        };
        if let Some(url) = pick_tunnel(&parsed.tunnels) {
            return Some(url);
        }
    }
    None
}

fn pick_tunnel(tunnels: &[TunnelInfo]) -> Option<String> {
    tunnels
        .iter()
        .find(|t| t.proto == "https")
        .or_else(|| tunnels.first())
        .map(|t| t.public_url.clone())
}

/// LAN address as seen by peers. The socket is never written to; connecting
/// a UDP socket just makes the OS pick the outbound interface.
pub fn local_ip() -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    Some(socket.local_addr().ok()?.ip().to_string())
}

/// Start a tunnel and print the access banner. Failures are logged and
/// swallowed; the caller's server loop is unaffected.
pub async fn launch(port: u16) {
    let Some(binary) = find_ngrok() else {
        warn!("ngrok not found (looked at ./ngrok and PATH); LAN access only");
        print_banner(port, None);
        return;
    };

    match spawn_ngrok(&binary, port) {
        Ok(_child) => {
            info!(binary = %binary.display(), "ngrok started");
            let client = reqwest::Client::new();
            let public_url = wait_for_public_url(&client).await;
            if public_url.is_none() {
                warn!("ngrok started but no tunnel appeared on its local API");
            }
            print_banner(port, public_url.as_deref());
        }
        Err(err) => {
            warn!("could not start ngrok: {err}");
            print_banner(port, None);
        }
    }
}

/// Console banner with every address the app answers on.
pub fn print_banner(port: u16, public_url: Option<&str>) {
    println!("============================================================");
    println!("🚀 ICT Inventory is running");
    println!("   Local:   http://127.0.0.1:{port}");
    if let Some(ip) = local_ip() {
        println!("   Network: http://{ip}:{port}");
    }
    match public_url {
        Some(url) => println!("   Public:  {url}"),
        None => println!("   Public:  (no tunnel)"),
    }
    println!("   Sign in: admin/admin123 (full) or user/user123 (read-only)");
    println!("============================================================");
}
