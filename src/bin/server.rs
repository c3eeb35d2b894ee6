use clap::Parser;

use cachette::config::{
    config_host_or_default, config_port_or_default, set_global_config, set_log_request, Config,
};
use cachette::metrics::PrometheusServer;
use cachette::server;

use std::process::exit;

use tokio::net::TcpListener;
use tokio::{fs, signal};

#[tokio::main]
pub async fn main() -> cachette::Result<()> {
    let cli = Cli::parse();
    let mut config: Option<Config> = None;

    if let Some(config_file_name) = cli.config {
        let config_content = fs::read_to_string(config_file_name)
            .await
            .expect("Failed to read config file");

        // deserialize toml config
        config = match toml::from_str(&config_content) {
            Ok(d) => Some(d),
            Err(e) => {
                println!("Unable to load config file {e}");
                exit(1);
            }
        };
    };

    match &config {
        Some(c) => {
            println!("{c:?}");
            set_global_config(c.clone())
        }
        None => (),
    }
    set_log_request(cli.log_request);

    let c_port = config_port_or_default();
    let port = cli.port.unwrap_or(c_port);
    let c_host = config_host_or_default();
    let host = cli.host.as_deref().unwrap_or(&c_host);

    if let Some(prom_port) = cli.prom_port {
        let prom_listen = cli
            .prom_listen_addr
            .unwrap_or_else(|| "0.0.0.0".to_owned());
        let prom_server = PrometheusServer::new(format!("{}:{}", prom_listen, prom_port));
        tokio::spawn(async move {
            if let Err(e) = prom_server.run().await {
                println!("prometheus exporter failed, {e}");
            }
        });
    }

    // Bind a TCP listener
    let listener = TcpListener::bind(&format!("{}:{}", host, port)).await?;

    server::run(listener, signal::ctrl_c()).await?;

    Ok(())
}

#[derive(Parser, Debug)]
#[clap(
    name = "cachette-server",
    version,
    author,
    about = "An in-memory cache server"
)]
struct Cli {
    #[clap(long = "host")]
    host: Option<String>,

    #[clap(long = "port")]
    port: Option<u16>,

    /// Log each raw request buffer.
    #[clap(long = "log_request")]
    log_request: bool,

    #[clap(long = "promlisten")]
    prom_listen_addr: Option<String>,

    #[clap(long = "promport")]
    prom_port: Option<u16>,

    #[clap(long = "config")]
    config: Option<String>,
}
