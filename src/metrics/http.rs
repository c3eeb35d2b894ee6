use crate::config::LOGGER;

use std::convert::Infallible;
use std::net::SocketAddr;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};
use prometheus::{Encoder, TextEncoder};
use slog::info;

pub struct PrometheusServer {
    listen_addr: String,
}

impl PrometheusServer {
    pub fn new(listen_addr: String) -> PrometheusServer {
        PrometheusServer { listen_addr }
    }

    pub async fn run(&self) -> crate::Result<()> {
        info!(LOGGER, "Prometheus Server Listen on: {}", &self.listen_addr);

        let addr: SocketAddr = self.listen_addr.parse()?;
        let make_svc =
            make_service_fn(|_conn| async { Ok::<_, Infallible>(service_fn(metric)) });
        Server::bind(&addr).serve(make_svc).await?;
        Ok(())
    }
}

async fn metric(_req: Request<Body>) -> Result<Response<Body>, Infallible> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer).unwrap();
    Ok(Response::new(Body::from(buffer)))
}
