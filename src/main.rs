mod config;

use api::{db::MemoryStore, Orchestrator};
use config::Config;
use core::{convert::Infallible, time::Duration};
use http_body_util::Full;
use hyper::{
    body::{Bytes, Incoming},
    server::conn::http1,
    service::service_fn,
    Method, Request, Response, StatusCode,
};
use hyper_util::rt::TokioIo;
use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};
use tokio::{net::TcpListener, runtime::Runtime, time};

type Quizzes = Orchestrator<MemoryStore>;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = Config::from_env()?;

    let runtime = Runtime::new()?;
    let quizzes = Orchestrator::new(Arc::new(MemoryStore::new()));
    runtime.block_on(serve(config, quizzes))
}

async fn serve(config: Config, quizzes: Quizzes) -> anyhow::Result<()> {
    let sweeper = tokio::spawn(sweep(quizzes.clone(), config.sweep_interval));

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
    let listener = TcpListener::bind(addr).await?;
    log::info!("listening on {addr}");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        let (stream, peer) = tokio::select! {
            biased;
            result = &mut shutdown => {
                result?;
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(err) => {
                    log::error!("failed to accept connection: {err}");
                    continue;
                }
            },
        };

        let quizzes = quizzes.clone();
        tokio::spawn(async move {
            let service = service_fn(move |req| respond(quizzes.clone(), req));
            if let Err(err) = http1::Builder::new().serve_connection(TokioIo::new(stream), service).await {
                log::error!("connection with {peer} failed: {err}");
            }
        });
    }

    log::info!("shutting down");
    sweeper.abort();
    Ok(())
}

/// Periodically reclaims the keys of expired quizzes.
async fn sweep(quizzes: Quizzes, period: Duration) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if let Err(err) = quizzes.purge_expired().await {
            log::error!("expiry sweep failed: {err}");
        }
    }
}

async fn respond(quizzes: Quizzes, req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    let health = req.method() == Method::GET && req.uri().path() == "/health";

    let (status, body) = if !health {
        (StatusCode::NOT_FOUND, "not found")
    } else if quizzes.health().await.is_ok() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    };

    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    Ok(response)
}
