//! keyturn server entry point
//!
//! Wires the rotation core to its native collaborators: in-memory store,
//! RS256 signer from a PEM key, channel-backed audit log, and a periodic
//! retention sweep.

use std::sync::Arc;
use std::time::Duration;

use keyturn::platform::{ChannelAuditSink, ProcessEnv, SystemClock};
use keyturn::signer::JwtAccessTokenIssuer;
use keyturn::AppState;
use keyturn_core::cleanup;
use keyturn_core::config::Config;
use keyturn_core::platform::{Environment, Store};
use keyturn_core::store::MemoryStore;

const AUDIT_BUFFER: usize = 1024;
const SWEEP_INTERVAL_SECS: u64 = 300;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let env = ProcessEnv;
    let config = Config::from_env(&env).expect("invalid configuration");

    let port: u16 = env
        .get_var("PORT")
        .unwrap_or_else(|_| "8080".into())
        .parse()
        .expect("PORT must be a number");

    let issuer_name = env
        .get_var("KEYTURN_ISSUER")
        .unwrap_or_else(|_| "https://keyturn.local".into());
    let signing_key = env
        .get_secret("KEYTURN_SIGNING_KEY")
        .expect("KEYTURN_SIGNING_KEY must be set to an RSA private key (PEM)");

    let issuer = JwtAccessTokenIssuer::from_pem(issuer_name, &signing_key, Box::new(SystemClock))
        .expect("invalid KEYTURN_SIGNING_KEY");

    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let state = Arc::new(AppState {
        store: store.clone(),
        issuer: Arc::new(issuer),
        audit: Arc::new(ChannelAuditSink::spawn(AUDIT_BUFFER)),
        clock: Arc::new(SystemClock),
        config: config.clone(),
    });

    // Periodic retention sweep for dead families
    {
        let store = store.clone();
        let config = config.clone();
        tokio::spawn(async move {
            let clock = SystemClock;
            let mut ticker = tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
            loop {
                ticker.tick().await;
                match cleanup::sweep(store.as_ref(), &clock, &config).await {
                    Ok(stats) if stats.removed > 0 => {
                        tracing::info!(removed = stats.removed, "retention sweep");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "retention sweep failed"),
                }
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .expect("failed to bind");
    tracing::info!(port, "keyturn listening");

    if let Err(e) = keyturn::serve(listener, state).await {
        tracing::error!(error = %e, "server exited");
    }
}
