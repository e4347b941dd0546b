//! Agent wiring: local producer ingress → QoS dispatcher → upstream egress.

pub mod egress;
pub mod lifecycle;
pub mod server;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::agent::lifecycle::LifecycleError;
use crate::config::Config;
use crate::core::qos;

/// Owns the QoS handler's lifetime and the internal shutdown channel.
pub struct Agent {
    qos: Arc<qos::Handler>,
    shutdown: broadcast::Sender<()>,
}

impl Agent {
    pub fn new(qos: Arc<qos::Handler>) -> (Self, broadcast::Receiver<()>) {
        let (shutdown, shutdown_rx) = broadcast::channel(1);
        (Self { qos, shutdown }, shutdown_rx)
    }

    pub async fn start(&self) -> Result<(), LifecycleError> {
        let qos = Arc::clone(&self.qos);
        lifecycle::guarded_start(async move { qos.start().await }).await
    }

    pub async fn stop(&self) -> Result<(), LifecycleError> {
        let qos = Arc::clone(&self.qos);
        lifecycle::guarded_stop(async move { qos.stop().await }, &self.shutdown).await
    }
}

/// Runs the agent until a shutdown signal arrives.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let upstream = egress::TcpEgress::connect(&config.agent.remote_addr).await?;
    let handler = Arc::new(qos::Handler::new(Arc::new(upstream), config.qos.clone())?);

    let (agent, mut shutdown_rx) = Agent::new(Arc::clone(&handler));
    agent.start().await?;

    let listener = TcpListener::bind(&config.agent.listen_addr).await?;
    info!(addr = %config.agent.listen_addr, "agent accepting producers");

    let producer_server = tokio::spawn(server::serve(listener, Arc::clone(&handler)));

    wait_for_shutdown(&mut shutdown_rx).await;

    producer_server.abort();
    if let Err(err) = agent.stop().await {
        error!(%err, "stop hook failed");
        return Err(err.into());
    }

    Ok(())
}

async fn wait_for_shutdown(internal: &mut broadcast::Receiver<()>) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received SIGINT");
        }
        _ = terminate => {
            info!("received SIGTERM");
        }
        _ = internal.recv() => {
            info!("internal shutdown requested");
        }
    }
}
