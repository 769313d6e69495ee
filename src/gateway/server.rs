//! Gateway server

use crate::cluster::{EtcdStore, Partitioner, TokenCoordinator};
use crate::common::{Config, Result};
use crate::gateway::fanout::HttpShardClient;
use crate::gateway::http::{create_router, GatewayState};
use std::sync::Arc;

pub struct Gateway {
    config: Config,
}

impl Gateway {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn serve(self) -> Result<()> {
        self.config.validate()?;

        tracing::info!("Starting tsgate gateway");
        tracing::info!("  HTTP API: {}", self.config.bind_addr);
        tracing::info!("  Store: {}", self.config.store_endpoints.join(","));
        tracing::info!("  Namespace: {}", self.config.namespace);
        tracing::info!("  Tokens: {}", self.config.num_tokens);

        let store = Arc::new(EtcdStore::connect(&self.config.store_endpoints).await?);
        let coordinator = Arc::new(TokenCoordinator::new(store, self.config.namespace.clone()));
        let shards = Arc::new(HttpShardClient::new(self.config.shard_timeout())?);

        let state = GatewayState {
            coordinator,
            partitioner: Partitioner::new(self.config.num_tokens),
            shards,
        };
        let router = create_router(state);

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!("Gateway ready");

        axum::serve(listener, router)
            .await
            .map_err(|e| crate::Error::Http(e.to_string()))?;

        Ok(())
    }
}
