use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::ApiResult;
use crate::router::build_router;
use crate::state::AppState;

/// iDig trench sync server.
pub struct IdigServer {
    state: Arc<AppState>,
}

impl IdigServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            state: Arc::new(AppState::new(config)),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(Arc::clone(&self.state))
    }

    /// Start serving requests.
    pub async fn serve(self) -> ApiResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(&self.state.config.bind_addr).await?;
        tracing::info!("iDig server listening on {}", self.state.config.bind_addr);
        axum::serve(listener, app).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_construction() {
        let server = IdigServer::new(ServerConfig::default());
        assert_eq!(server.config().bind_addr, "0.0.0.0:9000".parse().unwrap());
    }

    #[test]
    fn router_builds() {
        let server = IdigServer::new(ServerConfig::default());
        let _router = server.router();
    }
}
