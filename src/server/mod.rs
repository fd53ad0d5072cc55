pub mod api;

use log::info;
use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::agent::ChatAgent;
use crate::cli::Args;

pub struct Server {
    addr: String,
    agent: ChatAgent,
    args: Args,
}

impl Server {
    pub fn new(addr: String, agent: ChatAgent, args: Args) -> Self {
        Self { addr, agent, args }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let addr = self.addr.parse::<SocketAddr>()?;

        let uploads_dir = PathBuf::from(&self.args.uploads_dir);
        std::fs::create_dir_all(&uploads_dir)?;

        let app = api::router(self.agent.clone(), uploads_dir);

        if self.args.enable_tls && self.args.tls_cert_path.is_some() && self.args.tls_key_path.is_some() {
            let cert_path = self.args.tls_cert_path.as_ref().unwrap();
            let key_path = self.args.tls_key_path.as_ref().unwrap();

            let tls_config =
                axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_path, key_path).await?;

            info!("Starting HTTPS API server on: https://{}", addr);
            axum_server::bind_rustls(addr, tls_config)
                .serve(app.into_make_service())
                .await?;
        } else {
            info!("Starting HTTP API server on: http://{}", addr);
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app.into_make_service()).await?;
        }

        Ok(())
    }
}
