pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod rag;
pub mod server;
pub mod store;

use agent::ChatAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Store Type: {}", args.store_type);
    info!("Provider Endpoint: {}", args.provider_base_url);
    info!("Provider Model: {}", args.provider_model);
    info!("Uploads Dir: {}", args.uploads_dir);
    info!("Prompts Path: {}", args.prompts_path);
    info!("Retrieval Enabled: {}", args.enable_retrieval);
    if args.enable_retrieval {
        info!(
            "Retrieval Endpoint: {}",
            args.retrieval_base_url.as_deref().unwrap_or("(unset)")
        );
        info!("Retrieval Limit: {}", args.retrieval_limit);
    }
    info!("-------------------------");

    let agent = ChatAgent::new(&args)?;
    let server = Server::new(args.server_addr.clone(), agent, args);
    server.run().await
}
