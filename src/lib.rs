pub mod agent;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod history;
pub mod llm;
pub mod media;
pub mod models;
pub mod server;

use agent::ChatAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    args.validate()?;

    info!("--- Core Configuration ---");
    info!("Listen Address: {}:{}", args.server_host, args.port.unwrap_or_default());
    info!("TLS Enabled: {}", args.enable_tls);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    if let Some(base_url) = &args.chat_base_url {
        info!("Chat Base URL: {}", base_url);
    }
    info!("History Store Type: {}", args.history_type);
    info!("Default Model: {}", args.effective_default_model());
    info!("Baseline Model: {}", args.baseline_model);
    info!("Vision Model: {} (enabled: {})", args.vision_model, args.vision_enabled);
    info!("Max Tokens: {} text / {} vision", args.max_tokens, args.vision_max_tokens);
    info!("Upload Limit: {} bytes", args.upload_max_bytes);
    info!(
        "Media Host: {}",
        args.cloudinary_cloud_name.as_deref().unwrap_or("not configured")
    );
    info!("-------------------------");

    let agent = Arc::new(ChatAgent::new(&args).await?);
    let server = Server::new(agent, args)?;
    server.run().await?;

    Ok(())
}
