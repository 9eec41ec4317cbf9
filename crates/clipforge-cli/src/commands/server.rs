//! `clipforge server` — Start the ClipForge HTTP backend server.

pub async fn run(
    host: String,
    port: u16,
    db_path: String,
    config_path: Option<String>,
) -> Result<(), String> {
    let config = clipforge_server::ServerConfig {
        host: host.clone(),
        port,
        db_path,
        config_path,
    };

    println!("Starting ClipForge server on {}:{}...", host, port);

    let addr = clipforge_server::start_server(config).await?;
    println!("ClipForge server listening on http://{}", addr);

    // Keep the process running until interrupted
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for Ctrl+C: {}", e))?;

    println!("\nShutting down...");
    Ok(())
}
