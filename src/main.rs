use clap::Parser;

use kasa_tts::config::ServerConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::parse();
    kasa_tts::server::serve(config).await?;
    Ok(())
}
