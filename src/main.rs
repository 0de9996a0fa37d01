use anypoint_metrics_report::{config::Config, pipeline};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // A missing .env file is fine, the variables may come from the environment
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Configuration problems degrade the report, they never stop the run
    let (config, problems) = Config::from_env_partial();
    for problem in &problems {
        error!("Configuration: {}", problem);
    }
    info!("Reporting on environment {}", config.environment);
    tracing::debug!("{:?}", config);

    let summary = pipeline::run(&config).await;
    info!("Run summary\n{}", summary);
}
