use clap::Parser;
use tax_regime_sim::api::{Cli, Command, run_cli, run_http_server};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => {
            let output = tokio::task::spawn_blocking(move || run_cli(&args)).await;
            match output {
                Ok(Ok(json)) => println!("{json}"),
                Ok(Err(e)) => {
                    eprintln!("Error: {e}");
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("Simulation task failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Command::Serve { port } => {
            if let Err(e) = run_http_server(port).await {
                eprintln!("Server error: {e}");
                std::process::exit(1);
            }
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tax_regime_sim=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
