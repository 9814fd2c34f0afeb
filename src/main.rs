use clap::Parser;
use tracing_subscriber::EnvFilter;

use form_autofill::cli::commands::{cmd_analyze, cmd_serve};
use form_autofill::cli::config::{Cli, Commands, load_config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = load_config(cli.config.as_deref());
    // CLI > config file > defaults
    if let Some(endpoint) = cli.llm_endpoint.as_deref() {
        config.llm.endpoint = endpoint.to_string();
    }
    if let Some(model) = cli.llm_model.as_deref() {
        config.llm.model = model.to_string();
    }

    match cli.command {
        Commands::Serve {
            ref bind,
            ref driver_endpoint,
            ref mapper,
        } => {
            cmd_serve(
                &config,
                bind.as_deref(),
                driver_endpoint.as_deref(),
                mapper,
                cli.profile.as_deref(),
            )
            .await?;
        }
        Commands::Analyze {
            ref snapshot,
            ref mapper,
        } => {
            cmd_analyze(&config, snapshot, mapper, cli.profile.as_deref()).await?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "form_autofill=info",
        1 => "form_autofill=debug",
        _ => "form_autofill=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
