use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use labscan::config::{self, LabscanConfig};
use labscan::models::{Demographics, Gender, MissingValuePolicy};
use labscan::pipeline::acquisition::DocumentKind;
use labscan::{ExtractionResponse, ReportProcessor};

#[derive(Parser)]
#[command(name = "labscan")]
#[command(about = "Extract and classify blood-test values from a lab report")]
#[command(version)]
struct Cli {
    /// Report to read (PDF, JPEG, PNG, TIFF or plain text)
    file: PathBuf,

    /// Document kind; detected from the file contents when omitted
    #[arg(long)]
    kind: Option<DocumentKind>,

    /// Patient age in years
    #[arg(long)]
    age: Option<u32>,

    /// Patient gender (M or F)
    #[arg(long)]
    gender: Option<Gender>,

    /// Config file (default: $LABSCAN_CONFIG, then ~/.labscan/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory with label_encoder.json and the classifier
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// What to report for a parameter mentioned without a value
    #[arg(long)]
    policy: Option<MissingValuePolicy>,

    /// Pretty-print the JSON response
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    labscan::init_tracing();
    let cli = Cli::parse();

    tracing::debug!("{} v{}", config::APP_NAME, config::APP_VERSION);

    let response = run(&cli).await;
    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&response)
    } else {
        serde_json::to_string(&response)
    };
    match rendered {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("failed to render response: {e}");
            return ExitCode::FAILURE;
        }
    }

    if response.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn run(cli: &Cli) -> ExtractionResponse {
    let mut config = match LabscanConfig::resolve(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => return ExtractionResponse::error(e.to_string()),
    };
    if let Some(dir) = &cli.model_dir {
        config.model_dir = dir.clone();
    }
    if let Some(policy) = cli.policy {
        config.missing_value_policy = policy;
    }

    let processor = match ReportProcessor::from_config(&config) {
        Ok(p) => Arc::new(p),
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return ExtractionResponse::error(e.to_string());
        }
    };

    let bytes = match tokio::fs::read(&cli.file).await {
        Ok(b) => b,
        Err(e) => {
            return ExtractionResponse::error(format!(
                "Cannot read {}: {e}",
                cli.file.display()
            ))
        }
    };

    processor
        .process_with_timeout(
            bytes,
            cli.kind,
            Demographics::new(cli.age, cli.gender),
            config.acquisition_timeout(),
        )
        .await
        .into()
}
