use anyhow::{anyhow, Context};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use image_handler::config::Config;
use image_handler::request::security::{sign_path, string_to_sign};
use image_handler::secrets::StaticSecretProvider;
use image_handler::{ImageHandlerEvent, ImageRequestHandler};

/// Image request handler - resolves image requests into transform instructions
#[derive(Parser, Debug)]
#[command(name = "image-handler")]
#[command(version, about, long_about = None)]
struct Args {
    /// Event JSON file in the API-Gateway shape
    #[arg(short, long, conflicts_with = "path", required_unless_present = "path")]
    event: Option<PathBuf>,

    /// Request path, used instead of an event file
    #[arg(short, long)]
    path: Option<String>,

    /// YAML configuration file; environment variables are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Value of the signing secret named by the configuration
    #[arg(long)]
    secret: Option<String>,

    /// Accept header to negotiate the output format with
    #[arg(long)]
    accept: Option<String>,

    /// Expiry timestamp (YYYYMMDDTHHMMSSZ)
    #[arg(long)]
    expires: Option<String>,

    /// Signature of the request path
    #[arg(long)]
    signature: Option<String>,

    /// Print the signature for the request path (and --expires) and exit
    #[arg(long)]
    sign: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path),
        None => Config::from_env(),
    }
    .map_err(|e| anyhow!("Failed to load configuration: {}", e))?;
    config
        .validate()
        .map_err(|e| anyhow!("Invalid configuration: {}", e))?;

    image_handler::logging::init_subscriber(&config.log_level)
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    tracing::info!(
        source_buckets = config.source_buckets.len(),
        signature_enabled = config.enable_signature,
        fallback_enabled = config.fallback.enabled,
        auto_webp = config.auto_webp,
        "Configuration loaded successfully"
    );

    let mut event = match (&args.event, &args.path) {
        (Some(file), _) => {
            let raw = std::fs::read_to_string(file)
                .with_context(|| format!("Failed to read event file {}", file.display()))?;
            serde_json::from_str::<ImageHandlerEvent>(&raw).context("Failed to parse event")?
        }
        (None, Some(path)) => ImageHandlerEvent::new(path.clone()),
        (None, None) => return Err(anyhow!("Either --event or --path is required")),
    };

    if args.sign {
        let secret = args
            .secret
            .as_deref()
            .ok_or_else(|| anyhow!("--sign requires --secret"))?;
        let path = event.path.as_deref().unwrap_or_default();
        let message = string_to_sign(path, args.expires.as_deref());
        println!("{}", sign_path(secret.as_bytes(), &message)?);
        return Ok(());
    }

    if let Some(accept) = args.accept {
        event = event.with_header("Accept", accept);
    }
    if let Some(expires) = args.expires {
        event = event.with_query("expires", expires);
    }
    if let Some(signature) = args.signature {
        event = event.with_query("signature", signature);
    }

    let mut secrets = StaticSecretProvider::new();
    if let (Some(name), Some(value)) = (&config.secrets_manager, &args.secret) {
        secrets = secrets.with_secret(name.clone(), value.clone());
    }

    let handler = ImageRequestHandler::new(Arc::new(config), Arc::new(secrets));
    match handler.resolve(&event).await {
        Ok(resolved) => {
            println!("{}", serde_json::to_string_pretty(&resolved)?);
            Ok(())
        }
        Err(error) => {
            println!("{}", serde_json::to_string_pretty(&error.to_response())?);
            std::process::exit(1);
        }
    }
}
