use clap::Parser;
use radius_aaa::{
    AccessHandler, AccountingHandler, AdminState, CacheStore, CoaHandler, Config, Handlers,
    ListenerMultiplexer, MetricsAggregator, NasStore, PostgresStore, SecretResolver,
    SessionTracker, ValkeyCacheStore, start_admin_server,
};
use std::process;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// RADIUS AAA Server - Access, Accounting and CoA (RFC 2865, 2866, 5176)
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "radius-aaa")]
struct Cli {
    /// Path to configuration file
    #[arg(value_name = "CONFIG", default_value = "config.json")]
    config_path: String,

    /// Validate configuration and exit (doesn't start server)
    #[arg(short = 'c', long)]
    validate: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load or create configuration (without logging first)
    let config = match Config::from_file(&cli.config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing_subscriber::registry()
                .with(EnvFilter::new("info"))
                .with(tracing_subscriber::fmt::layer())
                .init();

            if cli.validate {
                eprintln!("Configuration validation failed: {}", e);
                process::exit(1);
            }

            if std::path::Path::new(&cli.config_path).exists() {
                error!("Invalid configuration in {}: {}", cli.config_path, e);
                process::exit(1);
            }

            warn!("Could not load config file from: {}", cli.config_path);
            info!("Creating example configuration at: {}", cli.config_path);

            if let Err(e) = Config::example().to_file(&cli.config_path) {
                error!("Error creating example config: {}", e);
                process::exit(1);
            }

            info!("Please edit {} and restart the server", cli.config_path);
            process::exit(0);
        }
    };

    if cli.validate {
        println!("Configuration validated successfully");
        println!("  Listen: {}", config.listen_address);
        println!(
            "  Ports: access {}, accounting {}, coa {}",
            config.access_port, config.accounting_port, config.coa_port
        );
        println!("  Valkey: {}", config.valkey.url);
        match &config.admin {
            Some(admin) => println!("  Admin: {}", admin.listen),
            None => println!("  Admin: disabled"),
        }
        process::exit(0);
    }

    let log_level = config.log_level.as_deref().unwrap_or("info");
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("RADIUS AAA Server v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded configuration from: {}", cli.config_path);

    if let Err(e) = run(config).await {
        error!("Server error: {}", e);
        process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let store: Arc<dyn NasStore> = Arc::new(PostgresStore::connect(&config.database).await?);

    let valkey = ValkeyCacheStore::new(config.valkey.clone()).await?;
    valkey.ensure_indexes().await?;
    let cache: Arc<dyn CacheStore> = Arc::new(valkey);
    info!("Connected to Valkey at {}", config.valkey.url);

    let metrics = Arc::new(MetricsAggregator::new());
    let tracker = Arc::new(SessionTracker::new(Arc::clone(&cache)));
    let resolver = Arc::new(SecretResolver::new(Arc::clone(&cache), Arc::clone(&store)));

    let handlers = Handlers {
        access: Arc::new(AccessHandler::new(Arc::clone(&store), Arc::clone(&metrics))),
        accounting: Arc::new(AccountingHandler::new(tracker, Arc::clone(&metrics))),
        coa: Arc::new(CoaHandler::new(Arc::clone(&metrics))),
    };

    let server = ListenerMultiplexer::bind(&config, resolver, handlers).await?;
    for (kind, addr) in server.local_addrs()? {
        info!("{} listener on {}", kind, addr);
    }

    let admin = match (config.admin_addr()?, &config.admin) {
        (Some(addr), Some(admin)) => {
            let state = AdminState::new(cache, store, metrics, admin.api_key.as_str());
            Some(tokio::spawn(start_admin_server(state, addr)))
        }
        _ => None,
    };

    info!("Server started successfully");

    match admin {
        Some(admin) => {
            // Either side ending takes the process down
            tokio::select! {
                result = server.run() => result?,
                result = admin => result??,
            }
        }
        None => server.run().await?,
    }

    Ok(())
}
