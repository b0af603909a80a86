use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tarot_api::{
    AppState,
    config::{CliArgs, Config, get_config},
    create_app, db,
    deck::{Deck, DeckOptions},
    llm::{GeminiClient, TextGenerator},
    logging::{init_tracing, with_bootstrap_logging},
    repo::{CardRepository, FileCardRepository, MemoryReadingRepository, PgCardRepository, PgReadingRepository, ReadingRepository},
    run_migrations,
};
use tokio::signal;
use tracing::{info, warn};

fn deck_options(config: &Config) -> DeckOptions {
    DeckOptions {
        data_path: config.data_path.clone(),
        meanings_path: config.meanings_path.clone(),
        static_dir: config.static_dir.clone(),
        prefer_local_images: config.prefer_local_images,
    }
}

/// Picks the file/in-memory or Postgres repositories
///
/// The Postgres card table is seeded from the loaded deck so both backends
/// serve the same identifiers.
fn repositories(config: &Config, deck: &Arc<Deck>) -> anyhow::Result<(Arc<dyn CardRepository>, Arc<dyn ReadingRepository>)> {
    if !config.use_db {
        info!("Using file-backed cards and in-memory readings");
        return Ok((
            Arc::new(FileCardRepository::new(deck.clone())),
            Arc::new(MemoryReadingRepository::new()),
        ));
    }

    let url = config.db_url.as_deref().context("DB_URL is required when USE_DB is set")?;
    let pool = Arc::new(db::init_pool(url)?);
    {
        let mut conn = pool.get().context("Failed to get a database connection")?;
        run_migrations(&mut conn)?;
    }

    let cards = PgCardRepository::new(pool.clone());
    let seeded = cards.seed(deck.cards())?;
    info!("Using Postgres storage, {} cards seeded", seeded);
    Ok((Arc::new(cards), Arc::new(PgReadingRepository::new(pool))))
}

fn text_generator(config: &Config) -> anyhow::Result<Option<Arc<dyn TextGenerator>>> {
    let Some(key) = config.google_api_key.as_deref().filter(|k| !k.trim().is_empty()) else {
        info!("GOOGLE_API_KEY not set, interpretations are local only");
        return Ok(None);
    };
    let client = GeminiClient::new(
        key.to_string(),
        config.llm_model.clone(),
        config.llm_temperature,
        config.llm_max_output_tokens,
    )?;
    Ok(Some(Arc::new(client)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let args = CliArgs::parse();
    let bootstrap_level = args.log_level.clone().unwrap_or_else(|| "INFO".to_string());
    let config = with_bootstrap_logging(&bootstrap_level, || get_config(args))?;
    let _guard = init_tracing(&config.log_level, config.log_format);

    let deck = Arc::new(Deck::load(&deck_options(&config))?);
    info!("Loaded {} cards from {}", deck.len(), config.data_path.display());

    let (cards, readings) = repositories(&config, &deck)?;
    let llm = text_generator(&config)?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;

    let state = AppState::new(config, deck, cards, readings, llm)?;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}
