//! # Shopdesk POS Terminal
//!
//! ## Usage
//!
//! ```bash
//! # Offline, against config/catalog.toml
//! pos-terminal
//!
//! # Against the shop API
//! export SHOP_API_URL=https://shop.example.com/api
//! export SHOP_API_TOKEN=...
//! pos-terminal
//!
//! # JSON logs
//! LOG_FORMAT=json RUST_LOG=pos_core=debug pos-terminal
//! ```

use pos_terminal::{console::Console, state::AppState};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    print_banner();

    let state = AppState::new()?;

    if state.config.is_offline() {
        info!("Offline mode: catalog {}", state.config.catalog_path.display());
    } else if let Some(api) = &state.config.api {
        info!("Shop API: {}", api.base_url);
    }
    info!("Shop service: {}", state.shop.service_name());

    let mut console = Console::new(state);
    console.run().await?;

    info!("Terminal closed");
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // Logs go to stderr so they don't interleave with console output.
    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }
}

fn print_banner() {
    println!(
        r#"
  Shopdesk POS
  ━━━━━━━━━━━━━━━━━━━━━━━
  Version: {}
  Type `help` for commands.
"#,
        env!("CARGO_PKG_VERSION")
    );
}
