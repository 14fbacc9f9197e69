//! # `otc_stream`: Stream OTC Market Data to the Log
//!
//! Connects to the OTC websocket API, subscribes to the requested channels once
//! authenticated and logs every response and channel message until interrupted.
//!
//! ## Usage
//!
//! ```bash
//! # Tickers for two products plus server heartbeats, JSON encoding
//! otc_stream -t brn -t wti -s --json
//!
//! # RFQ quotes as <symbol>@<exchange>[@<size>]
//! otc_stream -r brnz25@ice@25
//! ```
//!
//! Settings (URL, token, timeouts, logging) come from `otc_client.conf`, the
//! `OTC_*` environment variables (a `.env` file is honoured) and the flags.

#![forbid(unsafe_code)]

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use lib_otc::configs::Settings;
use lib_otc::core::handler::log_response;
use lib_otc::loggers::{setup_logging, LogSettings};
use lib_otc::{OtcChannelMessage, OtcClient, OtcHandler, OtcResponse, RfqChannel};

#[derive(Parser, Debug)]
#[command(name = "otc_stream", about = "Stream OTC websocket channels to the log", version)]
struct Cli {
    /// Product symbols to subscribe to on the tickers channel.
    #[arg(short = 't', long = "tickers")]
    tickers: Vec<String>,

    /// Subscribe to server info.
    #[arg(short = 's', long = "server-info")]
    server_info: bool,

    /// RFQ symbols as <symbol>@<exchange>@<size=1>.
    #[arg(short = 'r', long = "rfq")]
    rfq: Vec<String>,

    /// Subscribe to the account's order updates.
    #[arg(long = "orders")]
    orders: bool,

    #[command(flatten)]
    settings: Settings,
}

/// What to subscribe to once authenticated.
struct Workflow {
    tickers: Vec<String>,
    server_info: bool,
    orders: bool,
    rfq: Vec<RfqChannel>,
    requested: AtomicBool,
}

impl Workflow {
    fn new(tickers: Vec<String>, server_info: bool, orders: bool, rfq: Vec<RfqChannel>) -> Self {
        Self {
            tickers,
            server_info,
            orders,
            rfq,
            requested: AtomicBool::new(false),
        }
    }

    /// True the first time only. After a reconnect the client replays the
    /// tracked subscriptions itself.
    fn first_session(&self) -> bool {
        !self.requested.swap(true, Ordering::SeqCst)
    }

    fn is_empty(&self) -> bool {
        self.tickers.is_empty() && !self.server_info && !self.orders && self.rfq.is_empty()
    }

    fn subscribe_all(&self, client: &OtcClient) {
        if self.server_info {
            if let Err(e) = client.subscribe_server_info() {
                tracing::error!("Failed to subscribe to server info: {}", e);
            }
        }
        if !self.tickers.is_empty() {
            if let Err(e) = client.subscribe_tickers(self.tickers.iter().cloned()) {
                tracing::error!("Failed to subscribe to tickers: {}", e);
            }
        }
        if self.orders {
            if let Err(e) = client.subscribe_orders() {
                tracing::error!("Failed to subscribe to orders: {}", e);
            }
        }
        for rfq in &self.rfq {
            if let Err(e) = client.subscribe_rfq(rfq.clone()) {
                tracing::error!("Failed to subscribe to RFQ {}: {}", rfq, e);
            }
        }
    }
}

impl OtcHandler for Workflow {
    fn on_response(&self, client: &OtcClient, response: &OtcResponse) {
        log_response(response);
        if response.auth().is_some() && self.first_session() {
            self.subscribe_all(client);
        }
    }

    fn on_event(&self, _client: &OtcClient, message: &OtcChannelMessage) {
        if let Some(order) = message.order() {
            tracing::info!("Order: {:?}", order);
        } else if let Some(info) = message.server_info() {
            let age = Duration::from_secs(u64::try_from(info.age_millis / 1000).unwrap_or_default());
            tracing::info!("Server info: {}, age: {:?}", info.socket_uid, age);
        } else if let Some(tickers) = message.tickers() {
            for ticker in tickers {
                tracing::info!("{} - {} - {}", ticker.symbol, ticker.timestamp.to_rfc3339(), ticker.mid);
            }
        } else if let Some(quote) = message.otc_quote() {
            tracing::info!("{}", quote.as_string());
        } else if let Some(tops) = message.order_book_tops() {
            for top in tops {
                tracing::info!(
                    "{} {} buy: {}, sell: {}",
                    top.symbol,
                    top.exchange,
                    top.buy.as_string(),
                    top.sell.as_string()
                );
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let rfq = cli
        .rfq
        .iter()
        .map(|r| RfqChannel::from_str(r))
        .collect::<Result<Vec<_>, _>>()
        .context("Invalid --rfq value")?;

    let settings = Settings::layer(cli.settings)?;
    let _guard = setup_logging(&LogSettings {
        file_prefix: "otc_stream".to_string(),
        ..LogSettings::from(&settings)
    })?;
    let config = settings.into_client_config()?;

    let workflow = Arc::new(Workflow::new(cli.tickers, cli.server_info, cli.orders, rfq));
    if workflow.is_empty() {
        tracing::warn!("No channels requested; only responses will be logged");
    }
    let authenticated = config.api_token.is_some();
    let client = OtcClient::new(config, workflow.clone())?;
    client.connect()?;

    // Without a token there is no auth response to subscribe from.
    if !authenticated {
        client.wait_ready(Duration::from_secs(30)).await?;
        if workflow.first_session() {
            workflow.subscribe_all(&client);
        }
    }

    tokio::select! {
        result = client.closed() => {
            result.context("Connection failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, closing");
            client.close().await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_otc::{AuthResponse, ClientConfig, LoggingHandler, ResponseData};

    #[test]
    fn channels_are_requested_on_the_first_auth_only() {
        let workflow = Workflow::new(vec!["brn".into()], true, false, Vec::new());
        let client = OtcClient::new(ClientConfig::default(), Arc::new(LoggingHandler)).unwrap();
        let auth = OtcResponse::new(
            "auth-1",
            ResponseData::Auth(AuthResponse {
                message: "authenticated".into(),
            }),
        );

        workflow.on_response(&client, &auth);
        assert!(workflow.requested.load(Ordering::SeqCst));
        assert!(!workflow.first_session());

        // A reconnect's auth response leaves resubscribing to the client.
        workflow.on_response(&client, &auth);
        assert!(!workflow.first_session());
    }
}
