//! WebSocket gateway for live quote updates.
//!
//! Each connection registers one subscriber in the registry. Clients
//! send `subscribe`/`unsubscribe` frames carrying symbol lists; the
//! server pushes quote frames whenever the poller observes a price
//! change on a subscribed symbol. Closing the connection sweeps all of
//! its subscriptions.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use stockwatch_market_data::models::{symbol, QuoteSnapshot};
use stockwatch_market_data::subscription::SubscriberId;

use crate::main_lib::AppState;

/// Frames accepted from the client.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    Subscribe { symbols: Vec<String> },
    Unsubscribe { symbols: Vec<String> },
}

/// Frames sent to the client.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerFrame {
    Subscribed {
        symbols: Vec<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        rejected: Vec<String>,
    },
    Unsubscribed {
        symbols: Vec<String>,
    },
    Quote {
        #[serde(flatten)]
        snapshot: QuoteSnapshot,
    },
    Error {
        message: String,
    },
}

pub async fn ws_handler(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (id, mut updates) = state.registry.register();
    debug!("WebSocket connection opened, subscriber {}", id);

    let (mut sink, mut stream) = socket.split();

    'conn: loop {
        tokio::select! {
            // Quote updates from the poller
            update = updates.recv() => {
                let Some(snapshot) = update else { break };
                if send_frame(&mut sink, &ServerFrame::Quote { snapshot }).await.is_err() {
                    break;
                }
            }

            // Frames from the client
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        for reply in handle_frame(&state, id, text.as_str()).await {
                            if send_frame(&mut sink, &reply).await.is_err() {
                                break 'conn;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // Ping/pong handled by the stack
                    Some(Err(e)) => {
                        debug!("WebSocket read error for subscriber {}: {}", id, e);
                        break;
                    }
                }
            }
        }
    }

    // Sweep before any further await so a dead connection never
    // receives another delivery or causes another fetch
    let orphaned = state.registry.remove_subscriber(id);
    debug!(
        "WebSocket connection closed, subscriber {} removed ({} symbols orphaned)",
        id,
        orphaned.len()
    );
}

/// Handle one client frame, returning the frames to write back on
/// this connection only. Other subscribers hear nothing; they keep
/// receiving frames solely through the poller's change fan-out.
async fn handle_frame(state: &Arc<AppState>, id: SubscriberId, raw: &str) -> Vec<ServerFrame> {
    let frame: ClientFrame = match serde_json::from_str(raw) {
        Ok(frame) => frame,
        Err(e) => {
            return vec![ServerFrame::Error {
                message: format!("unrecognized frame: {}", e),
            }]
        }
    };

    match frame {
        ClientFrame::Subscribe { symbols } => {
            let mut accepted = Vec::new();
            let mut rejected = Vec::new();

            for raw_sym in symbols {
                let sym = symbol::normalize(&raw_sym);
                if symbol::is_canonical(&sym) {
                    state.registry.subscribe(id, &sym);
                    accepted.push(sym);
                } else {
                    rejected.push(raw_sym);
                }
            }

            let mut replies = vec![ServerFrame::Subscribed {
                symbols: accepted.clone(),
                rejected,
            }];

            // Seed this subscriber with the current quotes right away
            // so it does not have to wait for the next price movement
            for sym in &accepted {
                if let Ok(snapshot) = state.manager.get_quote(sym).await {
                    replies.push(ServerFrame::Quote { snapshot });
                }
            }

            replies
        }
        ClientFrame::Unsubscribe { symbols } => {
            let symbols: Vec<String> = symbols
                .into_iter()
                .map(|raw_sym| {
                    let sym = symbol::normalize(&raw_sym);
                    state.registry.unsubscribe(id, &sym);
                    sym
                })
                .collect();

            vec![ServerFrame::Unsubscribed { symbols }]
        }
    }
}

async fn send_frame(
    sink: &mut (impl SinkExt<Message> + Unpin),
    frame: &ServerFrame,
) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize WebSocket frame: {}", e);
            return Ok(());
        }
    };

    sink.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use stockwatch_market_data::errors::MarketDataError;
    use stockwatch_market_data::manager::ProviderManager;
    use stockwatch_market_data::models::Quote;
    use stockwatch_market_data::provider::{ProviderCapabilities, QuoteProvider};
    use stockwatch_market_data::subscription::SubscriptionRegistry;

    struct FixedPriceProvider;

    #[async_trait]
    impl QuoteProvider for FixedPriceProvider {
        fn id(&self) -> &'static str {
            "FIXED"
        }

        fn capabilities(&self) -> ProviderCapabilities {
            ProviderCapabilities {
                supports_search: false,
                supports_profile: false,
            }
        }

        async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
            Ok(Quote::new(symbol, dec!(10.00), "USD", "FIXED"))
        }
    }

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState {
            manager: Arc::new(ProviderManager::new(vec![Arc::new(FixedPriceProvider)])),
            registry: Arc::new(SubscriptionRegistry::new()),
        })
    }

    #[tokio::test]
    async fn test_subscribe_seed_goes_only_to_the_subscribing_connection() {
        let state = test_state();

        let (bystander, mut bystander_rx) = state.registry.register();
        state.registry.subscribe(bystander, "AAPL");

        let (joiner, _joiner_rx) = state.registry.register();
        let replies =
            handle_frame(&state, joiner, r#"{"type":"subscribe","symbols":["AAPL"]}"#).await;

        // The joining connection gets the ack plus its seed quote
        assert!(matches!(replies[0], ServerFrame::Subscribed { .. }));
        assert!(matches!(replies[1], ServerFrame::Quote { .. }));

        // The established subscriber hears nothing: only the poller's
        // change detection may push frames to it
        assert!(bystander_rx.try_recv().is_err());
    }

    #[test]
    fn test_subscribe_frame_parses() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"type":"subscribe","symbols":["AAPL","MSFT"]}"#).unwrap();
        assert!(matches!(frame, ClientFrame::Subscribe { ref symbols } if symbols.len() == 2));
    }

    #[test]
    fn test_unknown_frame_type_rejected() {
        let result: Result<ClientFrame, _> =
            serde_json::from_str(r#"{"type":"shout","symbols":["AAPL"]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_quote_frame_serializes_flat() {
        let snapshot = QuoteSnapshot::fresh(Quote::new("AAPL", dec!(150.25), "USD", "YAHOO"));
        let json = serde_json::to_value(ServerFrame::Quote { snapshot }).unwrap();
        assert_eq!(json["type"], "quote");
        assert_eq!(json["symbol"], "AAPL");
        assert_eq!(json["stale"], false);
    }

    #[test]
    fn test_subscribed_frame_hides_empty_rejected() {
        let json = serde_json::to_value(ServerFrame::Subscribed {
            symbols: vec!["AAPL".to_string()],
            rejected: Vec::new(),
        })
        .unwrap();
        assert_eq!(json["type"], "subscribed");
        assert!(json.get("rejected").is_none());
    }

    #[test]
    fn test_error_frame_shape() {
        let json = serde_json::to_value(ServerFrame::Error {
            message: "invalid symbol 'nope!'".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "error");
    }
}
