//! Reference-counted per-symbol tick fan-out
//!
//! Multiple engine-side consumers of the same symbol share a single upstream
//! subscription. The first subscriber opens the upstream stream and spawns a
//! forwarding task; later subscribers attach to the same fan-out. Dropping
//! the last subscription stops the upstream stream and the task.

use crate::errors::EngineResult;
use crate::feed::types::Tick;
use crate::feed::PriceFeed;
use crate::logger::{self, LogTag};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// A live tick subscription handle
///
/// Receive ticks from `receiver`; pass the handle back to
/// `FeedHub::unsubscribe` to detach. Detaching one subscriber never disturbs
/// the others.
pub struct TickSubscription {
    pub id: u64,
    pub symbol: String,
    pub receiver: mpsc::UnboundedReceiver<Tick>,
}

type SubscriberMap = Arc<Mutex<HashMap<u64, mpsc::UnboundedSender<Tick>>>>;

struct SymbolFan {
    subscribers: SubscriberMap,
    forward_task: JoinHandle<()>,
}

pub struct FeedHub {
    feed: Arc<dyn PriceFeed>,
    fans: Mutex<HashMap<String, SymbolFan>>,
    next_id: AtomicU64,
}

impl FeedHub {
    pub fn new(feed: Arc<dyn PriceFeed>) -> Self {
        Self {
            feed,
            fans: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Historical backfill passthrough (no subscription involved)
    pub async fn history(&self, symbol: &str, count: usize) -> EngineResult<Vec<Tick>> {
        self.feed.history(symbol, count).await
    }

    /// Attach a subscriber to `symbol`, opening the upstream stream if this
    /// is the first one
    pub async fn subscribe(&self, symbol: &str) -> EngineResult<TickSubscription> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        // Fetch-then-apply: open the upstream stream (an await) before
        // touching the fan map, so no map lock is held across the await.
        let mut fans = self.fans.lock().await;
        if let Some(fan) = fans.get(symbol) {
            fan.subscribers.lock().await.insert(id, tx);
        } else {
            drop(fans);
            let upstream = self.feed.stream(symbol).await?;
            let subscribers: SubscriberMap = Arc::new(Mutex::new(HashMap::new()));
            subscribers.lock().await.insert(id, tx);

            let forward_task = spawn_forwarder(symbol.to_string(), upstream, subscribers.clone());

            let mut fans = self.fans.lock().await;
            // A racing subscriber may have created the fan while the stream
            // call was in flight; keep the existing one in that case.
            if let Some(existing) = fans.get(symbol) {
                forward_task.abort();
                if let Some(sender) = subscribers.lock().await.remove(&id) {
                    existing.subscribers.lock().await.insert(id, sender);
                }
            } else {
                fans.insert(
                    symbol.to_string(),
                    SymbolFan {
                        subscribers,
                        forward_task,
                    },
                );
            }
        }

        logger::debug(
            LogTag::Feed,
            &format!("Subscriber {} attached to {}", id, symbol),
        );

        Ok(TickSubscription {
            id,
            symbol: symbol.to_string(),
            receiver: rx,
        })
    }

    /// Detach a subscriber; stops the upstream stream when it was the last
    ///
    /// Idempotent: unknown ids are ignored.
    pub async fn unsubscribe(&self, symbol: &str, id: u64) {
        let mut fans = self.fans.lock().await;
        let remove_fan = if let Some(fan) = fans.get(symbol) {
            let mut subs = fan.subscribers.lock().await;
            subs.remove(&id);
            subs.is_empty()
        } else {
            false
        };

        if remove_fan {
            if let Some(fan) = fans.remove(symbol) {
                fan.forward_task.abort();
            }
            drop(fans);
            self.feed.stop(symbol).await;
            logger::info(
                LogTag::Feed,
                &format!("Last subscriber left {}, upstream stream stopped", symbol),
            );
        }
    }

    /// Number of attached subscribers for a symbol
    pub async fn subscriber_count(&self, symbol: &str) -> usize {
        let fans = self.fans.lock().await;
        match fans.get(symbol) {
            Some(fan) => fan.subscribers.lock().await.len(),
            None => 0,
        }
    }
}

fn spawn_forwarder(
    symbol: String,
    mut upstream: mpsc::UnboundedReceiver<Tick>,
    subscribers: SubscriberMap,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(tick) = upstream.recv().await {
            let mut dead: Vec<u64> = Vec::new();
            {
                let subs = subscribers.lock().await;
                for (id, sender) in subs.iter() {
                    if sender.send(tick.clone()).is_err() {
                        dead.push(*id);
                    }
                }
            }
            // Prune subscribers whose receiver side was dropped
            if !dead.is_empty() {
                let mut subs = subscribers.lock().await;
                for id in dead {
                    subs.remove(&id);
                }
            }
        }
        logger::debug(LogTag::Feed, &format!("Upstream stream for {} ended", symbol));
    })
}
