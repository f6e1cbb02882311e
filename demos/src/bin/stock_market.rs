use std::{
    collections::HashSet,
    sync::{Arc, Mutex, Weak},
    time::Duration,
};

use nazar::{init_logging, message, Hubs, Publisher, Settings, Subscriber};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use tokio::time::{interval, sleep};
use tracing::info;

/// Общая часть всех рыночных событий.
#[derive(Clone, Debug)]
struct MarketEvent {
    symbol: String,
}

/// Новая цена бумаги.
#[derive(Clone, Debug)]
struct Stock {
    market: MarketEvent,
    price: f64,
}

/// Новость по бумаге.
#[derive(Clone, Debug)]
struct News {
    market: MarketEvent,
    headline: String,
    content: String,
}

message!(MarketEvent);
message!(Stock { market: MarketEvent });
message!(News { market: MarketEvent });

const SEED_PRICES: [(&str, f64); 3] = [("AAPL", 100.0), ("GOOG", 200.0), ("MSFT", 150.0)];

const HEADLINES: [(&str, &str, &str); 3] = [
    (
        "AAPL",
        "Apple unveils new product",
        "Apple announced a new device at its keynote.",
    ),
    (
        "GOOG",
        "Google expands cloud region",
        "Google opened a new data center region.",
    ),
    (
        "MSFT",
        "Microsoft beats estimates",
        "Microsoft reported quarterly revenue above forecasts.",
    ),
];

/// Биржа: держит текущие цены и публикует их изменения.
struct StockMarket {
    publisher: Publisher,
    prices: Mutex<Vec<(String, f64)>>,
}

impl StockMarket {
    fn new(publisher: Publisher) -> Self {
        let prices = SEED_PRICES
            .iter()
            .map(|(symbol, price)| (symbol.to_string(), *price))
            .collect();
        Self {
            publisher,
            prices: Mutex::new(prices),
        }
    }

    /// Сдвигает цену каждой бумаги на случайную величину и публикует её.
    fn tick(
        &self,
        rng: &mut StdRng,
    ) -> anyhow::Result<()> {
        let updates: Vec<Stock> = {
            let mut prices = self
                .prices
                .lock()
                .map_err(|_| anyhow::anyhow!("price table poisoned"))?;
            prices
                .iter_mut()
                .map(|(symbol, price)| {
                    *price = (*price + rng.gen_range(-5.0..5.0)).max(1.0);
                    Stock {
                        market: MarketEvent {
                            symbol: symbol.clone(),
                        },
                        price: *price,
                    }
                })
                .collect()
        };

        for stock in &updates {
            self.publisher.publish(stock)?;
        }
        Ok(())
    }
}

/// Публикует случайную новость из заготовленного списка.
struct NewsPublisher {
    publisher: Publisher,
}

impl NewsPublisher {
    async fn publish_random(
        &self,
        rng: &mut StdRng,
    ) -> anyhow::Result<()> {
        let Some((symbol, headline, content)) = HEADLINES.choose(rng) else {
            return Ok(());
        };
        let news = News {
            market: MarketEvent {
                symbol: symbol.to_string(),
            },
            headline: headline.to_string(),
            content: content.to_string(),
        };
        let report = self.publisher.publish_async(&news).await?;
        info!(headline = %news.headline, delivered = report.delivered, "news published");
        Ok(())
    }
}

/// Наблюдатель за ценами выбранных бумаг.
struct StockWatcher {
    name: &'static str,
    symbols: HashSet<&'static str>,
    subscriber: Subscriber,
}

impl StockWatcher {
    fn new(
        name: &'static str,
        symbols: &[&'static str],
        subscriber: Subscriber,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            symbols: symbols.iter().copied().collect(),
            subscriber,
        })
    }

    fn start_watching(self: &Arc<Self>) {
        let me: Weak<Self> = Arc::downgrade(self);
        self.subscriber.subscribe(self, move |stock: &Stock| {
            let Some(me) = me.upgrade() else {
                return;
            };
            if me.symbols.contains(stock.market.symbol.as_str()) {
                println!(
                    "[{}] {} is now {:.2}",
                    me.name, stock.market.symbol, stock.price
                );
            }
        });
    }

    fn stop_watching(self: &Arc<Self>) {
        let removed = self.subscriber.unsubscribe_type::<Stock>(self);
        info!(watcher = self.name, removed, "stopped watching prices");
    }
}

/// Наблюдатель за новостями; обработчик асинхронный.
struct NewsWatcher {
    name: &'static str,
}

impl NewsWatcher {
    fn start_watching(
        self: &Arc<Self>,
        subscriber: &Subscriber,
    ) {
        let name = self.name;
        subscriber.subscribe_async(self, move |news: News| async move {
            sleep(Duration::from_millis(10)).await;
            println!(
                "[{name}] {}: {} ({})",
                news.market.symbol, news.headline, news.content
            );
        });
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_logging(settings.logging.clone())?;

    let hubs = Hubs::new(settings.hub)?;
    let hub = hubs.default_hub().clone();

    // Журнал всех рыночных событий, подписанный от имени самого хаба.
    hub.subscribe_default(|event: &MarketEvent| {
        tracing::debug!(symbol = %event.symbol, "market event");
    });

    let market = StockMarket::new(Publisher::new(hub.clone()));
    let news = NewsPublisher {
        publisher: Publisher::new(hub.clone()),
    };

    let alice = StockWatcher::new("alice", &["AAPL", "GOOG"], Subscriber::new(hub.clone()));
    let bob = StockWatcher::new("bob", &["AAPL", "GOOG"], Subscriber::new(hub.clone()));
    alice.start_watching();
    bob.start_watching();
    let mut bob = Some(bob);

    let reader = Arc::new(NewsWatcher { name: "reader" });
    reader.start_watching(&Subscriber::new(hub.clone()));

    let mut rng = StdRng::from_entropy();
    let mut ticker = interval(Duration::from_millis(250));
    for round in 0..12u32 {
        ticker.tick().await;
        market.tick(&mut rng)?;
        if round % 3 == 0 {
            news.publish_random(&mut rng).await?;
        }

        match round {
            4 => alice.stop_watching(),
            8 => {
                // Хаб держит только слабую ссылку: после drop подписка
                // исчезает сама.
                if let Some(bob) = bob.take() {
                    info!(watcher = bob.name, "watcher dropped");
                }
            }
            _ => {}
        }
    }

    let stats = hub.stats();
    info!(
        published = stats.published,
        delivered = stats.delivered,
        panicked = stats.panicked,
        handlers = hub.handler_count(),
        "demo finished"
    );
    Ok(())
}
