// Weather Live v0.1
use std::rc::Rc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::LocalSet;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use weather_live::{
    AppConfig, ImageHandle, ImageSink, PropertyChange, PropertyObserver, WeatherQueryService,
};

/// Headless stand-in for the presentation layer: logs every property change
/// and every icon it receives.
struct ConsoleView;

impl PropertyObserver for ConsoleView {
    fn property_changed(&self, change: &PropertyChange) {
        tracing::info!("{} = {}", change.property, change.value);
    }
}

impl ImageSink for ConsoleView {
    fn set_image(&self, image: ImageHandle) {
        tracing::info!(
            "icon = {}x{} {:?} image",
            image.width(),
            image.height(),
            image.as_image().color()
        );
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weather_live=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    LocalSet::new().run_until(run(config)).await;
}

async fn run(config: AppConfig) {
    let view = Rc::new(ConsoleView);
    let service = match WeatherQueryService::new(config.query_config(), view.clone()) {
        Ok(service) => service,
        Err(e) => {
            tracing::error!("Failed to start weather service: {}", e);
            std::process::exit(1);
        }
    };
    service.state().subscribe(view);

    tracing::info!(
        "Querying current conditions in {}, enter one city name per line",
        config.region
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(city)) => {
                if let Some(pending) = service.request(&city) {
                    if let Err(e) = pending.await {
                        tracing::error!("Weather request task failed: {}", e);
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Failed to read from stdin: {}", e);
                break;
            }
        }
    }
}
