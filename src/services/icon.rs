//! Condition icon download.
//!
//! The weather response only carries the icon's URL; this fetches the bytes,
//! decodes them and hands the result to an [`ImageSink`]. Failures are
//! logged and otherwise ignored: the sink simply keeps its previous image.

use image::DynamicImage;
use std::fmt;
use std::rc::Rc;
use tokio::task::JoinHandle;
use url::Url;

use crate::errors::ImageFetchError;
use crate::services::http::{self, InFlightCounter, NetworkReply};

/// A decoded icon.
#[derive(Clone)]
pub struct ImageHandle(DynamicImage);

impl ImageHandle {
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn as_image(&self) -> &DynamicImage {
        &self.0
    }
}

impl fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageHandle")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

/// Where a fetched icon ends up, e.g. the image view of the presentation
/// layer.
pub trait ImageSink {
    fn set_image(&self, image: ImageHandle);
}

impl<F> ImageSink for F
where
    F: Fn(ImageHandle),
{
    fn set_image(&self, image: ImageHandle) {
        self(image)
    }
}

/// Fetches images over HTTP and publishes them to a sink.
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: Option<reqwest::Client>,
    in_flight: InFlightCounter,
}

impl ImageFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client: Some(client),
            in_flight: InFlightCounter::default(),
        }
    }

    /// A fetcher with no transport: every valid URL is accepted and ignored.
    pub fn without_transport() -> Self {
        Self {
            client: None,
            in_flight: InFlightCounter::default(),
        }
    }

    /// Share `in_flight` with the owner, so its count covers icon downloads.
    pub(crate) fn with_counter(client: Option<reqwest::Client>, in_flight: InFlightCounter) -> Self {
        Self { client, in_flight }
    }

    /// Number of downloads whose completion has not been processed yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.get()
    }

    /// Start downloading `url` into `sink`.
    ///
    /// Fails synchronously, without any request, if `url` is not a valid
    /// absolute URL. Otherwise returns the completion task, or `None` when
    /// there is no transport to issue the request on. Must be called from
    /// within a `tokio::task::LocalSet`.
    pub fn fetch(
        &self,
        url: &str,
        sink: Rc<dyn ImageSink>,
    ) -> Result<Option<JoinHandle<()>>, ImageFetchError> {
        let url = Url::parse(url).map_err(|source| ImageFetchError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        let Some(client) = self.client.clone() else {
            tracing::debug!("No transport for image fetch, skipping {}", url);
            return Ok(None);
        };

        tracing::debug!("Fetching image {}", url);
        let guard = self.in_flight.acquire();
        let handle = tokio::task::spawn_local(async move {
            let _guard = guard;
            let reply = http::get(&client, url.as_str()).await;
            match on_image_reply(reply) {
                Ok(Some(image)) => {
                    tracing::debug!(
                        "Decoded image {} ({}x{})",
                        url,
                        image.width(),
                        image.height()
                    );
                    sink.set_image(image);
                }
                Ok(None) => tracing::debug!("Image response for {} was empty", url),
                Err(e) => tracing::warn!("Image fetch for {} failed: {}", url, e),
            }
        });
        Ok(Some(handle))
    }
}

/// Turn a finished reply into an image. `Ok(None)` for an empty body.
fn on_image_reply(reply: NetworkReply) -> Result<Option<ImageHandle>, ImageFetchError> {
    match reply {
        NetworkReply::Finished { body, .. } if body.is_empty() => Ok(None),
        NetworkReply::Finished { body, .. } => {
            let image = image::load_from_memory(&body)?;
            Ok(Some(ImageHandle(image)))
        }
        NetworkReply::Failed { status, reason } => {
            Err(ImageFetchError::Transport { status, reason })
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageFormat, RgbaImage};
    use std::cell::RefCell;
    use std::io::Cursor;
    use tokio::task::LocalSet;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// A small PNG, as an icon endpoint would serve it.
    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, image::Rgba([30, 144, 255, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    /// Sink that records every published image.
    pub(crate) fn recording_sink() -> (Rc<dyn ImageSink>, Rc<RefCell<Vec<ImageHandle>>>) {
        let images = Rc::new(RefCell::new(Vec::new()));
        let out = Rc::clone(&images);
        let sink: Rc<dyn ImageSink> =
            Rc::new(move |image: ImageHandle| out.borrow_mut().push(image));
        (sink, images)
    }

    fn fetcher() -> ImageFetcher {
        ImageFetcher::new(http::build_client("test").unwrap())
    }

    #[test]
    fn test_invalid_url_fails_synchronously() {
        let (sink, images) = recording_sink();
        let fetcher = fetcher();

        // No LocalSet: reaching spawn_local would panic, so this also proves
        // nothing was issued.
        let result = fetcher.fetch("not a url", sink);

        assert!(matches!(result, Err(ImageFetchError::InvalidUrl { .. })));
        assert_eq!(fetcher.in_flight(), 0);
        assert!(images.borrow().is_empty());
    }

    #[test]
    fn test_relative_and_empty_urls_rejected() {
        let fetcher = fetcher();
        let (sink, _) = recording_sink();
        assert!(fetcher.fetch("", Rc::clone(&sink)).is_err());
        assert!(fetcher.fetch("/i/c/k/clear.gif", sink).is_err());
    }

    #[test]
    fn test_without_transport_is_noop_success() {
        let fetcher = ImageFetcher::without_transport();
        let (sink, images) = recording_sink();

        let result = fetcher.fetch("http://icons.example/clear.gif", sink);

        assert!(matches!(result, Ok(None)));
        assert!(images.borrow().is_empty());
    }

    #[test]
    fn test_on_image_reply_empty_body() {
        let reply = NetworkReply::Finished {
            status: 200,
            body: Vec::new(),
        };
        assert!(matches!(on_image_reply(reply), Ok(None)));
    }

    #[test]
    fn test_on_image_reply_garbage_is_decode_error() {
        let reply = NetworkReply::Finished {
            status: 200,
            body: b"definitely not an image".to_vec(),
        };
        assert!(matches!(
            on_image_reply(reply),
            Err(ImageFetchError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_publishes_decoded_image() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/i/c/k/clear.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(4, 3)))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = fetcher();
        let (sink, images) = recording_sink();
        let url = format!("{}/i/c/k/clear.png", server.uri());

        LocalSet::new()
            .run_until(async {
                let handle = fetcher.fetch(&url, sink).unwrap().unwrap();
                assert_eq!(fetcher.in_flight(), 1);
                handle.await.unwrap();
            })
            .await;

        let images = images.borrow();
        assert_eq!(images.len(), 1);
        assert_eq!((images[0].width(), images[0].height()), (4, 3));
        assert_eq!(images[0].as_image().color(), image::ColorType::Rgba8);
        assert_eq!(fetcher.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_transport_error_publishes_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = fetcher();
        let (sink, images) = recording_sink();
        let url = format!("{}/i/c/k/missing.gif", server.uri());

        LocalSet::new()
            .run_until(async {
                let handle = fetcher.fetch(&url, sink).unwrap().unwrap();
                handle.await.unwrap();
            })
            .await;

        assert!(images.borrow().is_empty());
        assert_eq!(fetcher.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_empty_body_publishes_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let fetcher = fetcher();
        let (sink, images) = recording_sink();
        let url = format!("{}/empty.gif", server.uri());

        LocalSet::new()
            .run_until(async {
                fetcher.fetch(&url, sink).unwrap().unwrap().await.unwrap();
            })
            .await;

        assert!(images.borrow().is_empty());
        assert_eq!(fetcher.in_flight(), 0);
    }
}
