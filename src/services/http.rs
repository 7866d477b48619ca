//! Shared HTTP plumbing for the query and icon pipelines.

use std::cell::Cell;
use std::rc::Rc;

/// Outcome of one GET, as seen by a completion handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkReply {
    /// A 2xx response. `body` may be empty.
    Finished { status: u16, body: Vec<u8> },
    /// Non-2xx status, or a transport failure before any status arrived
    /// (`status == 0`).
    Failed { status: u16, reason: String },
}

/// Counts requests that have been issued but whose completion handler has not
/// finished yet.
#[derive(Debug, Clone, Default)]
pub struct InFlightCounter(Rc<Cell<usize>>);

impl InFlightCounter {
    pub fn get(&self) -> usize {
        self.0.get()
    }

    pub(crate) fn acquire(&self) -> InFlight {
        self.0.set(self.0.get() + 1);
        InFlight(Rc::clone(&self.0))
    }
}

/// Held by a completion task for the lifetime of one reply; released on every
/// exit path when dropped.
#[derive(Debug)]
pub(crate) struct InFlight(Rc<Cell<usize>>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

/// Build the reqwest client used by both pipelines. No timeout is set: a hung
/// transport leaves the request outstanding.
pub fn build_client(user_agent: &str) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().user_agent(user_agent).build()
}

/// Issue a GET and read the whole body.
pub(crate) async fn get(client: &reqwest::Client, url: &str) -> NetworkReply {
    let response = match client.get(url).send().await {
        Ok(r) => r,
        Err(e) => {
            return NetworkReply::Failed {
                status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                reason: e.to_string(),
            }
        }
    };

    let status = response.status();
    if !status.is_success() {
        return NetworkReply::Failed {
            status: status.as_u16(),
            reason: status
                .canonical_reason()
                .unwrap_or("unknown status")
                .to_string(),
        };
    }

    match response.bytes().await {
        Ok(body) => NetworkReply::Finished {
            status: status.as_u16(),
            body: body.to_vec(),
        },
        Err(e) => NetworkReply::Failed {
            status: status.as_u16(),
            reason: format!("failed to read body: {}", e),
        },
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// A loopback address with nothing listening on it.
    pub(crate) fn unused_local_addr() -> std::net::SocketAddr {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    }

    #[test]
    fn test_in_flight_guard_releases_on_drop() {
        let counter = InFlightCounter::default();
        let a = counter.acquire();
        let b = counter.acquire();
        assert_eq!(counter.get(), 2);
        drop(a);
        assert_eq!(counter.get(), 1);
        drop(b);
        assert_eq!(counter.get(), 0);
    }

    #[tokio::test]
    async fn test_get_success_reads_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;

        let client = build_client("test").unwrap();
        let reply = get(&client, &format!("{}/ok", server.uri())).await;

        assert_eq!(
            reply,
            NetworkReply::Finished {
                status: 200,
                body: b"hello".to_vec()
            }
        );
    }

    #[tokio::test]
    async fn test_get_non_success_status_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = build_client("test").unwrap();
        let reply = get(&client, &format!("{}/missing", server.uri())).await;

        assert!(matches!(reply, NetworkReply::Failed { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_get_connection_failure_has_no_status() {
        let url = format!("http://{}/gone", unused_local_addr());

        let client = build_client("test").unwrap();
        let reply = get(&client, &url).await;

        assert!(matches!(reply, NetworkReply::Failed { status: 0, .. }));
    }
}
