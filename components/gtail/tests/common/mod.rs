//! In-process stand-in for the Graylog REST API.
#![allow(dead_code)]

use bytes::Bytes;
use gtail::graylog::client::GraylogClient;
use gtail::helpers::load_config::ServerConfig;
use http_body_util::Full;
use hyper::{
    Request, Response, StatusCode,
    body::Incoming,
    header::{AUTHORIZATION, CONTENT_TYPE},
    service::service_fn,
};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto::Builder as HyperServerBuilder,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// A request as seen by the fake server, query string decoded.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub params: HashMap<String, String>,
    pub authorization: Option<String>,
}

impl RecordedRequest {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

type Responder = dyn Fn(&RecordedRequest) -> (StatusCode, Value) + Send + Sync;

pub struct FakeGraylog {
    pub base_uri: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl FakeGraylog {
    /// Serve `responder` on an ephemeral local port.
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(&RecordedRequest) -> (StatusCode, Value) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests: Arc<Mutex<Vec<RecordedRequest>>> = Arc::default();
        let responder: Arc<Responder> = Arc::new(responder);

        let recorded = Arc::clone(&requests);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let io = TokioIo::new(stream);
                let recorded = Arc::clone(&recorded);
                let responder = Arc::clone(&responder);

                let service = service_fn(move |req: Request<Incoming>| {
                    let recorded = Arc::clone(&recorded);
                    let responder = Arc::clone(&responder);
                    async move {
                        let request = record(&req);
                        recorded.lock().unwrap().push(request.clone());
                        let (status, body) = (*responder)(&request);

                        Ok::<_, Infallible>(
                            Response::builder()
                                .status(status)
                                .header(CONTENT_TYPE, "application/json")
                                .body(Full::new(Bytes::from(body.to_string())))
                                .unwrap(),
                        )
                    }
                });

                tokio::spawn(async move {
                    let _ = HyperServerBuilder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await;
                });
            }
        });

        Self {
            base_uri: format!("http://{addr}"),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            uri: self.base_uri.clone(),
            token: None,
            username: None,
            password: None,
            timeout_secs: 5,
        }
    }

    pub fn client(&self) -> GraylogClient {
        GraylogClient::new(&self.server_config()).unwrap()
    }
}

fn record(req: &Request<Incoming>) -> RecordedRequest {
    let url = reqwest::Url::parse(&format!("http://fake{}", req.uri())).unwrap();
    RecordedRequest {
        method: req.method().to_string(),
        path: url.path().to_string(),
        params: url.query_pairs().into_owned().collect(),
        authorization: req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
    }
}

/// A message as Graylog returns it inside `messages[].message`.
pub fn wire_message(id: &str, timestamp: &str, text: &str) -> Value {
    json!({
        "_id": id,
        "timestamp": timestamp,
        "message": text,
        "source": "web-01",
        "streams": ["s1"],
    })
}

/// A search response body.
pub fn search_body(messages: &[Value], total_results: u64) -> Value {
    json!({
        "messages": messages.iter().map(|m| json!({ "message": m })).collect::<Vec<_>>(),
        "total_results": total_results,
    })
}
