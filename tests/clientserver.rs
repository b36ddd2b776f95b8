use hawk::{Header, Key, PayloadHasher, RequestBuilder, SHA256};
use hawk_interceptor::{
    ClockSync, Credentials, HawkInterceptor, HawkSigner, Interceptor, NestedConfig,
    OutgoingRequest, SignRequest, SigningConfig, SigningOptions,
};
use hyper::header::{AUTHORIZATION, CONTENT_TYPE};
use hyper::http::request::Parts;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Client, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::{SocketAddr, TcpListener};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

const ID: &str = "7c3f36371d144d91bcd747842f3d9746";
const KEY: &str = "5b85a5b854f84f9b9d62f4bc45d9fbf1";

#[derive(Clone, Copy)]
struct TestParams {
    server_require_hash: bool,
}

/// A loopback server that checks each request's Hawk header and answers 200 or 401.
struct TestServer {
    shutdown_tx: oneshot::Sender<()>,
    local_address: SocketAddr,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    fn new(tp: TestParams) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let local_address = listener.local_addr().unwrap();
        let port = local_address.port();

        let service_factory = make_service_fn(move |_conn| async move {
            Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                TestServer::handle(tp, port, req)
            }))
        });
        let server = Server::from_tcp(listener).unwrap().serve(service_factory);

        // set up a channel to signal the server to stop
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let shutdown = async {
                shutdown_rx.await.ok();
            };
            if let Err(e) = server.with_graceful_shutdown(shutdown).await {
                eprintln!("server error: {}", e);
            }
        });

        Self {
            shutdown_tx,
            local_address,
            handle,
        }
    }

    async fn handle(
        tp: TestParams,
        port: u16,
        req: Request<Body>,
    ) -> Result<Response<Body>, hyper::Error> {
        let (parts, body) = req.into_parts();
        let body = hyper::body::to_bytes(body).await?;

        let status = if TestServer::authorized(tp, port, &parts, &body) {
            StatusCode::OK
        } else {
            StatusCode::UNAUTHORIZED
        };
        Ok(Response::builder()
            .status(status)
            .body(Body::empty())
            .unwrap())
    }

    fn authorized(tp: TestParams, port: u16, parts: &Parts, body: &[u8]) -> bool {
        let value = match parts.headers.get(AUTHORIZATION).map(|v| v.to_str()) {
            Some(Ok(v)) if v.starts_with("Hawk ") => v,
            _ => return false,
        };
        let header = match Header::from_str(&value[5..]) {
            Ok(h) => h,
            Err(_) => return false,
        };
        if header.id.as_deref() != Some(ID) {
            return false;
        }

        let path = parts.uri.path_and_query().map_or("/", |p| p.as_str());
        let mut req_builder = RequestBuilder::new(parts.method.as_str(), "127.0.0.1", port, path);

        // if requested, calculate hash, add to builder
        let hash;
        if tp.server_require_hash {
            let content_type = parts
                .headers
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("");
            hash = PayloadHasher::hash(content_type, SHA256, body).unwrap();
            req_builder = req_builder.hash(&hash[..]);
        }

        let key = Key::new(KEY, SHA256).unwrap();
        req_builder
            .request()
            .validate_header(&header, &key, Duration::from_secs(60))
    }

    async fn stop(self) {
        self.shutdown_tx.send(()).unwrap();
        self.handle.await.unwrap();
    }
}

fn init(options: SigningOptions) -> (HawkInterceptor, SigningConfig) {
    let interceptor = HawkInterceptor::new(Arc::new(ClockSync::new()));
    let config = interceptor
        .init(
            NestedConfig::new(Credentials::new(ID, KEY, "sha256"))
                .options(options)
                .log_level("DEBUG")
                .into(),
        )
        .unwrap();
    (interceptor, config)
}

/// Send an intercepted request to `path` on the server, which may differ from the signed path.
async fn send(address: &SocketAddr, req: &OutgoingRequest, path: &str) -> StatusCode {
    let mut builder = Request::builder()
        .method(req.effective_method())
        .uri(format!("http://{}{}", address, path));
    for (name, value) in req.headers.as_ref().unwrap() {
        builder = builder.header(name.as_str(), value.as_str());
    }
    let body = Body::from(req.entity.clone().unwrap_or_default());

    let client = Client::new();
    let res = client.request(builder.body(body).unwrap()).await.unwrap();
    res.status()
}

async fn run_client_server(
    tp: TestParams,
    options: SigningOptions,
    req: impl FnOnce(&SocketAddr) -> OutgoingRequest,
    path: &str,
) -> StatusCode {
    let test_server = TestServer::new(tp);
    let (interceptor, config) = init(options);
    let req = interceptor
        .request(req(&test_server.local_address), &config)
        .unwrap();

    let status = send(&test_server.local_address, &req, path).await;
    test_server.stop().await;
    status
}

const NO_HASH: TestParams = TestParams {
    server_require_hash: false,
};

#[tokio::test]
async fn get_is_accepted() {
    let status = run_client_server(
        NO_HASH,
        SigningOptions::new(),
        |addr| OutgoingRequest::new(format!("http://{}/api/hapi/plugins", addr)),
        "/api/hapi/plugins",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn post_with_ext_is_accepted() {
    let status = run_client_server(
        NO_HASH,
        SigningOptions::new().ext("app-specific-data"),
        |addr| {
            OutgoingRequest::new(format!("http://{}/api/items?page=2", addr))
                .entity("{\"some\":\"payload\"}")
        },
        "/api/items?page=2",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn payload_hash_is_accepted() {
    let body = "foo=bar";
    let status = run_client_server(
        TestParams {
            server_require_hash: true,
        },
        SigningOptions::new().payload(body).content_type("text/plain"),
        |addr| {
            OutgoingRequest::new(format!("http://{}/resource", addr))
                .header("Content-Type", "text/plain")
                .entity(body)
        },
        "/resource",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn missing_hash_is_rejected() {
    let status = run_client_server(
        TestParams {
            server_require_hash: true,
        },
        SigningOptions::new(),
        |addr| {
            OutgoingRequest::new(format!("http://{}/resource", addr))
                .header("Content-Type", "text/plain")
                .entity("foo=bar")
        },
        "/resource",
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_path_is_rejected() {
    let status = run_client_server(
        NO_HASH,
        SigningOptions::new(),
        |addr| OutgoingRequest::new(format!("http://{}/api/items", addr)),
        "/api/other",
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signed_hyper_request_is_accepted() {
    let test_server = TestServer::new(NO_HASH);
    let (_, config) = init(SigningOptions::new());
    let signer = HawkSigner::new(Arc::new(ClockSync::new()));

    let mut req = Request::builder()
        .method("PUT")
        .uri(format!("http://{}/resource", test_server.local_address))
        .body(Body::from("hello"))
        .unwrap();
    req.sign_hawk(&signer, &config).unwrap();

    let status = Client::new().request(req).await.unwrap().status();
    test_server.stop().await;
    assert_eq!(status, StatusCode::OK);
}
