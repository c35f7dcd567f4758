use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{routing::get, Router};
use covid_core::FreshnessMarker;
use covid_infra::net::{fetch_json, fetch_table, FetchError, FetchOutcome};
use std::net::SocketAddr;

async fn start_server() -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let app = Router::new()
        .route(
            "/dati/platea.csv",
            get(|| async { "area,fascia_anagrafica,totale_popolazione\nABR,12-19,106000\n" }),
        )
        .route("/dati/empty.csv", get(|| async { "" }))
        .route(
            "/dati/broken.csv",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response() }),
        )
        .route(
            "/dati/last-update-dataset.json",
            get(|| async { r#"{"ultimo_aggiornamento":"2022-03-01T06:00:00+01:00"}"# }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, handle)
}

#[tokio::test]
async fn classifies_success_missing_and_failures() {
    let (addr, handle) = start_server().await;
    let client = reqwest::Client::new();
    let base = format!("http://{addr}/dati");

    match fetch_table(&client, &format!("{base}/platea.csv")).await {
        FetchOutcome::Success(table) => {
            assert_eq!(
                table.header,
                vec!["area", "fascia_anagrafica", "totale_popolazione"]
            );
            assert_eq!(table.rows, 1);
        }
        other => panic!("expected success, got {other:?}"),
    }

    assert_eq!(
        fetch_table(&client, &format!("{base}/missing.csv")).await,
        FetchOutcome::NotFound
    );

    assert!(matches!(
        fetch_table(&client, &format!("{base}/broken.csv")).await,
        FetchOutcome::TransportError(msg) if msg.contains("500")
    ));

    assert!(matches!(
        fetch_table(&client, &format!("{base}/empty.csv")).await,
        FetchOutcome::TransportError(msg) if msg.contains("invalid table")
    ));

    handle.abort();
}

#[tokio::test]
async fn unreachable_host_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = reqwest::Client::new();
    let outcome = fetch_table(&client, &format!("http://{addr}/x.csv")).await;
    assert!(matches!(outcome, FetchOutcome::TransportError(_)));
}

#[tokio::test]
async fn fetches_marker_json() {
    let (addr, handle) = start_server().await;
    let client = reqwest::Client::new();

    let marker: FreshnessMarker = fetch_json(
        &client,
        &format!("http://{addr}/dati/last-update-dataset.json"),
    )
    .await
    .unwrap();
    assert_eq!(marker.timestamp.to_rfc3339(), "2022-03-01T05:00:00+00:00");

    let missing = fetch_json::<FreshnessMarker>(&client, &format!("http://{addr}/nope.json")).await;
    assert!(matches!(missing, Err(FetchError::NotFound { .. })));

    let wrong_shape =
        fetch_json::<FreshnessMarker>(&client, &format!("http://{addr}/dati/platea.csv")).await;
    assert!(matches!(wrong_shape, Err(FetchError::Decode { .. })));

    handle.abort();
}
