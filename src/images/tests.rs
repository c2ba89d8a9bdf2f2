use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Query, RawQuery, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use uuid::Uuid;

use super::*;
use crate::config::{
    CoverArtArchiveConfig, DeezerConfig, ImageSourceConfig, SpotifyConfig, SubsonicConfig,
};
use crate::error::Error;
use crate::test_utils::{spawn_upstream, HitCounter};

// ---------------------------------------------------------------------------
// Resolver chains
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Outcome {
    Found(&'static str),
    Missing,
    Fails,
}

struct FakeProvider {
    name: &'static str,
    outcome: Outcome,
    calls: HitCounter,
    shutdowns: HitCounter,
}

impl FakeProvider {
    fn new(name: &'static str, outcome: Outcome) -> Arc<Self> {
        Arc::new(Self {
            name,
            outcome,
            calls: HitCounter::new(),
            shutdowns: HitCounter::new(),
        })
    }

    fn answer(&self) -> crate::Result<Option<String>> {
        self.calls.hit();
        match self.outcome {
            Outcome::Found(url) => Ok(Some(url.to_string())),
            Outcome::Missing => Ok(None),
            Outcome::Fails => Err(Error::Status {
                service: self.name,
                status: StatusCode::BAD_GATEWAY,
            }),
        }
    }
}

#[async_trait]
impl ImageProvider for FakeProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn artist_image(&self, _query: &ArtistImageQuery) -> crate::Result<Option<String>> {
        self.answer()
    }

    async fn album_image(&self, _query: &AlbumImageQuery) -> crate::Result<Option<String>> {
        self.answer()
    }

    async fn shutdown(&self) {
        self.shutdowns.hit();
    }
}

fn chain(providers: &[&Arc<FakeProvider>]) -> Vec<Arc<dyn ImageProvider>> {
    providers
        .iter()
        .map(|provider| (*provider).clone() as Arc<dyn ImageProvider>)
        .collect()
}

fn artist_query(names: &[&str]) -> ArtistImageQuery {
    ArtistImageQuery::new(names.iter().map(|name| name.to_string()).collect())
}

fn album_query(artists: &[&str], album: &str) -> AlbumImageQuery {
    AlbumImageQuery::new(
        artists.iter().map(|artist| artist.to_string()).collect(),
        album.to_string(),
    )
}

#[tokio::test]
async fn test_first_found_wins() {
    let first = FakeProvider::new("first", Outcome::Found("https://img/first"));
    let second = FakeProvider::new("second", Outcome::Found("https://img/second"));
    let resolver = ImageResolver::from_chains(chain(&[&first, &second]), vec![]);

    let url = resolver.artist_image(&artist_query(&["x"])).await.unwrap();

    assert_eq!(url.as_deref(), Some("https://img/first"));
    assert_eq!(second.calls.count(), 0);
}

#[tokio::test]
async fn test_missing_falls_through() {
    let first = FakeProvider::new("first", Outcome::Missing);
    let blank = FakeProvider::new("blank", Outcome::Found("   "));
    let last = FakeProvider::new("last", Outcome::Found("https://img/last"));
    let resolver = ImageResolver::from_chains(vec![], chain(&[&first, &blank, &last]));

    let url = resolver.album_image(&album_query(&["x"], "y")).await.unwrap();

    assert_eq!(url.as_deref(), Some("https://img/last"));
    assert_eq!(first.calls.count(), 1);
    assert_eq!(blank.calls.count(), 1);
}

#[tokio::test]
async fn test_early_error_is_swallowed() {
    let broken = FakeProvider::new("broken", Outcome::Fails);
    let working = FakeProvider::new("working", Outcome::Found("https://img/ok"));
    let resolver = ImageResolver::from_chains(chain(&[&broken, &working]), vec![]);

    let url = resolver.artist_image(&artist_query(&["x"])).await.unwrap();

    assert_eq!(url.as_deref(), Some("https://img/ok"));
}

#[tokio::test]
async fn test_last_error_is_returned() {
    let missing = FakeProvider::new("missing", Outcome::Missing);
    let broken = FakeProvider::new("broken", Outcome::Fails);
    let resolver = ImageResolver::from_chains(chain(&[&missing, &broken]), vec![]);

    let err = resolver
        .artist_image(&artist_query(&["x"]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Status { service: "broken", .. }));
}

#[tokio::test]
async fn test_all_missing_is_none() {
    let a = FakeProvider::new("a", Outcome::Missing);
    let b = FakeProvider::new("b", Outcome::Missing);
    let resolver = ImageResolver::from_chains(chain(&[&a, &b]), chain(&[&a, &b]));

    assert_eq!(resolver.artist_image(&artist_query(&["x"])).await.unwrap(), None);
    assert_eq!(resolver.album_image(&album_query(&["x"], "y")).await.unwrap(), None);
    assert_eq!(a.calls.count(), 2);
}

#[tokio::test]
async fn test_empty_chain_is_none() {
    let resolver = ImageResolver::from_chains(vec![], vec![]);
    assert_eq!(resolver.artist_image(&artist_query(&["x"])).await.unwrap(), None);
    assert_eq!(resolver.album_image(&album_query(&[], "")).await.unwrap(), None);
}

#[tokio::test]
async fn test_shared_provider_shut_down_once() {
    let shared = FakeProvider::new("shared", Outcome::Missing);
    let album_only = FakeProvider::new("album-only", Outcome::Missing);
    let resolver =
        ImageResolver::from_chains(chain(&[&shared]), chain(&[&shared, &album_only]));

    resolver.shutdown().await;

    assert_eq!(shared.shutdowns.count(), 1);
    assert_eq!(album_only.shutdowns.count(), 1);
}

#[tokio::test]
async fn test_chain_order_from_config() {
    let config = ImageSourceConfig {
        spotify: Some(SpotifyConfig::new("id", "secret")),
        subsonic: Some(SubsonicConfig {
            url: "http://127.0.0.1:9".to_string(),
            auth_params: "u=a&p=b".to_string(),
        }),
        cover_art_archive: Some(CoverArtArchiveConfig::default()),
        deezer: Some(DeezerConfig::default()),
    };
    let resolver = ImageResolver::new(&config, "linernotes-test");

    assert_eq!(
        resolver.artist_provider_names(),
        vec!["Spotify", "Subsonic", "Deezer"]
    );
    assert_eq!(
        resolver.album_provider_names(),
        vec!["Spotify", "Subsonic", "Cover Art Archive", "Deezer"]
    );
    resolver.shutdown().await;
}

#[tokio::test]
async fn test_nothing_enabled_resolves_none() {
    let resolver = ImageResolver::new(&ImageSourceConfig::default(), "linernotes-test");

    assert!(resolver.artist_provider_names().is_empty());
    assert_eq!(resolver.artist_image(&artist_query(&["x"])).await.unwrap(), None);
    assert_eq!(resolver.album_image(&album_query(&["x"], "y")).await.unwrap(), None);
}

#[tokio::test]
async fn test_degenerate_queries_with_subsonic_only() {
    // Unreachable server: any request would surface as an error.
    let config = ImageSourceConfig {
        subsonic: Some(SubsonicConfig {
            url: "http://127.0.0.1:9".to_string(),
            auth_params: "u=a&p=b".to_string(),
        }),
        ..ImageSourceConfig::default()
    };
    let resolver = ImageResolver::new(&config, "linernotes-test");

    assert_eq!(resolver.artist_image(&ArtistImageQuery::default()).await.unwrap(), None);
    assert_eq!(resolver.artist_image(&artist_query(&["", "  "])).await.unwrap(), None);
    assert_eq!(resolver.album_image(&AlbumImageQuery::default()).await.unwrap(), None);
    assert_eq!(resolver.album_image(&album_query(&[], "Souvlaki")).await.unwrap(), None);
    resolver.shutdown().await;
}

// ---------------------------------------------------------------------------
// Spotify
// ---------------------------------------------------------------------------

const SPOTIFY_BASIC: &str = "Basic Y2xpZW50LWlkOmNsaWVudC1zZWNyZXQ=";

#[derive(Clone)]
struct SpotifyMock {
    token_hits: HitCounter,
    search_hits: HitCounter,
    reject_first: usize,
    queries: Arc<Mutex<Vec<String>>>,
    respond: fn(&str, &str) -> Value,
}

async fn spotify_token(
    State(mock): State<SpotifyMock>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let issued = mock.token_hits.hit();
    let authorized = headers
        .get("authorization")
        .is_some_and(|value| value == SPOTIFY_BASIC);
    if !authorized || body != "grant_type=client_credentials" {
        return StatusCode::BAD_REQUEST.into_response();
    }
    Json(json!({
        "access_token": format!("token-{}", issued),
        "token_type": "Bearer",
        "expires_in": 3600
    }))
    .into_response()
}

async fn spotify_search(
    State(mock): State<SpotifyMock>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let n = mock.search_hits.hit();
    let bearer = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if n <= mock.reject_first || !bearer.starts_with("Bearer token-") {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let kind = params.get("type").cloned().unwrap_or_default();
    let q = params.get("q").cloned().unwrap_or_default();
    assert_eq!(params.get("limit").map(String::as_str), Some("5"));
    mock.queries.lock().unwrap().push(q.clone());
    Json((mock.respond)(&kind, &q)).into_response()
}

async fn mock_spotify(reject_first: usize, respond: fn(&str, &str) -> Value) -> (SpotifyClient, SpotifyMock) {
    let mock = SpotifyMock {
        token_hits: HitCounter::new(),
        search_hits: HitCounter::new(),
        reject_first,
        queries: Arc::new(Mutex::new(Vec::new())),
        respond,
    };
    let router = Router::new()
        .route("/api/token", post(spotify_token))
        .route("/v1/search", get(spotify_search))
        .with_state(mock.clone());
    let base = spawn_upstream(router).await;

    let config = SpotifyConfig {
        token_url: format!("{}/api/token", base),
        api_url: base,
        ..SpotifyConfig::new("client-id", "client-secret")
    };
    (SpotifyClient::new(&config, "linernotes-test"), mock)
}

fn spotify_artists(_kind: &str, _q: &str) -> Value {
    json!({"artists": {"items": [
        {"name": "Beach House Tribute", "images": [{"url": "https://img/tribute"}]},
        {"name": "beach house", "images": [{"url": "https://img/beach-house"}, {"url": "https://img/small"}]}
    ]}})
}

fn spotify_album_only(_kind: &str, q: &str) -> Value {
    if q.contains("artist:") {
        return json!({"albums": {"items": []}});
    }
    json!({"albums": {"items": [
        {"name": "Souvlaki", "artists": [{"name": "Slowdive"}], "images": [{"url": "https://img/souvlaki"}]}
    ]}})
}

fn spotify_wrong_artist(_kind: &str, _q: &str) -> Value {
    json!({"albums": {"items": [
        {"name": "Souvlaki", "artists": [{"name": "Some Cover Band"}], "images": [{"url": "https://img/cover-band"}]}
    ]}})
}

#[tokio::test]
async fn test_spotify_artist_exact_match() {
    let (client, mock) = mock_spotify(0, spotify_artists).await;

    let url = client.artist_image(&artist_query(&["Beach House"])).await.unwrap();

    assert_eq!(url.as_deref(), Some("https://img/beach-house"));
    assert_eq!(
        mock.queries.lock().unwrap().clone(),
        vec!["artist:\"Beach House\"".to_string()]
    );
    client.shutdown().await;
}

#[tokio::test]
async fn test_spotify_refreshes_token_once_on_unauthorized() {
    let (client, mock) = mock_spotify(1, spotify_artists).await;

    let url = client.artist_image(&artist_query(&["Beach House"])).await.unwrap();

    assert_eq!(url.as_deref(), Some("https://img/beach-house"));
    assert_eq!(mock.token_hits.count(), 2);
    assert_eq!(mock.search_hits.count(), 2);
    client.shutdown().await;
}

#[tokio::test]
async fn test_spotify_second_unauthorized_is_an_error() {
    let (client, mock) = mock_spotify(usize::MAX, spotify_artists).await;

    let err = client
        .artist_image(&artist_query(&["Beach House"]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Unauthorized { service: "Spotify" }));
    assert_eq!(mock.token_hits.count(), 2);
    assert_eq!(mock.search_hits.count(), 2);
    client.shutdown().await;
}

#[tokio::test]
async fn test_spotify_token_reused_across_lookups() {
    let (client, mock) = mock_spotify(0, spotify_artists).await;
    let client = Arc::new(client);

    let lookups = (0..5).map(|_| {
        let client = client.clone();
        async move { client.artist_image(&artist_query(&["Beach House"])).await }
    });
    for result in futures::future::join_all(lookups).await {
        assert_eq!(result.unwrap().as_deref(), Some("https://img/beach-house"));
    }

    assert_eq!(mock.token_hits.count(), 1);
    assert_eq!(mock.search_hits.count(), 5);
    client.shutdown().await;
}

#[tokio::test]
async fn test_spotify_album_falls_back_to_album_only_query() {
    let (client, mock) = mock_spotify(0, spotify_album_only).await;

    let url = client
        .album_image(&album_query(&["Slowdive", "slowdive", "Neil Halstead"], "Souvlaki"))
        .await
        .unwrap();

    assert_eq!(url.as_deref(), Some("https://img/souvlaki"));
    assert_eq!(
        mock.queries.lock().unwrap().clone(),
        vec![
            "album:\"Souvlaki\" artist:\"Slowdive\"".to_string(),
            "album:\"Souvlaki\" artist:\"Neil Halstead\"".to_string(),
            "album:\"Souvlaki\"".to_string(),
        ]
    );
    client.shutdown().await;
}

#[tokio::test]
async fn test_spotify_album_requires_matching_artist() {
    let (client, mock) = mock_spotify(0, spotify_wrong_artist).await;

    let url = client
        .album_image(&album_query(&["Slowdive"], "Souvlaki"))
        .await
        .unwrap();

    assert_eq!(url, None);
    assert_eq!(mock.search_hits.count(), 2);
    client.shutdown().await;
}

#[tokio::test]
async fn test_spotify_empty_queries_skip_network() {
    let (client, mock) = mock_spotify(0, spotify_artists).await;

    assert_eq!(client.artist_image(&ArtistImageQuery::default()).await.unwrap(), None);
    assert_eq!(client.album_image(&album_query(&["Slowdive"], " ")).await.unwrap(), None);
    assert_eq!(mock.token_hits.count(), 0);
    assert_eq!(mock.search_hits.count(), 0);
    client.shutdown().await;
}

// ---------------------------------------------------------------------------
// Subsonic
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct SubsonicMock {
    body: &'static str,
    queries: Arc<Mutex<Vec<String>>>,
}

async fn subsonic_search(State(mock): State<SubsonicMock>, RawQuery(query): RawQuery) -> Response {
    mock.queries.lock().unwrap().push(query.unwrap_or_default());
    (
        StatusCode::OK,
        [("content-type", "application/json")],
        mock.body,
    )
        .into_response()
}

async fn mock_subsonic(body: &'static str) -> (SubsonicClient, SubsonicMock, String) {
    let mock = SubsonicMock {
        body,
        queries: Arc::new(Mutex::new(Vec::new())),
    };
    let router = Router::new()
        .route("/rest/search3", get(subsonic_search))
        .with_state(mock.clone());
    let base = spawn_upstream(router).await;
    let config = SubsonicConfig {
        url: format!("{}/", base),
        auth_params: "u=alice&t=tok&s=salt".to_string(),
    };
    (SubsonicClient::new(&config, "linernotes-test"), mock, base)
}

#[tokio::test]
async fn test_subsonic_album_cover_url() {
    let (client, mock, base) = mock_subsonic(
        r#"{"subsonic-response":{"status":"ok","version":"1.16.1","searchResult3":{"album":[{"id":"al-1","name":"Souvlaki","coverArt":"al-1"}]}}}"#,
    )
    .await;

    let url = client
        .album_image(&album_query(&["Slowdive", "Neil Halstead"], "Souvlaki"))
        .await
        .unwrap();

    assert_eq!(
        url,
        Some(format!(
            "{}/rest/getCoverArt?u=alice&t=tok&s=salt&id=al-1&v=1.13.0&c=linernotes",
            base
        ))
    );
    let queries = mock.queries.lock().unwrap().clone();
    assert_eq!(queries.len(), 1);
    assert!(queries[0].starts_with("u=alice&t=tok&s=salt&f=json"));
    assert!(queries[0].contains("query=Slowdive%20Souvlaki"));
    assert!(queries[0].contains("artistCount=0&songCount=0&albumCount=1"));
    client.shutdown().await;
}

#[tokio::test]
async fn test_subsonic_artist_image() {
    let (client, mock, _base) = mock_subsonic(
        r#"{"subsonic-response":{"status":"ok","searchResult3":{"artist":[{"id":"ar-1","name":"Slowdive","artistImageUrl":"https://img/slowdive"}]}}}"#,
    )
    .await;

    let url = client
        .artist_image(&artist_query(&["", "Slowdive"]))
        .await
        .unwrap();

    assert_eq!(url.as_deref(), Some("https://img/slowdive"));
    let queries = mock.queries.lock().unwrap().clone();
    assert!(queries[0].contains("query=Slowdive&"));
    assert!(queries[0].contains("artistCount=1&songCount=0&albumCount=0"));
    client.shutdown().await;
}

#[tokio::test]
async fn test_subsonic_empty_result_is_none() {
    let (client, _mock, _base) =
        mock_subsonic(r#"{"subsonic-response":{"status":"ok","searchResult3":{}}}"#).await;

    assert_eq!(client.artist_image(&artist_query(&["Nobody"])).await.unwrap(), None);
    assert_eq!(
        client.album_image(&album_query(&["Nobody"], "Nothing")).await.unwrap(),
        None
    );
    client.shutdown().await;
}

#[tokio::test]
async fn test_subsonic_failed_status_is_an_error() {
    let (client, _mock, _base) = mock_subsonic(
        r#"{"subsonic-response":{"status":"failed","error":{"code":40,"message":"Wrong username or password"}}}"#,
    )
    .await;

    let err = client
        .artist_image(&artist_query(&["Slowdive"]))
        .await
        .unwrap_err();

    match err {
        Error::Upstream { service, message } => {
            assert_eq!(service, "Subsonic");
            assert!(message.contains("Wrong username or password"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    client.shutdown().await;
}

// ---------------------------------------------------------------------------
// Deezer
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct DeezerMock {
    artist_body: &'static str,
    album_body: &'static str,
    queries: Arc<Mutex<Vec<String>>>,
}

async fn deezer_artist(
    State(mock): State<DeezerMock>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    mock.queries
        .lock()
        .unwrap()
        .push(params.get("q").cloned().unwrap_or_default());
    ([("content-type", "application/json")], mock.artist_body).into_response()
}

async fn deezer_album(
    State(mock): State<DeezerMock>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    mock.queries
        .lock()
        .unwrap()
        .push(params.get("q").cloned().unwrap_or_default());
    ([("content-type", "application/json")], mock.album_body).into_response()
}

async fn mock_deezer(artist_body: &'static str, album_body: &'static str) -> (DeezerClient, DeezerMock) {
    let mock = DeezerMock {
        artist_body,
        album_body,
        queries: Arc::new(Mutex::new(Vec::new())),
    };
    let router = Router::new()
        .route("/search/artist", get(deezer_artist))
        .route("/search/album", get(deezer_album))
        .with_state(mock.clone());
    let base = spawn_upstream(router).await;
    (
        DeezerClient::new(&DeezerConfig { url: base }, "linernotes-test"),
        mock,
    )
}

#[tokio::test]
async fn test_deezer_artist_skips_placeholders_and_near_matches() {
    let (client, mock) = mock_deezer(
        r#"{"data":[
            {"name":"Slowdive Tribute","picture_xl":"https://cdn/images/artist/aaa/1000x1000.jpg"},
            {"name":"SLOWDIVE","picture_xl":"https://cdn/images/artist//1000x1000.jpg"},
            {"name":"Slowdive","picture_xl":"https://cdn/images/artist/bbb/1000x1000.jpg"}
        ],"total":3}"#,
        r#"{"data":[]}"#,
    )
    .await;

    let url = client.artist_image(&artist_query(&["slowdive"])).await.unwrap();

    assert_eq!(url.as_deref(), Some("https://cdn/images/artist/bbb/1000x1000.jpg"));
    assert_eq!(mock.queries.lock().unwrap().clone(), vec!["slowdive".to_string()]);
    client.shutdown().await;
}

#[tokio::test]
async fn test_deezer_album_query_per_artist() {
    let (client, mock) = mock_deezer(
        r#"{"data":[]}"#,
        r#"{"data":[{"title":"Souvlaki","cover_xl":"https://cdn/images/cover/ccc/1000x1000.jpg","artist":{"name":"Slowdive"}}]}"#,
    )
    .await;

    let url = client
        .album_image(&album_query(&["Neil Halstead", "Slowdive"], "souvlaki"))
        .await
        .unwrap();

    assert_eq!(url.as_deref(), Some("https://cdn/images/cover/ccc/1000x1000.jpg"));
    assert_eq!(
        mock.queries.lock().unwrap().clone(),
        vec!["artist:\"Neil Halstead\" album:\"souvlaki\"".to_string()]
    );
    client.shutdown().await;
}

#[tokio::test]
async fn test_deezer_album_without_artists() {
    let (client, mock) = mock_deezer(
        r#"{"data":[]}"#,
        r#"{"data":[{"title":"Souvlaki","cover_xl":"https://cdn/images/cover/ccc/1000x1000.jpg","artist":{"name":"Slowdive"}}]}"#,
    )
    .await;

    let url = client.album_image(&album_query(&[], "Souvlaki")).await.unwrap();

    assert_eq!(url.as_deref(), Some("https://cdn/images/cover/ccc/1000x1000.jpg"));
    assert_eq!(
        mock.queries.lock().unwrap().clone(),
        vec!["album:\"Souvlaki\"".to_string()]
    );
    client.shutdown().await;
}

#[tokio::test]
async fn test_deezer_error_object_is_an_error() {
    let (client, _mock) = mock_deezer(
        r#"{"error":{"type":"Exception","message":"Quota limit exceeded","code":4}}"#,
        r#"{"data":[]}"#,
    )
    .await;

    let err = client
        .artist_image(&artist_query(&["Slowdive"]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Upstream { service: "Deezer", .. }));
    client.shutdown().await;
}

// ---------------------------------------------------------------------------
// Cover Art Archive
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct CaaMock {
    release_listing: Option<&'static str>,
    release_group_front: bool,
    requests: Arc<Mutex<Vec<String>>>,
}

async fn caa_handler(State(mock): State<CaaMock>, method: Method, uri: Uri) -> Response {
    let path = uri.path().to_string();
    mock.requests
        .lock()
        .unwrap()
        .push(format!("{} {}", method, path));

    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    match segments.as_slice() {
        ["release", _id] => match mock.release_listing {
            Some(body) => ([("content-type", "application/json")], body).into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        },
        ["release-group", _id, "front"] if mock.release_group_front => {
            StatusCode::OK.into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn mock_caa(
    release_listing: Option<&'static str>,
    release_group_front: bool,
) -> (CoverArtArchiveClient, CaaMock, String) {
    let mock = CaaMock {
        release_listing,
        release_group_front,
        requests: Arc::new(Mutex::new(Vec::new())),
    };
    let router = Router::new().fallback(caa_handler).with_state(mock.clone());
    let base = spawn_upstream(router).await;
    let client =
        CoverArtArchiveClient::new(&CoverArtArchiveConfig { url: base.clone() }, "linernotes-test");
    (client, mock, base)
}

#[tokio::test]
async fn test_caa_release_listing_uses_cover_selector() {
    let (client, mock, _base) = mock_caa(
        Some(
            r#"{"images":[
                {"image":"https://caa/back.jpg","front":false,"back":true,"thumbnails":{"1200":"https://caa/back-1200.jpg"}},
                {"image":"https://caa/front.jpg","front":true,"back":false,"thumbnails":{"small":"https://caa/front-250.jpg","large":"https://caa/front-500.jpg"}}
            ],"release":"https://musicbrainz.org/release/x"}"#,
        ),
        true,
    )
    .await;
    let query = album_query(&["Slowdive"], "Souvlaki")
        .with_release_id(Uuid::new_v4())
        .with_release_group_id(Uuid::new_v4());

    let url = client.album_image(&query).await.unwrap();

    assert_eq!(url.as_deref(), Some("https://caa/front-500.jpg"));
    assert_eq!(mock.requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_caa_falls_back_to_release_group_front() {
    let (client, mock, base) = mock_caa(None, true).await;
    let release = Uuid::new_v4();
    let group = Uuid::new_v4();
    let query = album_query(&[], "Souvlaki")
        .with_release_id(release)
        .with_release_group_id(group);

    let url = client.album_image(&query).await.unwrap();

    assert_eq!(url, Some(format!("{}/release-group/{}/front", base, group)));
    assert_eq!(
        mock.requests.lock().unwrap().clone(),
        vec![
            format!("GET /release/{}", release),
            format!("HEAD /release/{}/front", release),
            format!("GET /release-group/{}", group),
            format!("HEAD /release-group/{}/front", group),
        ]
    );
}

#[tokio::test]
async fn test_caa_skips_nil_and_missing_ids() {
    let (client, mock, _base) = mock_caa(None, true).await;

    let nil_release = album_query(&[], "Souvlaki").with_release_id(Uuid::nil());
    assert_eq!(client.album_image(&nil_release).await.unwrap(), None);
    assert_eq!(client.album_image(&AlbumImageQuery::default()).await.unwrap(), None);
    assert!(mock.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_caa_nothing_found() {
    let (client, _mock, _base) = mock_caa(None, false).await;
    let query = album_query(&[], "Souvlaki")
        .with_release_id(Uuid::new_v4())
        .with_release_group_id(Uuid::new_v4());

    assert_eq!(client.album_image(&query).await.unwrap(), None);
}

#[tokio::test]
async fn test_album_chain_falls_through_to_deezer() {
    let (caa, caa_mock, _base) = mock_caa(None, false).await;
    let (deezer, _deezer_mock) = mock_deezer(
        r#"{"data":[]}"#,
        r#"{"data":[{"title":"Souvlaki","cover_xl":"https://cdn/images/cover/ddd/1000x1000.jpg","artist":{"name":"Slowdive"}}]}"#,
    )
    .await;
    let resolver = ImageResolver::from_chains(
        vec![],
        vec![
            Arc::new(caa) as Arc<dyn ImageProvider>,
            Arc::new(deezer) as Arc<dyn ImageProvider>,
        ],
    );
    let query = album_query(&["Slowdive"], "Souvlaki").with_release_id(Uuid::new_v4());

    let url = resolver.album_image(&query).await.unwrap();

    assert_eq!(url.as_deref(), Some("https://cdn/images/cover/ddd/1000x1000.jpg"));
    assert_eq!(caa_mock.requests.lock().unwrap().len(), 2);
    resolver.shutdown().await;
}
