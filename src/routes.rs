use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::Query;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, warn};

use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{Bucket, Comment, DisplayFilters, Movie, MovieTitle, SearchFilters},
};

pub const MOVIES_PER_PAGE: u64 = 20;

pub fn router(state: Arc<AppState>) -> Router {
    let movies = Router::new()
        .route("/", get(list_movies))
        .route("/search", get(search_movies))
        .route("/id/{id}", get(movie_by_id))
        .route("/countries", get(movies_by_country))
        .route("/facet-search", get(facet_search))
        .route(
            "/comment",
            axum::routing::post(post_comment).put(update_comment).delete(delete_comment),
        )
        .route("/config-options", get(config_options));

    Router::new()
        .nest("/api/v1/movies", movies)
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any).allow_methods(Any))
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    page: Option<String>,
    #[serde(default)]
    cast: Vec<String>,
    #[serde(default)]
    genre: Vec<String>,
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CountriesQuery {
    #[serde(default)]
    countries: Vec<String>,
}

#[derive(Debug, Serialize)]
struct MoviePage {
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'static str>,
    movies: Vec<Movie>,
    page: u64,
    filters: DisplayFilters,
    entries_per_page: u64,
    total_results: u64,
}

#[derive(Debug, Serialize)]
struct Facets {
    runtime: Vec<Bucket>,
    rating: Vec<Bucket>,
}

#[derive(Debug, Serialize)]
struct FacetedPage {
    status: &'static str,
    movies: Vec<Movie>,
    facets: Facets,
    page: u64,
    filters: DisplayFilters,
    entries_per_page: u64,
    total_results: u64,
}

#[derive(Debug, Serialize)]
struct MovieResponse {
    status: &'static str,
    movie: Movie,
    updated_type: &'static str,
}

#[derive(Debug, Serialize)]
struct TitlesResponse {
    status: &'static str,
    titles: Vec<MovieTitle>,
}

#[derive(Debug, Serialize)]
struct CommentsResponse {
    status: &'static str,
    comments: Vec<Comment>,
}

/// Zero-indexed page number. Missing or unparseable values fall back to 0.
pub fn parse_page(raw: Option<&str>) -> u64 {
    let Some(raw) = raw else {
        return 0;
    };
    match raw.trim().parse::<u64>() {
        Ok(page) => page,
        Err(err) => {
            warn!(page = %raw, error = %err, "bad value for page, defaulting to 0");
            0
        },
    }
}

/// Builds the store filters and the client-facing echo of them. Empty values
/// contribute nothing to either.
pub fn build_filters(
    cast: &[String],
    genre: &[String],
    text: Option<&str>,
) -> (SearchFilters, DisplayFilters) {
    let mut filters = SearchFilters::default();
    let mut display = DisplayFilters::default();

    if !cast.is_empty() {
        filters.cast = Some(cast.to_vec());
        display.cast = Some(cast.to_vec());
    }
    if !genre.is_empty() {
        filters.genres = Some(genre.to_vec());
        display.genre = Some(genre.to_vec());
    }
    if let Some(text) = text.filter(|t| !t.is_empty()) {
        filters.text = Some(text.to_string());
        display.search = Some(text.to_string());
    }

    (filters, display)
}

async fn list_movies(State(state): State<Arc<AppState>>) -> AppResult<Response> {
    let (movies, total_results) = state.store.get_movies(None, 0, MOVIES_PER_PAGE).await?;

    Ok(Json(MoviePage {
        status: None,
        movies,
        page: 0,
        filters: DisplayFilters::default(),
        entries_per_page: MOVIES_PER_PAGE,
        total_results,
    })
    .into_response())
}

async fn search_movies(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Response> {
    run_search(&state, &query).await
}

async fn run_search(state: &AppState, query: &SearchQuery) -> AppResult<Response> {
    let page = parse_page(query.page.as_deref());
    let (filters, display) = build_filters(&query.cast, &query.genre, query.text.as_deref());

    debug!(page, ?filters, "searching movies");

    let filters = (!filters.is_empty()).then_some(filters);
    let (movies, total_results) =
        state.store.get_movies(filters.as_ref(), page, MOVIES_PER_PAGE).await?;

    Ok(Json(MoviePage {
        status: Some("success"),
        movies,
        page,
        filters: display,
        entries_per_page: MOVIES_PER_PAGE,
        total_results,
    })
    .into_response())
}

async fn movie_by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let Some(movie) = state.store.get_movie(&id).await? else {
        return Ok((StatusCode::BAD_REQUEST, Json(json!({ "status": "fail" }))).into_response());
    };

    let updated_type = movie.lastupdated.type_name();
    Ok(Json(MovieResponse { status: "success", movie, updated_type }).into_response())
}

async fn movies_by_country(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CountriesQuery>,
) -> AppResult<Json<TitlesResponse>> {
    let titles = state.store.get_movies_by_country(&query.countries).await?;
    Ok(Json(TitlesResponse { status: "success", titles }))
}

async fn facet_search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Response> {
    if query.cast.is_empty() {
        return run_search(&state, &query).await;
    }

    let page = parse_page(query.page.as_deref());
    let (filters, display) = build_filters(&query.cast, &[], None);

    debug!(page, ?filters, "faceted movie search");

    let (faceted, total_results) =
        state.store.get_movies_faceted(&filters, page, MOVIES_PER_PAGE).await?;

    Ok(Json(FacetedPage {
        status: "success",
        movies: faceted.movies,
        facets: Facets { runtime: faceted.runtime, rating: faceted.rating },
        page,
        filters: display,
        entries_per_page: MOVIES_PER_PAGE,
        total_results,
    })
    .into_response())
}

async fn post_comment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    body: Bytes,
) -> AppResult<Json<CommentsResponse>> {
    let body = parse_body(&body)?;
    let movie_id = expect_string(&body, "movie_id")?;
    let comment = expect_string(&body, "comment")?;

    state.store.add_comment(movie_id, &user, comment, jiff::Timestamp::now()).await?;
    comments_of(&state, movie_id).await
}

async fn update_comment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    body: Bytes,
) -> AppResult<Json<CommentsResponse>> {
    let body = parse_body(&body)?;
    let comment_id = expect_string(&body, "comment_id")?;
    let updated_comment = expect_string(&body, "updated_comment")?;
    let movie_id = expect_string(&body, "movie_id")?;

    let changed = state
        .store
        .update_comment(comment_id, &user.email, updated_comment, jiff::Timestamp::now())
        .await?;
    if changed == 0 {
        debug!(comment_id = %comment_id, email = %user.email, "no comment updated");
    }

    comments_of(&state, movie_id).await
}

async fn delete_comment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    body: Bytes,
) -> AppResult<Json<CommentsResponse>> {
    let body = parse_body(&body)?;
    let comment_id = expect_string(&body, "comment_id")?;
    let movie_id = expect_string(&body, "movie_id")?;

    let deleted = state.store.delete_comment(comment_id, &user.email).await?;
    if deleted == 0 {
        debug!(comment_id = %comment_id, email = %user.email, "no comment deleted");
    }

    comments_of(&state, movie_id).await
}

async fn config_options(State(state): State<Arc<AppState>>) -> AppResult<Json<Map<String, Value>>> {
    let config = state.store.get_configuration().await?;

    let mut body = config.user_info;
    body.insert("status".to_string(), Value::from("success"));
    body.insert("pool_size".to_string(), Value::from(config.pool_size));
    body.insert("wtimeout".to_string(), config.write_concern.wtimeout());

    Ok(Json(body))
}

async fn comments_of(state: &AppState, movie_id: &str) -> AppResult<Json<CommentsResponse>> {
    let movie = state.store.get_movie(movie_id).await?.ok_or(AppError::MovieNotFound)?;
    Ok(Json(CommentsResponse { status: "success", comments: movie.comments.unwrap_or_default() }))
}

fn parse_body(body: &[u8]) -> AppResult<Map<String, Value>> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AppError::MalformedBody("expected a JSON object".to_string())),
        Err(err) => Err(AppError::MalformedBody(err.to_string())),
    }
}

fn expect_string<'a>(body: &'a Map<String, Value>, field: &'static str) -> AppResult<&'a str> {
    body.get(field)
        .and_then(Value::as_str)
        .ok_or(AppError::Validation { field, expected: "string" })
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, header},
    };
    use jiff::Timestamp;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        auth::{
            Hs256Authenticator,
            tests::{SECRET, mint},
        },
        models::{Configuration, FacetedMovies, User, WriteConcern},
        store::{MovieStore, tests::seeded_store},
    };

    /// Store that either fails every call or answers with canned data.
    struct StubStore {
        fail: bool,
    }

    impl StubStore {
        fn check(&self) -> AppResult<()> {
            if self.fail {
                return Err(AppError::from(sea_orm::DbErr::Custom("connection refused".to_string())));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl MovieStore for StubStore {
        async fn get_movie(&self, _id: &str) -> AppResult<Option<Movie>> {
            self.check()?;
            Ok(None)
        }

        async fn get_movies(
            &self,
            _filters: Option<&SearchFilters>,
            _page: u64,
            _per_page: u64,
        ) -> AppResult<(Vec<Movie>, u64)> {
            self.check()?;
            Ok((Vec::new(), 0))
        }

        async fn get_movies_by_country(&self, _countries: &[String]) -> AppResult<Vec<MovieTitle>> {
            self.check()?;
            Ok(Vec::new())
        }

        async fn get_movies_faceted(
            &self,
            _filters: &SearchFilters,
            _page: u64,
            _per_page: u64,
        ) -> AppResult<(FacetedMovies, u64)> {
            self.check()?;
            Ok((FacetedMovies { movies: Vec::new(), runtime: Vec::new(), rating: Vec::new() }, 0))
        }

        async fn add_comment(
            &self,
            _movie_id: &str,
            _user: &User,
            _text: &str,
            _date: Timestamp,
        ) -> AppResult<Comment> {
            self.check()?;
            Err(AppError::MovieNotFound)
        }

        async fn update_comment(
            &self,
            _comment_id: &str,
            _user_email: &str,
            _text: &str,
            _date: Timestamp,
        ) -> AppResult<u64> {
            self.check()?;
            Ok(0)
        }

        async fn delete_comment(&self, _comment_id: &str, _user_email: &str) -> AppResult<u64> {
            self.check()?;
            Ok(0)
        }

        async fn get_configuration(&self) -> AppResult<Configuration> {
            self.check()?;
            let mut user_info = Map::new();
            user_info.insert("status".to_string(), json!("hijacked"));
            user_info.insert("pool_size".to_string(), json!(999));
            user_info.insert("wtimeout".to_string(), json!(1));
            user_info.insert("authenticated_users".to_string(), json!([{ "user": "app" }]));
            Ok(Configuration { pool_size: 50, write_concern: WriteConcern::new("majority", None), user_info })
        }
    }

    fn app_with(store: Arc<dyn MovieStore>) -> Router {
        router(Arc::new(AppState { store, auth: Arc::new(Hs256Authenticator::new(SECRET.as_bytes())) }))
    }

    async fn app() -> Router {
        app_with(Arc::new(seeded_store().await))
    }

    async fn send_raw(app: &Router, req: Request<Body>) -> (StatusCode, Bytes) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        (status, to_bytes(res.into_body(), usize::MAX).await.unwrap())
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let (status, bytes) = send_raw(app, req).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn comment_request(method: &str, token: Option<&str>, body: Value) -> Request<Body> {
        raw_comment_request(method, token, body.to_string())
    }

    fn raw_comment_request(
        method: &str,
        token: Option<&str>,
        body: impl Into<Body>,
    ) -> Request<Body> {
        let mut req = Request::builder()
            .method(method)
            .uri("/api/v1/movies/comment")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        req.body(body.into()).unwrap()
    }

    #[test]
    fn page_defaults_to_zero() {
        assert_eq!(parse_page(None), 0);
        assert_eq!(parse_page(Some("3")), 3);
        assert_eq!(parse_page(Some(" 2 ")), 2);
        assert_eq!(parse_page(Some("three")), 0);
        assert_eq!(parse_page(Some("-1")), 0);
        assert_eq!(parse_page(Some("")), 0);
    }

    #[test]
    fn empty_inputs_build_no_filters() {
        let (filters, display) = build_filters(&[], &[], Some(""));
        assert!(filters.is_empty());
        assert_eq!(display, DisplayFilters::default());
    }

    #[test]
    fn display_filters_use_query_names() {
        let (filters, display) =
            build_filters(&["Tom Hanks".to_string()], &["Comedy".to_string()], Some("island"));

        assert_eq!(filters.cast, Some(vec!["Tom Hanks".to_string()]));
        assert_eq!(filters.genres, Some(vec!["Comedy".to_string()]));
        assert_eq!(filters.text.as_deref(), Some("island"));
        assert_eq!(
            serde_json::to_value(display).unwrap(),
            json!({ "cast": ["Tom Hanks"], "genre": ["Comedy"], "search": "island" })
        );
    }

    #[tokio::test]
    async fn listing_returns_first_page_unfiltered() {
        let app = app().await;
        let (status, body) = send(&app, get("/api/v1/movies")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["page"], 0);
        assert_eq!(body["filters"], json!({}));
        assert_eq!(body["entries_per_page"], 20);
        assert_eq!(body["total_results"], 4);
        assert_eq!(body["movies"].as_array().unwrap().len(), 4);
        assert!(body.get("status").is_none());
    }

    #[tokio::test]
    async fn search_echoes_display_filters() {
        let app = app().await;
        let uri = format!(
            "/api/v1/movies/search?cast={}&genre=Comedy&page=oops",
            urlencoding::encode("Tom Hanks")
        );
        let (status, body) = send(&app, get(&uri)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["page"], 0);
        assert_eq!(body["filters"], json!({ "cast": ["Tom Hanks"], "genre": ["Comedy"] }));
        assert_eq!(body["total_results"], 1);
        assert_eq!(body["movies"][0]["title"], "Big");
    }

    #[tokio::test]
    async fn search_accepts_repeated_cast() {
        let app = app().await;
        let uri = format!(
            "/api/v1/movies/search?cast={}&cast={}&text=",
            urlencoding::encode("Helen Hunt"),
            urlencoding::encode("Audrey Tautou")
        );
        let (_, body) = send(&app, get(&uri)).await;

        assert_eq!(body["total_results"], 2);
        assert_eq!(body["filters"], json!({ "cast": ["Helen Hunt", "Audrey Tautou"] }));
    }

    #[tokio::test]
    async fn search_beyond_last_page_is_empty() {
        let app = app().await;
        let (status, body) = send(&app, get("/api/v1/movies/search?page=5")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["page"], 5);
        assert_eq!(body["total_results"], 4);
        assert!(body["movies"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn facet_search_without_cast_is_plain_search() {
        let app = app().await;
        let (facet_status, facet) = send_raw(&app, get("/api/v1/movies/facet-search?genre=Comedy&page=0")).await;
        let (search_status, search) = send_raw(&app, get("/api/v1/movies/search?genre=Comedy&page=0")).await;

        assert_eq!(facet_status, search_status);
        assert_eq!(facet, search);
    }

    #[tokio::test]
    async fn facet_search_returns_buckets() {
        let app = app().await;
        let uri = format!("/api/v1/movies/facet-search?cast={}", urlencoding::encode("Tom Hanks"));
        let (status, body) = send(&app, get(&uri)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["total_results"], 2);
        assert_eq!(body["filters"], json!({ "cast": ["Tom Hanks"] }));
        assert_eq!(body["facets"]["runtime"], json!([{ "_id": 90, "count": 1 }, { "_id": 120, "count": 1 }]));
        assert_eq!(body["facets"]["rating"], json!([{ "_id": 50, "count": 1 }, { "_id": 70, "count": 1 }]));
        assert_eq!(body["movies"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_movie_is_a_bad_request() {
        let app = app().await;
        let (status, body) = send(&app, get("/api/v1/movies/id/does-not-exist")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "status": "fail" }));
    }

    #[tokio::test]
    async fn movie_by_id_reports_lastupdated_type() {
        let app = app().await;

        let (status, body) = send(&app, get("/api/v1/movies/id/m-big")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["movie"]["_id"], "m-big");
        assert_eq!(body["movie"]["comments"], json!([]));
        assert_eq!(body["updated_type"], "datetime");

        let (_, body) = send(&app, get("/api/v1/movies/id/m-castaway")).await;
        assert_eq!(body["updated_type"], "string");
    }

    #[tokio::test]
    async fn countries_lists_titles() {
        let app = app().await;
        let (status, body) = send(&app, get("/api/v1/movies/countries?countries=Germany")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "success", "titles": [{ "_id": "m-amelie", "title": "Amelie" }] }));
    }

    #[tokio::test]
    async fn comment_routes_require_a_token() {
        let app = app().await;
        let body = json!({ "movie_id": "m-big", "comment": "hello" });

        let (status, res) = send(&app, comment_request("POST", None, body.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(res["status"], "fail");

        let (status, _) = send(&app, comment_request("POST", Some("not-a-jwt"), body)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn posting_without_movie_id_names_the_field() {
        let app = app().await;
        let token = mint("ann@example.com", "Ann", 600);
        let (status, body) = send(&app, comment_request("POST", Some(&token), json!({ "comment": "hi" }))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "fail");
        assert!(body["error"].as_str().unwrap().contains("movie_id"));

        let (status, body) =
            send(&app, comment_request("POST", Some(&token), json!({ "movie_id": 7, "comment": "hi" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("movie_id"));
    }

    #[tokio::test]
    async fn huge_page_numbers_return_empty_pages() {
        let app = app().await;
        let cast = urlencoding::encode("Tom Hanks");

        for uri in [
            "/api/v1/movies/search?page=18446744073709551615".to_string(),
            "/api/v1/movies/search?page=922337203685477581".to_string(),
            format!("/api/v1/movies/facet-search?cast={cast}&page=18446744073709551615"),
            format!("/api/v1/movies/facet-search?cast={cast}&page=500000000000000000"),
        ] {
            let (status, body) = send(&app, get(&uri)).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            assert_eq!(body["status"], "success", "{uri}");
            assert!(body["movies"].as_array().unwrap().is_empty(), "{uri}");
            assert!(body["total_results"].as_u64().unwrap() > 0, "{uri}");
        }
    }

    #[tokio::test]
    async fn facet_search_parses_page_like_search() {
        let app = app().await;
        let cast = urlencoding::encode("Tom Hanks");

        let (_, body) = send(&app, get(&format!("/api/v1/movies/facet-search?cast={cast}&page=abc"))).await;
        assert_eq!(body["page"], 0);
        assert_eq!(body["movies"].as_array().unwrap().len(), 2);

        let (_, body) = send(&app, get(&format!("/api/v1/movies/facet-search?cast={cast}&page=1"))).await;
        assert_eq!(body["page"], 1);
        assert_eq!(body["total_results"], 2);
        assert!(body["movies"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn wildcard_text_matches_nothing() {
        let app = app().await;
        for uri in ["/api/v1/movies/search?text=%25", "/api/v1/movies/search?text=_"] {
            let (status, body) = send(&app, get(uri)).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            assert_eq!(body["total_results"], 0, "{uri}");
        }
    }

    #[tokio::test]
    async fn update_and_delete_name_the_bad_field() {
        let app = app().await;
        let token = mint("ann@example.com", "Ann", 600);

        let cases = [
            ("PUT", json!({ "updated_comment": "x", "movie_id": "m-big" }), "comment_id"),
            ("PUT", json!({ "comment_id": "c1", "updated_comment": 5, "movie_id": "m-big" }), "updated_comment"),
            ("PUT", json!({ "comment_id": "c1", "updated_comment": "x" }), "movie_id"),
            ("DELETE", json!({ "movie_id": "m-big" }), "comment_id"),
            ("DELETE", json!({ "comment_id": "c1", "movie_id": null }), "movie_id"),
        ];
        for (method, payload, field) in cases {
            let (status, body) = send(&app, comment_request(method, Some(&token), payload)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{method} {field}");
            assert_eq!(body["status"], "fail");
            assert!(body["error"].as_str().unwrap().contains(field), "{method} {field}");
        }
    }

    #[tokio::test]
    async fn non_json_body_is_rejected() {
        let app = app().await;
        let token = mint("ann@example.com", "Ann", 600);

        for body in ["movie_id=m-big&comment=hi", ""] {
            let (status, res) = send(&app, raw_comment_request("POST", Some(&token), body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body:?}");
            assert_eq!(res["status"], "fail");
            assert!(res["error"].as_str().unwrap().starts_with("malformed request body"));
        }
    }

    #[tokio::test]
    async fn non_object_body_is_rejected() {
        let app = app().await;
        let token = mint("ann@example.com", "Ann", 600);
        let (status, body) = send(&app, comment_request("DELETE", Some(&token), json!(["m-big"]))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "fail");
    }

    #[tokio::test]
    async fn comment_on_missing_movie_fails() {
        let app = app().await;
        let token = mint("ann@example.com", "Ann", 600);
        let (status, body) =
            send(&app, comment_request("POST", Some(&token), json!({ "movie_id": "nope", "comment": "hi" }))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "status": "fail", "error": "movie not found" }));
    }

    #[tokio::test]
    async fn only_the_author_edits_or_deletes() {
        let app = app().await;
        let ann = mint("ann@example.com", "Ann", 600);
        let bob = mint("bob@example.com", "Bob", 600);

        let (status, body) =
            send(&app, comment_request("POST", Some(&ann), json!({ "movie_id": "m-big", "comment": "Great" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["comments"][0]["email"], "ann@example.com");
        assert_eq!(body["comments"][0]["name"], "Ann");
        let comment_id = body["comments"][0]["_id"].as_str().unwrap().to_string();

        let edit = |text: &str| json!({ "comment_id": comment_id, "updated_comment": text, "movie_id": "m-big" });

        let (status, body) = send(&app, comment_request("PUT", Some(&bob), edit("bob was here"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["comments"][0]["text"], "Great");

        let (_, body) = send(&app, comment_request("PUT", Some(&ann), edit("Still great"))).await;
        assert_eq!(body["comments"][0]["text"], "Still great");

        let delete = json!({ "comment_id": comment_id, "movie_id": "m-big" });
        let (_, body) = send(&app, comment_request("DELETE", Some(&bob), delete.clone())).await;
        assert_eq!(body["comments"].as_array().unwrap().len(), 1);

        let (status, body) = send(&app, comment_request("DELETE", Some(&ann), delete)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "success", "comments": [] }));
    }

    #[tokio::test]
    async fn config_merges_user_info_without_clobbering() {
        let app = app_with(Arc::new(StubStore { fail: false }));
        let (status, body) = send(&app, get("/api/v1/movies/config-options")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["pool_size"], 50);
        assert_eq!(body["wtimeout"], "0");
        assert_eq!(body["authenticated_users"], json!([{ "user": "app" }]));
    }

    #[tokio::test]
    async fn config_reports_sqlite_details() {
        let app = app().await;
        let (status, body) = send(&app, get("/api/v1/movies/config-options")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pool_size"], 1);
        assert_eq!(body["wtimeout"], 2500);
        assert_eq!(body["backend"], "sqlite");
    }

    #[tokio::test]
    async fn store_failures_surface_as_server_errors() {
        let app = app_with(Arc::new(StubStore { fail: true }));
        let cast = format!("/api/v1/movies/facet-search?cast={}", urlencoding::encode("Tom Hanks"));

        for uri in [
            "/api/v1/movies",
            "/api/v1/movies/search",
            cast.as_str(),
            "/api/v1/movies/countries?countries=USA",
            "/api/v1/movies/config-options",
        ] {
            let (status, body) = send(&app, get(uri)).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
            assert_eq!(body["status"], "fail", "{uri}");
            assert!(body["error"].as_str().unwrap().contains("connection refused"), "{uri}");
        }
    }
}
