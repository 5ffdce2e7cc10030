use crate::dictionary::{Dictionary, DictionaryConfig, DictionaryRow};
use crate::error::WorksheetError;
use crate::rating::Rating;
use crate::selection::{
    MAX_WORD_COUNT, SelectedSymbol, SelectionMode, WordCount, filter_by_symbol,
};
use crate::sessions::{SESSION_ID_LEN, SessionStore, generate_session_id};
use crate::worksheet::Worksheet;
use askama::Template;
use axum::{
    Form, Json, Router,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use cookie::{Cookie, SameSite};
use rand::thread_rng;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn};

type SharedState = Arc<AppState>;
const SESSION_COOKIE: &str = "worksheet_session";

pub struct AppState {
    pub dictionary: Arc<Dictionary>,
    pub dictionary_error: Option<String>,
    pub sessions: SessionStore,
    pub theme: WebTheme,
}

impl AppState {
    pub fn new(dictionary: Dictionary, dictionary_error: Option<String>, theme: WebTheme) -> Self {
        Self {
            dictionary: Arc::new(dictionary),
            dictionary_error,
            sessions: SessionStore::new(),
            theme,
        }
    }

    /// Loads the dictionary, keeping the server usable with empty lists on failure.
    pub fn load(config: &DictionaryConfig, theme: WebTheme) -> Self {
        match Dictionary::load(config) {
            Ok(dictionary) => Self::new(dictionary, None, theme),
            Err(err) => {
                warn!(error = %err, "dictionary failed to load; serving empty word lists");
                Self::new(Dictionary::default(), Some(err.to_string()), theme)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum WebTheme {
    #[default]
    Tailwind,
    Bootstrap,
}

impl fmt::Display for WebTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebTheme::Tailwind => write!(f, "tailwind"),
            WebTheme::Bootstrap => write!(f, "bootstrap"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Chrome {
    use_tailwind: bool,
    use_bootstrap: bool,
    body_class: &'static str,
    main_class: &'static str,
    card_class: &'static str,
    headline_class: &'static str,
    lede_class: &'static str,
    controls_class: &'static str,
    input_class: &'static str,
    button_class: &'static str,
    danger_button_class: &'static str,
    row_class: &'static str,
    alert_class: &'static str,
}

impl Chrome {
    fn new(theme: WebTheme) -> Self {
        match theme {
            WebTheme::Tailwind => Self {
                use_tailwind: true,
                use_bootstrap: false,
                body_class: "bg-slate-50 text-slate-900",
                main_class: "min-h-screen flex flex-col items-center justify-start py-10 px-4",
                card_class: "max-w-3xl w-full space-y-6",
                headline_class: "text-4xl font-extrabold tracking-tight",
                lede_class: "text-lg text-slate-600",
                controls_class: "flex flex-wrap items-center gap-3",
                input_class: "rounded-md border border-slate-300 px-3 py-2 bg-white",
                button_class: "inline-flex items-center rounded-md bg-slate-900 px-4 py-2 text-white font-semibold shadow hover:bg-slate-800 transition-colors",
                danger_button_class: "inline-flex items-center rounded-md bg-rose-700 px-3 py-1 text-white text-sm font-semibold hover:bg-rose-600",
                row_class: "flex items-center justify-between border-b border-slate-200 py-2",
                alert_class: "rounded-md border border-rose-300 bg-rose-50 px-4 py-3 text-rose-800",
            },
            WebTheme::Bootstrap => Self {
                use_tailwind: false,
                use_bootstrap: true,
                body_class: "bg-light text-dark",
                main_class: "container py-5",
                card_class: "mx-auto col-lg-8",
                headline_class: "display-5 fw-bold",
                lede_class: "lead mb-4",
                controls_class: "d-flex flex-wrap align-items-center gap-3 mb-3",
                input_class: "form-control w-auto d-inline-block",
                button_class: "btn btn-primary",
                danger_button_class: "btn btn-sm btn-outline-danger",
                row_class: "list-group-item d-flex justify-content-between align-items-center",
                alert_class: "alert alert-danger",
            },
        }
    }
}

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub theme: WebTheme,
    pub dictionary: DictionaryConfig,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            theme: WebTheme::default(),
            dictionary: DictionaryConfig::default(),
        }
    }
}

#[derive(Debug)]
pub enum WebError {
    Io(std::io::Error),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for WebError {}

impl From<std::io::Error> for WebError {
    fn from(value: std::io::Error) -> Self {
        WebError::Io(value)
    }
}

pub async fn serve(config: WebConfig) -> Result<(), WebError> {
    let state = Arc::new(AppState::load(&config.dictionary, config.theme));
    info!(
        %config.addr,
        theme = %config.theme,
        words = state.dictionary.words().len(),
        symbols = state.dictionary.symbols().len(),
        "Binding HTTP listener"
    );
    let router = build_router(state);
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.message });
        (self.status, Json(payload)).into_response()
    }
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(worksheet_html))
        .route("/words/add", post(add_words_form))
        .route("/words/delete", post(delete_word_form))
        .route("/words/clear", post(clear_words_form))
        .route("/ratings", post(rate_form))
        .route("/export", post(export_pdf))
        .route("/api/worksheet", get(api_worksheet))
        .route("/api/symbols", get(api_symbols))
        .route("/api/words", post(api_add_words).delete(api_delete_words))
        .route("/api/ratings", post(api_rate))
        .route("/api/export.txt", get(api_export_text))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

struct SessionCookie {
    id: String,
    fresh: bool,
}

impl SessionCookie {
    fn from_headers(headers: &HeaderMap) -> Self {
        for value in headers.get_all(header::COOKIE) {
            let Ok(raw) = value.to_str() else {
                continue;
            };
            for cookie in Cookie::split_parse(raw).flatten() {
                if cookie.name() == SESSION_COOKIE && is_valid_session_id(cookie.value()) {
                    return Self {
                        id: cookie.value().to_string(),
                        fresh: false,
                    };
                }
            }
        }
        Self {
            id: generate_session_id(),
            fresh: true,
        }
    }

    fn attach(&self, mut response: Response) -> Response {
        if !self.fresh {
            return response;
        }
        let cookie = Cookie::build((SESSION_COOKIE, self.id.as_str()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build();
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(err) => warn!(error = %err, "failed to encode session cookie"),
        }
        response
    }
}

fn is_valid_session_id(id: &str) -> bool {
    id.len() == SESSION_ID_LEN && id.chars().all(|c| c.is_ascii_alphanumeric())
}

async fn worksheet_html(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let session = SessionCookie::from_headers(&headers);
    let worksheet = state.sessions.snapshot(&session.id);
    let html = render_worksheet_page(&state, &worksheet);
    session.attach(Html(html).into_response())
}

#[derive(Debug, Deserialize)]
struct AddWordsForm {
    symbol: Option<String>,
    count: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WordForm {
    word: String,
}

#[derive(Debug, Deserialize)]
struct RatingForm {
    word: String,
    #[serde(default)]
    rating: String,
}

async fn add_words_form(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Form(form): Form<AddWordsForm>,
) -> Response {
    let session = SessionCookie::from_headers(&headers);
    let count = match form.count.as_deref().map(parse_word_count).transpose() {
        Ok(count) => count,
        Err(err) => return session.attach(error_page(state.theme, err)),
    };
    let symbol = SelectedSymbol::from(form.symbol);
    let (added, _) =
        apply_selection(&state, &session.id, Some(symbol), count, SelectionMode::Append);
    info!(session = %session.id, added, "words added");
    session.attach(Redirect::to("/").into_response())
}

async fn delete_word_form(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Form(form): Form<WordForm>,
) -> Response {
    let session = SessionCookie::from_headers(&headers);
    state
        .sessions
        .with_worksheet(&session.id, |sheet| sheet.delete_word(&form.word));
    session.attach(Redirect::to("/").into_response())
}

async fn clear_words_form(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let session = SessionCookie::from_headers(&headers);
    state
        .sessions
        .with_worksheet(&session.id, Worksheet::delete_all);
    session.attach(Redirect::to("/").into_response())
}

async fn rate_form(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Form(form): Form<RatingForm>,
) -> Response {
    let session = SessionCookie::from_headers(&headers);
    let rating = match Rating::parse_optional(&form.rating) {
        Ok(rating) => rating,
        Err(err) => {
            let err = ApiError::bad_request(err.to_string());
            return session.attach(error_page(state.theme, err));
        }
    };
    state
        .sessions
        .with_worksheet(&session.id, |sheet| sheet.set_rating(&form.word, rating));
    session.attach(Redirect::to("/").into_response())
}

async fn export_pdf(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let session = SessionCookie::from_headers(&headers);
    let export = state
        .sessions
        .with_worksheet(&session.id, Worksheet::export);
    info!(
        session = %session.id,
        lines = export.text.lines().count(),
        bytes = export.pdf.len(),
        "worksheet exported"
    );
    let response = (
        [
            (header::CONTENT_TYPE, mime::APPLICATION_PDF.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export.filename),
            ),
        ],
        export.pdf,
    )
        .into_response();
    session.attach(response)
}

async fn api_worksheet(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let session = SessionCookie::from_headers(&headers);
    let worksheet = state.sessions.snapshot(&session.id);
    session.attach(Json(WorksheetPayload::new(&state, &worksheet)).into_response())
}

async fn api_symbols(State(state): State<SharedState>) -> Json<Vec<SymbolPayload>> {
    Json(
        state
            .dictionary
            .symbols()
            .iter()
            .map(|row| SymbolPayload {
                symbol: row.symbol().to_string(),
                description: row.description().map(str::to_string),
            })
            .collect(),
    )
}

async fn api_add_words(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(request): Json<AddWordsRequest>,
) -> Response {
    let session = SessionCookie::from_headers(&headers);
    let count = match json_word_count(&request.count) {
        Ok(count) => count,
        Err(err) => return session.attach(err.into_response()),
    };
    let symbol = request.symbol.map(SelectedSymbol::new);
    let mode = request.mode.unwrap_or_default();
    let (_, worksheet) = apply_selection(&state, &session.id, symbol, count, mode);
    session.attach(Json(WorksheetPayload::new(&state, &worksheet)).into_response())
}

async fn api_rate(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(request): Json<RateRequest>,
) -> Response {
    let session = SessionCookie::from_headers(&headers);
    let rating = match json_rating(&request.rating) {
        Ok(rating) => rating,
        Err(err) => return session.attach(err.into_response()),
    };
    let worksheet = state.sessions.with_worksheet(&session.id, |sheet| {
        sheet.set_rating(&request.word, rating);
        sheet.clone()
    });
    session.attach(Json(WorksheetPayload::new(&state, &worksheet)).into_response())
}

async fn api_delete_words(
    State(state): State<SharedState>,
    headers: HeaderMap,
    request: Option<Json<DeleteRequest>>,
) -> Response {
    let session = SessionCookie::from_headers(&headers);
    let word = request.and_then(|Json(body)| body.word);
    let worksheet = state.sessions.with_worksheet(&session.id, |sheet| {
        match word.as_deref() {
            Some(word) => {
                sheet.delete_word(word);
            }
            None => sheet.delete_all(),
        }
        sheet.clone()
    });
    session.attach(Json(WorksheetPayload::new(&state, &worksheet)).into_response())
}

async fn api_export_text(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let session = SessionCookie::from_headers(&headers);
    let text = state.sessions.snapshot(&session.id).export_text();
    let response = (
        [(header::CONTENT_TYPE, mime::TEXT_PLAIN_UTF_8.to_string())],
        text,
    )
        .into_response();
    session.attach(response)
}

async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    let status = if state.dictionary_error.is_some() {
        "degraded"
    } else {
        "ok"
    };
    Json(json!({
        "status": status,
        "service": "phonetic-worksheet",
        "words": state.dictionary.words().len(),
        "symbols": state.dictionary.symbols().len(),
        "sessions": state.sessions.len(),
    }))
}

fn apply_selection(
    state: &AppState,
    session_id: &str,
    symbol: Option<SelectedSymbol>,
    count: Option<WordCount>,
    mode: SelectionMode,
) -> (usize, Worksheet) {
    state.sessions.with_worksheet(session_id, |sheet| {
        if let Some(symbol) = symbol {
            sheet.set_selected_symbol(symbol);
        }
        if let Some(count) = count {
            sheet.set_word_count(count);
        }
        let added = sheet.add_words(&state.dictionary, mode, &mut thread_rng());
        (added, sheet.clone())
    })
}

fn parse_word_count(raw: &str) -> Result<WordCount, ApiError> {
    raw.trim()
        .parse::<usize>()
        .ok()
        .and_then(WordCount::new)
        .ok_or_else(|| {
            ApiError::bad_request(format!(
                "Word count must be between 1 and {MAX_WORD_COUNT}, got {raw:?}"
            ))
        })
}

/// JSON counts may be numbers or numeric strings; `null` keeps the current count.
fn json_word_count(value: &Value) -> Result<Option<WordCount>, ApiError> {
    match value {
        Value::Null => Ok(None),
        Value::String(raw) => parse_word_count(raw).map(Some),
        other => parse_word_count(&other.to_string()).map(Some),
    }
}

/// `null` and `""` clear; numbers and numeric strings must be 1-5.
fn json_rating(value: &Value) -> Result<Option<Rating>, ApiError> {
    let parsed = match value {
        Value::Null => Ok(None),
        Value::String(raw) => Rating::parse_optional(raw),
        Value::Number(number) => Rating::parse_optional(&number.to_string()),
        other => Err(WorksheetError::InvalidRating(other.to_string())),
    };
    parsed.map_err(|err| ApiError::bad_request(err.to_string()))
}

#[derive(Debug, Deserialize)]
struct AddWordsRequest {
    symbol: Option<String>,
    #[serde(default)]
    count: Value,
    mode: Option<SelectionMode>,
}

#[derive(Debug, Deserialize)]
struct RateRequest {
    word: String,
    #[serde(default)]
    rating: Value,
}

#[derive(Debug, Deserialize)]
struct DeleteRequest {
    word: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SymbolPayload {
    symbol: String,
    description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WordPayload {
    word: String,
    symbols: Option<String>,
    rating: Option<Rating>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorksheetPayload {
    selected_symbol: String,
    word_count: usize,
    matching_words: usize,
    words: Vec<WordPayload>,
    dictionary_error: Option<String>,
}

impl WorksheetPayload {
    fn new(state: &AppState, worksheet: &Worksheet) -> Self {
        Self {
            selected_symbol: worksheet.selected_symbol().as_str().to_string(),
            word_count: worksheet.word_count().get(),
            matching_words: filter_by_symbol(state.dictionary.words(), worksheet.selected_symbol())
                .len(),
            words: worksheet
                .displayed()
                .iter()
                .map(|row| WordPayload {
                    word: row.word().to_string(),
                    symbols: row.symbols().map(str::to_string),
                    rating: worksheet.rating(row.word()),
                })
                .collect(),
            dictionary_error: state.dictionary_error.clone(),
        }
    }
}

fn error_page(theme: WebTheme, err: ApiError) -> Response {
    (err.status, Html(render_error_page(theme, err.message))).into_response()
}

fn render_error_page(theme: WebTheme, message: impl Into<String>) -> String {
    let template = ErrorTemplate {
        chrome: Chrome::new(theme),
        message: message.into(),
    };
    template
        .render()
        .unwrap_or_else(|_| "<!DOCTYPE html><p>Something went wrong</p>".to_string())
}

fn render_worksheet_page(state: &AppState, worksheet: &Worksheet) -> String {
    let selected = worksheet.selected_symbol().as_str();
    let symbols = state
        .dictionary
        .symbols()
        .iter()
        .map(|row| SymbolOption {
            value: row.symbol().to_string(),
            selected: row.symbol() == selected,
        })
        .collect();
    let rows = worksheet
        .displayed()
        .iter()
        .map(|row| RowView::new(row, worksheet.rating(row.word())))
        .collect();
    let template = WorksheetTemplate {
        chrome: Chrome::new(state.theme),
        dictionary_error: state.dictionary_error.as_deref(),
        no_filter_selected: selected.is_empty(),
        symbols,
        word_count: worksheet.word_count().get(),
        rows,
        word_total: state.dictionary.words().len(),
        rated: worksheet.ratings().len(),
    };
    template
        .render()
        .unwrap_or_else(|err| render_error_page(state.theme, err.to_string()))
}

struct SymbolOption {
    value: String,
    selected: bool,
}

struct RatingOption {
    value: u8,
    selected: bool,
}

struct RowView {
    word: String,
    symbols: String,
    unrated: bool,
    options: Vec<RatingOption>,
}

impl RowView {
    fn new(row: &DictionaryRow, rating: Option<Rating>) -> Self {
        Self {
            word: row.word().to_string(),
            symbols: row.symbols().unwrap_or_default().to_string(),
            unrated: rating.is_none(),
            options: Rating::ALL
                .iter()
                .map(|candidate| RatingOption {
                    value: candidate.value(),
                    selected: Some(*candidate) == rating,
                })
                .collect(),
        }
    }
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Phonetic Worksheet</title>
    {% if chrome.use_tailwind %}
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
    {% endif %}
    {% if chrome.use_bootstrap %}
    <link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet" integrity="sha384-sRIl4kxILFvY47J16cr9ZwB07vP4J8+LH7qKQnuqkuIAvNWLzeN8tE5YBujZqJLB" crossorigin="anonymous">
    {% endif %}
  </head>
  <body class="{{ chrome.body_class }}">
    <main class="{{ chrome.main_class }}">
      <div class="{{ chrome.card_class }}">
        <div>
          <h1 class="{{ chrome.headline_class }}">Phonetic Worksheet</h1>
          <p class="{{ chrome.lede_class }}">{{ rows.len() }} word{% if rows.len() != 1 %}s{% endif %} on the sheet, {{ rated }} rated, drawn from {{ word_total }} dictionary entries.</p>
        </div>

        {% if dictionary_error.is_some() %}
        <div class="{{ chrome.alert_class }}" role="alert" id="dictionary-error">
          Dictionary failed to load: {{ dictionary_error.unwrap() }}
        </div>
        {% endif %}

        <div class="{{ chrome.controls_class }}">
          <form method="post" action="/words/add" class="{{ chrome.controls_class }}">
            <select name="symbol" class="{{ chrome.input_class }}" aria-label="Symbol filter">
              <option value=""{% if no_filter_selected %} selected{% endif %}>No Filter</option>
              {% for symbol in symbols %}
              <option value="{{ symbol.value }}"{% if symbol.selected %} selected{% endif %}>{{ symbol.value }}</option>
              {% endfor %}
            </select>
            <input type="number" name="count" value="{{ word_count }}" min="1" class="{{ chrome.input_class }}" aria-label="Word count" />
            <button type="submit" class="{{ chrome.button_class }}">Add Words</button>
          </form>
          <form method="post" action="/words/clear">
            <button type="submit" class="{{ chrome.button_class }}">Delete All</button>
          </form>
          <form method="post" action="/export">
            <button type="submit" class="{{ chrome.button_class }}">Submit and Download</button>
          </form>
        </div>

        <ul class="list-group list-none">
          {% for row in rows %}
          <li class="{{ chrome.row_class }}">
            <span title="{{ row.symbols }}">{{ row.word }}</span>
            <div class="d-flex flex gap-2">
              <form method="post" action="/ratings">
                <input type="hidden" name="word" value="{{ row.word }}" />
                <select name="rating" class="rating-select {{ chrome.input_class }}" onchange="this.form.submit()">
                  <option value=""{% if row.unrated %} selected{% endif %}>Rate</option>
                  {% for option in row.options %}
                  <option value="{{ option.value }}"{% if option.selected %} selected{% endif %}>{{ option.value }}</option>
                  {% endfor %}
                </select>
                <noscript><button type="submit" class="{{ chrome.button_class }}">Save</button></noscript>
              </form>
              <form method="post" action="/words/delete">
                <input type="hidden" name="word" value="{{ row.word }}" />
                <button type="submit" class="delete-button {{ chrome.danger_button_class }}">Delete</button>
              </form>
            </div>
          </li>
          {% endfor %}
        </ul>
      </div>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct WorksheetTemplate<'a> {
    chrome: Chrome,
    dictionary_error: Option<&'a str>,
    no_filter_selected: bool,
    symbols: Vec<SymbolOption>,
    word_count: usize,
    rows: Vec<RowView>,
    word_total: usize,
    rated: usize,
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Phonetic Worksheet • Error</title>
    {% if chrome.use_tailwind %}
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
    {% endif %}
    {% if chrome.use_bootstrap %}
    <link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet" integrity="sha384-sRIl4kxILFvY47J16cr9ZwB07vP4J8+LH7qKQnuqkuIAvNWLzeN8tE5YBujZqJLB" crossorigin="anonymous">
    {% endif %}
  </head>
  <body class="{{ chrome.body_class }}">
    <main class="{{ chrome.main_class }}">
      <div class="{{ chrome.card_class }}">
        <h1 class="{{ chrome.headline_class }}">Something went wrong</h1>
        <p class="{{ chrome.lede_class }}">{{ message }}</p>
        <a href="/" class="{{ chrome.button_class }}">Back to worksheet</a>
      </div>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct ErrorTemplate {
    chrome: Chrome,
    message: String,
}

#[cfg(all(test, feature = "web"))]
mod tests {
    use super::*;
    use axum::{body, body::Body, http::Request};
    use tower::ServiceExt;

    fn test_state(error: Option<&str>) -> SharedState {
        let dictionary = Dictionary::from_csv_str(
            "cat,K AE1 T\ndog,D AO1 G\ncat2,K AE1 T\n",
            "AE,vowel\nK,stop\n",
        )
        .unwrap();
        Arc::new(AppState::new(
            dictionary,
            error.map(str::to_string),
            WebTheme::Tailwind,
        ))
    }

    fn test_router() -> Router {
        build_router(test_state(None))
    }

    fn session_cookie(response: &Response) -> String {
        response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| raw.split(';').next())
            .map(str::to_string)
            .expect("session cookie issued")
    }

    async fn body_text(response: Response) -> String {
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn form(uri: &str, cookie: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::COOKIE, cookie)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn json_request(method: &str, uri: &str, cookie: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::COOKIE, cookie)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn fetch_state(router: &Router, cookie: &str) -> WorksheetPayload {
        let response = router
            .clone()
            .oneshot(
                Request::get("/api/worksheet")
                    .header(header::COOKIE, cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        serde_json::from_str(&body_text(response).await).unwrap()
    }

    #[tokio::test]
    async fn home_renders_controls_and_issues_cookie() {
        let router = test_router();
        let response = router
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_success());
        let cookie = session_cookie(&response);
        assert!(cookie.starts_with("worksheet_session="));
        let html = body_text(response).await;
        assert!(html.contains("Phonetic Worksheet"));
        assert!(html.contains("No Filter"));
        assert!(html.contains(r#"<option value="AE">AE</option>"#));
        assert!(html.contains("Submit and Download"));
        assert!(!html.contains("dictionary-error"));
    }

    #[tokio::test]
    async fn form_flow_adds_rates_and_deletes() {
        let router = test_router();
        let first = router
            .clone()
            .oneshot(form("/words/add", "", "symbol=K&count=10"))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::SEE_OTHER);
        let cookie = session_cookie(&first);

        let state = fetch_state(&router, &cookie).await;
        let mut words: Vec<_> = state.words.iter().map(|w| w.word.as_str()).collect();
        words.sort_unstable();
        assert_eq!(words, vec!["cat", "cat2"]);
        assert_eq!(state.selected_symbol, "K");
        assert_eq!(state.matching_words, 2);

        let rated = router
            .clone()
            .oneshot(form("/ratings", &cookie, "word=cat&rating=4"))
            .await
            .unwrap();
        assert_eq!(rated.status(), StatusCode::SEE_OTHER);
        router
            .clone()
            .oneshot(form("/words/delete", &cookie, "word=cat2"))
            .await
            .unwrap();

        let state = fetch_state(&router, &cookie).await;
        assert_eq!(state.words.len(), 1);
        assert_eq!(state.words[0].rating, Some(Rating::Four));

        let page = router
            .clone()
            .oneshot(
                Request::get("/")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(page.headers().get(header::SET_COOKIE).is_none());
        let html = body_text(page).await;
        assert!(html.contains(r#"<option value="4" selected>4</option>"#));
        assert!(html.contains(r#"<option value="K" selected>K</option>"#));
    }

    #[tokio::test]
    async fn export_downloads_pdf_and_clears() {
        let router = test_router();
        let added = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/words",
                "",
                json!({ "symbol": "D", "count": 5 }),
            ))
            .await
            .unwrap();
        let cookie = session_cookie(&added);
        router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/ratings",
                &cookie,
                json!({ "word": "dog", "rating": 2 }),
            ))
            .await
            .unwrap();

        let preview = router
            .clone()
            .oneshot(
                Request::get("/api/export.txt")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_text(preview).await, "dog: 2");

        let response = router
            .clone()
            .oneshot(form("/export", &cookie, ""))
            .await
            .unwrap();
        assert!(response.status().is_success());
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/pdf"
        );
        assert_eq!(
            response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"word_ratings.pdf\""
        );
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(bytes.starts_with(b"%PDF-"));

        let state = fetch_state(&router, &cookie).await;
        assert!(state.words.is_empty());
    }

    #[tokio::test]
    async fn invalid_ratings_are_rejected() {
        let router = test_router();
        let api = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/ratings",
                "",
                json!({ "word": "cat", "rating": 9 }),
            ))
            .await
            .unwrap();
        assert_eq!(api.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(api).await.contains("invalid rating"));

        for rating in [json!(300), json!(-1), json!("x"), json!(true)] {
            let response = router
                .clone()
                .oneshot(json_request(
                    "POST",
                    "/api/ratings",
                    "",
                    json!({ "word": "cat", "rating": rating.clone() }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "rating {rating}");
            let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
            assert!(body["error"].as_str().unwrap().contains("invalid rating"));
        }

        let html = router
            .clone()
            .oneshot(form("/ratings", "", "word=cat&rating=0"))
            .await
            .unwrap();
        assert_eq!(html.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(html).await.contains("Something went wrong"));
    }

    #[tokio::test]
    async fn numeric_string_ratings_are_accepted() {
        let router = test_router();
        let added = router
            .clone()
            .oneshot(json_request("POST", "/api/words", "", json!({ "count": 3 })))
            .await
            .unwrap();
        let cookie = session_cookie(&added);

        let rated = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/ratings",
                &cookie,
                json!({ "word": "cat", "rating": "4" }),
            ))
            .await
            .unwrap();
        assert_eq!(rated.status(), StatusCode::OK);
        let payload: WorksheetPayload = serde_json::from_str(&body_text(rated).await).unwrap();
        let cat = payload.words.iter().find(|row| row.word == "cat").unwrap();
        assert_eq!(cat.rating, Some(Rating::Four));

        let cleared = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/ratings",
                &cookie,
                json!({ "word": "cat", "rating": null }),
            ))
            .await
            .unwrap();
        assert_eq!(cleared.status(), StatusCode::OK);
        let state = fetch_state(&router, &cookie).await;
        let cat = state.words.iter().find(|row| row.word == "cat").unwrap();
        assert_eq!(cat.rating, None);
    }

    #[tokio::test]
    async fn bad_word_count_is_rejected() {
        let router = test_router();
        for body in ["symbol=&count=abc", "symbol=&count=0", "symbol=&count=501"] {
            let response = router.clone().oneshot(form("/words/add", "", body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        }
    }

    #[tokio::test]
    async fn api_word_count_outside_range_is_rejected() {
        let router = test_router();
        for count in [json!(0), json!(-1), json!(1000), json!(2.5), json!("many")] {
            let response = router
                .clone()
                .oneshot(json_request("POST", "/api/words", "", json!({ "count": count.clone() })))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "count {count}");
            let cookie = session_cookie(&response);
            let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
            assert!(body["error"].as_str().unwrap().contains("between 1 and 500"));
            assert!(fetch_state(&router, &cookie).await.words.is_empty());
        }

        let response = router
            .clone()
            .oneshot(json_request("POST", "/api/words", "", json!({ "count": "2" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let payload: WorksheetPayload = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(payload.word_count, 2);
        assert_eq!(payload.words.len(), 2);
    }

    #[tokio::test]
    async fn delete_without_word_clears_everything() {
        let router = test_router();
        let added = router
            .clone()
            .oneshot(json_request("POST", "/api/words", "", json!({ "count": 3 })))
            .await
            .unwrap();
        let cookie = session_cookie(&added);
        assert_eq!(fetch_state(&router, &cookie).await.words.len(), 3);
        let cleared = router
            .clone()
            .oneshot(
                Request::delete("/api/words")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let payload: WorksheetPayload = serde_json::from_str(&body_text(cleared).await).unwrap();
        assert!(payload.words.is_empty());
    }

    #[tokio::test]
    async fn load_failure_is_visible() {
        let router = build_router(test_state(Some("failed to read cmudict.csv")));
        let response = router
            .clone()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let html = body_text(response).await;
        assert!(html.contains("dictionary-error"));
        assert!(html.contains("failed to read cmudict.csv"));

        let health = router
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(body_text(health).await.contains("degraded"));
    }

    #[tokio::test]
    async fn symbols_endpoint_lists_filter_values() {
        let router = test_router();
        let response = router
            .oneshot(Request::get("/api/symbols").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let symbols: Vec<SymbolPayload> = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[1].symbol, "K");
        assert_eq!(symbols[1].description.as_deref(), Some("stop"));
    }
}
