#![forbid(unsafe_code)]

use std::{
    env,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use icl_adapter::{
    render_page, AdapterHealthResponse, AdapterRuntime, AdapterTableCounts, LoginAdapterRequest,
    SubmissionAdapterRequest, SubmissionAdapterResponse, OUTCOME_ACCEPTED,
    OUTCOME_PERSISTENCE_FAILED, OUTCOME_REJECTED, OUTCOME_UNAUTHENTICATED,
};
use icl_contracts::identity::AuthState;

type SharedRuntime = Arc<Mutex<AdapterRuntime>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bind = env::var("ICL_HTTP_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let addr: SocketAddr = bind.parse()?;

    let runtime = Arc::new(Mutex::new(AdapterRuntime::default_from_env()?));
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/", get(index))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/submit", post(submit_form))
        .route("/v1/submission", post(submit_json))
        .with_state(runtime);

    println!("icl_adapter_http listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn cookie_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::COOKIE).and_then(|v| v.to_str().ok())
}

fn lock_poisoned_page() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html("<p>adapter runtime lock poisoned</p>".to_string()),
    )
        .into_response()
}

async fn healthz(State(runtime): State<SharedRuntime>) -> (StatusCode, Json<AdapterHealthResponse>) {
    match runtime.lock() {
        Ok(runtime) => (StatusCode::OK, Json(runtime.health_report())),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(AdapterHealthResponse {
                status: "error".to_string(),
                outcome: "UNHEALTHY".to_string(),
                reason: Some("adapter runtime lock poisoned".to_string()),
                tables: AdapterTableCounts::default(),
            }),
        ),
    }
}

async fn index(State(runtime): State<SharedRuntime>, headers: HeaderMap) -> Response {
    let runtime = match runtime.lock() {
        Ok(runtime) => runtime,
        Err(_) => return lock_poisoned_page(),
    };
    let state = runtime.session_state(cookie_header(&headers));
    Html(render_page(&state, None)).into_response()
}

async fn login(
    State(runtime): State<SharedRuntime>,
    Form(request): Form<LoginAdapterRequest>,
) -> Response {
    let runtime = match runtime.lock() {
        Ok(runtime) => runtime,
        Err(_) => return lock_poisoned_page(),
    };
    let (_, state, cookie) = runtime.handle_login(&request);
    let page = Html(render_page(&state, None));
    match cookie {
        Some(cookie) => {
            let set_cookie = format!(
                "{}={}; Path=/; HttpOnly; SameSite=Lax",
                cookie.name, cookie.value
            );
            (AppendHeaders([(header::SET_COOKIE, set_cookie)]), page).into_response()
        }
        None => page.into_response(),
    }
}

async fn logout(State(runtime): State<SharedRuntime>) -> Response {
    let runtime = match runtime.lock() {
        Ok(runtime) => runtime,
        Err(_) => return lock_poisoned_page(),
    };
    let page = Html(render_page(&AuthState::Unauthenticated, None));
    match runtime.session_cookie_name() {
        Some(name) => {
            let clear_cookie = format!("{name}=; Path=/; HttpOnly; Max-Age=0");
            (AppendHeaders([(header::SET_COOKIE, clear_cookie)]), page).into_response()
        }
        None => page.into_response(),
    }
}

async fn submit_form(
    State(runtime): State<SharedRuntime>,
    headers: HeaderMap,
    Form(request): Form<SubmissionAdapterRequest>,
) -> Response {
    let mut runtime = match runtime.lock() {
        Ok(runtime) => runtime,
        Err(_) => return lock_poisoned_page(),
    };
    let header = cookie_header(&headers);
    let response = runtime.handle_submission(&request, header);
    let state = runtime.session_state(header);
    Html(render_page(&state, Some(&response))).into_response()
}

async fn submit_json(
    State(runtime): State<SharedRuntime>,
    headers: HeaderMap,
    Json(request): Json<SubmissionAdapterRequest>,
) -> (StatusCode, Json<SubmissionAdapterResponse>) {
    let mut runtime = match runtime.lock() {
        Ok(runtime) => runtime,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SubmissionAdapterResponse {
                    status: "error".to_string(),
                    outcome: OUTCOME_REJECTED.to_string(),
                    reason: Some("adapter runtime lock poisoned".to_string()),
                    id: None,
                    vault: None,
                    created_at: None,
                }),
            )
        }
    };
    let response = runtime.handle_submission(&request, cookie_header(&headers));
    (status_for_outcome(&response.outcome), Json(response))
}

fn status_for_outcome(outcome: &str) -> StatusCode {
    match outcome {
        o if o == OUTCOME_ACCEPTED => StatusCode::OK,
        o if o == OUTCOME_UNAUTHENTICATED => StatusCode::UNAUTHORIZED,
        o if o == OUTCOME_REJECTED => StatusCode::BAD_REQUEST,
        o if o == OUTCOME_PERSISTENCE_FAILED => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
