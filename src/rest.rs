//! HTTP layer: Axum router, session middleware and every endpoint of the
//! inventory app (login/logout, dashboards, DataTables JSON feed, record
//! CRUD, CSV export, user management).
//!
//! API failures become a `{success, message}` JSON envelope; page failures
//! become a diagnostic HTML page; missing or expired sessions redirect to
//! the login form and non-admins get bounced to the read-only dashboard.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{delete, get, post},
    Extension, Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::auth;
use crate::columns::ColumnMapping;
use crate::models::{ApiResponse, Record, Role, SessionClaims, TableResponse, UserAccount};
use crate::pages;
use crate::permissions::{
    location_fields, resolve_row_filter, resolve_visible_columns, EmptyGrantPolicy,
};
use crate::storage::{Storage, StoreError};

/// Shared app state for handlers (Arc-wrapped for concurrency).
#[derive(Clone)]
pub struct AppState {
    storage: Arc<Storage>,
    empty_grant_policy: EmptyGrantPolicy,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct DrawParams {
    #[serde(default = "default_draw")]
    pub draw: u64,
}

fn default_draw() -> u64 {
    1
}

#[derive(Serialize)]
pub struct ColumnsResponse {
    pub success: bool,
    pub columns: Vec<String>,
}

#[derive(Deserialize)]
pub struct UserPayload {
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub location_permissions: crate::models::LocationPermissions,
    #[serde(default)]
    pub column_permissions: Vec<String>,
}

#[derive(Deserialize)]
pub struct PasswordPayload {
    pub password: String,
}

/// Store failure surfaced through a JSON endpoint.
pub struct ApiError(StoreError);

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            StoreError::NotFound => StatusCode::NOT_FOUND,
            StoreError::Conflict(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("store failure: {}", self.0);
        }
        (status, Json(ApiResponse::error(self.0.to_string()))).into_response()
    }
}

/// Store failure surfaced through a page render: diagnostic HTML.
pub struct PageError {
    context: &'static str,
    detail: String,
}

impl PageError {
    fn new(context: &'static str, detail: impl Into<String>) -> Self {
        Self {
            context,
            detail: detail.into(),
        }
    }
}

impl From<StoreError> for PageError {
    fn from(err: StoreError) -> Self {
        Self::new("Error loading inventory data", err.to_string())
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        error!("{}: {}", self.context, self.detail);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(pages::error_page(self.context, &self.detail)),
        )
            .into_response()
    }
}

/// Build the application router.
pub fn create_router(storage: Storage, empty_grant_policy: EmptyGrantPolicy) -> Router {
    let state = Arc::new(AppState {
        storage: Arc::new(storage),
        empty_grant_policy,
    });

    let admin_routes = Router::new()
        .route("/admin", get(admin_dashboard_handler))
        .route("/edit/:record_id", post(edit_record_handler))
        .route("/add", post(add_record_handler))
        .route("/delete/:record_id", delete(delete_record_handler))
        .route("/manage_users", get(manage_users_handler))
        .route("/api/users", post(create_user_handler))
        .route(
            "/api/users/:user_id",
            get(get_user_handler)
                .put(update_user_handler)
                .delete(delete_user_handler),
        )
        .route("/api/users/:user_id/reset-password", post(reset_password_handler))
        .route_layer(middleware::from_fn(require_admin));

    let protected = Router::new()
        .route("/", get(index_handler))
        .route("/user", get(user_dashboard_handler))
        .route("/data", post(data_handler))
        .route("/get_columns", get(get_columns_handler))
        .route("/download", get(download_handler))
        .merge(admin_routes)
        .route_layer(middleware::from_fn(require_login));

    Router::new()
        .route("/login", get(login_form_handler).post(login_submit_handler))
        .route("/logout", get(logout_handler))
        .merge(protected)
        .with_state(state)
}

/// Gate: a valid session cookie, or off to the login form.
async fn require_login(mut req: Request, next: Next) -> Response {
    let claims = req
        .headers()
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(auth::token_from_cookie_header)
        .and_then(|token| auth::validate_session_token(token).ok());

    match claims {
        Some(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        None => Redirect::to("/login").into_response(),
    }
}

/// Gate: admin role, or off to the read-only dashboard.
async fn require_admin(
    Extension(claims): Extension<SessionClaims>,
    req: Request,
    next: Next,
) -> Response {
    if claims.role.is_admin() {
        next.run(req).await
    } else {
        warn!(user = %claims.sub, "admin route denied");
        Redirect::to("/user").into_response()
    }
}

// --- Session ---

async fn login_form_handler() -> Html<String> {
    Html(pages::login_page(None))
}

async fn login_submit_handler(
    State(state): State<Arc<AppState>>,
    Form(form): Form<LoginForm>,
) -> Response {
    match auth::authenticate(&state.storage, &form.username, &form.password) {
        Ok(Some(claims)) => {
            let target = if claims.role.is_admin() { "/admin" } else { "/user" };
            match auth::create_session_token(&claims) {
                Ok(token) => {
                    info!(user = %claims.sub, role = ?claims.role, "login");
                    (
                        [(header::SET_COOKIE, auth::session_cookie(&token))],
                        Redirect::to(target),
                    )
                        .into_response()
                }
                Err(err) => {
                    error!("session token error: {err}");
                    Html(pages::login_page(Some("Could not establish a session"))).into_response()
                }
            }
        }
        Ok(None) => Html(pages::login_page(Some("Invalid username or password"))).into_response(),
        Err(err) => {
            error!("login lookup failed: {err}");
            Html(pages::login_page(Some("Could not reach the inventory store"))).into_response()
        }
    }
}

async fn logout_handler() -> impl IntoResponse {
    (
        [(header::SET_COOKIE, auth::clear_session_cookie())],
        Redirect::to("/login"),
    )
}

async fn index_handler(Extension(claims): Extension<SessionClaims>) -> Redirect {
    if claims.role.is_admin() {
        Redirect::to("/admin")
    } else {
        Redirect::to("/user")
    }
}

// --- Dashboards ---

async fn admin_dashboard_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<SessionClaims>,
) -> Result<Html<String>, PageError> {
    let columns = state.storage.column_names()?;
    if columns.is_empty() {
        return Err(PageError::new(
            "Error loading inventory data",
            "No data found in the inventory collection. Run the import_csv binary first.",
        ));
    }
    Ok(Html(pages::admin_dashboard(&claims.sub, &columns)))
}

async fn user_dashboard_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<SessionClaims>,
) -> Result<Html<String>, PageError> {
    let all_columns = state.storage.column_names()?;
    if all_columns.is_empty() {
        return Err(PageError::new(
            "Error loading inventory data",
            "No data found in the inventory collection.",
        ));
    }
    let visible = resolve_visible_columns(claims.role, &claims.column_permissions, &all_columns);
    Ok(Html(pages::user_dashboard(&claims.sub, &visible)))
}

// --- Inventory data ---

/// DataTables feed. Row filter from the session's location grants, column
/// filter from its column grants, then synthetic column ids. Admins get a
/// `record_id` handle per row; it is stripped for everyone else.
async fn data_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<SessionClaims>,
    params: Option<Form<DrawParams>>,
) -> Json<TableResponse> {
    let draw = params.map(|Form(p)| p.draw).unwrap_or(1);

    let filter = resolve_row_filter(
        claims.role,
        &claims.location_permissions,
        state.empty_grant_policy,
    );
    let rows = match state.storage.find_records(&filter) {
        Ok(rows) => rows,
        Err(err) => {
            // Always answer with a well-formed (empty) table body
            error!("data query failed: {err}");
            return Json(TableResponse::empty(draw));
        }
    };
    if rows.is_empty() {
        return Json(TableResponse::empty(draw));
    }

    // Column set sniffed from the first record of this result set; the
    // mapping is only valid together with this exact ordered list.
    let all_columns: Vec<String> = rows[0].1.keys().map(|k| k.trim().to_string()).collect();
    let visible = resolve_visible_columns(claims.role, &claims.column_permissions, &all_columns);
    let mapping = ColumnMapping::build(&visible);

    let data: Vec<Record> = rows
        .into_iter()
        .map(|(id, record)| {
            let mut projected = mapping.apply(&record);
            if claims.role.is_admin() {
                projected.insert("record_id".to_string(), Value::String(id));
            }
            projected
        })
        .collect();

    let total = data.len() as u64;
    info!(user = %claims.sub, rows = total, "data listing");
    Json(TableResponse {
        draw,
        records_total: total,
        records_filtered: total,
        data,
    })
}

async fn edit_record_handler(
    State(state): State<Arc<AppState>>,
    Path(record_id): Path<String>,
    Json(changes): Json<Record>,
) -> Result<Response, ApiError> {
    // Fields apply verbatim; no coercion or validation by design
    if state.storage.update_record(&record_id, &changes)? {
        info!(record = %record_id, fields = changes.len(), "record updated");
        Ok(Json(ApiResponse::ok("Record updated successfully")).into_response())
    } else {
        Ok((
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Record not found")),
        )
            .into_response())
    }
}

async fn add_record_handler(
    State(state): State<Arc<AppState>>,
    Json(fields): Json<Record>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = state.storage.insert_record(fields)?;
    info!(record = %id, "record added");
    Ok(Json(ApiResponse::ok_with_id(
        "Record added successfully",
        id,
    )))
}

async fn delete_record_handler(
    State(state): State<Arc<AppState>>,
    Path(record_id): Path<String>,
) -> Result<Response, ApiError> {
    if state.storage.delete_record(&record_id)? {
        info!(record = %record_id, "record deleted");
        Ok(Json(ApiResponse::ok("Record deleted successfully")).into_response())
    } else {
        Ok((
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Record not found")),
        )
            .into_response())
    }
}

async fn get_columns_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ColumnsResponse>, ApiError> {
    let columns = state.storage.column_names()?;
    Ok(Json(ColumnsResponse {
        success: !columns.is_empty(),
        columns,
    }))
}

/// Full CSV snapshot of the collection. Deliberately unfiltered for any
/// authenticated role, matching the tool this replaces; the interactive
/// views stay permission-scoped.
async fn download_handler(State(state): State<Arc<AppState>>) -> Response {
    let rows = match state.storage.find_records(&crate::permissions::RowFilter::MatchAll) {
        Ok(rows) => rows,
        Err(err) => {
            error!("export failed: {err}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Export failed.").into_response();
        }
    };
    if rows.is_empty() {
        return (StatusCode::NOT_FOUND, "No data available.").into_response();
    }

    // Header set: every field name, in order of first appearance
    let mut headers: Vec<String> = Vec::new();
    for (_, record) in &rows {
        for key in record.keys() {
            if !headers.iter().any(|h| h == key) {
                headers.push(key.clone());
            }
        }
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    if let Err(err) = writer.write_record(&headers) {
        error!("export failed: {err}");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Export failed.").into_response();
    }
    for (_, record) in &rows {
        let row: Vec<String> = headers
            .iter()
            .map(|h| match record.get(h) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                Some(Value::Bool(b)) => b.to_string(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            })
            .collect();
        if let Err(err) = writer.write_record(&row) {
            error!("export failed: {err}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Export failed.").into_response();
        }
    }

    let body = writer.into_inner().unwrap_or_default();
    (
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"ICT_Inventory.csv\"".to_string(),
            ),
        ],
        body,
    )
        .into_response()
}

// --- User management ---

async fn manage_users_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<SessionClaims>,
) -> Result<Html<String>, PageError> {
    let users = state.storage.list_users()?;
    let all_columns = state.storage.column_names()?;

    let mut location_values = BTreeMap::new();
    for field in location_fields(&all_columns) {
        let values = state.storage.distinct_values(&field)?;
        location_values.insert(field, values);
    }

    Ok(Html(pages::manage_users_page(
        &claims.sub,
        &users,
        &location_values,
        &all_columns,
    )))
}

async fn create_user_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UserPayload>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = state.storage.create_user(UserAccount {
        id: String::new(),
        username: payload.username,
        password: payload.password,
        role: payload.role,
        location_permissions: payload.location_permissions,
        column_permissions: payload.column_permissions,
    })?;
    info!(user = %id, "user created");
    Ok(Json(ApiResponse::ok_with_id(
        "User created successfully",
        id,
    )))
}

async fn get_user_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user = state
        .storage
        .get_user(&user_id)?
        .ok_or(StoreError::NotFound)?;
    // Sanitized view: the password never leaves the store
    Ok(Json(serde_json::json!({
        "id": user.id,
        "username": user.username,
        "role": user.role,
        "location_permissions": user.location_permissions,
        "column_permissions": user.column_permissions,
    })))
}

async fn update_user_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(payload): Json<UserPayload>,
) -> Result<Response, ApiError> {
    let updated = UserAccount {
        id: user_id.clone(),
        username: payload.username,
        password: String::new(), // unchanged; see reset-password
        role: payload.role,
        location_permissions: payload.location_permissions,
        column_permissions: payload.column_permissions,
    };
    if state.storage.update_user(&user_id, updated)? {
        Ok(Json(ApiResponse::ok("User updated successfully")).into_response())
    } else {
        Ok((
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("User not found")),
        )
            .into_response())
    }
}

async fn reset_password_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(payload): Json<PasswordPayload>,
) -> Result<Response, ApiError> {
    if state.storage.set_password(&user_id, &payload.password)? {
        Ok(Json(ApiResponse::ok("Password reset successfully")).into_response())
    } else {
        Ok((
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("User not found")),
        )
            .into_response())
    }
}

async fn delete_user_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Response, ApiError> {
    if state.storage.delete_user(&user_id)? {
        Ok(Json(ApiResponse::ok("User deleted successfully")).into_response())
    } else {
        Ok((
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("User not found")),
        )
            .into_response())
    }
}
