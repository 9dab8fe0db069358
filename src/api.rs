//! HTTP API.
//!
//! The caller's identity comes from the `x-user-id` header set by the
//! upstream auth gateway. Carts are keyed by a client-chosen session id.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinError;
use tokio::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error};
use uuid::Uuid;

use crate::cart_store::CartStore;
use crate::data::DataClient;
use crate::domain::aggregates::{price_range, product_images, CartItem, Order, OrderItem, OrderStatus, PriceRange, ProductDraft, ProductWithVariants, Profile, Registration};
use crate::domain::value_objects::Money;
use crate::publisher::EventPublisher;
use crate::services::{Catalog, Checkout, OrderDesk, OrderHistory, Partners, PendingApprovals, ProductBoard, SubmitError, SubmitGate, SubmittedOrder, VariantSelection};
use crate::storage::{CartStorage, FileStorage, MemoryStorage};
use crate::StorefrontError;

type ApiResult<T> = Result<T, (StatusCode, String)>;
type StorageFactory = Arc<dyn Fn(&str) -> Arc<dyn CartStorage> + Send + Sync>;

/// Sessions untouched for this long are dropped from memory. Their carts
/// stay in storage and are restored on the next request.
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

pub struct SessionState {
    pub cart: CartStore,
    pub notes: String,
    pub selection: VariantSelection,
}

pub struct Session {
    pub gate: SubmitGate,
    pub state: Arc<Mutex<SessionState>>,
}

struct OpenSession {
    session: Arc<Session>,
    last_seen: Instant,
}

/// Open cart sessions, each backed by its own storage scope.
#[derive(Clone)]
pub struct Sessions {
    storage: StorageFactory,
    idle_timeout: Duration,
    open: Arc<Mutex<HashMap<String, OpenSession>>>,
}

impl Sessions {
    pub fn files(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self::with_storage(Arc::new(move |id: &str| -> Arc<dyn CartStorage> { Arc::new(FileStorage::new(root.join(id))) }))
    }

    /// Saved carts live as long as the process.
    pub fn in_memory() -> Self {
        let saved: Arc<std::sync::Mutex<HashMap<String, Arc<MemoryStorage>>>> = Arc::default();
        Self::with_storage(Arc::new(move |id: &str| -> Arc<dyn CartStorage> {
            let mut saved = saved.lock().unwrap_or_else(PoisonError::into_inner);
            let storage = saved.entry(id.to_string()).or_insert_with(|| Arc::new(MemoryStorage::new())).clone();
            storage
        }))
    }

    fn with_storage(storage: StorageFactory) -> Self { Self { storage, idle_timeout: SESSION_IDLE_TIMEOUT, open: Arc::default() } }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub async fn get(&self, id: &str) -> ApiResult<Arc<Session>> {
        let valid = !id.is_empty() && id.len() <= 64 && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid { return Err((StatusCode::BAD_REQUEST, "Invalid session id".to_string())); }

        let now = Instant::now();
        let mut open = self.open.lock().await;
        let before = open.len();
        open.retain(|_, s| Arc::strong_count(&s.session) > 1 || now.duration_since(s.last_seen) < self.idle_timeout);
        if open.len() < before { debug!(evicted = before - open.len(), "idle sessions dropped"); }

        if let Some(entry) = open.get_mut(id) {
            entry.last_seen = now;
            return Ok(entry.session.clone());
        }
        let storage = (self.storage)(id);
        let cart = tokio::task::spawn_blocking(move || CartStore::open(storage)).await.map_err(internal)?;
        let session = Arc::new(Session {
            gate: SubmitGate::new(),
            state: Arc::new(Mutex::new(SessionState { cart, notes: String::new(), selection: VariantSelection::new() })),
        });
        open.insert(id.to_string(), OpenSession { session: session.clone(), last_seen: now });
        Ok(session)
    }

    /// Forgets a session. Its saved cart is untouched.
    pub async fn close(&self, id: &str) { self.open.lock().await.remove(id); }

    pub async fn open_count(&self) -> usize { self.open.lock().await.len() }
}

/// Runs a cart mutation on the blocking pool, since every change is written
/// through to storage.
async fn mutate<R, F>(session: &Session, f: F) -> ApiResult<(OwnedMutexGuard<SessionState>, R)>
where
    F: FnOnce(&mut SessionState) -> R + Send + 'static,
    R: Send + 'static,
{
    let mut state = session.state.clone().lock_owned().await;
    tokio::task::spawn_blocking(move || {
        let out = f(&mut *state);
        (state, out)
    }).await.map_err(internal)
}

fn internal(e: JoinError) -> (StatusCode, String) {
    error!(error = %e, "cart task failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong. Please try again.".to_string())
}

#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
    pub checkout: Checkout,
    pub partners: Partners,
    pub orders: OrderDesk,
    pub history: Arc<Mutex<OrderHistory>>,
    pub approvals: Arc<Mutex<PendingApprovals>>,
    pub products: Arc<Mutex<ProductBoard>>,
    pub sessions: Sessions,
}

impl AppState {
    pub fn new(data: DataClient, events: EventPublisher, sessions: Sessions) -> Self {
        let partners = Partners::new(data.clone(), events.clone());
        Self {
            catalog: Catalog::new(data.clone()),
            checkout: Checkout::new(data.clone(), events.clone()),
            orders: OrderDesk::new(data.clone(), events.clone()),
            history: Arc::new(Mutex::new(OrderHistory::new(data.clone()))),
            approvals: Arc::new(Mutex::new(PendingApprovals::new(partners.clone()))),
            products: Arc::new(Mutex::new(ProductBoard::new(data, events))),
            partners,
            sessions,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "wholesale-portal"})) }))
        .route("/api/v1/catalog", get(list_catalog))
        .route("/api/v1/cart/:session", get(get_cart).delete(clear_cart))
        .route("/api/v1/cart/:session/items", post(add_to_cart))
        .route("/api/v1/cart/:session/items/:variant_id", put(update_quantity).delete(remove_from_cart))
        .route("/api/v1/cart/:session/selection/:variant_id", put(adjust_selection))
        .route("/api/v1/cart/:session/products/:product_id/commit", post(commit_selection))
        .route("/api/v1/cart/:session/notes", put(stage_notes))
        .route("/api/v1/cart/:session/checkout", post(submit_order))
        .route("/api/v1/partners", post(register))
        .route("/api/v1/partners/me", get(my_profile))
        .route("/api/v1/orders", get(my_orders))
        .route("/api/v1/orders/:id/items", get(my_order_items))
        .route("/api/v1/admin/approvals", get(pending_approvals))
        .route("/api/v1/admin/approvals/:user_id", post(review_partner))
        .route("/api/v1/admin/customers", get(list_customers))
        .route("/api/v1/admin/products", get(list_products).post(create_product))
        .route("/api/v1/admin/products/:id", put(update_product).delete(delete_product))
        .route("/api/v1/admin/products/:id/availability", post(toggle_availability))
        .route("/api/v1/admin/orders", get(list_orders))
        .route("/api/v1/admin/orders/:id", get(get_order))
        .route("/api/v1/admin/orders/:id/status", put(update_order_status))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state)
}

fn reject(e: StorefrontError) -> (StatusCode, String) {
    let status = match &e {
        StorefrontError::NotFound(_) => StatusCode::NOT_FOUND,
        StorefrontError::Unavailable(_) | StorefrontError::InvalidTransition { .. } => StatusCode::CONFLICT,
        StorefrontError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        StorefrontError::Cart(_) => StatusCode::BAD_REQUEST,
        StorefrontError::Data(source) => {
            error!(error = %source, "data service call failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong. Please try again.".to_string());
        }
    };
    (status, e.to_string())
}

fn user_id(headers: &HeaderMap) -> ApiResult<Uuid> {
    headers.get("x-user-id").and_then(|v| v.to_str().ok()).and_then(|v| Uuid::parse_str(v).ok())
        .ok_or((StatusCode::UNAUTHORIZED, "Missing or invalid x-user-id".to_string()))
}

async fn require_admin(s: &AppState, headers: &HeaderMap) -> ApiResult<Profile> {
    let profile = s.partners.profile(user_id(headers)?).await.map_err(reject)?;
    if !profile.is_admin { return Err((StatusCode::FORBIDDEN, "Admin access required".to_string())); }
    Ok(profile)
}

// -----------------------------------------------------------------------------
// Catalog
// -----------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub entry: ProductWithVariants,
    pub images: Vec<String>,
    pub price_range: Option<PriceRange>,
}

async fn list_catalog(State(s): State<AppState>) -> ApiResult<Json<Vec<CatalogEntry>>> {
    let products = s.catalog.available_products().await.map_err(reject)?;
    Ok(Json(products.into_iter().map(|entry| CatalogEntry {
        images: product_images(&entry.product), price_range: price_range(&entry.variants), entry,
    }).collect()))
}

// -----------------------------------------------------------------------------
// Cart
// -----------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartItem>,
    pub total_amount: Money,
    pub total_items: u64,
    pub notes: String,
    pub submitting: bool,
}

fn view(session: &Session, state: &SessionState) -> Json<CartView> {
    Json(CartView {
        items: state.cart.items().to_vec(), total_amount: state.cart.total_amount(),
        total_items: state.cart.total_items(), notes: state.notes.clone(), submitting: session.gate.is_busy(),
    })
}

async fn get_cart(State(s): State<AppState>, Path(session): Path<String>) -> ApiResult<Json<CartView>> {
    let session = s.sessions.get(&session).await?;
    let state = session.state.lock().await;
    Ok(view(&session, &state))
}

#[derive(Debug, Deserialize)] pub struct AddToCartRequest { pub variant_id: Uuid, pub quantity: u32 }

async fn add_to_cart(State(s): State<AppState>, Path(session): Path<String>, Json(r): Json<AddToCartRequest>) -> ApiResult<Json<CartView>> {
    let session = s.sessions.get(&session).await?;
    let (product, variant) = s.catalog.variant(r.variant_id).await.map_err(reject)?;
    let (state, added) = mutate(&session, move |st| st.cart.add_to_cart(product, variant, r.quantity)).await?;
    added.map_err(|e| reject(e.into()))?;
    Ok(view(&session, &state))
}

#[derive(Debug, Deserialize)] pub struct QuantityRequest { pub quantity: i64 }

async fn update_quantity(State(s): State<AppState>, Path((session, variant_id)): Path<(String, Uuid)>, Json(r): Json<QuantityRequest>) -> ApiResult<Json<CartView>> {
    let session = s.sessions.get(&session).await?;
    let (state, ()) = mutate(&session, move |st| st.cart.update_quantity(variant_id, r.quantity)).await?;
    Ok(view(&session, &state))
}

async fn remove_from_cart(State(s): State<AppState>, Path((session, variant_id)): Path<(String, Uuid)>) -> ApiResult<Json<CartView>> {
    let session = s.sessions.get(&session).await?;
    let (state, ()) = mutate(&session, move |st| st.cart.remove_from_cart(variant_id)).await?;
    Ok(view(&session, &state))
}

async fn clear_cart(State(s): State<AppState>, Path(session): Path<String>) -> ApiResult<StatusCode> {
    let session = s.sessions.get(&session).await?;
    mutate(&session, |st| st.cart.clear_cart()).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)] pub struct SelectionRequest { pub delta: i64 }
#[derive(Debug, Serialize)] pub struct SelectionView { pub variant_id: Uuid, pub quantity: u32 }

async fn adjust_selection(State(s): State<AppState>, Path((session, variant_id)): Path<(String, Uuid)>, Json(r): Json<SelectionRequest>) -> ApiResult<Json<SelectionView>> {
    let session = s.sessions.get(&session).await?;
    let quantity = session.state.lock().await.selection.adjust(variant_id, r.delta);
    Ok(Json(SelectionView { variant_id, quantity }))
}

/// Moves the staged quantities for one product into the cart.
async fn commit_selection(State(s): State<AppState>, Path((session, product_id)): Path<(String, Uuid)>) -> ApiResult<Json<CartView>> {
    let session = s.sessions.get(&session).await?;
    let entry = s.catalog.product(product_id).await.map_err(reject)?;
    let (state, _) = mutate(&session, move |st| {
        let SessionState { cart, selection, .. } = st;
        selection.commit(&entry, cart)
    }).await?;
    Ok(view(&session, &state))
}

#[derive(Debug, Deserialize)] pub struct NotesRequest { pub notes: String }

async fn stage_notes(State(s): State<AppState>, Path(session): Path<String>, Json(r): Json<NotesRequest>) -> ApiResult<Json<CartView>> {
    let session = s.sessions.get(&session).await?;
    let mut state = session.state.lock().await;
    state.notes = r.notes;
    Ok(view(&session, &state))
}

async fn submit_order(State(s): State<AppState>, Path(id): Path<String>, headers: HeaderMap) -> ApiResult<(StatusCode, Json<SubmittedOrder>)> {
    let partner = s.partners.profile(user_id(&headers)?).await.map_err(reject)?;
    let session = s.sessions.get(&id).await?;
    if session.gate.is_busy() { return Err((StatusCode::CONFLICT, SubmitError::InFlight.to_string())); }
    let mut state = session.state.lock().await;
    let SessionState { cart, notes, .. } = &mut *state;
    match s.checkout.submit(&session.gate, &partner, cart, notes).await {
        Ok(submitted) => {
            s.sessions.close(&id).await;
            Ok((StatusCode::CREATED, Json(submitted)))
        }
        Err(e) => {
            let status = match e {
                SubmitError::EmptyCart => StatusCode::BAD_REQUEST,
                SubmitError::NotApproved => StatusCode::FORBIDDEN,
                SubmitError::InFlight => StatusCode::CONFLICT,
                SubmitError::Failed { .. } => StatusCode::BAD_GATEWAY,
            };
            Err((status, e.to_string()))
        }
    }
}

// -----------------------------------------------------------------------------
// Partners
// -----------------------------------------------------------------------------

async fn register(State(s): State<AppState>, headers: HeaderMap, Json(r): Json<Registration>) -> ApiResult<(StatusCode, Json<Profile>)> {
    let profile = s.partners.register(user_id(&headers)?, &r).await.map_err(reject)?;
    Ok((StatusCode::CREATED, Json(profile)))
}

async fn my_profile(State(s): State<AppState>, headers: HeaderMap) -> ApiResult<Json<Profile>> {
    Ok(Json(s.partners.profile(user_id(&headers)?).await.map_err(reject)?))
}

async fn my_orders(State(s): State<AppState>, headers: HeaderMap) -> ApiResult<Json<Vec<Order>>> {
    let me = user_id(&headers)?;
    Ok(Json(s.history.lock().await.orders(me).await.map_err(reject)?))
}

async fn my_order_items(State(s): State<AppState>, Path(id): Path<Uuid>, headers: HeaderMap) -> ApiResult<Json<Vec<OrderItem>>> {
    let me = user_id(&headers)?;
    let order = s.orders.order(id).await.map_err(reject)?;
    if order.user_id != me { return Err(reject(StorefrontError::NotFound("order"))); }
    let mut history = s.history.lock().await;
    Ok(Json(history.items(id).await.map_err(reject)?.to_vec()))
}

// -----------------------------------------------------------------------------
// Admin
// -----------------------------------------------------------------------------

async fn pending_approvals(State(s): State<AppState>, headers: HeaderMap) -> ApiResult<Json<Vec<Profile>>> {
    require_admin(&s, &headers).await?;
    let mut approvals = s.approvals.lock().await;
    Ok(Json(approvals.refresh().await.map_err(reject)?.to_vec()))
}

#[derive(Debug, Deserialize)] pub struct ReviewRequest { pub approve: bool }

async fn review_partner(State(s): State<AppState>, Path(user): Path<Uuid>, headers: HeaderMap, Json(r): Json<ReviewRequest>) -> ApiResult<StatusCode> {
    require_admin(&s, &headers).await?;
    s.approvals.lock().await.decide(user, r.approve).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_customers(State(s): State<AppState>, headers: HeaderMap) -> ApiResult<Json<Vec<Profile>>> {
    require_admin(&s, &headers).await?;
    Ok(Json(s.partners.customers().await.map_err(reject)?))
}

async fn list_products(State(s): State<AppState>, headers: HeaderMap) -> ApiResult<Json<Vec<ProductWithVariants>>> {
    require_admin(&s, &headers).await?;
    let mut board = s.products.lock().await;
    Ok(Json(board.refresh().await.map_err(reject)?.to_vec()))
}

async fn create_product(State(s): State<AppState>, headers: HeaderMap, Json(r): Json<ProductDraft>) -> ApiResult<(StatusCode, Json<ProductWithVariants>)> {
    require_admin(&s, &headers).await?;
    let saved = s.products.lock().await.save(None, &r).await.map_err(reject)?;
    Ok((StatusCode::CREATED, Json(saved)))
}

async fn update_product(State(s): State<AppState>, Path(id): Path<Uuid>, headers: HeaderMap, Json(r): Json<ProductDraft>) -> ApiResult<Json<ProductWithVariants>> {
    require_admin(&s, &headers).await?;
    Ok(Json(s.products.lock().await.save(Some(id), &r).await.map_err(reject)?))
}

async fn delete_product(State(s): State<AppState>, Path(id): Path<Uuid>, headers: HeaderMap) -> ApiResult<StatusCode> {
    require_admin(&s, &headers).await?;
    s.products.lock().await.delete(id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_availability(State(s): State<AppState>, Path(id): Path<Uuid>, headers: HeaderMap) -> ApiResult<Json<serde_json::Value>> {
    require_admin(&s, &headers).await?;
    let mut board = s.products.lock().await;
    if board.products().iter().all(|p| p.product.id != id) {
        board.refresh().await.map_err(reject)?;
    }
    let is_available = board.toggle_availability(id).await.map_err(reject)?;
    Ok(Json(serde_json::json!({"id": id, "is_available": is_available})))
}

async fn list_orders(State(s): State<AppState>, headers: HeaderMap) -> ApiResult<Json<Vec<Order>>> {
    require_admin(&s, &headers).await?;
    Ok(Json(s.orders.all_orders().await.map_err(reject)?))
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

async fn get_order(State(s): State<AppState>, Path(id): Path<Uuid>, headers: HeaderMap) -> ApiResult<Json<OrderDetail>> {
    require_admin(&s, &headers).await?;
    let order = s.orders.order(id).await.map_err(reject)?;
    let items = s.orders.items(id).await.map_err(reject)?;
    Ok(Json(OrderDetail { order, items }))
}

#[derive(Debug, Deserialize)] pub struct StatusRequest { pub status: OrderStatus }

async fn update_order_status(State(s): State<AppState>, Path(id): Path<Uuid>, headers: HeaderMap, Json(r): Json<StatusRequest>) -> ApiResult<Json<Order>> {
    require_admin(&s, &headers).await?;
    Ok(Json(s.orders.update_status(id, r.status).await.map_err(reject)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use crate::data::{MemoryDataService, Table};
    use crate::domain::aggregates::{Product, ProductVariant};
    use crate::test_support::memory_client;

    async fn call(app: &Router, method: &str, uri: &str, user: Option<Uuid>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri).header("content-type", "application/json");
        if let Some(user) = user { req = req.header("x-user-id", user.to_string()); }
        let body = body.map_or_else(Body::empty, |b| Body::from(b.to_string()));
        let res = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned())))
    }

    async fn seed(data: &DataClient) -> (Uuid, ProductVariant) {
        let product: Product = data.insert_one(Table::Products, &json!({"name": "Widget", "sku": "W", "price": 15, "wholesale_price": 10, "image_url": "a.jpg,b.jpg"})).await.unwrap();
        let red: ProductVariant = data.insert_one(Table::ProductVariants, &json!({"product_id": product.id, "name": "Red", "sku": "W-R", "wholesale_price": 10, "rrp_price": 15})).await.unwrap();
        let buyer = Uuid::new_v4();
        let _: Profile = data.insert_one(Table::Profiles, &json!({
            "id": buyer, "email": "b@x.example", "company_name": "Scoot Shop", "contact_name": "Sam",
            "phone": "1", "address": "1 Main", "city": "Portland", "state": "OR", "zip": "97201",
            "country": "US", "status": "approved",
        })).await.unwrap();
        (buyer, red)
    }

    fn app_with(sessions: Sessions) -> (Arc<MemoryDataService>, DataClient, Router) {
        let (db, data) = memory_client();
        let app = router(AppState::new(data.clone(), EventPublisher::disabled(), sessions));
        (db, data, app)
    }

    fn app() -> (Arc<MemoryDataService>, DataClient, Router) { app_with(Sessions::in_memory()) }

    #[tokio::test]
    async fn test_health() {
        let (_db, _data, app) = app();
        let (status, body) = call(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_catalog_includes_presentation_fields() {
        let (_db, data, app) = app();
        seed(&data).await;
        let (status, body) = call(&app, "GET", "/api/v1/catalog", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["images"], json!(["a.jpg", "b.jpg"]));
        assert_eq!(body[0]["price_range"]["max_rrp"], 15.0);
    }

    #[tokio::test]
    async fn test_cart_to_order() {
        let (db, data, app) = app();
        let (buyer, red) = seed(&data).await;

        let (status, cart) = call(&app, "POST", "/api/v1/cart/s1/items", None, Some(json!({"variant_id": red.id, "quantity": 3}))).await;
        assert_eq!(status, StatusCode::OK);
        call(&app, "POST", "/api/v1/cart/s1/items", None, Some(json!({"variant_id": red.id, "quantity": 1}))).await;
        let (_, cart_after) = call(&app, "GET", "/api/v1/cart/s1", None, None).await;
        assert_eq!(cart["total_items"], 3);
        assert_eq!(cart_after["total_items"], 4);
        assert_eq!(cart_after["items"].as_array().unwrap().len(), 1);

        let (status, _) = call(&app, "POST", "/api/v1/cart/s1/checkout", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, order) = call(&app, "POST", "/api/v1/cart/s1/checkout", Some(buyer), None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(order["order"]["total_amount"], 40.0);
        assert_eq!(order["items"][0]["product_name"], "Widget - Red");
        assert_eq!(order["dismiss_after"], 3000);

        let (_, cart) = call(&app, "GET", "/api/v1/cart/s1", None, None).await;
        assert_eq!(cart["total_items"], 0);
        assert_eq!(db.count(Table::OrderItems).await, 1);

        let (_, orders) = call(&app, "GET", "/api/v1/orders", Some(buyer), None).await;
        assert_eq!(orders.as_array().unwrap().len(), 1);

        let items_uri = format!("/api/v1/orders/{}/items", order["order"]["id"].as_str().unwrap());
        let (status, items) = call(&app, "GET", &items_uri, Some(buyer), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(items[0]["quantity"], 4);
        let (status, _) = call(&app, "GET", &items_uri, Some(Uuid::new_v4()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_checkout_releases_session() {
        let sessions = Sessions::in_memory();
        let (_db, data, app) = app_with(sessions.clone());
        let (buyer, red) = seed(&data).await;
        call(&app, "POST", "/api/v1/cart/s1/items", None, Some(json!({"variant_id": red.id, "quantity": 1}))).await;
        assert_eq!(sessions.open_count().await, 1);

        let (status, _) = call(&app, "POST", "/api/v1/cart/s1/checkout", Some(buyer), None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(sessions.open_count().await, 0);
    }

    #[tokio::test]
    async fn test_idle_sessions_are_evicted_and_restored() {
        let sessions = Sessions::in_memory().with_idle_timeout(Duration::ZERO);
        let (_db, data, app) = app_with(sessions.clone());
        let (_, red) = seed(&data).await;
        call(&app, "POST", "/api/v1/cart/s1/items", None, Some(json!({"variant_id": red.id, "quantity": 3}))).await;

        call(&app, "GET", "/api/v1/cart/s2", None, None).await;
        assert_eq!(sessions.open_count().await, 1);

        let (_, cart) = call(&app, "GET", "/api/v1/cart/s1", None, None).await;
        assert_eq!(cart["total_items"], 3);
    }

    #[tokio::test]
    async fn test_file_backed_cart_survives_eviction() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = Sessions::files(dir.path()).with_idle_timeout(Duration::ZERO);
        let (_db, data, app) = app_with(sessions.clone());
        let (_, red) = seed(&data).await;

        call(&app, "POST", "/api/v1/cart/s1/items", None, Some(json!({"variant_id": red.id, "quantity": 2}))).await;
        assert!(dir.path().join("s1").join("wholesaleCart.json").exists());

        call(&app, "GET", "/api/v1/cart/s2", None, None).await;
        let (_, cart) = call(&app, "GET", "/api/v1/cart/s1", None, None).await;
        assert_eq!(cart["total_items"], 2);
        assert_eq!(cart["items"][0]["variant"]["sku"], "W-R");
    }

    #[tokio::test]
    async fn test_staged_selection_commits_to_cart() {
        let (_db, data, app) = app();
        let (_, red) = seed(&data).await;
        let select_uri = format!("/api/v1/cart/s4/selection/{}", red.id);

        let (_, staged) = call(&app, "PUT", &select_uri, None, Some(json!({"delta": -2}))).await;
        assert_eq!(staged["quantity"], 0);
        let (_, staged) = call(&app, "PUT", &select_uri, None, Some(json!({"delta": 5}))).await;
        assert_eq!(staged["quantity"], 5);

        let (status, cart) = call(&app, "POST", &format!("/api/v1/cart/s4/products/{}/commit", red.product_id), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cart["total_items"], 5);

        let (_, staged) = call(&app, "PUT", &select_uri, None, Some(json!({"delta": 0}))).await;
        assert_eq!(staged["quantity"], 0);
    }

    #[tokio::test]
    async fn test_failed_checkout_shows_generic_message() {
        let (db, data, app) = app();
        let (buyer, red) = seed(&data).await;
        call(&app, "POST", "/api/v1/cart/s2/items", None, Some(json!({"variant_id": red.id, "quantity": 2}))).await;
        db.fail_on(crate::data::memory::Operation::Insert(Table::OrderItems)).await;

        let (status, body) = call(&app, "POST", "/api/v1/cart/s2/checkout", Some(buyer), None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body, Value::String(crate::services::SUBMIT_FAILED_MESSAGE.to_string()));
        let (_, cart) = call(&app, "GET", "/api/v1/cart/s2", None, None).await;
        assert_eq!(cart["total_items"], 2);
    }

    #[tokio::test]
    async fn test_quantity_update_and_bad_session() {
        let (_db, data, app) = app();
        let (_, red) = seed(&data).await;
        call(&app, "POST", "/api/v1/cart/s3/items", None, Some(json!({"variant_id": red.id, "quantity": 2}))).await;
        let (_, cart) = call(&app, "PUT", &format!("/api/v1/cart/s3/items/{}", red.id), None, Some(json!({"quantity": -1}))).await;
        assert_eq!(cart["items"], json!([]));

        let (status, _) = call(&app, "GET", "/api/v1/cart/bad.session", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_admin_routes_require_admin() {
        let (_db, data, app) = app();
        let (buyer, _) = seed(&data).await;
        let (status, _) = call(&app, "GET", "/api/v1/admin/orders", Some(buyer), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
