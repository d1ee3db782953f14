use crate::config::Config;
use crate::contract::{RaffleChain, StartRaffleData};
use crate::entries::{self, EntriesReport, Verification};
use crate::error::Error;
use crate::identity::{self, Identity};
use crate::provider::OwnershipProvider;
use crate::store::{self, BlobStore};
use crate::utils::check_bearer;
use crate::winners::{self, LatestWinner, PastWinner};
use actix_multipart::Multipart;
use actix_web::{
    body::BoxBody, error, http::header::AUTHORIZATION, http::StatusCode, web, HttpRequest, HttpResponse,
    Responder, ResponseError,
};
use futures_util::StreamExt;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt::{self, Debug, Display};
use std::sync::Arc;
use web3::types::H256;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiResult<T = ()> {
    pub code: u16,
    pub msg: Option<Cow<'static, str>>,
    pub data: Option<T>,
}

impl<T: Serialize> Default for ApiResult<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize> ApiResult<T> {
    pub fn new() -> Self {
        Self {
            code: 200,
            msg: None,
            data: None,
        }
    }
    pub fn code(mut self, code: u16) -> Self {
        self.code = code;
        self
    }
    pub fn with_msg<S: Into<Cow<'static, str>>>(mut self, msg: S) -> Self {
        self.msg = Some(msg.into());
        self
    }
    pub fn msg_as_str(&self) -> &str {
        self.msg.as_ref().map(|s| s.as_ref()).unwrap_or_default()
    }
    pub fn with_data(mut self, data: T) -> Self {
        self.data = Some(data);
        self
    }
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
    pub fn log_to_resp(&self, req: &HttpRequest) -> HttpResponse {
        self.log(req);
        self.to_resp()
    }
    pub fn log(&self, req: &HttpRequest) {
        info!(
            "{} \"{} {} {:?}\" {}",
            req.peer_addr().map(|a| a.to_string()).unwrap_or_else(|| "-".to_string()),
            req.method(),
            req.uri(),
            req.version(),
            self.code
        );
    }
    pub fn to_resp(&self) -> HttpResponse {
        match serde_json::to_string(self) {
            Ok(json) => HttpResponse::build(self.status())
                .content_type("application/json")
                .body(json),
            Err(e) => error::Error::from(e).into(),
        }
    }
}

impl<T: Debug + Serialize> Display for ApiResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub type ApiError = ApiResult<()>;

impl<T: Debug + Serialize> ResponseError for ApiResult<T> {
    fn status_code(&self) -> StatusCode {
        self.status()
    }
    fn error_response(&self) -> HttpResponse<BoxBody> {
        self.to_resp()
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        let code = e.code();
        if code >= 500 {
            log::error!("request failed: {}", e);
        } else {
            warn!("request rejected: {}", e);
        }
        ApiResult::new().code(code).with_msg(e.to_string())
    }
}

impl<T: Serialize> Responder for ApiResult<T> {
    type Body = BoxBody;

    fn respond_to(self, req: &HttpRequest) -> HttpResponse {
        (&self).respond_to(req)
    }
}

impl<T: Serialize> Responder for &ApiResult<T> {
    type Body = BoxBody;

    fn respond_to(self, req: &HttpRequest) -> HttpResponse {
        self.log_to_resp(req)
    }
}

pub fn json_error_handler<E: std::fmt::Display + std::fmt::Debug + 'static>(err: E, req: &HttpRequest) -> error::Error {
    let detail = err.to_string();
    let api = ApiResult::new().with_data(()).code(400).with_msg(detail);
    let response = api.log_to_resp(req);

    error::InternalError::from_response(err, response).into()
}

pub async fn notfound(req: HttpRequest) -> HttpResponse {
    let api = ApiResult::new()
        .with_data(())
        .code(404)
        .with_msg("route not found");

    api.respond_to(&req)
}

type ApiResponse<T> = Result<ApiResult<T>, ApiError>;

fn ok<T: Serialize>(data: T) -> ApiResponse<T> {
    Ok(ApiResult::new().with_data(data))
}

pub struct AppState<P, C> {
    pub config: Config,
    pub provider: P,
    pub chain: C,
    pub store: Arc<dyn BlobStore>,
}

fn authorize(req: &HttpRequest, token: &str) -> Result<(), Error> {
    let header = req.headers().get(AUTHORIZATION).and_then(|h| h.to_str().ok());
    check_bearer(header, token)
}

async fn blocking<F, R>(f: F) -> Result<R, Error>
where
    F: FnOnce() -> Result<R, Error> + Send + 'static,
    R: Send + 'static,
{
    web::block(f)
        .await
        .map_err(|e| Error::Internal(format!("blocking task failed: {}", e)))?
}

/// Token ids or entries as sent by clients. Anything but an array of strings
/// or numbers counts as absent.
fn id_list(value: Option<Value>) -> Option<Vec<String>> {
    let items = match value {
        Some(Value::Array(items)) => items,
        _ => return None,
    };
    items
        .into_iter()
        .map(|v| match v {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect()
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct EntriesRequest {
    pub nft_ids: Option<Value>,
    pub shuffle: bool,
    pub month: Option<String>,
}

pub async fn fetch_number_of_entries<P, C>(
    state: web::Data<AppState<P, C>>,
    body: web::Json<EntriesRequest>,
) -> ApiResponse<EntriesReport>
where
    P: OwnershipProvider + 'static,
    C: RaffleChain + 'static,
{
    let EntriesRequest { nft_ids, shuffle, month } = body.into_inner();
    let nft_ids = match id_list(nft_ids) {
        Some(ids) if !ids.is_empty() => ids,
        _ => state.config.default_nft_ids.clone(),
    };
    if let Some(month) = month {
        info!("fetching entries for month {}", month);
    }
    let report = entries::aggregate(&state.provider, &nft_ids, shuffle)
        .await
        .map_err(|e| match e {
            Error::Config(_) => e,
            e => Error::Fetch(format!("Failed to fetch NFT owner data: {}", e)),
        })?;
    ok(report)
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifyRequest {
    pub nft_ids: Option<Value>,
    pub entries: Option<Value>,
    pub commitment_hash: String,
}

pub async fn verify_commitment_hash<P, C>(
    state: web::Data<AppState<P, C>>,
    body: web::Json<VerifyRequest>,
) -> ApiResponse<Verification>
where
    P: OwnershipProvider + 'static,
    C: RaffleChain + 'static,
{
    let VerifyRequest {
        nft_ids,
        entries,
        commitment_hash,
    } = body.into_inner();
    ok(entries::verify(&state.provider, id_list(nft_ids), id_list(entries), &commitment_hash).await?)
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PastWinners {
    pub winners: Vec<PastWinner>,
}

pub async fn fetch_past_winners<P, C>(state: web::Data<AppState<P, C>>) -> ApiResponse<PastWinners>
where
    P: OwnershipProvider + 'static,
    C: RaffleChain + 'static,
{
    let winners = winners::past_winners(&state.chain)
        .await
        .map_err(|e| Error::Internal(format!("Failed to fetch past winners: {}", e)))?;
    ok(PastWinners { winners })
}

pub async fn fetch_winner_address<P, C>(state: web::Data<AppState<P, C>>) -> ApiResponse<LatestWinner>
where
    P: OwnershipProvider + 'static,
    C: RaffleChain + 'static,
{
    ok(winners::latest_winner(&state.chain).await?)
}

#[derive(Debug, Deserialize)]
pub struct AddressQuery {
    pub address: Option<String>,
}

pub async fn get_discord_name<P, C>(
    req: HttpRequest,
    state: web::Data<AppState<P, C>>,
    query: web::Query<AddressQuery>,
) -> ApiResponse<Identity>
where
    P: OwnershipProvider + 'static,
    C: RaffleChain + 'static,
{
    authorize(&req, &state.config.api_token)?;
    let address = match query.into_inner().address {
        Some(a) if !a.trim().is_empty() => a,
        _ => return Err(Error::BadRequest("Ethereum address parameter is required".to_string()).into()),
    };
    let store = state.store.clone();
    let fallback = state.config.uploads.fallback_csv.clone();
    let found = blocking(move || identity::lookup(store.as_ref(), fallback.as_deref(), &address)).await?;
    ok(found)
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadResult {
    pub success: bool,
    pub message: String,
    pub filename: String,
    pub timestamp: i64,
}

pub async fn upload_csv<P, C>(
    req: HttpRequest,
    state: web::Data<AppState<P, C>>,
    mut payload: Multipart,
) -> ApiResponse<UploadResult>
where
    P: OwnershipProvider + 'static,
    C: RaffleChain + 'static,
{
    authorize(&req, &state.config.api_token)?;
    let max_bytes = state.config.uploads.max_bytes;

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = payload.next().await {
        let mut field = field.map_err(|e| Error::BadRequest(format!("invalid multipart body: {}", e)))?;
        if field.name() != "file" {
            continue;
        }
        let name = field
            .content_disposition()
            .get_filename()
            .unwrap_or_default()
            .to_string();
        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| Error::BadRequest(format!("invalid multipart body: {}", e)))?;
            if data.len() + chunk.len() > max_bytes {
                return Err(Error::TooLarge(format!("File exceeds {} bytes", max_bytes)).into());
            }
            data.extend_from_slice(&chunk);
        }
        upload = Some((name, data));
    }

    let (name, data) = upload.ok_or_else(|| Error::BadRequest("No file provided".to_string()))?;
    if !name.ends_with(".csv") {
        return Err(Error::BadRequest("File must be a CSV file".to_string()).into());
    }

    let timestamp = chrono::Utc::now().timestamp_millis();
    let blobs = state.store.clone();
    let stem = format!("discord_data_{}", timestamp);
    let filename = blocking(move || store::save_latest(blobs.as_ref(), &stem, &data)).await?;
    info!("uploaded {} as {}", name, filename);

    ok(UploadResult {
        success: true,
        message: "CSV uploaded successfully".to_string(),
        filename,
        timestamp,
    })
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct StartRaffleRequest {
    pub nft_ids: Vec<String>,
    pub month: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StartRaffleResult {
    pub transaction_hash: H256,
    pub month: String,
    pub nft_ids: Vec<String>,
}

pub async fn start_raffle<P, C>(
    req: HttpRequest,
    state: web::Data<AppState<P, C>>,
    body: web::Json<StartRaffleRequest>,
) -> ApiResponse<StartRaffleResult>
where
    P: OwnershipProvider + 'static,
    C: RaffleChain + 'static,
{
    authorize(&req, &state.config.api_token)?;
    let StartRaffleRequest { nft_ids, month } = body.into_inner();
    if month.trim().is_empty() {
        return Err(Error::BadRequest("month is required".to_string()).into());
    }
    if nft_ids.is_empty() {
        return Err(Error::BadRequest("nftIds must not be empty".to_string()).into());
    }
    let transaction_hash = state
        .chain
        .start_raffle(StartRaffleData {
            nft_ids: nft_ids.clone(),
            month: month.clone(),
        })
        .await?;
    ok(StartRaffleResult {
        transaction_hash,
        month,
        nft_ids,
    })
}

pub fn configure<P, C>(cfg: &mut web::ServiceConfig)
where
    P: OwnershipProvider + 'static,
    C: RaffleChain + 'static,
{
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .app_data(web::QueryConfig::default().error_handler(json_error_handler))
        .service(
            web::scope("/api")
                .route("/FetchNumberOfEntries", web::post().to(fetch_number_of_entries::<P, C>))
                .route("/VerifyCommitmentHash", web::post().to(verify_commitment_hash::<P, C>))
                .route("/FetchPastWinners", web::get().to(fetch_past_winners::<P, C>))
                .route("/FetchWinnerAddress", web::get().to(fetch_winner_address::<P, C>))
                .route("/GetDiscordName", web::get().to(get_discord_name::<P, C>))
                .route("/UploadCSV", web::post().to(upload_csv::<P, C>))
                .route("/StartRaffle", web::post().to(start_raffle::<P, C>)),
        );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::tests::{record, FakeChain};
    use crate::entries::tests::FakeProvider;
    use crate::entries::commitment_hash;
    use crate::store::FsStore;
    use actix_web::{test, App};
    use serde_json::{json, Value};

    const TOKEN: &str = "s3cret";

    fn state(provider: FakeProvider, chain: FakeChain, dir: &std::path::Path) -> web::Data<AppState<FakeProvider, FakeChain>> {
        state_with(provider, chain, dir, |_| {})
    }

    fn state_with(
        provider: FakeProvider,
        chain: FakeChain,
        dir: &std::path::Path,
        tweak: impl FnOnce(&mut Config),
    ) -> web::Data<AppState<FakeProvider, FakeChain>> {
        let mut config = Config::default();
        config.api_token = TOKEN.to_string();
        config.default_nft_ids = vec!["1".to_string(), "2".to_string()];
        tweak(&mut config);
        web::Data::new(AppState {
            config,
            provider,
            chain,
            store: Arc::new(FsStore::new(dir.to_path_buf())),
        })
    }

    macro_rules! service {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data($state.clone())
                    .configure(configure::<FakeProvider, FakeChain>)
                    .default_service(web::route().to(notfound)),
            )
            .await
        };
    }

    fn provider() -> FakeProvider {
        FakeProvider::with(vec![("1", vec!["0xA"]), ("2", vec!["0xA", "0xB"])])
    }

    #[actix_web::test]
    async fn entries_default_to_configured_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let data = state(provider(), FakeChain::default(), dir.path());
        let app = service!(data);

        let req = test::TestRequest::post()
            .uri("/api/FetchNumberOfEntries")
            .set_json(json!({}))
            .to_request();
        let resp: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["code"], 200);
        assert_eq!(resp["data"]["totalEntries"], 3);
        assert_eq!(resp["data"]["commitmentHash"], commitment_hash(&["0xA", "0xA", "0xB"]));
        assert_eq!(resp["data"]["ownerCounts"][0]["address"], "0xA");
        assert_eq!(resp["data"]["ownerCounts"][0]["nftCount"], 2);
        assert_eq!(resp["data"]["ownerCounts"][0]["tokenIds"], json!(["1", "2"]));
        assert_eq!(*data.provider.calls.borrow(), vec!["1", "2"]);
    }

    #[actix_web::test]
    async fn non_array_token_ids_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let data = state(provider(), FakeChain::default(), dir.path());
        let app = service!(data);

        for body in [json!({"nftIds": "137"}), json!({"nftIds": null}), json!({"nftIds": []}), json!({"nftIds": {"a": 1}})] {
            let req = test::TestRequest::post()
                .uri("/api/FetchNumberOfEntries")
                .set_json(body)
                .to_request();
            let resp: Value = test::call_and_read_body_json(&app, req).await;
            assert_eq!(resp["code"], 200);
            assert_eq!(resp["data"]["totalEntries"], 3);
        }
        assert_eq!(data.provider.calls.borrow().len(), 8);

        let req = test::TestRequest::post()
            .uri("/api/FetchNumberOfEntries")
            .set_json(json!({"nftIds": [2]}))
            .to_request();
        let resp: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["data"]["totalEntries"], 2);
    }

    #[actix_web::test]
    async fn verify_ignores_non_array_token_ids() {
        let dir = tempfile::tempdir().unwrap();
        let data = state(provider(), FakeChain::default(), dir.path());
        let app = service!(data);
        let hash = commitment_hash(&["0xAA", "0xBB"]);

        let req = test::TestRequest::post()
            .uri("/api/VerifyCommitmentHash")
            .set_json(json!({"nftIds": "1", "entries": ["0xAA", "0xBB"], "commitmentHash": hash}))
            .to_request();
        let resp: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["data"]["isValid"], true);
        assert_eq!(resp["data"]["method"], "provided-entries");
        assert!(data.provider.calls.borrow().is_empty());
    }

    #[actix_web::test]
    async fn entries_fetch_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = provider();
        p.failing = Some("2".to_string());
        let app = service!(state(p, FakeChain::default(), dir.path()));

        let req = test::TestRequest::post()
            .uri("/api/FetchNumberOfEntries")
            .set_json(json!({"nftIds": ["1", "2"], "shuffle": true}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["msg"].as_str().unwrap().starts_with("Failed to fetch NFT owner data"));
        assert!(body["data"].is_null());
    }

    #[actix_web::test]
    async fn malformed_json_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let app = service!(state(provider(), FakeChain::default(), dir.path()));
        let req = test::TestRequest::post()
            .uri("/api/VerifyCommitmentHash")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn verify_round_trip_over_http() {
        let dir = tempfile::tempdir().unwrap();
        let app = service!(state(provider(), FakeChain::default(), dir.path()));
        let hash = commitment_hash(&["0xAA", "0xBB"]);

        let req = test::TestRequest::post()
            .uri("/api/VerifyCommitmentHash")
            .set_json(json!({"entries": ["0xBB", "0xAA"], "commitmentHash": hash}))
            .to_request();
        let resp: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["data"]["isValid"], true);
        assert_eq!(resp["data"]["method"], "provided-entries");
        assert_eq!(resp["data"]["entriesCount"], 2);

        let req = test::TestRequest::post()
            .uri("/api/VerifyCommitmentHash")
            .set_json(json!({"commitmentHash": hash}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn winners_routes_read_the_chain() {
        let dir = tempfile::tempdir().unwrap();
        let chain = FakeChain {
            raffles: vec![record("January", 7, &["1"]), record("February", 0, &["2"])],
            ..Default::default()
        };
        let app = service!(state(provider(), chain, dir.path()));

        let req = test::TestRequest::get().uri("/api/FetchPastWinners").to_request();
        let resp: Value = test::call_and_read_body_json(&app, req).await;
        let winners = resp["data"]["winners"].as_array().unwrap();
        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0]["raffleId"], 1);
        assert_eq!(winners[0]["month"], "January");

        let req = test::TestRequest::get().uri("/api/FetchWinnerAddress").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["msg"], "No winner yet");
    }

    #[actix_web::test]
    async fn gated_routes_require_bearer() {
        let dir = tempfile::tempdir().unwrap();
        let data = state(provider(), FakeChain::default(), dir.path());
        let app = service!(data);

        let req = test::TestRequest::get()
            .uri("/api/GetDiscordName?address=0x1")
            .insert_header(("Authorization", "Bearer wrong"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::post()
            .uri("/api/StartRaffle")
            .set_json(json!({"nftIds": ["1"], "month": "May"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
        assert!(data.chain.started.lock().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn discord_lookup_after_upload() {
        let dir = tempfile::tempdir().unwrap();
        let app = service!(state(provider(), FakeChain::default(), dir.path()));

        let csv = format!(
            "\"{}\",\"{}\"\nalice,0xAbC0000000000000000000000000000000000001\n",
            identity::HANDLE_COLUMN,
            identity::ADDRESS_COLUMN
        );
        let boundary = "raffleboundary";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"members.csv\"\r\nContent-Type: text/csv\r\n\r\n{csv}\r\n--{b}--\r\n",
            b = boundary,
            csv = csv
        );
        let req = test::TestRequest::post()
            .uri("/api/UploadCSV")
            .insert_header(("Authorization", format!("Bearer {}", TOKEN)))
            .insert_header(("content-type", format!("multipart/form-data; boundary={}", boundary)))
            .set_payload(body)
            .to_request();
        let resp: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["code"], 200);
        assert_eq!(resp["data"]["success"], true);
        let filename = resp["data"]["filename"].as_str().unwrap().to_string();
        assert!(filename.starts_with("discord_data_") && filename.ends_with(".csv"));
        assert!(dir.path().join(&filename).exists());

        let req = test::TestRequest::get()
            .uri("/api/GetDiscordName?address=0xabc0000000000000000000000000000000000001")
            .insert_header(("Authorization", format!("Bearer {}", TOKEN)))
            .to_request();
        let resp: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["data"]["discordName"], "alice");

        let req = test::TestRequest::get()
            .uri("/api/GetDiscordName?address=0x0000000000000000000000000000000000000009")
            .insert_header(("Authorization", format!("Bearer {}", TOKEN)))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get()
            .uri("/api/GetDiscordName")
            .insert_header(("Authorization", format!("Bearer {}", TOKEN)))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn upload_rejects_non_csv() {
        let dir = tempfile::tempdir().unwrap();
        let app = service!(state(provider(), FakeChain::default(), dir.path()));
        let body = "--b\r\nContent-Disposition: form-data; name=\"file\"; filename=\"members.txt\"\r\n\r\nhello\r\n--b--\r\n";
        let req = test::TestRequest::post()
            .uri("/api/UploadCSV")
            .insert_header(("Authorization", format!("Bearer {}", TOKEN)))
            .insert_header(("content-type", "multipart/form-data; boundary=b"))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["msg"], "File must be a CSV file");
    }

    #[actix_web::test]
    async fn upload_over_limit_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = service!(state_with(provider(), FakeChain::default(), dir.path(), |c| {
            c.uploads.max_bytes = 16
        }));
        let body = format!(
            "--b\r\nContent-Disposition: form-data; name=\"file\"; filename=\"members.csv\"\r\n\r\n{}\r\n--b--\r\n",
            "x".repeat(64)
        );
        let req = test::TestRequest::post()
            .uri("/api/UploadCSV")
            .insert_header(("Authorization", format!("Bearer {}", TOKEN)))
            .insert_header(("content-type", "multipart/form-data; boundary=b"))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[actix_web::test]
    async fn start_raffle_submits_to_chain() {
        let dir = tempfile::tempdir().unwrap();
        let data = state(provider(), FakeChain::default(), dir.path());
        let app = service!(data);

        let req = test::TestRequest::post()
            .uri("/api/StartRaffle")
            .insert_header(("Authorization", format!("Bearer {}", TOKEN)))
            .set_json(json!({"nftIds": ["137", "138"], "month": "May"}))
            .to_request();
        let resp: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["code"], 200);
        assert!(resp["data"]["transactionHash"].as_str().unwrap().ends_with("abcd"));
        let started = data.chain.started.lock().unwrap();
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].month, "May");
        assert_eq!(started[0].nft_ids, vec!["137", "138"]);
    }

    #[actix_web::test]
    async fn unknown_route_is_enveloped() {
        let dir = tempfile::tempdir().unwrap();
        let app = service!(state(provider(), FakeChain::default(), dir.path()));
        let req = test::TestRequest::get().uri("/api/Nope").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["msg"], "route not found");
    }
}
