//! HTTP API for the congregation hierarchy
//!
//! The identity gateway in front of this service resolves the caller and
//! forwards it as two headers: `x-member-id` and `x-matrix-id`.
//!
//! ## Endpoints
//! - `GET  /health` - Health check with row counts
//! - `GET  /cells/{id}/attendance?year=&month=&type=` - One cell's month
//! - `GET  /attendance?year=&month=&type=&congregationId=&networkId=&discipleshipId=&cellId=&all=`
//!   - Every visible cell's month, narrowed by the most specific filter
//! - `POST /cells/{id}/reports` - Create or replace a report
//! - `POST /cells/{id}/split` - Multiply a cell
//! - `GET  /cells/{id}/access` - `{canView, canManage, grant}` for the caller
//! - `PUT  /congregations/{id}/principal` - Make a congregation principal
//! - `PUT  /networks/{id}/pastor` - Assign or clear a network pastor
//!
//! ## Example Usage
//!
//! ```bash
//! curl -H 'x-member-id: m-42' -H 'x-matrix-id: church-1' \
//!      'http://localhost:8095/cells/c-7/attendance?year=2024&month=6'
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::HeaderMap;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::db::models::ReportType;
use crate::db::{Database, TenantContext};
use crate::error::ServiceError;
use crate::services::response::{self, HandlerResult};
use crate::services::{AssignPastorInput, SaveReportInput, ScopeFilter, Services, SplitCellInput};
use crate::views::{
    CellAccessView, CellMonthlyReportView, CongregationView, NetworkView, ReportView, ScopeMonthlyReportView,
    SplitResultView,
};

pub const MEMBER_HEADER: &str = "x-member-id";
pub const MATRIX_HEADER: &str = "x-matrix-id";

/// Authenticated caller of a request
#[derive(Debug, Clone)]
pub struct Principal {
    pub member_id: String,
    pub ctx: TenantContext,
}

impl Principal {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ServiceError> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| ServiceError::Auth(format!("missing {} header", name)))
        };
        Ok(Self {
            member_id: header(MEMBER_HEADER)?,
            ctx: TenantContext::new(header(MATRIX_HEADER)?),
        })
    }
}

// ============================================================================
// Query parameters
// ============================================================================

/// Accept `true`/`false` as JSON booleans or as strings
fn bool_or_string<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => Ok(value),
        Flag::Text(text) => match text.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(de::Error::custom(format!("expected true or false, got '{}'", other))),
        },
    }
}

fn parse_report_type(value: Option<&str>) -> Result<ReportType, ServiceError> {
    value.map_or(Ok(ReportType::default()), str::parse)
}

#[derive(Debug, Deserialize)]
struct MonthQuery {
    year: i32,
    month: u32,
    #[serde(default, rename = "type")]
    report_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScopeQuery {
    year: i32,
    month: u32,
    #[serde(default, rename = "type")]
    report_type: Option<String>,
    #[serde(default)]
    congregation_id: Option<String>,
    #[serde(default)]
    network_id: Option<String>,
    #[serde(default)]
    discipleship_id: Option<String>,
    #[serde(default)]
    cell_id: Option<String>,
    #[serde(default, deserialize_with = "bool_or_string")]
    all: bool,
}

fn parse_query<T: DeserializeOwned>(query: Option<&str>) -> Result<T, ServiceError> {
    serde_urlencoded::from_str(query.unwrap_or(""))
        .map_err(|e| ServiceError::InvalidInput(format!("Invalid query: {}", e)))
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ServiceError> {
    Ok(serde_json::from_slice(body)?)
}

// ============================================================================
// Server
// ============================================================================

/// HTTP server state
pub struct HttpServer {
    services: Arc<Services>,
    db: Arc<Database>,
    bind_addr: SocketAddr,
}

impl HttpServer {
    pub fn new(services: Arc<Services>, db: Arc<Database>, bind_addr: SocketAddr) -> Self {
        Self {
            services,
            db,
            bind_addr,
        }
    }

    /// Run the HTTP server
    pub async fn run(self: Arc<Self>) -> Result<(), ServiceError> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!(addr = %self.bind_addr, "HTTP server listening");

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let server = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let server = server.clone();
                    async move { server.handle_request(req).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    warn!(addr = %remote_addr, error = %err, "Connection error");
                }
            });
        }
    }

    /// Collect the body and run the route on the blocking pool
    async fn handle_request(self: Arc<Self>, req: Request<Incoming>) -> Result<Response<Full<Bytes>>, hyper::Error> {
        let (parts, body) = req.into_parts();
        let body = body.collect().await?.to_bytes();

        debug!(method = %parts.method, path = %parts.uri.path(), "Incoming request");

        let response = tokio::task::spawn_blocking(move || {
            self.route(&parts.method, parts.uri.path(), parts.uri.query(), &parts.headers, &body)
        })
        .await;

        Ok(response.unwrap_or_else(|e| {
            error!(error = %e, "Request handler panicked");
            response::internal_error("Request handler failed")
        }))
    }

    /// Dispatch one request; diesel calls block, so run this off the reactor
    pub fn route(
        &self,
        method: &Method,
        path: &str,
        query: Option<&str>,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Response<Full<Bytes>> {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

        let result = match (method, segments.as_slice()) {
            (&Method::GET, ["health"]) => self.handle_health(),

            (&Method::GET, ["attendance"]) => self.handle_scope_report(headers, query),
            (&Method::GET, ["cells", cell_id, "attendance"]) => self.handle_cell_report(headers, cell_id, query),
            (&Method::POST, ["cells", cell_id, "reports"]) => self.handle_save_report(headers, cell_id, body),
            (&Method::POST, ["cells", cell_id, "split"]) => self.handle_split(headers, cell_id, body),
            (&Method::GET, ["cells", cell_id, "access"]) => self.handle_access(headers, cell_id),
            (&Method::PUT, ["congregations", id, "principal"]) => self.handle_principal(headers, id),
            (&Method::PUT, ["networks", id, "pastor"]) => self.handle_pastor(headers, id, body),

            (_, ["health"])
            | (_, ["attendance"])
            | (_, ["cells", _, "attendance" | "reports" | "split" | "access"])
            | (_, ["congregations", _, "principal"])
            | (_, ["networks", _, "pastor"]) => Ok(response::method_not_allowed()),

            _ => Ok(response::not_found("Not found")),
        };

        result.unwrap_or_else(response::error_response)
    }

    /// GET /health
    fn handle_health(&self) -> HandlerResult {
        let stats = self.db.stats()?;
        Ok(response::ok(&serde_json::json!({
            "status": "ok",
            "congregations": stats.congregation_count,
            "cells": stats.cell_count,
            "members": stats.member_count,
            "reports": stats.report_count,
        })))
    }

    /// GET /cells/{id}/attendance
    fn handle_cell_report(&self, headers: &HeaderMap, cell_id: &str, query: Option<&str>) -> HandlerResult {
        let principal = Principal::from_headers(headers)?;
        let query: MonthQuery = parse_query(query)?;
        let report_type = parse_report_type(query.report_type.as_deref())?;

        let report = self.services.attendance.monthly_report(
            &principal.ctx,
            &principal.member_id,
            cell_id,
            query.year,
            query.month,
            report_type,
        )?;
        Ok(response::ok(&CellMonthlyReportView::from(report)))
    }

    /// GET /attendance
    fn handle_scope_report(&self, headers: &HeaderMap, query: Option<&str>) -> HandlerResult {
        let principal = Principal::from_headers(headers)?;
        let query: ScopeQuery = parse_query(query)?;
        let report_type = parse_report_type(query.report_type.as_deref())?;
        let filter = ScopeFilter {
            congregation_id: query.congregation_id,
            network_id: query.network_id,
            discipleship_id: query.discipleship_id,
            cell_id: query.cell_id,
        };

        let report = self.services.attendance.monthly_report_for_scope(
            &principal.ctx,
            &principal.member_id,
            &filter,
            query.all,
            query.year,
            query.month,
            report_type,
        )?;
        Ok(response::ok(&ScopeMonthlyReportView::from(report)))
    }

    /// POST /cells/{id}/reports
    fn handle_save_report(&self, headers: &HeaderMap, cell_id: &str, body: &[u8]) -> HandlerResult {
        let principal = Principal::from_headers(headers)?;
        let input: SaveReportInput = parse_body(body)?;

        let report = self
            .services
            .attendance
            .save_report(&principal.ctx, &principal.member_id, cell_id, input)?;
        Ok(response::created(&ReportView::from(report)))
    }

    /// POST /cells/{id}/split
    fn handle_split(&self, headers: &HeaderMap, cell_id: &str, body: &[u8]) -> HandlerResult {
        let principal = Principal::from_headers(headers)?;
        let input: SplitCellInput = parse_body(body)?;

        let result = self
            .services
            .split
            .split(&principal.ctx, &principal.member_id, cell_id, input)?;
        Ok(response::created(&SplitResultView::from(result)))
    }

    /// GET /cells/{id}/access
    fn handle_access(&self, headers: &HeaderMap, cell_id: &str) -> HandlerResult {
        let principal = Principal::from_headers(headers)?;
        let access = self
            .services
            .access
            .cell_access(&principal.ctx, &principal.member_id, cell_id)?;
        Ok(response::ok(&CellAccessView::from(access)))
    }

    /// PUT /congregations/{id}/principal
    fn handle_principal(&self, headers: &HeaderMap, congregation_id: &str) -> HandlerResult {
        let principal = Principal::from_headers(headers)?;
        let congregation = self.services.organization.set_principal_congregation(
            &principal.ctx,
            &principal.member_id,
            congregation_id,
        )?;
        Ok(response::ok(&CongregationView::from(congregation)))
    }

    /// PUT /networks/{id}/pastor
    fn handle_pastor(&self, headers: &HeaderMap, network_id: &str, body: &[u8]) -> HandlerResult {
        let principal = Principal::from_headers(headers)?;
        let input: AssignPastorInput = if body.is_empty() {
            AssignPastorInput::default()
        } else {
            parse_body(body)?
        };

        let network = self.services.organization.assign_network_pastor(
            &principal.ctx,
            &principal.member_id,
            network_id,
            input,
        )?;
        Ok(response::ok(&NetworkView::from(network)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{Fixture, TEST_MATRIX_ID};
    use hyper::header::HeaderValue;
    use hyper::StatusCode;

    fn server(fx: &Fixture) -> HttpServer {
        let services = Arc::new(Services::new(fx.db.clone()));
        HttpServer::new(services, fx.db.clone(), "127.0.0.1:0".parse().unwrap())
    }

    fn headers(member: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(MEMBER_HEADER, HeaderValue::from_str(member).unwrap());
        headers.insert(MATRIX_HEADER, HeaderValue::from_static(TEST_MATRIX_ID));
        headers
    }

    async fn body_json(resp: Response<Full<Bytes>>) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn seed(fx: &Fixture) {
        fx.all_ministries();
        fx.chain("cong", "net", "disc", "cell", Some(2));
        fx.member("leader", None);
        fx.set_leader("cell", "leader");
        fx.member("a", Some("cell"));
        fx.member("b", Some("cell"));
        fx.member("stranger", None);
    }

    #[test]
    fn test_bool_or_string_flag() {
        #[derive(Deserialize)]
        struct Flagged {
            #[serde(deserialize_with = "bool_or_string")]
            all: bool,
        }

        let from_query: Flagged = serde_urlencoded::from_str("all=true").unwrap();
        assert!(from_query.all);
        let from_json: Flagged = serde_json::from_str(r#"{"all": false}"#).unwrap();
        assert!(!from_json.all);
        let from_json_text: Flagged = serde_json::from_str(r#"{"all": "true"}"#).unwrap();
        assert!(from_json_text.all);
        assert!(serde_urlencoded::from_str::<Flagged>("all=yes").is_err());
    }

    #[tokio::test]
    async fn test_health() {
        let fx = Fixture::new();
        seed(&fx);
        let resp = server(&fx).route(&Method::GET, "/health", None, &HeaderMap::new(), &[]);
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["cells"], 1);
    }

    #[test]
    fn test_missing_principal_is_unauthorized() {
        let fx = Fixture::new();
        seed(&fx);
        let resp = server(&fx).route(&Method::GET, "/cells/cell/access", None, &HeaderMap::new(), &[]);
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_unknown_route_and_wrong_method() {
        let fx = Fixture::new();
        let srv = server(&fx);
        assert_eq!(
            srv.route(&Method::GET, "/nope", None, &headers("a"), &[]).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            srv.route(&Method::DELETE, "/cells/x/split", None, &headers("a"), &[]).status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
    }

    #[tokio::test]
    async fn test_save_then_read_month() {
        let fx = Fixture::new();
        seed(&fx);
        let srv = server(&fx);

        let body = br#"{"date": "2024-06-14", "type": "cell", "presentMemberIds": ["a", "stranger"]}"#;
        let resp = srv.route(&Method::POST, "/cells/cell/reports", None, &headers("leader"), body);
        assert_eq!(resp.status(), StatusCode::CREATED);
        let report = body_json(resp).await;
        assert_eq!(report["date"], "2024-06-14");
        assert_eq!(report["createdAt"], "2024-06-14T03:00:00.000Z");

        let resp = srv.route(
            &Method::GET,
            "/cells/cell/attendance",
            Some("year=2024&month=6"),
            &headers("leader"),
            &[],
        );
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        let dates = json["dates"].as_array().unwrap();
        assert_eq!(dates.len(), 5);
        let friday = dates.iter().find(|d| d["date"] == "2024-06-14").unwrap();
        assert_eq!(friday["isStandardDay"], false);
        assert_eq!(friday["present"].as_array().unwrap().len(), 1);
        assert_eq!(friday["absent"][0]["id"], "b");
    }

    #[test]
    fn test_bad_query_and_body_are_bad_requests() {
        let fx = Fixture::new();
        seed(&fx);
        let srv = server(&fx);

        let resp = srv.route(&Method::GET, "/cells/cell/attendance", Some("year=x"), &headers("leader"), &[]);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = srv.route(
            &Method::GET,
            "/attendance",
            Some("year=2024&month=6&type=mass"),
            &headers("leader"),
            &[],
        );
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = srv.route(&Method::POST, "/cells/cell/split", None, &headers("leader"), b"{not json");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_scope_report_all_flag_as_string() {
        let fx = Fixture::new();
        seed(&fx);
        let srv = server(&fx);

        let resp = srv.route(
            &Method::GET,
            "/attendance",
            Some("year=2024&month=6&all=true"),
            &headers("leader"),
            &[],
        );
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = srv.route(
            &Method::GET,
            "/attendance",
            Some("year=2024&month=6&all=false&congregationId=cong"),
            &headers("leader"),
            &[],
        );
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["cells"].as_array().unwrap().len(), 1);
        assert_eq!(json["allMembers"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_split_route() {
        let fx = Fixture::new();
        seed(&fx);
        fx.member_with("heir", Some("cell"), Some("leader_in_training"), None);
        let srv = server(&fx);

        let body = br#"{"memberIds": ["b", "99"], "newCellName": "Cell II", "newLeaderMemberId": "heir", "oldLeaderMemberId": "leader"}"#;
        let resp = srv.route(&Method::POST, "/cells/cell/split", None, &headers("leader"), body);
        assert_eq!(resp.status(), StatusCode::CREATED);
        let json = body_json(resp).await;
        assert_eq!(json["movedCount"], 1);
        assert_eq!(json["newCell"]["leaderId"], "leader");

        let conflict = br#"{"memberIds": ["99"], "newCellName": "Cell III", "newLeaderMemberId": "heir", "oldLeaderMemberId": "leader"}"#;
        let resp = srv.route(&Method::POST, "/cells/cell/split", None, &headers("heir"), conflict);
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_access_route() {
        let fx = Fixture::new();
        seed(&fx);
        let srv = server(&fx);

        let json = body_json(srv.route(&Method::GET, "/cells/cell/access", None, &headers("leader"), &[])).await;
        assert_eq!(json["canView"], true);
        assert_eq!(json["grant"], "leader");

        let json = body_json(srv.route(&Method::GET, "/cells/cell/access", None, &headers("stranger"), &[])).await;
        assert_eq!(json["canManage"], false);
        assert!(json["grant"].is_null());
    }

    #[tokio::test]
    async fn test_admin_routes() {
        let fx = Fixture::new();
        seed(&fx);
        fx.admin("root");
        fx.network("kids", "cong", true);
        fx.member_with("her", None, None, Some("F"));
        let srv = server(&fx);

        let resp = srv.route(&Method::PUT, "/congregations/cong/principal", None, &headers("leader"), &[]);
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = srv.route(&Method::PUT, "/congregations/cong/principal", None, &headers("root"), &[]);
        assert_eq!(body_json(resp).await["isPrincipal"], true);

        let resp = srv.route(&Method::PUT, "/networks/kids/pastor", None, &headers("root"), br#"{"pastorId": "leader"}"#);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = srv.route(&Method::PUT, "/networks/kids/pastor", None, &headers("root"), br#"{"pastorId": "her"}"#);
        assert_eq!(body_json(resp).await["pastorId"], "her");
    }
}
