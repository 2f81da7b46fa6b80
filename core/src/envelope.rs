use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Action names understood by the bridge server.
pub mod actions {
    pub const ADMIN_LOGIN: &str = "admin_login";
    pub const ADMIN_LOGOUT: &str = "admin_logout";
    pub const GET_FIRST_ADMIN_ID: &str = "get_first_admin_id";
    pub const LIST_WORKERS: &str = "list_workers";
    pub const CREATE_WORKER: &str = "create_worker";
    pub const UPDATE_WORKER: &str = "update_worker";
    pub const DELETE_WORKER: &str = "delete_worker";
}

/// Structured failure classification carried on every failed response.
///
/// Clients branch on this field, never on the human-readable `error` text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    BadRequest,
    Unauthorized,
    NotFound,
    Conflict,
}

/// A client-originated request. `id` is chosen by the requester and is
/// echoed back on the matching response; correlation is by id only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub action: String,
    #[serde(default)]
    pub body: Value,
}

/// The server's answer to exactly one [`Request`] on the same connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    pub ok: bool,
    pub body: Option<Value>,
    pub error: Option<String>,
    #[serde(default)]
    pub code: Option<ErrorCode>,
}

impl Response {
    pub fn success(id: u64, body: Option<Value>) -> Self {
        Self {
            id,
            ok: true,
            body,
            error: None,
            code: None,
        }
    }

    pub fn failure(id: u64, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            id,
            ok: false,
            body: None,
            error: Some(message.into()),
            code: Some(code),
        }
    }
}

/// Unsolicited push sent to every connected client when a badge is read.
///
/// The register controller attaches extra fields (`source`, timestamps);
/// deserialization tolerates and ignores them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardRead {
    pub uid: String,
}

/// One line on the wire, discriminated by the `type` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Envelope {
    #[serde(rename = "request")]
    Request(Request),
    #[serde(rename = "response")]
    Response(Response),
    #[serde(rename = "card_read")]
    CardRead(CardRead),
}

impl Envelope {
    /// Parses one wire line. Returns `None` for anything that is not a
    /// well-formed envelope (invalid JSON, non-object, missing or unknown
    /// `type`); such lines are dropped and the stream resumes at the next
    /// newline.
    pub fn parse_line(line: &str) -> Option<Envelope> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        serde_json::from_str(line).ok()
    }

    /// Serializes the envelope as a single line, without the trailing LF.
    pub fn to_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminLoginBody {
    pub password: String,
}

/// Body of a successful `admin_login` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResult {
    pub token: String,
    pub admin_id: i64,
}

/// Body of a successful `get_first_admin_id` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminIdResult {
    pub admin_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorkerBody {
    pub admin_id: i64,
    pub name: String,
    pub card_uid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateWorkerBody {
    pub worker_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_uid: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteWorkerBody {
    pub worker_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_request_line() {
        let line = r#"{"type":"request","id":7,"action":"list_workers","body":{}}"#;
        match Envelope::parse_line(line) {
            Some(Envelope::Request(req)) => {
                assert_eq!(req.id, 7);
                assert_eq!(req.action, actions::LIST_WORKERS);
            }
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn request_body_defaults_to_null_when_missing() {
        let line = r#"{"type":"request","id":1,"action":"list_workers"}"#;
        match Envelope::parse_line(line) {
            Some(Envelope::Request(req)) => assert!(req.body.is_null()),
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn parses_failed_response_with_code() {
        let line = r#"{"type":"response","id":3,"ok":false,"body":null,"error":"Worker not found","code":"not_found"}"#;
        match Envelope::parse_line(line) {
            Some(Envelope::Response(resp)) => {
                assert!(!resp.ok);
                assert_eq!(resp.code, Some(ErrorCode::NotFound));
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn response_without_code_field_still_parses() {
        // Success responses omit the code; older peers may omit it entirely.
        let line = r#"{"type":"response","id":3,"ok":true,"body":[],"error":null}"#;
        match Envelope::parse_line(line) {
            Some(Envelope::Response(resp)) => {
                assert!(resp.ok);
                assert_eq!(resp.code, None);
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn card_read_tolerates_extra_fields() {
        let line = r#"{"type":"card_read","uid":"AB12CD34","source":"register_controller","ts":123}"#;
        match Envelope::parse_line(line) {
            Some(Envelope::CardRead(ev)) => assert_eq!(ev.uid, "AB12CD34"),
            other => panic!("expected card_read, got {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(Envelope::parse_line("").is_none());
        assert!(Envelope::parse_line("   ").is_none());
        assert!(Envelope::parse_line("not json").is_none());
        assert!(Envelope::parse_line("[1,2,3]").is_none());
        assert!(Envelope::parse_line(r#"{"id":1}"#).is_none());
        assert!(Envelope::parse_line(r#"{"type":"telemetry","rssi":-40}"#).is_none());
    }

    #[test]
    fn response_helpers_round_trip() {
        let ok = Response::success(9, Some(json!({"admin_id": 1})));
        let line = Envelope::Response(ok).to_line().unwrap();
        assert!(line.contains("\"ok\":true"));

        let err = Response::failure(9, ErrorCode::Conflict, "duplicate card uid");
        let line = Envelope::Response(err).to_line().unwrap();
        let parsed = Envelope::parse_line(&line).unwrap();
        match parsed {
            Envelope::Response(resp) => {
                assert_eq!(resp.code, Some(ErrorCode::Conflict));
                assert_eq!(resp.error.as_deref(), Some("duplicate card uid"));
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn update_body_skips_absent_fields() {
        let body = UpdateWorkerBody {
            worker_id: 4,
            name: None,
            card_uid: Some("FF00".into()),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("name").is_none());
        assert_eq!(value["card_uid"], "FF00");
    }
}
