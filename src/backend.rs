//! Backend collaborators
//!
//! Wire shapes for configuration, session start and session finish, plus the
//! synchronous `Backend` trait used by native runs and tests. The web host
//! performs the same calls with fetch and hands results back by ticket.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::RemoteConfig;
use crate::error::BackendError;
use crate::tiers::TierTable;

/// Placeholder session id prefix
pub const PLACEHOLDER_PREFIX: &str = "temp-";
/// Client-synthesized discount code prefix
pub const FALLBACK_PREFIX: &str = "OFFLINE";

const FALLBACK_SUFFIX_LEN: usize = 6;
const PLACEHOLDER_SUFFIX_LEN: usize = 9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub shop_id: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub referrer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionResponse {
    pub session_id: String,
}

/// Per-session stats sent on finish and to `on_game_end`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameData {
    /// Seconds of play
    pub duration: f64,
    pub objects_collected: u32,
    pub obstacles_hit: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishSessionRequest {
    pub session_id: String,
    pub final_score: u64,
    pub game_data: GameData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FinishSessionResponse {
    pub discount_code: Option<String>,
}

/// Identifies which controller generation issued a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub generation: u64,
}

/// A collaborator call the host should perform
#[derive(Debug, Clone, PartialEq)]
pub enum BackendRequest {
    FetchConfig {
        ticket: Ticket,
        shop_id: String,
    },
    StartSession {
        ticket: Ticket,
        body: StartSessionRequest,
    },
    FinishSession {
        ticket: Ticket,
        body: FinishSessionRequest,
    },
}

impl BackendRequest {
    pub fn ticket(&self) -> Ticket {
        match self {
            BackendRequest::FetchConfig { ticket, .. }
            | BackendRequest::StartSession { ticket, .. }
            | BackendRequest::FinishSession { ticket, .. } => *ticket,
        }
    }

    /// HTTP method and path relative to the API base
    pub fn route(&self) -> (&'static str, String) {
        match self {
            BackendRequest::FetchConfig { shop_id, .. } => {
                ("GET", format!("/games/config/{}", shop_id))
            }
            BackendRequest::StartSession { .. } => ("POST", "/games/sessions/start".to_string()),
            BackendRequest::FinishSession { .. } => ("POST", "/games/sessions/finish".to_string()),
        }
    }

    /// JSON request body, if the call has one
    pub fn body_json(&self) -> Result<Option<String>, BackendError> {
        let body = match self {
            BackendRequest::FetchConfig { .. } => None,
            BackendRequest::StartSession { body, .. } => Some(serde_json::to_string(body)?),
            BackendRequest::FinishSession { body, .. } => Some(serde_json::to_string(body)?),
        };
        Ok(body)
    }
}

/// Synchronous collaborator access
pub trait Backend {
    fn get_configuration(&mut self, shop_id: &str) -> Result<RemoteConfig, BackendError>;
    fn start_session(
        &mut self,
        request: &StartSessionRequest,
    ) -> Result<StartSessionResponse, BackendError>;
    fn finish_session(
        &mut self,
        request: &FinishSessionRequest,
    ) -> Result<FinishSessionResponse, BackendError>;
}

/// Backend that is never reachable
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineBackend;

impl Backend for OfflineBackend {
    fn get_configuration(&mut self, _shop_id: &str) -> Result<RemoteConfig, BackendError> {
        Err(BackendError::Unavailable)
    }

    fn start_session(
        &mut self,
        _request: &StartSessionRequest,
    ) -> Result<StartSessionResponse, BackendError> {
        Err(BackendError::Unavailable)
    }

    fn finish_session(
        &mut self,
        _request: &FinishSessionRequest,
    ) -> Result<FinishSessionResponse, BackendError> {
        Err(BackendError::Unavailable)
    }
}

/// In-process backend that issues ids and codes itself
#[derive(Debug, Clone, Default)]
pub struct LocalBackend {
    pub config: RemoteConfig,
    /// Tiers used to decide the issued discount
    pub tiers: TierTable,
    next_session: u64,
    /// Every finish request received, in order
    pub finished: Vec<FinishSessionRequest>,
}

impl LocalBackend {
    pub fn new(config: RemoteConfig) -> Self {
        let tiers = config
            .discount_tiers
            .clone()
            .and_then(|t| TierTable::new(t).ok())
            .unwrap_or_default();
        Self {
            config,
            tiers,
            next_session: 1,
            finished: Vec::new(),
        }
    }
}

impl Backend for LocalBackend {
    fn get_configuration(&mut self, _shop_id: &str) -> Result<RemoteConfig, BackendError> {
        Ok(self.config.clone())
    }

    fn start_session(
        &mut self,
        request: &StartSessionRequest,
    ) -> Result<StartSessionResponse, BackendError> {
        let session_id = format!("local-{}-{}", request.shop_id, self.next_session);
        self.next_session += 1;
        Ok(StartSessionResponse { session_id })
    }

    fn finish_session(
        &mut self,
        request: &FinishSessionRequest,
    ) -> Result<FinishSessionResponse, BackendError> {
        self.finished.push(request.clone());
        let percent = self.tiers.discount_for(request.final_score);
        let discount_code = (percent > 0)
            .then(|| format!("SAVE{}-{}", percent, request.session_id.to_uppercase()));
        Ok(FinishSessionResponse { discount_code })
    }
}

fn random_chars<R: Rng>(rng: &mut R, alphabet: &[u8], len: usize) -> String {
    (0..len)
        .map(|_| alphabet[rng.random_range(0..alphabet.len())] as char)
        .collect()
}

/// Local session id used when session start fails: `temp-{ms}-{9 × [a-z0-9]}`
pub fn placeholder_session_id<R: Rng>(now_ms: f64, rng: &mut R) -> String {
    let ms = if now_ms.is_finite() && now_ms > 0.0 {
        now_ms as u64
    } else {
        0
    };
    format!(
        "{}{}-{}",
        PLACEHOLDER_PREFIX,
        ms,
        random_chars(rng, b"abcdefghijklmnopqrstuvwxyz0123456789", PLACEHOLDER_SUFFIX_LEN)
    )
}

pub fn is_placeholder_id(id: &str) -> bool {
    id.starts_with(PLACEHOLDER_PREFIX)
}

/// Client-synthesized code used when session finish fails:
/// `OFFLINE{percent}-{6 × [A-Z0-9]}`. Never validated by the backend.
pub fn fallback_discount_code<R: Rng>(percent: u32, rng: &mut R) -> String {
    format!(
        "{}{}-{}",
        FALLBACK_PREFIX,
        percent,
        random_chars(rng, b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789", FALLBACK_SUFFIX_LEN)
    )
}

/// True if `code` has the fallback code shape
pub fn is_fallback_code(code: &str) -> bool {
    let Some(rest) = code.strip_prefix(FALLBACK_PREFIX) else {
        return false;
    };
    let Some((percent, suffix)) = rest.split_once('-') else {
        return false;
    };
    !percent.is_empty()
        && percent.chars().all(|c| c.is_ascii_digit())
        && suffix.len() == FALLBACK_SUFFIX_LEN
        && suffix
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_placeholder_shape() {
        let mut rng = Pcg32::seed_from_u64(1);
        let id = placeholder_session_id(1_700_000_000_123.0, &mut rng);
        assert!(id.starts_with("temp-1700000000123-"));
        let suffix = id.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 9);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert!(is_placeholder_id(&id));
    }

    #[test]
    fn test_fallback_code_shape() {
        let mut rng = Pcg32::seed_from_u64(2);
        let code = fallback_discount_code(15, &mut rng);
        assert!(code.starts_with("OFFLINE15-"));
        assert!(is_fallback_code(&code));
        assert!(!is_fallback_code("SAVE15-ABCDEF"));
        assert!(!is_fallback_code("OFFLINE15-abc"));
    }

    #[test]
    fn test_wire_shapes_are_camel_case() {
        let body = FinishSessionRequest {
            session_id: "s1".into(),
            final_score: 500,
            game_data: GameData {
                duration: 12.5,
                objects_collected: 3,
                obstacles_hit: 1,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["sessionId"], "s1");
        assert_eq!(json["finalScore"], 500);
        assert_eq!(json["gameData"]["objectsCollected"], 3);

        let empty: FinishSessionResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.discount_code, None);
    }

    #[test]
    fn test_local_backend_issues_codes_by_tier() {
        let mut backend = LocalBackend::new(RemoteConfig::default());
        let start = backend
            .start_session(&StartSessionRequest {
                shop_id: "shop".into(),
                source: "test".into(),
                referrer: None,
            })
            .unwrap();
        let finish = |score| FinishSessionRequest {
            session_id: start.session_id.clone(),
            final_score: score,
            game_data: GameData::default(),
        };
        assert_eq!(backend.finish_session(&finish(10)).unwrap().discount_code, None);
        let code = backend.finish_session(&finish(600)).unwrap().discount_code.unwrap();
        assert!(code.starts_with("SAVE15-"));
        assert_eq!(backend.finished.len(), 2);
    }

    #[test]
    fn test_routes() {
        let req = BackendRequest::FetchConfig {
            ticket: Ticket { generation: 0 },
            shop_id: "abc".into(),
        };
        assert_eq!(req.route(), ("GET", "/games/config/abc".to_string()));
        assert_eq!(req.body_json().unwrap(), None);
    }
}
