use serde::{Serialize, Deserialize};
use uuid::Uuid;

/// Header carrying the authenticated user id, set by the auth proxy.
pub const USER_ID_HEADER: &str = "X-User-Id";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub request_id: Uuid,
    pub user_id: Option<Uuid>,
    pub user_fingerprint: String,
    pub ip: String,
}

impl UserInfo {
    pub fn is_user(&self, id: Uuid) -> bool {
        self.user_id == Some(id)
    }
}

pub fn generate_server_fingerprint(ip: &str, user_agent: Option<&str>) -> String {
    use base64::engine::general_purpose::URL_SAFE;
    use base64::Engine;
    use sha2::{Sha256, Digest};

    let mut hasher = Sha256::new();
    hasher.update(ip.as_bytes());
    if let Some(ua) = user_agent {
        hasher.update(ua.as_bytes());
    }
    URL_SAFE.encode(hasher.finalize())
}

/// Parses the user id header; nil and malformed ids count as anonymous.
pub fn parse_user_header(value: Option<&str>) -> Option<Uuid> {
    value
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .filter(|id| !id.is_nil())
}

#[cfg(feature = "backend")]
mod backend_impl {
    use super::*;
    use rocket::request::{FromRequest, Outcome};
    use rocket::Request;

    #[rocket::async_trait]
    impl<'r> FromRequest<'r> for UserInfo {
        type Error = ();

        async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
            let headers = req.headers();
            let ip = headers.get_one("X-Real-IP")
                .or_else(|| headers.get_one("X-Forwarded-For"))
                .map(str::to_string)
                .or_else(|| req.client_ip().map(|ip| ip.to_string()))
                .unwrap_or_else(|| "0.0.0.0".to_string());

            let user_agent = headers.get_one("User-Agent");
            let fingerprint = super::generate_server_fingerprint(&ip, user_agent);

            Outcome::Success(UserInfo {
                request_id: Uuid::new_v4(),
                user_id: parse_user_header(headers.get_one(USER_ID_HEADER)),
                user_fingerprint: fingerprint,
                ip,
            })
        }
    }
}
