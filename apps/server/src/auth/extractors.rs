use actix_web::{dev::Payload, FromRequest, HttpRequest};
use std::future::{ready, Ready};

use crate::error::AppError;

/// Header carrying the authenticated user id
pub const USER_ID_HEADER: &str = "X-User-Id";

const MAX_USER_ID_LEN: usize = 255;

/// Extractor for the authenticated caller
///
/// Usage in handlers:
/// ```ignore
/// async fn my_handler(caller: CallerIdentity) -> HttpResponse {
///     // caller.user_id is the owner used for quota and job access
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: String,
}

impl CallerIdentity {
    fn from_header(value: Option<&str>) -> Result<Self, AppError> {
        let user_id = value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                AppError::Unauthorized(format!("Missing {} header", USER_ID_HEADER))
            })?;

        if user_id.len() > MAX_USER_ID_LEN {
            return Err(AppError::Unauthorized(format!(
                "{} header is too long",
                USER_ID_HEADER
            )));
        }

        Ok(Self {
            user_id: user_id.to_string(),
        })
    }
}

impl FromRequest for CallerIdentity {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let header = req
            .headers()
            .get(USER_ID_HEADER)
            .and_then(|h| h.to_str().ok());

        ready(Self::from_header(header))
    }
}
