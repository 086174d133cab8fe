use crate::error::ApiError;
use rustrict::CensorStr;
use shared::UserInfo;
use uuid::Uuid;

pub fn parse_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::InvalidId)
}

pub fn require_user(user_info: &UserInfo) -> Result<Uuid, ApiError> {
    user_info.user_id.ok_or(ApiError::Unauthorized)
}

/// Rejects requests acting on another user's account.
pub fn require_self(user_info: &UserInfo, id: Uuid) -> Result<(), ApiError> {
    let caller = require_user(user_info)?;
    if caller != id {
        return Err(ApiError::Forbidden("You can only manage your own account"));
    }
    Ok(())
}

pub fn screen_text(field: &str, text: &str) -> Result<(), ApiError> {
    if text.is_inappropriate() {
        return Err(ApiError::InvalidInput(format!("Possible profanity detected in {field}")));
    }
    Ok(())
}
