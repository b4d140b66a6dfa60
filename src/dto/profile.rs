use serde::Deserialize;
use validator::Validate;

/// Profile fields supplied by the presentation layer when saving a user.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProfileInput {
    /// Display name; also checked for being non-blank by the service.
    #[validate(length(min = 1, max = 64, message = "display name must be 1-64 characters"))]
    pub display_name: String,
    /// Avatar image reference; empty means no avatar.
    #[validate(length(max = 512, message = "avatar reference is too long"))]
    pub avatar_url: String,
}
