//! OpenAPI/Utoipa configuration.

use crate::api::{embed::EMBED_TAG, health::MISC_TAG};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

/// Security addon for OpenAPI documentation.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        let bearer = HttpBuilder::new()
            .scheme(HttpAuthScheme::Bearer)
            .bearer_format("JWT")
            .description(Some(
                "The signed-in user's access token. It is exchanged on-behalf-of the user for the downstream data resource.",
            ))
            .build();
        components.add_security_scheme("Authorization", SecurityScheme::Http(bearer));
    }
}

/// OpenAPI documentation configuration.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Embed Token Broker API",
        version = "1.0.0",
        description = "Issues report embed tokens bound to the signed-in user's downstream identity."
    ),
    tags(
        (name = MISC_TAG, description = "Miscellaneous endpoints"),
        (name = EMBED_TAG, description = "Embed configuration endpoints")
    )
)]
pub struct ApiDoc;
