use utoipa::Modify;
use utoipa::OpenApi;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

use crate::common::media::MediaType;
use crate::modules::content::dto::{
    CommitUploadRequest, CreateContentRequest, UploadGrantRequest, UploadGrantResponse,
};
use crate::modules::content::model::{ContentRecord, MediaStatus};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::content::handler::create_content,
        crate::modules::content::handler::get_content,
        crate::modules::content::handler::issue_upload_grant,
        crate::modules::content::handler::commit_upload,
        crate::modules::content::handler::retry_transcode,
    ),
    components(
        schemas(
            ContentRecord, MediaType, MediaStatus,
            CreateContentRequest, UploadGrantRequest, UploadGrantResponse, CommitUploadRequest,
        )
    ),
    tags(
        (name = "Content", description = "Media upload and transcoding")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}
