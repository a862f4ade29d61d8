use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(description = "File storage API", license(name = "MIT or Apache2", identifier="MIT Apache2.0"), title = "filedrop", version = env!("CARGO_PKG_VERSION")),
    paths(
        crate::files::get_files,
        crate::files::post_files,
        crate::files::delete_files,
        crate::files::get_file_content,
        crate::files::delete_file,
        crate::files::get_file_by_id,
        crate::files::delete_file_by_id
    )
)]
pub struct ApiDoc;

pub(crate) fn api_route<T: Clone + Sync + Send + 'static>() -> Router<T> {
    let doc = ApiDoc::openapi();
    Router::new().merge(SwaggerUi::new("/api/v1/swagger-ui").url("/api/v1/openapi.json", doc))
}
