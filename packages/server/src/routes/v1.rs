use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::config::AppConfig;
use crate::handlers;
use crate::state::AppState;

pub fn routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest("/files", file_routes(config))
}

fn file_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            handlers::files::upload_file,
            handlers::files::list_files
        ))
        .routes(routes!(handlers::files::storage_stats))
        .routes(routes!(handlers::files::file_types))
        .routes(routes!(
            handlers::files::get_file,
            handlers::files::delete_file
        ))
        .routes(routes!(handlers::files::download_file))
        .layer(handlers::files::upload_body_limit(
            config.storage.max_upload_size,
        ))
}
