use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::config::AppConfig;
use crate::handlers;
use crate::state::AppState;

pub fn routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::health::health))
        .merge(auth_routes())
        .merge(image_routes())
        .merge(upload_routes(config))
}

fn auth_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::auth::register))
        .routes(routes!(handlers::auth::login))
        .routes(routes!(handlers::auth::me))
}

fn image_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::image::list_images))
        .routes(routes!(handlers::image::list_favorites))
        .routes(routes!(handlers::image::list_archived))
        .routes(routes!(handlers::image::list_trash))
        .routes(routes!(handlers::image::search_images))
        .routes(routes!(handlers::image::image_stats))
        .routes(routes!(
            handlers::image::get_image,
            handlers::image::trash_image
        ))
        .routes(routes!(handlers::image::download_image))
        .routes(routes!(handlers::image::get_thumbnail))
        .routes(routes!(handlers::image::toggle_favorite))
        .routes(routes!(handlers::image::toggle_archive))
        .routes(routes!(handlers::image::restore_image))
        .routes(routes!(handlers::image::delete_image_permanently))
}

fn upload_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::image::upload_image))
        .routes(routes!(handlers::image::upload_images))
        .layer(handlers::image::upload_body_limit(
            config.storage.max_request_size,
        ))
}
