use axum::routing::get;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::config::AppConfig;
use crate::handlers;
use crate::state::AppState;

pub fn routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .merge(entry_routes(config))
        .merge(evidence_routes(config))
        .merge(review_routes())
        // Signed links carry their own credential and stay out of the API docs.
        .route("/files/{*path}", get(handlers::files::download))
}

fn entry_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    let crud = OpenApiRouter::new()
        .routes(routes!(
            handlers::entry::upsert_entry,
            handlers::entry::list_entries
        ))
        .routes(routes!(handlers::entry::save_draft))
        .routes(routes!(handlers::entry::lookup_entry))
        .routes(routes!(
            handlers::entry::get_entry,
            handlers::entry::delete_draft
        ))
        .routes(routes!(handlers::entry::resubmit_entry));

    let submit = OpenApiRouter::new()
        .routes(routes!(handlers::entry::submit_entry))
        .layer(handlers::entry::submit_body_limit(
            config.storage.max_object_size,
        ));

    crud.merge(submit)
}

fn evidence_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    let crud = OpenApiRouter::new()
        .routes(routes!(handlers::evidence::delete_evidence))
        .routes(routes!(handlers::evidence::evidence_url))
        .routes(routes!(handlers::evidence::assign_group))
        .routes(routes!(handlers::evidence::list_groups))
        .routes(routes!(handlers::evidence::group_records))
        .routes(routes!(handlers::evidence::ungroup));

    let upload = OpenApiRouter::new()
        .routes(routes!(
            handlers::evidence::list_evidence,
            handlers::evidence::upload_evidence
        ))
        .layer(handlers::evidence::evidence_upload_body_limit(
            config.storage.max_object_size,
        ));

    crud.merge(upload)
}

fn review_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::review::list_pending))
        .routes(routes!(handlers::review::list_reviewed))
        .routes(routes!(handlers::review::pending_owners))
        .routes(routes!(handlers::review::bulk_review))
        .routes(routes!(handlers::review::review_entry))
}
