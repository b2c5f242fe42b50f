pub mod activity;
pub mod app_state;
pub mod auth;
pub mod comments;
pub mod config;
pub mod conflict;
pub mod db;
pub mod error;
pub mod events;
pub mod membership;
pub mod memos;
pub mod models;
pub mod notifications;
pub mod tasks;
pub mod teams;
pub mod users;

use actix_web::web;

/// Full route table, shared between `main` and the integration tests.
/// Everything except `/auth` requires a bearer token; the `Authentication`
/// middleware attaches the identity, handlers fail closed without one.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/signup", web::post().to(auth::signup))
            .route("/login", web::post().to(auth::login)),
    )
    .service(
        web::scope("/users")
            // Fixed segment must register before the `{id}` catch-all.
            .route("/plan", web::get().to(users::get_plan))
            .route("/plan", web::patch().to(users::update_plan))
            .route("/{id}", web::get().to(users::get_user))
            .route("/{id}", web::put().to(users::update_user)),
    )
    .service(
        web::scope("/teams")
            .route("", web::get().to(teams::get_user_teams))
            .route("", web::post().to(teams::create_team))
            .route("/join-by-code", web::post().to(teams::join_by_code))
            .service(
                web::scope("/{custom_url}")
                    .route("", web::get().to(teams::get_team))
                    .route("", web::put().to(teams::update_team))
                    .route("", web::delete().to(teams::delete_team))
                    .route("/invite", web::post().to(teams::create_invite))
                    .route("/activity", web::get().to(activity::list_activity))
                    .service(
                        web::scope("/members")
                            .route("", web::get().to(teams::get_team_members))
                            .route("/{user_id}", web::delete().to(teams::remove_team_member)),
                    )
                    .service(
                        web::scope("/join-requests")
                            .route("", web::get().to(teams::list_join_requests))
                            .route("/{id}/approve", web::put().to(teams::approve_join_request))
                            .route("/{id}/reject", web::put().to(teams::reject_join_request)),
                    )
                    .service(
                        web::scope("/tasks")
                            .route("", web::get().to(tasks::list_tasks))
                            .route("", web::post().to(tasks::create_task))
                            .route("/{id}", web::put().to(tasks::update_task))
                            .route("/{id}", web::delete().to(tasks::delete_task)),
                    )
                    .service(
                        web::scope("/memos")
                            .route("", web::get().to(memos::list_memos))
                            .route("", web::post().to(memos::create_memo))
                            .route("/{id}", web::put().to(memos::update_memo))
                            .route("/{id}", web::delete().to(memos::delete_memo)),
                    ),
            ),
    )
    .service(
        web::scope("/comments")
            .route("", web::get().to(comments::list_comments))
            .route("", web::post().to(comments::create_comment))
            .route("/{id}", web::put().to(comments::update_comment))
            .route("/{id}", web::delete().to(comments::delete_comment)),
    )
    .service(
        web::scope("/notifications")
            .route("", web::get().to(notifications::list_notifications))
            .route("/mark-all-read", web::put().to(notifications::mark_all_read))
            .route("/{id}/read", web::put().to(notifications::mark_read)),
    );
}
