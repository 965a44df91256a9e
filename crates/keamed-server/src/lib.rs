//! KeaMed server wiring: configuration, admin authentication and the
//! top-level router.

pub mod auth;
pub mod error;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{Router, middleware};
use keamed_api::{ApiState, LlmSettings};
use keamed_core::{limits::LimitsConfig, quiz::QuizSettings, store::Store};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::{AuthConfig, require_admin};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `KEAMED_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:                  String,
  pub port:                  u16,
  pub store_path:            PathBuf,
  pub admin_username:        String,
  pub admin_password_hash:   String,
  /// Label untagged questions once before serving.
  #[serde(default)]
  pub auto_label_on_startup: bool,
  /// Tier limits; each tier table must list every resource, a missing one
  /// is unlimited.
  #[serde(default)]
  pub limits:                LimitsConfig,
  #[serde(default)]
  pub quiz:                  QuizSettings,
  /// Case generation serves the template case when absent.
  #[serde(default)]
  pub llm:                   Option<LlmSettings>,
}

impl ServerConfig {
  pub fn auth(&self) -> AuthConfig {
    AuthConfig {
      username:      self.admin_username.clone(),
      password_hash: self.admin_password_hash.clone(),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Mount the user API under `/api` and the Basic-auth protected admin API
/// under `/api/admin`.
pub fn router<S>(state: Arc<ApiState<S>>, auth: AuthConfig) -> Router
where
  S: Store + 'static,
{
  let admin = keamed_api::admin_router(Arc::clone(&state))
    .layer(middleware::from_fn_with_state(Arc::new(auth), require_admin));

  Router::new()
    .nest("/api/admin", admin)
    .nest("/api", keamed_api::api_router(state))
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use super::*;
  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
  use keamed_api::CaseGenerator;
  use keamed_core::limits::LimitsHandle;
  use keamed_store_sqlite::SqliteStore;
  use rand_core::OsRng;
  use tower::ServiceExt as _;

  async fn make_app(password: &str) -> Router {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();
    let state = Arc::new(ApiState::new(
      Arc::new(store),
      LimitsHandle::default(),
      QuizSettings::default(),
      CaseGenerator::template_only(),
    ));
    router(state, AuthConfig { username: "admin".to_string(), password_hash: hash })
  }

  async fn get(app: Router, uri: &str, auth: Option<(&str, &str)>) -> StatusCode {
    let mut builder = Request::builder().uri(uri);
    if let Some((user, pass)) = auth {
      builder = builder.header(
        header::AUTHORIZATION,
        format!("Basic {}", B64.encode(format!("{user}:{pass}"))),
      );
    }
    let req = builder.body(Body::empty()).unwrap();
    app.oneshot(req).await.unwrap().status()
  }

  #[tokio::test]
  async fn admin_routes_require_credentials() {
    let app = make_app("secret").await;
    assert_eq!(get(app.clone(), "/api/admin/limits", None).await, StatusCode::UNAUTHORIZED);
    assert_eq!(
      get(app.clone(), "/api/admin/limits", Some(("admin", "nope"))).await,
      StatusCode::UNAUTHORIZED
    );
    assert_eq!(
      get(app, "/api/admin/limits", Some(("admin", "secret"))).await,
      StatusCode::OK
    );
  }

  #[tokio::test]
  async fn user_routes_are_open() {
    let app = make_app("secret").await;
    assert_eq!(get(app, "/api/users/u1/gap-profile", None).await, StatusCode::OK);
  }

  #[test]
  fn config_defaults() {
    let cfg: ServerConfig = serde_json::from_value(serde_json::json!({
      "host": "127.0.0.1",
      "port": 8080,
      "store_path": "~/keamed.db",
      "admin_username": "admin",
      "admin_password_hash": "$argon2id$...",
    }))
    .unwrap();
    assert!(!cfg.auto_label_on_startup);
    assert_eq!(cfg.limits, LimitsConfig::default());
    assert_eq!(cfg.quiz.max_count, 50);
    assert!(cfg.llm.is_none());
  }
}
