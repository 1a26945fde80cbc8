use std::{ops::Deref, sync::Arc};

use anyhow::Result;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use sqlx::MySqlPool;
use tracing::info;

use shib_connect::saml::{SAMLEngine, ShibbolethSp};
use shib_slo::errors;
use shib_storage::{IdentityImpl, IdentityStore};

use crate::{
    services::saml::{LoginHook, TracingLoginHook},
    AppConfig,
};

pub struct App {
    pub config: AppConfig,
    pub store: Box<dyn IdentityStore>,
    pub engine: Box<dyn SAMLEngine>,
    pub login: Box<dyn LoginHook>,
}

impl App {
    pub fn new(pool: MySqlPool, config: AppConfig) -> Result<Self> {
        info!("initializing identity services...");
        let unique_identifier_field =
            config.reconciliation.unique_identifier_field().to_owned();

        let store = IdentityImpl::new(pool, unique_identifier_field.clone());
        let engine = ShibbolethSp::new(config.sp.clone());
        let login = TracingLoginHook::new(unique_identifier_field);

        info!("identity services successfully initialized!");
        Ok(Self::with_services(
            config,
            Box::new(store),
            Box::new(engine),
            Box::new(login),
        ))
    }

    pub fn with_services(
        config: AppConfig,
        store: Box<dyn IdentityStore>,
        engine: Box<dyn SAMLEngine>,
        login: Box<dyn LoginHook>,
    ) -> Self {
        Self {
            config,
            store,
            engine,
            login,
        }
    }
}

#[derive(Clone)]
pub struct AppState(pub Arc<App>);

// deref so you can still access the inner fields easily
impl Deref for AppState {
    type Target = App;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for AppState
where
    Self: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = errors::WithBacktrace;
    async fn from_request_parts(
        _: &mut Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self::from_ref(state))
    }
}
