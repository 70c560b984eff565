//! Cliente HTTP para el backend de intervenciones
//!
//! Este módulo contiene el trait `InterventionStore`, el contrato que consume
//! el núcleo, y su implementación REST sobre `reqwest`.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::config::EnvironmentConfig;
use crate::models::{Intervention, InterventionPage, InterventionQuery, Technician};
use crate::utils::errors::{not_found_error, AppError, AppResult};

/// Almacén remoto de intervenciones (recurso REST opaco, sin versionado)
#[async_trait]
pub trait InterventionStore: Send + Sync {
    /// `GET /interventions/{id}`
    async fn fetch_intervention(&self, id: i64) -> AppResult<Intervention>;

    /// `PUT /interventions/{id}` con el registro completo
    async fn write_intervention(&self, record: &Intervention) -> AppResult<()>;

    /// `GET /interventions?from_date&to_date&page&skip`
    async fn list_interventions(&self, query: InterventionQuery) -> AppResult<InterventionPage>;

    /// `GET /users?role_id&query`
    async fn search_technicians(&self, role_id: i64, query: &str) -> AppResult<Vec<Technician>>;
}

/// Dirección de la llamada, decide el tipo de error para fallos genéricos
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallDirection {
    Read,
    Write,
}

/// Respuesta de búsqueda de técnicos: lista directa o paginada
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TechnicianSearchResponse {
    List(Vec<Technician>),
    Page { data: Vec<Technician> },
}

impl TechnicianSearchResponse {
    fn into_vec(self) -> Vec<Technician> {
        match self {
            TechnicianSearchResponse::List(list) => list,
            TechnicianSearchResponse::Page { data } => data,
        }
    }
}

/// Cliente HTTP para la API REST de intervenciones
#[derive(Clone)]
pub struct InterventionApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl InterventionApiClient {
    /// Crear nuevo cliente HTTP con URL configurable
    pub fn new(base_url: &str, token: Option<String>, timeout: std::time::Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Error creando cliente HTTP: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn from_config(config: &EnvironmentConfig) -> AppResult<Self> {
        Self::new(&config.api_base_url, config.api_token.clone(), config.http_timeout)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("Accept", "application/json");
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub fn intervention_url(&self, id: i64) -> String {
        format!("{}/interventions/{}", self.base_url, id)
    }

    pub fn list_url(&self, query: &InterventionQuery) -> String {
        let mut params = Vec::new();
        if let Some(from) = query.from_date {
            params.push(format!("from_date={}", from.format("%Y-%m-%d")));
        }
        if let Some(to) = query.to_date {
            params.push(format!("to_date={}", to.format("%Y-%m-%d")));
        }
        params.push(format!("page={}", query.page));
        params.push(format!("skip={}", query.skip));
        format!("{}/interventions?{}", self.base_url, params.join("&"))
    }

    pub fn technician_search_url(&self, role_id: i64, query: &str) -> String {
        format!(
            "{}/users?role_id={}&query={}",
            self.base_url,
            role_id,
            urlencoding::encode(query.trim())
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, context: &str) -> AppResult<T> {
        debug!("🌐 GET {}", url);
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|e| AppError::Fetch(format!("{}: error de red: {}", context, e)))?;

        let status = response.status();
        debug!("📡 Response status: {}", status);
        if let Some(err) = status_error(status, CallDirection::Read, context) {
            return Err(err);
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::Fetch(format!("{}: respuesta ilegible: {}", context, e)))
    }
}

/// Traduce un status HTTP a la taxonomía de errores; `None` si es éxito
pub fn status_error(status: StatusCode, direction: CallDirection, context: &str) -> Option<AppError> {
    if status.is_success() {
        return None;
    }

    let err = match status {
        StatusCode::UNAUTHORIZED => {
            warn!("🔒 401 en {}: sesión caducada", context);
            AppError::Unauthorized(format!("{}: HTTP 401", context))
        }
        StatusCode::NOT_FOUND if direction == CallDirection::Read => {
            AppError::NotFound(format!("{}: HTTP 404", context))
        }
        _ => {
            error!("❌ {} falló con status {}", context, status);
            match direction {
                CallDirection::Read => AppError::Fetch(format!("{}: HTTP {}", context, status)),
                CallDirection::Write => AppError::Write(format!("{}: HTTP {}", context, status)),
            }
        }
    };
    Some(err)
}

#[async_trait]
impl InterventionStore for InterventionApiClient {
    async fn fetch_intervention(&self, id: i64) -> AppResult<Intervention> {
        let url = self.intervention_url(id);
        let raw = match self.get_json::<serde_json::Value>(&url, "GET /interventions").await {
            Err(AppError::NotFound(_)) => return Err(not_found_error("intervention", &id.to_string())),
            other => other?,
        };
        Intervention::from_wire(raw)
            .map_err(|e| AppError::Fetch(format!("GET /interventions: registro ilegible: {}", e)))
    }

    async fn write_intervention(&self, record: &Intervention) -> AppResult<()> {
        let url = self.intervention_url(record.id);
        debug!("🌐 PUT {}", url);

        let body = record
            .to_wire()
            .map_err(|e| AppError::Write(format!("PUT /interventions: cuerpo no serializable: {}", e)))?;
        let response = self
            .authorize(self.client.put(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Write(format!("PUT /interventions: error de red: {}", e)))?;

        if let Some(err) = status_error(response.status(), CallDirection::Write, "PUT /interventions") {
            return Err(err);
        }

        info!("💾 Intervención {} escrita", record.id);
        Ok(())
    }

    async fn list_interventions(&self, query: InterventionQuery) -> AppResult<InterventionPage> {
        let url = self.list_url(&query);
        self.get_json::<InterventionPage>(&url, "GET /interventions (listado)").await
    }

    async fn search_technicians(&self, role_id: i64, query: &str) -> AppResult<Vec<Technician>> {
        let url = self.technician_search_url(role_id, query);
        let response: TechnicianSearchResponse = self.get_json(&url, "GET /users").await?;
        Ok(response.into_vec())
    }
}
