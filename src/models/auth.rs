use serde::{Deserialize, Serialize};

/// Roles del sistema.
///
/// `Unknown` conserva el texto recibido del proveedor de identidad; cualquier
/// evaluación de política sobre él falla cerrada.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserRole {
    Admin,
    Operator,
    Technician,
    Unknown(String),
}

impl UserRole {
    pub const KNOWN: [UserRole; 3] = [UserRole::Admin, UserRole::Operator, UserRole::Technician];

    pub fn as_str(&self) -> &str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Operator => "operator",
            UserRole::Technician => "technician",
            UserRole::Unknown(raw) => raw.as_str(),
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.trim() {
            "admin" => UserRole::Admin,
            "operator" => UserRole::Operator,
            "technician" => UserRole::Technician,
            other => UserRole::Unknown(other.to_string()),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, UserRole::Unknown(_))
    }
}

/// Contexto de sesión que el llamador pasa explícitamente a la política
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    pub role: UserRole,
}

impl SessionContext {
    pub fn new(role: &str) -> Self {
        Self {
            role: UserRole::from_str(role),
        }
    }
}

/// Permisos de navegación de un rol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePermission {
    /// Patrones exactos o `prefijo/**`
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Rutas exactas siempre rechazadas
    #[serde(default)]
    pub deny_exceptions: Vec<String>,
    /// Rutas exactas siempre aceptadas
    #[serde(default)]
    pub allow_exceptions: Vec<String>,
    pub default_route: String,
}

impl RoutePermission {
    pub fn new(patterns: &[&str], default_route: &str) -> Self {
        Self {
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            deny_exceptions: Vec::new(),
            allow_exceptions: Vec::new(),
            default_route: default_route.to_string(),
        }
    }

    pub fn deny(mut self, paths: &[&str]) -> Self {
        self.deny_exceptions
            .extend(paths.iter().map(|p| p.to_string()));
        self
    }

    pub fn allow(mut self, paths: &[&str]) -> Self {
        self.allow_exceptions
            .extend(paths.iter().map(|p| p.to_string()));
        self
    }
}

/// Entrada del menú de navegación
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuSection {
    pub key: String,
    pub label: String,
    pub path: String,
}

impl MenuSection {
    pub fn new(key: &str, label: &str, path: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            path: path.to_string(),
        }
    }
}

/// Resultado de un intento de navegación
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationDecision {
    Allow,
    Redirect(String),
}
