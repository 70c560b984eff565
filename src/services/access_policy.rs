//! Política de acceso por rol
//!
//! Cada rol tiene una lista de patrones de ruta (exactos o `prefijo/**`),
//! excepciones de rechazo, excepciones de aceptación y una ruta de aterrizaje.
//! El rol llega siempre como parámetro; la política no lee estado global.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::models::{MenuSection, NavigationDecision, RoutePermission, UserRole};
use crate::utils::errors::{config_error, not_found_error, validation_error, AppResult};

pub const LOGIN_ROUTE: &str = "/login";

/// Formato del fichero de política
#[derive(Debug, Deserialize)]
struct PolicyFile {
    roles: HashMap<String, RoutePermission>,
    #[serde(default)]
    menu: Option<Vec<MenuSection>>,
}

#[derive(Debug, Clone)]
pub struct AccessPolicy {
    permissions: HashMap<UserRole, RoutePermission>,
    menu: Vec<MenuSection>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::builtin()
    }
}

impl AccessPolicy {
    pub fn new(permissions: HashMap<UserRole, RoutePermission>, menu: Vec<MenuSection>) -> Self {
        Self { permissions, menu }
    }

    /// Tabla por defecto de la aplicación
    pub fn builtin() -> Self {
        let mut permissions = HashMap::new();

        permissions.insert(
            UserRole::Admin,
            RoutePermission::new(
                &[
                    "/dashboard/**",
                    "/interventions/**",
                    "/calendar/**",
                    "/customers/**",
                    "/equipment/**",
                    "/team/**",
                    "/settings/**",
                ],
                "/dashboard",
            ),
        );

        permissions.insert(
            UserRole::Operator,
            RoutePermission::new(
                &[
                    "/dashboard/**",
                    "/interventions/**",
                    "/calendar/**",
                    "/customers/**",
                    "/equipment/**",
                ],
                "/dashboard",
            )
            .deny(&["/interventions/import"])
            .allow(&["/settings/profile"]),
        );

        permissions.insert(
            UserRole::Technician,
            RoutePermission::new(&["/calendar/**", "/interventions/**"], "/calendar")
                .deny(&["/interventions/to-assign", "/interventions/new"])
                .allow(&["/settings/profile"]),
        );

        let menu = vec![
            MenuSection::new("dashboard", "Dashboard", "/dashboard"),
            MenuSection::new("calendar", "Calendario", "/calendar"),
            MenuSection::new("interventions", "Interventi", "/interventions"),
            MenuSection::new("to_assign", "Da assegnare", "/interventions/to-assign"),
            MenuSection::new("customers", "Clienti", "/customers"),
            MenuSection::new("equipment", "Apparecchiature", "/equipment"),
            MenuSection::new("team", "Team", "/team"),
            MenuSection::new("settings", "Impostazioni", "/settings"),
        ];

        Self { permissions, menu }
    }

    /// Carga la tabla desde JSON: `{"roles": {...}, "menu": [...]}`.
    ///
    /// Sin `menu` se conserva el menú por defecto. Una clave de rol que no
    /// corresponde a ningún rol conocido es un error de configuración.
    pub fn from_json_str(raw: &str) -> AppResult<Self> {
        let file: PolicyFile = serde_json::from_str(raw)
            .map_err(|e| config_error("ACCESS_POLICY_PATH", &format!("invalid policy JSON: {}", e)))?;

        let mut permissions = HashMap::new();
        for (key, permission) in file.roles {
            let role = UserRole::from_str(&key);
            if !role.is_known() {
                return Err(config_error("ACCESS_POLICY_PATH", &format!("unknown role '{}'", key)));
            }
            permissions.insert(role, permission);
        }

        let menu = file.menu.unwrap_or_else(|| Self::builtin().menu);
        Ok(Self { permissions, menu })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            config_error("ACCESS_POLICY_PATH", &format!("cannot read {}: {}", path.display(), e))
        })?;
        let policy = Self::from_json_str(&raw)?;
        info!("🛡️ Política de acceso cargada desde {} ({} roles)", path.display(), policy.permissions.len());
        Ok(policy)
    }

    /// Solo son válidos los roles presentes en la tabla
    pub fn is_valid_role(&self, role: &str) -> bool {
        let role = UserRole::from_str(role);
        role.is_known() && self.permissions.contains_key(&role)
    }

    /// Permisos configurados del rol; nunca los hay para `Unknown`
    pub fn permission(&self, role: &UserRole) -> Option<&RoutePermission> {
        self.permissions.get(role)
    }

    pub fn menu(&self) -> &[MenuSection] {
        &self.menu
    }

    /// Evalúa, en este orden, excepciones de rechazo, excepciones de
    /// aceptación y patrones del rol. Sin coincidencia se rechaza.
    pub fn can_access(&self, role: &UserRole, path: &str) -> bool {
        let Some(permission) = self.permission(role) else {
            debug!("🚫 Rol '{}' sin permisos configurados", role.as_str());
            return false;
        };
        let path = normalize_path(path);

        if permission.deny_exceptions.iter().any(|denied| normalize_path(denied) == path) {
            debug!("🚫 {} rechazado para '{}' (excepción)", path, role.as_str());
            return false;
        }
        if permission.allow_exceptions.iter().any(|allowed| normalize_path(allowed) == path) {
            return true;
        }
        permission
            .patterns
            .iter()
            .any(|pattern| pattern_matches(pattern, path))
    }

    /// Ruta de aterrizaje; los roles desconocidos van al login
    pub fn get_default_route(&self, role: &UserRole) -> &str {
        self.permission(role)
            .map(|permission| permission.default_route.as_str())
            .unwrap_or(LOGIN_ROUTE)
    }

    /// Entradas del menú accesibles para el rol, en orden de menú
    pub fn visible_sections(&self, role: &UserRole) -> Vec<&MenuSection> {
        self.menu
            .iter()
            .filter(|section| self.can_access(role, &section.path))
            .collect()
    }

    pub fn resolve_navigation(&self, role: &UserRole, path: &str) -> NavigationDecision {
        if !role.is_known() || !self.permissions.contains_key(role) {
            warn!("🔒 Rol '{}' no válido, redirigiendo al login", role.as_str());
            return NavigationDecision::Redirect(LOGIN_ROUTE.to_string());
        }
        if self.can_access(role, path) {
            NavigationDecision::Allow
        } else {
            let target = self.get_default_route(role).to_string();
            info!("↪️ {} no permitido para '{}', redirigiendo a {}", path, role.as_str(), target);
            NavigationDecision::Redirect(target)
        }
    }

    pub fn set_permission(&mut self, role: UserRole, permission: RoutePermission) -> AppResult<()> {
        if !role.is_known() {
            return Err(validation_error("role", "unknown role"));
        }
        info!("🛡️ Permisos de '{}' reemplazados", role.as_str());
        self.permissions.insert(role, permission);
        Ok(())
    }

    pub fn add_pattern(&mut self, role: &UserRole, pattern: &str) -> AppResult<()> {
        let permission = self.permission_mut(role)?;
        if !permission.patterns.iter().any(|p| p == pattern) {
            permission.patterns.push(pattern.to_string());
        }
        Ok(())
    }

    /// Devuelve `true` si el patrón existía
    pub fn remove_pattern(&mut self, role: &UserRole, pattern: &str) -> AppResult<bool> {
        let permission = self.permission_mut(role)?;
        let before = permission.patterns.len();
        permission.patterns.retain(|p| p != pattern);
        Ok(permission.patterns.len() != before)
    }

    pub fn add_deny_exception(&mut self, role: &UserRole, path: &str) -> AppResult<()> {
        let permission = self.permission_mut(role)?;
        if !permission.deny_exceptions.iter().any(|p| p == path) {
            permission.deny_exceptions.push(path.to_string());
        }
        Ok(())
    }

    pub fn add_allow_exception(&mut self, role: &UserRole, path: &str) -> AppResult<()> {
        let permission = self.permission_mut(role)?;
        if !permission.allow_exceptions.iter().any(|p| p == path) {
            permission.allow_exceptions.push(path.to_string());
        }
        Ok(())
    }

    pub fn set_default_route(&mut self, role: &UserRole, route: &str) -> AppResult<()> {
        let permission = self.permission_mut(role)?;
        permission.default_route = route.to_string();
        Ok(())
    }

    fn permission_mut(&mut self, role: &UserRole) -> AppResult<&mut RoutePermission> {
        if !role.is_known() {
            return Err(validation_error("role", "unknown role"));
        }
        self.permissions
            .get_mut(role)
            .ok_or_else(|| not_found_error("role", role.as_str()))
    }
}

/// `prefijo/**` acepta el prefijo y todo lo que cuelga de `prefijo/`;
/// cualquier otro patrón solo coincide exactamente.
pub fn pattern_matches(pattern: &str, path: &str) -> bool {
    let path = normalize_path(path);
    match pattern.strip_suffix("/**") {
        Some(prefix) => {
            path == prefix || path.strip_prefix(prefix).map_or(false, |rest| rest.starts_with('/'))
        }
        None => normalize_path(pattern) == path,
    }
}

/// Quita query, fragmento y barra final (salvo la raíz)
fn normalize_path(path: &str) -> &str {
    let end = path.find(|c: char| c == '?' || c == '#').unwrap_or(path.len());
    let path = &path[..end];
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}
