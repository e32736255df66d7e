//! Compose project assembly
//!
//! Ties discovery, interpolation, normalization and dependency ordering into
//! one call and works out the project name.

use super::env::EnvLookup;
use super::graph::DependencyGraph;
use super::model::ComposeSpec;
use super::normalize::Normalizer;
use super::parser::ComposeParser;
use crate::error::{ComposeError, Result};
use std::path::{Path, PathBuf};

/// Name used when nothing else yields a usable project name
pub const DEFAULT_PROJECT_NAME: &str = "default";

/// Inputs for loading a project
#[derive(Debug, Clone, Default)]
pub struct ProjectOptions {
    /// Compose files, in merge order; empty means discover the default file
    pub files: Vec<PathBuf>,
    /// Directory relative paths resolve against; the current directory if unset
    pub project_dir: Option<PathBuf>,
    /// Explicit project name
    pub project_name: Option<String>,
}

impl ProjectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a compose file
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push(path.into());
        self
    }

    /// Set the project directory
    pub fn project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = Some(dir.into());
        self
    }

    /// Set the project name
    pub fn project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = Some(name.into());
        self
    }
}

/// A fully resolved compose project
#[derive(Debug, Clone)]
pub struct ComposeProject {
    /// Sanitized project name
    pub name: String,
    /// Project directory
    pub project_dir: PathBuf,
    /// Normalized specification
    pub spec: ComposeSpec,
    /// Services in dependency order
    pub startup_order: Vec<String>,
}

impl ComposeProject {
    /// Load, normalize and order a project
    pub fn load(options: &ProjectOptions, env: &dyn EnvLookup) -> Result<Self> {
        let project_dir = match &options.project_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().map_err(|source| ComposeError::Io {
                path: PathBuf::from("."),
                source,
            })?,
        };

        let raw = ComposeParser::new(env).load(&options.files, &project_dir)?;
        let spec = Normalizer::new(env).normalize(raw)?;
        let startup_order = DependencyGraph::from_services(&spec.services)?.startup_order()?;
        let name = resolve_project_name(options.project_name.as_deref(), &spec, &project_dir);

        tracing::info!(
            project = %name,
            services = spec.services.len(),
            "Loaded compose project"
        );

        Ok(Self {
            name,
            project_dir,
            spec,
            startup_order,
        })
    }

    /// Services in reverse dependency order
    pub fn shutdown_order(&self) -> Vec<String> {
        self.startup_order.iter().rev().cloned().collect()
    }
}

/// Project name from the explicit name, the document name, or the directory
pub fn resolve_project_name(
    explicit: Option<&str>,
    spec: &ComposeSpec,
    project_dir: &Path,
) -> String {
    let candidate = explicit
        .filter(|n| !n.is_empty())
        .or_else(|| spec.name.as_deref().filter(|n| !n.is_empty()))
        .map(str::to_string)
        .or_else(|| {
            project_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_default();

    let sanitized = sanitize_project_name(&candidate);
    if sanitized.is_empty() {
        DEFAULT_PROJECT_NAME.to_string()
    } else {
        sanitized
    }
}

/// Lower-case `name` and replace anything outside `[a-z0-9-]` with `-`
pub fn sanitize_project_name(name: &str) -> String {
    let replaced: String = name
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    replaced.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_sanitize_project_name() {
        assert_eq!(sanitize_project_name("My App_1"), "my-app-1");
        assert_eq!(sanitize_project_name("--shop--"), "shop");
        assert_eq!(sanitize_project_name("web.stack"), "web-stack");
    }

    #[test]
    fn test_resolve_project_name_priority() {
        let dir = Path::new("/srv/Storefront");
        let mut spec = ComposeSpec::default();

        assert_eq!(resolve_project_name(None, &spec, dir), "storefront");

        spec.name = Some("Shop".to_string());
        assert_eq!(resolve_project_name(None, &spec, dir), "shop");
        assert_eq!(resolve_project_name(Some(""), &spec, dir), "shop");
        assert_eq!(resolve_project_name(Some("Override"), &spec, dir), "override");
    }

    #[test]
    fn test_resolve_project_name_fallback() {
        let spec = ComposeSpec::default();
        assert_eq!(
            resolve_project_name(Some("___"), &spec, Path::new("/")),
            DEFAULT_PROJECT_NAME
        );
    }

    #[test]
    fn test_load_project() {
        let temp = tempdir().unwrap();
        std::fs::write(
            temp.path().join("compose.yaml"),
            r#"
name: ${PROJECT:-fallback}
services:
  web:
    image: nginx
    depends_on: [api]
  api:
    image: app:${TAG}
    depends_on:
      db:
        condition: service_healthy
  db:
    image: postgres
"#,
        )
        .unwrap();

        let mut env = HashMap::new();
        env.insert("TAG".to_string(), "2.1".to_string());

        let options = ProjectOptions::new().project_dir(temp.path());
        let project = ComposeProject::load(&options, &env).unwrap();

        assert_eq!(project.name, "fallback");
        assert_eq!(project.startup_order, vec!["db", "api", "web"]);
        assert_eq!(project.shutdown_order(), vec!["web", "api", "db"]);
        assert_eq!(project.spec.services["api"].image.as_deref(), Some("app:2.1"));
    }

    #[test]
    fn test_load_project_override_file() {
        let temp = tempdir().unwrap();
        std::fs::write(
            temp.path().join("compose.yaml"),
            "services:\n  web:\n    image: nginx\n    ports: [\"80:80\"]\n  db:\n    image: postgres\n",
        )
        .unwrap();
        std::fs::write(
            temp.path().join("compose.override.yaml"),
            "services:\n  web:\n    image: caddy\n    depends_on: [cache]\n  cache:\n    image: redis\n",
        )
        .unwrap();

        let options = ProjectOptions::new()
            .project_dir(temp.path())
            .project_name("Demo")
            .file("compose.yaml")
            .file("compose.override.yaml");
        let project = ComposeProject::load(&options, &HashMap::<String, String>::new()).unwrap();

        let web = &project.spec.services["web"];
        assert_eq!(web.image.as_deref(), Some("caddy"));
        assert_eq!(web.ports, None);
        assert!(project.spec.services.contains_key("db"));
        assert!(project.spec.services.contains_key("cache"));
        assert_eq!(project.name, "demo");
        assert_eq!(project.startup_order, vec!["cache", "db", "web"]);
    }

    #[test]
    fn test_load_project_cycle() {
        let temp = tempdir().unwrap();
        std::fs::write(
            temp.path().join("compose.yaml"),
            "services:\n  a:\n    depends_on: [b]\n  b:\n    depends_on: [a]\n",
        )
        .unwrap();

        let options = ProjectOptions::new().project_dir(temp.path());
        let err = ComposeProject::load(&options, &HashMap::<String, String>::new()).unwrap_err();
        assert!(matches!(err, ComposeError::Cycle { ref services } if services == &["a", "b"]));
    }
}
