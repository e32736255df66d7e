//! Compose file discovery, parsing and merging

use super::config::RawDocument;
use super::env::EnvLookup;
use super::interpolate::interpolate;
use crate::error::{ComposeError, Result};
use std::path::{Path, PathBuf};

/// Default compose file names, in priority order
pub const DEFAULT_COMPOSE_FILES: &[&str] = &[
    "compose.yaml",
    "compose.yml",
    "docker-compose.yml",
    "docker-compose.yaml",
];

/// Compose file parser
pub struct ComposeParser<'a> {
    env: &'a dyn EnvLookup,
}

impl<'a> ComposeParser<'a> {
    /// Create a parser that interpolates against `env`
    pub fn new(env: &'a dyn EnvLookup) -> Self {
        Self { env }
    }

    /// Find compose file in directory
    pub fn find_compose_file(dir: &Path) -> Option<PathBuf> {
        DEFAULT_COMPOSE_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Load and merge `files` (or the default file in `base_dir` if none are given)
    pub fn load(&self, files: &[PathBuf], base_dir: &Path) -> Result<RawDocument> {
        let paths = if files.is_empty() {
            let found = Self::find_compose_file(base_dir).ok_or_else(|| ComposeError::NotFound {
                dir: base_dir.to_path_buf(),
                tried: DEFAULT_COMPOSE_FILES.join(", "),
            })?;
            tracing::debug!("Discovered compose file {}", found.display());
            vec![found]
        } else {
            files
                .iter()
                .map(|f| {
                    if f.is_absolute() {
                        f.clone()
                    } else {
                        base_dir.join(f)
                    }
                })
                .collect()
        };

        let mut merged = RawDocument::default();
        for path in &paths {
            let document = self.parse_file(path)?;
            merged = Self::merge(merged, document);
        }

        tracing::debug!(
            files = paths.len(),
            services = merged.services.len(),
            "Merged compose documents"
        );

        Ok(merged)
    }

    /// Parse compose file from path
    pub fn parse_file(&self, path: &Path) -> Result<RawDocument> {
        let content = std::fs::read_to_string(path).map_err(|source| ComposeError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!("Parsing compose file {}", path.display());
        self.parse_document(&content, path)
    }

    /// Parse compose document from string
    pub fn parse_str(&self, content: &str) -> Result<RawDocument> {
        self.parse_document(content, Path::new("<string>"))
    }

    fn parse_document(&self, content: &str, path: &Path) -> Result<RawDocument> {
        let parse_error = |e: serde_yaml::Error| ComposeError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let interpolated = interpolate(content, self.env);
        let value: serde_yaml::Value = serde_yaml::from_str(&interpolated).map_err(parse_error)?;

        // An empty or comment-only document decodes to null
        if value.is_null() {
            return Ok(RawDocument::default());
        }

        serde_yaml::from_value(value).map_err(parse_error)
    }

    /// Merge two compose documents; `overlay` entries replace same-named ones in `base`
    pub fn merge(base: RawDocument, overlay: RawDocument) -> RawDocument {
        let mut result = base;

        // Merge name (overlay wins unless empty)
        if let Some(name) = overlay.name.filter(|n| !n.is_empty()) {
            result.name = Some(name);
        }

        result.services.extend(overlay.services);
        result.networks.extend(overlay.networks);
        result.volumes.extend(overlay.volumes);

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn no_env() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn test_parse_simple_compose() {
        let yaml = r#"
version: "3.8"
services:
  web:
    image: nginx:latest
    ports:
      - "80:80"
  db:
    image: postgres:13
    environment:
      POSTGRES_PASSWORD: secret
"#;

        let env = no_env();
        let doc = ComposeParser::new(&env).parse_str(yaml).unwrap();
        assert_eq!(doc.services.len(), 2);
        assert!(doc.services.contains_key("web"));
        assert!(doc.services.contains_key("db"));
    }

    #[test]
    fn test_parse_interpolates_before_parsing() {
        let mut env = no_env();
        env.insert("REPLICA_TAG".to_string(), "1.25".to_string());

        let yaml = "services:\n  web:\n    image: nginx:${REPLICA_TAG}\n    tty: ${TTY:-true}\n";
        let doc = ComposeParser::new(&env).parse_str(yaml).unwrap();

        let web = &doc.services["web"];
        assert_eq!(web["image"], serde_yaml::Value::from("nginx:1.25"));
        assert_eq!(web["tty"], serde_yaml::Value::Bool(true));
    }

    #[test]
    fn test_parse_empty_document() {
        let env = no_env();
        let doc = ComposeParser::new(&env).parse_str("# nothing here\n").unwrap();
        assert_eq!(doc, RawDocument::default());
    }

    #[test]
    fn test_parse_error_includes_path() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("compose.yaml");
        std::fs::write(&path, "services: [unclosed\n").unwrap();

        let env = no_env();
        let err = ComposeParser::new(&env).parse_file(&path).unwrap_err();
        match err {
            ComposeError::Parse { path: p, .. } => assert_eq!(p, path),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_unreadable_file_is_io_error() {
        let temp = tempdir().unwrap();
        let env = no_env();
        let err = ComposeParser::new(&env)
            .load(&[PathBuf::from("missing.yaml")], temp.path())
            .unwrap_err();

        assert!(matches!(err, ComposeError::Io { ref path, .. } if path == &temp.path().join("missing.yaml")));
    }

    #[test]
    fn test_no_file_found() {
        let temp = tempdir().unwrap();
        let env = no_env();
        let err = ComposeParser::new(&env).load(&[], temp.path()).unwrap_err();

        match err {
            ComposeError::NotFound { tried, .. } => {
                assert_eq!(
                    tried,
                    "compose.yaml, compose.yml, docker-compose.yml, docker-compose.yaml"
                );
            }
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[test]
    fn test_default_file_priority() {
        let temp = tempdir().unwrap();
        std::fs::write(
            temp.path().join("docker-compose.yml"),
            "services:\n  legacy:\n    image: a\n",
        )
        .unwrap();
        std::fs::write(
            temp.path().join("compose.yml"),
            "services:\n  modern:\n    image: b\n",
        )
        .unwrap();

        assert_eq!(
            ComposeParser::find_compose_file(temp.path()),
            Some(temp.path().join("compose.yml"))
        );

        let env = no_env();
        let doc = ComposeParser::new(&env).load(&[], temp.path()).unwrap();
        assert!(doc.services.contains_key("modern"));
        assert!(!doc.services.contains_key("legacy"));
    }

    #[test]
    fn test_merge_replaces_whole_entries() {
        let temp = tempdir().unwrap();
        std::fs::write(
            temp.path().join("base.yaml"),
            r#"
name: base
services:
  web:
    image: nginx
    ports: ["80:80"]
  db:
    image: postgres
networks:
  front: {}
"#,
        )
        .unwrap();
        std::fs::write(
            temp.path().join("override.yaml"),
            r#"
name: ""
services:
  web:
    image: caddy
  cache:
    image: redis
networks:
  back: {}
"#,
        )
        .unwrap();

        let env = no_env();
        let doc = ComposeParser::new(&env)
            .load(
                &[PathBuf::from("base.yaml"), PathBuf::from("override.yaml")],
                temp.path(),
            )
            .unwrap();

        // Empty name does not overwrite
        assert_eq!(doc.name.as_deref(), Some("base"));

        let web = doc.services["web"].as_mapping().unwrap();
        assert_eq!(web.get("image"), Some(&serde_yaml::Value::from("caddy")));
        assert!(web.get("ports").is_none());

        assert!(doc.services.contains_key("db"));
        assert!(doc.services.contains_key("cache"));
        assert!(doc.networks.contains_key("front"));
        assert!(doc.networks.contains_key("back"));
    }

    #[test]
    fn test_absolute_path_ignores_base_dir() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("stack.yaml");
        std::fs::write(&path, "name: stack\n").unwrap();

        let env = no_env();
        let doc = ComposeParser::new(&env)
            .load(&[path], Path::new("/nonexistent"))
            .unwrap();
        assert_eq!(doc.name.as_deref(), Some("stack"));
    }
}
