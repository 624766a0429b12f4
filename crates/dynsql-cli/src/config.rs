use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use dynsql::{RegistryContext, TemplateConfig};
use serde::Deserialize;

const DEFAULT_CONFIG: &str = "dynsql.toml";

#[derive(Debug, Clone, Default)]
pub struct ProjectConfig {
    pub config_path: Option<PathBuf>,
    pub file: ConfigFile,
}

impl ProjectConfig {
    /// Load `explicit` (which must exist), or `dynsql.toml` when present, or defaults.
    pub fn load_optional(explicit: Option<&Path>) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => Self::load(path.to_path_buf()),
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG);
                if path.exists() {
                    Self::load(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load(config_path: PathBuf) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(&config_path).map_err(|e| {
            anyhow::anyhow!(
                "failed to read config file {}: {e}",
                config_path.display()
            )
        })?;

        let mut file = ConfigFile::parse(&raw).map_err(|e| {
            anyhow::anyhow!(
                "failed to load config file {}: {e:#}",
                config_path.display()
            )
        })?;
        file.expand_env()?;

        Ok(Self {
            config_path: Some(config_path),
            file,
        })
    }

    fn source(&self) -> String {
        self.config_path
            .as_ref()
            .map_or_else(|| "defaults".to_string(), |p| p.display().to_string())
    }

    /// Query context with the configured options and macros.
    pub fn context(&self) -> anyhow::Result<RegistryContext> {
        let mut ctx = RegistryContext::new().with_config(self.file.options.clone());
        for (name, template) in &self.file.macros {
            ctx.macros_mut()
                .register(name, template)
                .map_err(|e| anyhow::anyhow!("invalid macro `{name}` in {}: {e}", self.source()))?;
        }
        Ok(ctx)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub options: TemplateConfig,

    #[serde(default)]
    pub macros: BTreeMap<String, String>,
}

impl ConfigFile {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let file: ConfigFile = toml::from_str(raw)?;
        file.validate()?;
        Ok(file)
    }

    fn expand_env(&mut self) -> anyhow::Result<()> {
        for template in self.macros.values_mut() {
            *template = expand_env_vars(template)?;
        }
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.options.max_depth == 0 {
            anyhow::bail!("options.max_depth must be at least 1");
        }
        for name in self.macros.keys() {
            if name.trim().is_empty() {
                anyhow::bail!("macro names must not be empty");
            }
        }
        Ok(())
    }
}

/// Replace `${env:NAME}` with the value of `NAME`. Other `${...}` text is kept.
fn expand_env_vars(input: &str) -> anyhow::Result<String> {
    const OPEN: &str = "${env:";

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after = &rest[start + OPEN.len()..];
        let Some(end) = after.find('}') else {
            anyhow::bail!("unterminated env var reference: {}", &rest[start..]);
        };

        let key = after[..end].trim();
        if key.is_empty() {
            anyhow::bail!("invalid env var reference: ${{env:}}");
        }
        let v = std::env::var(key)
            .map_err(|_| anyhow::anyhow!("missing env var for config expansion: {key}"))?;
        out.push_str(&v);
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynsql::{InListStyle, MissingPolicy, QueryContext};

    #[test]
    fn parses_options_and_macros() {
        let file = ConfigFile::parse(
            r#"
[options]
in_list_style = "literal"
missing_parameter = "bind_null"
max_depth = 8

[macros]
user_columns = "id, name, email"
"#,
        )
        .unwrap();

        assert_eq!(file.options.in_list_style, InListStyle::Literal);
        assert_eq!(file.options.missing_parameter, MissingPolicy::BindNull);
        assert_eq!(file.options.max_depth, 8);
        assert_eq!(file.options.max_log_sql_length, Some(200));
        assert_eq!(file.macros["user_columns"], "id, name, email");
    }

    #[test]
    fn empty_config_uses_defaults() {
        let file = ConfigFile::parse("").unwrap();
        assert_eq!(file.options, TemplateConfig::default());
        assert!(file.macros.is_empty());
    }

    #[test]
    fn rejects_invalid_config() {
        assert!(ConfigFile::parse("[options]\nmax_depth = 0").is_err());
        assert!(ConfigFile::parse("[options]\nin_list_style = \"sideways\"").is_err());
    }

    #[test]
    fn context_registers_macros() {
        let project = ProjectConfig {
            config_path: None,
            file: ConfigFile::parse("[macros]\ncols = \"id, name\"").unwrap(),
        };
        let ctx = project.context().unwrap();
        assert!(ctx.find_macro("cols").is_some());

        let broken = ProjectConfig {
            config_path: None,
            file: ConfigFile::parse("[macros]\nbad = \"@{if\"").unwrap(),
        };
        assert!(broken.context().is_err());
    }

    #[test]
    fn expands_env_references_only() {
        // SAFETY: test-only mutation of a variable no other test reads.
        unsafe { std::env::set_var("DYNSQL_TEST_SCHEMA", "audit") };
        assert_eq!(
            expand_env_vars("select * from ${env:DYNSQL_TEST_SCHEMA}.log order by ${col}").unwrap(),
            "select * from audit.log order by ${col}"
        );
        assert!(expand_env_vars("${env:DYNSQL_TEST_UNSET_VARIABLE}").is_err());
        assert!(expand_env_vars("${env:}").is_err());
        assert!(expand_env_vars("${env:X").is_err());
    }
}
