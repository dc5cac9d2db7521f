// Configuration module for routemap
// Loads indicator definitions from a YAML file, layered over the stock set

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::indicator::{Indicator, stock_indicators};

/// On-disk indicator configuration.
///
/// ```yaml
/// indicators:
///   - id: admin-routes
///     package: example.com/app/admin
///     function: Register
///     params:
///       - name: path
///         pos: 0
/// ```
#[derive(Debug, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub indicators: Vec<Indicator>,
}

pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: FileConfig = serde_yaml_ng::from_str(&content)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Builds the indicator list for a run. Custom indicators come after the
/// stock ones, so a custom definition wins whenever both match a call.
pub fn build_indicators(config: Option<&Path>, skip_default: bool) -> Result<Vec<Indicator>> {
    let mut indicators = if skip_default {
        Vec::new()
    } else {
        stock_indicators()
    };
    if let Some(path) = config {
        let file = load_config(path)?;
        let base = indicators.len();
        for (n, mut indicator) in file.indicators.into_iter().enumerate() {
            if indicator.id.is_empty() {
                indicator.id = (base + n + 1).to_string();
            }
            indicators.push(indicator);
        }
    }
    if indicators.is_empty() {
        bail!("no indicators configured; pass --config or drop --skip-default");
    }
    Ok(indicators)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(yaml: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file
    }

    #[test]
    fn custom_indicators_append_after_stock() {
        let file = write_config(
            r#"
indicators:
  - package: example.com/app/router
    function: Register
    params:
      - name: route
        pos: 0
"#,
        );
        let indicators = build_indicators(Some(file.path()), false).unwrap();
        let stock = stock_indicators().len();
        assert_eq!(indicators.len(), stock + 1);
        let custom = indicators.last().unwrap();
        assert_eq!(custom.package, "example.com/app/router");
        assert_eq!(custom.id, (stock + 1).to_string());
    }

    #[test]
    fn skip_default_uses_only_custom() {
        let file = write_config(
            r#"
indicators:
  - package: "*"
    function: Invoke
"#,
        );
        let indicators = build_indicators(Some(file.path()), true).unwrap();
        assert_eq!(indicators.len(), 1);
        assert_eq!(indicators[0].function, "Invoke");
    }

    #[test]
    fn skip_default_without_config_is_an_error() {
        assert!(build_indicators(None, true).is_err());
    }

    #[test]
    fn malformed_yaml_reports_the_file() {
        let file = write_config("indicators: [not: {valid");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("failed to parse config file"));
    }
}
