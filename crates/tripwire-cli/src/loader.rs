//! Alarm configuration loading
//!
//! The format is picked by file extension. Parameter keys keep the alarm
//! API's PascalCase spelling, so the file is handed to serde as is.

use std::path::Path;
use tracing::debug;
use tripwire_types::ConfigModel;

use crate::error::{CliError, CliResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Json,
    Toml,
}

impl Format {
    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "yaml" | "yml" => Some(Format::Yaml),
            "json" => Some(Format::Json),
            "toml" => Some(Format::Toml),
            _ => None,
        }
    }
}

/// Parse a configuration document without validating it
pub fn parse_config(path: &Path, contents: &str) -> CliResult<ConfigModel> {
    let format = Format::from_path(path).ok_or_else(|| CliError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;

    match format {
        Format::Yaml => serde_yaml::from_str(contents).map_err(|e| CliError::parse(path, e)),
        Format::Json => serde_json::from_str(contents).map_err(|e| CliError::parse(path, e)),
        Format::Toml => toml::from_str(contents).map_err(|e| CliError::parse(path, e)),
    }
}

/// Read, parse and validate the configuration at `path`
pub fn load_config(path: &Path) -> CliResult<ConfigModel> {
    let contents = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let config = parse_config(path, &contents)?;
    config.validate()?;

    debug!(
        path = %path.display(),
        prefix = %config.globals.prefix(),
        rules = config.resources.len(),
        "Loaded configuration"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tripwire_types::ConfigError;

    const YAML: &str = r#"
globals:
  alarm:
    alarm_name_prefix: "tw-"
    default_alarm_params:
      Threshold: 2
resources:
  fns:
    target_resource_type: "lambda:function"
    alarm:
      metrics: [Errors]
"#;

    const TOML: &str = r#"
[globals.alarm]
alarm_name_prefix = "tw-"

[globals.alarm.default_alarm_params]
Period = 300

[resources.queues]
target_resource_type = "sqs:queue"

[resources.queues.alarm]
metrics = ["ApproximateAgeOfOldestMessage"]
"#;

    fn write(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_loads_yaml() {
        let file = write(".yaml", YAML);
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.globals.alarm.default_alarm_params.threshold, Some(2.0));
    }

    #[test]
    fn test_loads_toml() {
        let file = write(".toml", TOML);
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.globals.alarm.default_alarm_params.period, Some(300));
        assert!(config.resources.contains_key("queues"));
    }

    #[test]
    fn test_loads_json() {
        let file = write(
            ".json",
            r#"{"globals":{"alarm":{"alarm_name_prefix":"tw-"}},"resources":{}}"#,
        );
        assert!(load_config(file.path()).is_ok());
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let file = write(".ini", YAML);
        assert!(matches!(
            load_config(file.path()),
            Err(CliError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let file = write(".yml", &YAML.replace("\"tw-\"", "\"\""));
        assert!(matches!(
            load_config(file.path()),
            Err(CliError::Config(ConfigError::EmptyPrefix))
        ));
    }

    #[test]
    fn test_unknown_param_key_is_a_parse_error() {
        let file = write(".yaml", &YAML.replace("Threshold", "Treshold"));
        assert!(matches!(load_config(file.path()), Err(CliError::Parse { .. })));
    }

    #[test]
    fn test_missing_file_is_a_read_error() {
        let result = load_config(Path::new("/nonexistent/tripwire.yaml"));
        assert!(matches!(result, Err(CliError::Read { .. })));
    }
}
