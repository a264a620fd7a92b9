//! 配置解析模块
//!
//! 支持 YAML、TOML 和 JSON 格式。

use contracts::{ContractError, ExporterConfig};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML 格式
    Yaml,
    /// TOML 格式
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 YAML 格式配置
pub fn parse_yaml(content: &str) -> Result<ExporterConfig, ContractError> {
    serde_yaml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("YAML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<ExporterConfig, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<ExporterConfig, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<ExporterConfig, ContractError> {
    match format {
        ConfigFormat::Yaml => parse_yaml(content),
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SinkType;

    #[test]
    fn test_parse_yaml_route_tree() {
        let content = r#"
log_level: debug
cluster_name: prod-eu
route:
  drop:
    - namespace: ".*test.*"
    - type: Normal
  match:
    - receiver: dump
  routes:
    - match:
        - kind: Pod|Deployment
          labels:
            app: web
          receiver: alerts
receivers:
  - name: dump
    sink_type: stdout
  - name: alerts
    sink_type: file
    params:
      path: /var/log/alerts.jsonl
"#;
        let result = parse_yaml(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.cluster_name, "prod-eu");
        assert_eq!(config.route.drop.len(), 2);
        assert_eq!(config.route.drop[1].event_type, "Normal");
        assert_eq!(config.route.routes[0].matchers[0].labels["app"], "web");
        assert_eq!(config.receivers[1].sink_type, SinkType::File);
    }

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[[route.match]]
receiver = "dump"

[[receivers]]
name = "dump"
sink_type = "log"
"#;
        let result = parse_toml(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.route.matchers[0].receiver, "dump");
        assert_eq!(config.receivers[0].queue_capacity, 100);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "route": { "match": [{ "reason": "BackOff", "receiver": "dump" }] },
            "receivers": [{ "name": "dump", "sink_type": "udp", "params": { "addr": "127.0.0.1:9000" } }]
        }"#;
        let result = parse_json(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
    }

    #[test]
    fn test_parse_syntax_errors() {
        assert!(matches!(
            parse_toml("invalid toml [[["),
            Err(ContractError::ConfigParse { .. })
        ));
        assert!(matches!(
            parse_yaml("route: [unclosed"),
            Err(ContractError::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("yaml"), Some(ConfigFormat::Yaml));
        assert_eq!(ConfigFormat::from_extension("YML"), Some(ConfigFormat::Yaml));
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("ini"), None);
    }
}
