//! Loading configuration from files and the environment

use alertload_config::*;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use temp_env::with_vars;

fn yaml_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_environment_overrides() {
    let vars = vec![
        ("ALERTLOAD_HTTP_TIMEOUT", Some("60")),
        ("ALERTLOAD_LOG_LEVEL", Some("debug")),
        ("ALERTLOAD_RUN_MINUTES", Some("2")),
        ("ALERTLOAD_RULE_CONCURRENCY", Some("8")),
        ("ALERTLOAD_SAMPLE_INTERVAL_SECONDS", Some("5")),
        ("ALERTLOAD_ECCTL_CONFIG", Some("staging")),
        ("ALERTLOAD_REPORT_DIR", Some("/tmp/reports")),
    ];

    with_vars(vars, || {
        let config = ConfigLoader::new().from_env().unwrap();

        assert_eq!(config.http.request_timeout, Duration::from_secs(60));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.run.minutes, 2);
        assert_eq!(config.run.rule_concurrency, 8);
        assert_eq!(config.run.sample_interval, Duration::from_secs(5));
        assert_eq!(config.provisioning.ecctl_config, "staging");
        assert_eq!(config.report.output_dir, PathBuf::from("/tmp/reports"));
    });
}

#[test]
fn test_blank_variable_is_ignored() {
    with_vars(vec![("ALERTLOAD_ECCTL_CONFIG", Some("  "))], || {
        let config = ConfigLoader::new().from_env().unwrap();
        assert_eq!(config.provisioning.ecctl_config, "config");
    });
}

#[test]
fn test_malformed_variable_names_itself() {
    with_vars(vec![("ALERTLOAD_RULE_CONCURRENCY", Some("many"))], || {
        let err = ConfigLoader::new().from_env().unwrap_err();
        match err {
            ConfigError::Env { ref var, ref value, .. } => {
                assert_eq!(var, "ALERTLOAD_RULE_CONCURRENCY");
                assert_eq!(value, "many");
            }
            other => panic!("unexpected error: {}", other),
        }
    });

    with_vars(vec![("ALERTLOAD_LOG_FORMAT", Some("xml"))], || {
        let err = ConfigLoader::new().from_env().unwrap_err();
        assert!(err.to_string().contains("expected text, compact or json"));
    });
}

#[test]
fn test_overrides_are_validated() {
    with_vars(vec![("ALERTLOAD_RULE_CONCURRENCY", Some("0"))], || {
        let err = ConfigLoader::new().from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                domain: "run",
                field: "rule_concurrency",
                ..
            }
        ));
    });
}

#[test]
fn test_yaml_file() {
    let file = yaml_file(
        r#"
provisioning:
  ecctl_config: perf
  poll_interval: 5
  wait_budget: 15m
  stagger: 0

http:
  timeout: 45
  verify_ssl: true

run:
  minutes: 20
  rule_concurrency: 2
  sample_interval: 2s 500ms
  log_page_size: 500
  stop_on_empty_page: false
  rule_input_index: load-*

retry:
  max_retries: 1
  delay: 2

logging:
  level: info,alertload_deploy=debug
  format: json
"#,
    );

    with_vars(vec![("ALERTLOAD_RUN_MINUTES", None::<&str>)], || {
        let config = ConfigLoader::new().from_file(file.path()).unwrap();

        assert_eq!(config.provisioning.ecctl_config, "perf");
        assert_eq!(config.provisioning.wait_budget, Duration::from_secs(900));
        assert_eq!(config.provisioning.stagger, Duration::ZERO);
        assert_eq!(config.http.request_timeout, Duration::from_secs(45));
        assert!(config.http.verify_ssl);
        assert_eq!(config.run.minutes, 20);
        assert_eq!(config.run.sample_interval, Duration::from_millis(2500));
        assert_eq!(config.run.log_page_size, 500);
        assert!(!config.run.stop_on_empty_page);
        assert_eq!(config.run.rule_input_index, "load-*");
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.logging.level, "info,alertload_deploy=debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        // sections absent from the file keep their defaults
        assert_eq!(config.report.output_dir, PathBuf::from("."));
    });
}

#[test]
fn test_environment_beats_file() {
    let file = yaml_file("run:\n  minutes: 20\n");

    with_vars(vec![("ALERTLOAD_RUN_MINUTES", Some("1"))], || {
        let config = ConfigLoader::new().from_file(file.path()).unwrap();
        assert_eq!(config.run.minutes, 1);
    });
}

#[test]
fn test_file_errors_carry_the_path() {
    let err = ConfigLoader::new()
        .from_file("/definitely/not/here.yaml")
        .unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
    assert!(err.to_string().contains("/definitely/not/here.yaml"));

    let file = yaml_file("run: [not, a, map]\n");
    let err = ConfigLoader::new().from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { ref path, .. } if path == file.path()));
}

#[test]
fn test_load_without_path_uses_env() {
    with_vars(vec![("ALERTLOAD_HTTP_VERIFY_SSL", Some("true"))], || {
        let config = ConfigLoader::new().load(None::<&str>).unwrap();
        assert!(config.http.verify_ssl);
    });
}

#[test]
fn test_custom_prefix() {
    with_vars(vec![("PERF_RUN_MINUTES", Some("3"))], || {
        let config = ConfigLoader::with_prefix("PERF").from_env().unwrap();
        assert_eq!(config.run.minutes, 3);
    });
}
