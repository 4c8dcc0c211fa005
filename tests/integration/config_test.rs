//! Configuration files on disk

use riskgate::config::Config;
use riskgate::risk::SizingMethod;
use rust_decimal_macros::dec;
use std::io::Write;

#[test]
fn test_example_config_loads() {
    let config = Config::load(concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml.example")).unwrap();
    assert_eq!(config.engine.initial_balance, dec!(10000));
    assert_eq!(config.risk.min_confidence, dec!(0.6));
    assert!(config.telemetry.metrics_port.is_none());
}

#[test]
fn test_partial_config_keeps_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [risk]
        sizing_method = "volatility_adjusted"
        cooldown_seconds = 60

        [execution]
        taker_fee_rate = 0.002
        "#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.risk.sizing_method, SizingMethod::VolatilityAdjusted);
    assert_eq!(config.risk.cooldown_seconds, 60);
    assert_eq!(config.risk.max_consecutive_losses, 5);
    assert_eq!(config.execution.taker_fee_rate, dec!(0.002));
    assert_eq!(config.execution.slippage_rate, dec!(0.0005));
}

#[test]
fn test_rejects_out_of_range_settings() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[risk]\nmin_confidence = 1.5").unwrap();

    let err = Config::load(file.path()).unwrap_err();
    assert!(format!("{err:#}").contains("Invalid configuration"));
}
