use breath_config::load_toml;
use rstest::rstest;

#[test]
fn rejects_zero_sample_rate_hz() {
    let toml = r#"
[filter]
order = 4
cutoff_hz = 2.0
sample_rate_hz = 0
"#;

    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject sample_rate_hz=0");
    assert!(
        format!("{err}")
            .to_lowercase()
            .contains("sample_rate_hz must be > 0")
    );
}

#[test]
fn rejects_cutoff_at_or_above_nyquist() {
    let toml = r#"
[filter]
order = 4
cutoff_hz = 30.0
sample_rate_hz = 60
"#;

    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("cutoff at Nyquist must fail");
    assert!(format!("{err}").contains("cutoff_hz"));
}

#[rstest]
#[case(0)]
#[case(3)]
#[case(10)]
fn rejects_odd_or_out_of_range_order(#[case] order: usize) {
    let toml = format!(
        r#"
[filter]
order = {order}
cutoff_hz = 2.0
sample_rate_hz = 60
"#
    );

    let cfg = load_toml(&toml).expect("parse TOML");
    let err = cfg.validate().expect_err("bad order must fail");
    assert!(format!("{err}").contains("filter.order"));
}

#[test]
fn rejects_fail_threshold_below_success_threshold() {
    let toml = r#"
[adaptive]
sampling_window = 4
success_threshold_pct = 15.0
fail_threshold_pct = 10.0
increase_breath_s = 0.5
"#;

    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("inverted thresholds must fail");
    assert!(format!("{err}").contains("fail_threshold_pct"));
}

#[test]
fn rejects_zero_fallback_target() {
    let toml = r#"
[session]
fallback_target_s = 0.0
"#;

    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("zero fallback must fail");
    assert!(format!("{err}").contains("fallback_target_s"));
}

#[test]
fn rejects_duplicate_driver_pins() {
    let toml = r#"
[pins]
in1 = 23
in2 = 23
enable = 25
"#;

    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("duplicate pins must fail");
    assert!(format!("{err}").contains("distinct"));
}

#[test]
fn rejects_unparseable_bind_address() {
    let toml = r#"
[server]
bind = "not-an-address"
"#;

    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("bad bind must fail");
    assert!(format!("{err}").contains("server.bind"));
}

#[test]
fn empty_config_uses_original_defaults_and_passes() {
    let cfg = load_toml("").expect("empty TOML parses via defaults");
    cfg.validate().expect("defaults must validate");

    assert_eq!(cfg.filter.order, 4);
    assert!((cfg.filter.cutoff_hz - 2.0).abs() < f64::EPSILON);
    assert_eq!(cfg.filter.sample_rate_hz, 60);
    assert!((cfg.session.warmup_s - 5.0).abs() < f64::EPSILON);
    assert!((cfg.session.mirror_s - 60.0).abs() < f64::EPSILON);
    assert!((cfg.session.fallback_target_s - 4.0).abs() < f64::EPSILON);
    assert_eq!(cfg.adaptive.sampling_window, 4);
    assert!((cfg.adaptive.success_threshold_pct - 15.0).abs() < f64::EPSILON);
    assert!((cfg.adaptive.fail_threshold_pct - 50.0).abs() < f64::EPSILON);
    assert_eq!(cfg.actuator.max_distance, 50);
    assert_eq!(cfg.pins.in1, 23);
    assert_eq!(cfg.pins.bmp280_addr, 0x76);
    assert_eq!(cfg.server.bind, "0.0.0.0:5005");
}

#[test]
fn partial_override_keeps_other_defaults() {
    let toml = r#"
[session]
mirror_s = 30.0

[server]
bind = "127.0.0.1:6000"
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid override must pass");
    assert!((cfg.session.mirror_s - 30.0).abs() < f64::EPSILON);
    assert!((cfg.session.warmup_s - 5.0).abs() < f64::EPSILON);
    assert_eq!(cfg.server.bind, "127.0.0.1:6000");
}
