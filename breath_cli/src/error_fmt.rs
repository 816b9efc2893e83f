//! Human-readable error descriptions and structured JSON error formatting.

/// Map an eyre::Report to a human-readable explanation with likely causes
/// and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use breath_core::error::{BuildError, SessionError};

    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See README for a sample."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<SessionError>() {
        if matches!(se, SessionError::Timeout) {
            return "What happened: Pressure sensor read timed out.\nLikely causes: BMP280 not wired correctly, wrong I2C address, or timeout too low.\nHow to fix: Verify SDA/SCL wiring and pins.bmp280_addr, and consider increasing timeouts.sensor_ms in the config.".to_string();
        }
        return format!(
            "What happened: {se}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
        );
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("chip id") {
        return "What happened: The device on the I2C bus is not a BMP280.\nLikely causes: Wrong pins.bmp280_addr, another sensor on the address, or bus mixup.\nHow to fix: Check pins.i2c_bus and pins.bmp280_addr (0x76 or 0x77) in the config.".to_string();
    }

    if lower.contains("open bmp280") || lower.contains("open actuator pins") {
        return "What happened: Failed to initialize hardware.\nLikely causes: Incorrect pin numbers or insufficient GPIO/I2C permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process may access GPIO and I2C.".to_string();
    }

    if lower.contains("invalid config") {
        return "What happened: Configuration is invalid or incomplete.\nLikely causes: Out-of-range values under [filter], [session], [adaptive], [actuator], or [pins].\nHow to fix: Edit the TOML config and try again.".to_string();
    }

    if lower.contains("bind") {
        return "What happened: The relay could not bind its listen address.\nLikely causes: Port already in use or server.bind malformed.\nHow to fix: Change server.bind in the config or pass --bind with a free port.".to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: config faults 2, everything else 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    use breath_core::error::BuildError;
    if err.downcast_ref::<BuildError>().is_some() {
        return 2;
    }
    1
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let reason = if err
        .downcast_ref::<breath_core::error::BuildError>()
        .is_some()
    {
        "InvalidConfig"
    } else if matches!(
        err.downcast_ref::<breath_core::error::SessionError>(),
        Some(breath_core::error::SessionError::Timeout)
    ) {
        "SensorTimeout"
    } else {
        "Error"
    };

    json!({ "reason": reason, "message": humanize(err) }).to_string()
}
