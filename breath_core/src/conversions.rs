//! Mappings from the serde config schema (`breath_config`) into the
//! core's runtime config structs. The core stays serde-free; the CLI
//! converts with `(&cfg.filter).into()` etc.

use crate::{ActuatorCfg, AdaptiveCfg, FilterCfg, SessionCfg, Timeouts};

impl From<&breath_config::FilterCfg> for FilterCfg {
    fn from(c: &breath_config::FilterCfg) -> Self {
        Self {
            order: c.order,
            cutoff_hz: c.cutoff_hz,
            sample_rate_hz: c.sample_rate_hz,
        }
    }
}

impl From<&breath_config::SessionCfg> for SessionCfg {
    fn from(c: &breath_config::SessionCfg) -> Self {
        Self {
            warmup_s: c.warmup_s,
            mirror_s: c.mirror_s,
            fallback_target_s: c.fallback_target_s,
            min_breath_guide_s: c.min_breath_guide_s,
            min_breath_mirror_s: c.min_breath_mirror_s,
        }
    }
}

impl From<&breath_config::AdaptiveCfg> for AdaptiveCfg {
    fn from(c: &breath_config::AdaptiveCfg) -> Self {
        Self {
            sampling_window: c.sampling_window,
            success_threshold_pct: c.success_threshold_pct,
            fail_threshold_pct: c.fail_threshold_pct,
            increase_breath_s: c.increase_breath_s,
        }
    }
}

impl From<&breath_config::ActuatorCfg> for ActuatorCfg {
    fn from(c: &breath_config::ActuatorCfg) -> Self {
        Self {
            max_distance: c.max_distance,
        }
    }
}

impl From<&breath_config::Timeouts> for Timeouts {
    fn from(c: &breath_config::Timeouts) -> Self {
        Self {
            sensor_ms: c.sensor_ms,
        }
    }
}
