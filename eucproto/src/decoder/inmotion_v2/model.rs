//! The InMotion V2 model registry (spec §9 design notes): a static table of
//! `(series, type) → {display_name, max_speed, cell_count, layout_id}` that
//! selects the real-time-frame parser variant once `MainInfo` (cmd `0x01`)
//! identifies the connected wheel.

use lazy_static::lazy_static;
use std::collections::HashMap;

/// Which of the five real-time-frame field layouts a model uses (spec
/// §4.2.4: "five distinct layouts (V11 v1, V11 v2, V12 family, V13 family,
/// V14 family)").
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LayoutId {
    /// Selected between V11V1/V11V2 once a versions (`0x06`) frame arrives;
    /// defaults to V11V1 until then.
    V11V1,
    V11V2,
    V12Family,
    V13Family,
    V14Family,
}

#[derive(Clone, Copy, Debug)]
pub struct ModelInfo {
    pub display_name: &'static str,
    pub max_speed_kmh: f64,
    pub cell_count: usize,
    pub layout: LayoutId,
}

/// `model_id = series * 10 + type` (spec §4.2.4).
pub fn model_id(series: u8, kind: u8) -> u8 {
    series * 10 + kind
}

lazy_static! {
    pub static ref MODEL_REGISTRY: HashMap<u8, ModelInfo> = {
        use LayoutId::*;
        let mut m = HashMap::new();
        let mut add = |series: u8, kind: u8, display_name: &'static str, max_speed_kmh: f64, cell_count: usize, layout: LayoutId| {
            m.insert(
                model_id(series, kind),
                ModelInfo { display_name, max_speed_kmh, cell_count, layout },
            );
        };

        add(1, 1, "V11", 50.0, 45, V11V1);
        add(1, 2, "V11Y", 50.0, 45, V11V1);
        add(1, 3, "V11Lite", 45.0, 30, V11V2);
        add(2, 0, "V12", 50.0, 45, V12Family);
        add(2, 1, "V12HT", 55.0, 45, V12Family);
        add(2, 2, "V12Pro", 50.0, 45, V12Family);
        add(3, 0, "V13", 50.0, 45, V13Family);
        add(3, 1, "V13Pro", 55.0, 60, V13Family);
        add(3, 2, "V14", 55.0, 60, V14Family);
        add(4, 0, "V14", 55.0, 60, V14Family);
        add(4, 1, "V14Pro", 60.0, 60, V14Family);
        add(5, 0, "V5", 45.0, 30, V12Family);
        add(5, 1, "V5F", 45.0, 30, V12Family);

        m
    };
}

pub fn lookup(id: u8) -> Option<&'static ModelInfo> {
    MODEL_REGISTRY.get(&id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_id_packs_series_and_type() {
        assert_eq!(model_id(1, 1), 11);
        assert_eq!(model_id(3, 2), 32);
    }

    #[test]
    fn known_models_resolve() {
        assert_eq!(lookup(model_id(1, 1)).unwrap().display_name, "V11");
        assert_eq!(lookup(model_id(4, 1)).unwrap().display_name, "V14Pro");
        assert!(lookup(250).is_none());
    }
}
