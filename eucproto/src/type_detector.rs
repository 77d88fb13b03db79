//! WheelTypeDetector (spec §4.7): classifies a wheel from its discovered
//! GATT services plus an optional advertised device name.

use crate::state::WheelType;

/// One discovered GATT service and its characteristics, as reported by the
/// platform's service-discovery callback (spec §6.1 `on_services_discovered`).
#[derive(Clone, Debug)]
pub struct DiscoveredService {
    pub service_uuid: String,
    pub characteristic_uuids: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct DiscoveredServices {
    pub services: Vec<DiscoveredService>,
}

impl DiscoveredServices {
    pub fn has_service(&self, uuid_prefix: &str) -> bool {
        self.services
            .iter()
            .any(|s| s.service_uuid.to_uppercase().starts_with(&uuid_prefix.to_uppercase()))
    }

    pub fn service_has_characteristic(&self, service_prefix: &str, char_prefix: &str) -> bool {
        self.services.iter().any(|s| {
            s.service_uuid.to_uppercase().starts_with(&service_prefix.to_uppercase())
                && s.characteristic_uuids
                    .iter()
                    .any(|c| c.to_uppercase().starts_with(&char_prefix.to_uppercase()))
        })
    }
}

pub const NORDIC_UART_SERVICE: &str = "6E400001";
pub const NORDIC_UART_RX: &str = "6E400002";
pub const NORDIC_UART_TX: &str = "6E400003";
pub const FFE0_SERVICE: &str = "0000FFE0";
pub const FFE4_CHAR: &str = "FFE4";
pub const FFE5_SERVICE: &str = "0000FFE5";
pub const FFE9_CHAR: &str = "FFE9";
pub const FFF0_SERVICE: &str = "0000FFF0";

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Clone, Debug)]
pub struct Detection {
    pub wheel_type: WheelType,
    pub confidence: Confidence,
}

/// The outcome of classification: a concrete detection, confirmed-ambiguous
/// (requires an [`crate::decoder::autodetect::AutoDetectDecoder`]), or
/// entirely unknown.
#[derive(Clone, Debug)]
pub enum DetectionResult {
    Detected(Detection),
    Ambiguous,
    Unknown,
}

/// Applies spec §4.7's six ordered rules.
pub fn detect(services: &DiscoveredServices, device_name: Option<&str>) -> DetectionResult {
    if services.service_has_characteristic(NORDIC_UART_SERVICE, FFE4_CHAR) {
        return DetectionResult::Detected(Detection {
            wheel_type: WheelType::InMotionV2,
            confidence: Confidence::High,
        });
    }
    if services.has_service(NORDIC_UART_SERVICE) {
        return DetectionResult::Detected(Detection {
            wheel_type: WheelType::NinebotZ,
            confidence: Confidence::High,
        });
    }
    if services.service_has_characteristic(FFE0_SERVICE, FFE4_CHAR)
        && services.service_has_characteristic(FFE5_SERVICE, FFE9_CHAR)
    {
        return DetectionResult::Detected(Detection {
            wheel_type: WheelType::InMotion,
            confidence: Confidence::High,
        });
    }
    if services.has_service(FFF0_SERVICE) {
        return DetectionResult::Detected(Detection {
            wheel_type: WheelType::Kingsong,
            confidence: Confidence::High,
        });
    }
    if services.has_service(FFE0_SERVICE) {
        if let Some(name) = device_name {
            let upper = name.to_uppercase();
            if ["VETERAN", "SHERMAN", "LYNX", "PATTON", "ABRAMS"]
                .iter()
                .any(|t| upper.contains(t))
            {
                return DetectionResult::Detected(Detection {
                    wheel_type: WheelType::Veteran,
                    confidence: Confidence::Medium,
                });
            }
            if [
                "GW", "GOTWAY", "BEGODE", "MCMASTER", "NIKOLA", "MONSTER", "MSP", "RSHS", "EX.N",
                "HERO", "MASTER",
            ]
            .iter()
            .any(|t| upper.contains(t))
            {
                return DetectionResult::Detected(Detection {
                    wheel_type: WheelType::Gotway,
                    confidence: Confidence::Medium,
                });
            }
            if upper.starts_with("KS-") || upper.starts_with("KS") || upper.contains("KINGSONG") {
                return DetectionResult::Detected(Detection {
                    wheel_type: WheelType::Kingsong,
                    confidence: Confidence::Medium,
                });
            }
            if upper.contains("NINEBOT") || upper.contains("NB-") {
                return DetectionResult::Detected(Detection {
                    wheel_type: WheelType::Ninebot,
                    confidence: Confidence::Medium,
                });
            }
        }
        return DetectionResult::Ambiguous;
    }
    DetectionResult::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    fn services_with(uuid: &str, chars: &[&str]) -> DiscoveredServices {
        DiscoveredServices {
            services: vec![DiscoveredService {
                service_uuid: uuid.to_string(),
                characteristic_uuids: chars.iter().map(|s| s.to_string()).collect(),
            }],
        }
    }

    #[test]
    fn nordic_uart_with_ffe4_is_inmotion_v2() {
        let svcs = services_with(NORDIC_UART_SERVICE, &[FFE4_CHAR]);
        let result = detect(&svcs, None);
        match result {
            DetectionResult::Detected(d) => {
                assert_eq!(d.wheel_type, WheelType::InMotionV2);
                assert_eq!(d.confidence, Confidence::High);
            }
            _ => panic!("expected detection"),
        }
    }

    #[test]
    fn nordic_uart_alone_is_ninebot_z() {
        let svcs = services_with(NORDIC_UART_SERVICE, &["6E400002"]);
        match detect(&svcs, None) {
            DetectionResult::Detected(d) => assert_eq!(d.wheel_type, WheelType::NinebotZ),
            _ => panic!("expected detection"),
        }
    }

    #[test]
    fn ffe0_with_veteran_name_token() {
        let svcs = services_with(FFE0_SERVICE, &["FFE1"]);
        match detect(&svcs, Some("VETERAN Sherman Max")) {
            DetectionResult::Detected(d) => assert_eq!(d.wheel_type, WheelType::Veteran),
            _ => panic!("expected detection"),
        }
    }

    #[test]
    fn ffe0_without_name_is_ambiguous() {
        let svcs = services_with(FFE0_SERVICE, &["FFE1"]);
        assert!(matches!(detect(&svcs, None), DetectionResult::Ambiguous));
    }

    #[test]
    fn no_known_service_is_unknown() {
        let svcs = services_with("0000ABCD", &[]);
        assert!(matches!(detect(&svcs, None), DetectionResult::Unknown));
    }
}
