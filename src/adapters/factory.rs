//! Brand registry and adapter construction.
//!
//! Protocol divergence is resolved here: a device row declares a brand, the
//! factory maps it (including vendor short codes and localized names) onto
//! one of the two probe implementations.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::dahua::DahuaAdapter;
use super::hikvision::HikvisionAdapter;
use super::{ConnectionFacts, ConnectionTest, DeviceStatusProbe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Brand {
    Hikvision,
    Dahua,
}

impl Brand {
    /// Resolve a brand string, accepting canonical codes, vendor short codes
    /// and localized names, case-insensitively.
    pub fn parse(input: &str) -> Result<Self> {
        match input.trim().to_uppercase().as_str() {
            "HIKVISION" | "海康威视" | "海康" | "HK" => Ok(Brand::Hikvision),
            "DAHUA" | "大华" | "DH" => Ok(Brand::Dahua),
            _ => Err(Error::UnsupportedBrand(input.to_string())),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Brand::Hikvision => "HIKVISION",
            Brand::Dahua => "DAHUA",
        }
    }
}

impl std::fmt::Display for Brand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BrandInfo {
    pub code: &'static str,
    pub display_name: &'static str,
    pub short_name: &'static str,
}

/// Supported brands in a fixed presentation order.
pub fn supported_brands() -> &'static [BrandInfo] {
    const BRANDS: &[BrandInfo] = &[
        BrandInfo {
            code: "HIKVISION",
            display_name: "海康威视",
            short_name: "海康",
        },
        BrandInfo {
            code: "DAHUA",
            display_name: "大华",
            short_name: "大华",
        },
    ];
    BRANDS
}

pub struct AdapterFactory;

impl AdapterFactory {
    pub fn create(brand: Brand, facts: &ConnectionFacts) -> Box<dyn DeviceStatusProbe> {
        match brand {
            Brand::Hikvision => Box::new(HikvisionAdapter::new(facts)),
            Brand::Dahua => Box::new(DahuaAdapter::new(facts)),
        }
    }

    /// Resolve the brand string and build the adapter in one step.
    pub fn create_from_str(
        brand: &str,
        facts: &ConnectionFacts,
    ) -> Result<Box<dyn DeviceStatusProbe>> {
        Ok(Self::create(Brand::parse(brand)?, facts))
    }

    /// Connectivity test for the administrative layer's "test connection"
    /// button. Never fails: unknown brands and probe errors both come back
    /// as an unsuccessful result with a message.
    pub async fn test_connection(brand: &str, facts: &ConnectionFacts) -> ConnectionTest {
        match Self::create_from_str(brand, facts) {
            Ok(adapter) => adapter.test_connection().await,
            Err(e) => ConnectionTest {
                success: false,
                message: e.to_string(),
            },
        }
    }
}
