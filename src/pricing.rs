//! Ride fare pricing.
//!
//! Pure fare arithmetic: a base amount per service package plus distance and
//! duration components derived from the previewed route. Amounts are rupees.

use serde::Deserialize;

use crate::proto::{RideFare, Route};

/// Base fares per service package.
pub const BASE_PACKAGE_FARES: [(&str, f64); 4] = [
    ("bike", 50.0),
    ("auto", 70.0),
    ("sedan", 100.0),
    ("suv", 150.0),
];

/// Pricing coefficients applied on top of the package base fare.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Fare per kilometer of route distance.
    pub price_per_km: f64,
    /// Fare per minute of estimated ride duration.
    pub price_per_minute: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            price_per_km: 15.0,
            price_per_minute: 2.0,
        }
    }
}

/// Estimate one fare per package for the given route.
///
/// The returned fares carry no id or rider; the trip service fills those in
/// when it persists them.
pub fn estimate_packages(route: &Route, config: &PricingConfig) -> Vec<RideFare> {
    BASE_PACKAGE_FARES
        .iter()
        .map(|(slug, base)| RideFare {
            id: String::new(),
            rider_id: String::new(),
            package_slug: (*slug).to_string(),
            total_fare: estimate_fare(route, *base, config),
            route: None,
        })
        .collect()
}

fn estimate_fare(route: &Route, base_fare: f64, config: &PricingConfig) -> f64 {
    // The routing backend reports meters and seconds.
    let distance_km = route.distance / 1000.0;
    let duration_minutes = route.duration / 60.0;

    base_fare + distance_km * config.price_per_km + duration_minutes * config.price_per_minute
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(distance_m: f64, duration_s: f64) -> Route {
        Route {
            distance: distance_m,
            duration: duration_s,
            geometry: vec![],
        }
    }

    #[test]
    fn estimates_one_fare_per_package() {
        let fares = estimate_packages(&route(0.0, 0.0), &PricingConfig::default());

        let slugs: Vec<&str> = fares.iter().map(|f| f.package_slug.as_str()).collect();
        assert_eq!(slugs, ["bike", "auto", "sedan", "suv"]);

        // Zero-length route collapses to the base fares.
        let totals: Vec<f64> = fares.iter().map(|f| f.total_fare).collect();
        assert_eq!(totals, [50.0, 70.0, 100.0, 150.0]);
    }

    #[test]
    fn distance_and_duration_components_are_added() {
        let config = PricingConfig {
            price_per_km: 10.0,
            price_per_minute: 1.0,
        };
        // 5 km, 12 minutes.
        let fares = estimate_packages(&route(5_000.0, 720.0), &config);

        let sedan = fares.iter().find(|f| f.package_slug == "sedan").unwrap();
        assert!((sedan.total_fare - (100.0 + 50.0 + 12.0)).abs() < f64::EPSILON);
    }
}
