//! Bicycle catalog records and the stations derived from them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BicycleStatus {
    #[default]
    Available,
    Maintenance,
    Retired,
}

/// A catalog record. The `name` doubles as the station name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bicycle {
    pub id: String,
    pub name: String,
    pub location: String,
    pub hourly_rate: f64,
    pub daily_rate: f64,
    #[serde(default)]
    pub status: BicycleStatus,
}

impl Bicycle {
    pub fn station_key(&self) -> String {
        station_key(&self.name, &self.location)
    }
}

/// Request body for adding a bicycle to the catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBicycleRequest {
    pub name: String,
    pub location: String,
    pub hourly_rate: f64,
    pub daily_rate: f64,
    #[serde(default)]
    pub status: BicycleStatus,
}

/// A station as seen by riders, grouped from catalog records.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub key: String,
    pub name: String,
    pub location: String,
    pub hourly_rate: f64,
    pub daily_rate: f64,
    pub bicycle_count: usize,
    /// Catalog record recorded as `bikeId` on rentals from this station
    pub bike_id: String,
}

/// Compound station identifier used to namespace slot registries.
pub fn station_key(name: &str, location: &str) -> String {
    format!("{}_{}", name, location)
}

/// Group catalog records into stations, in first-seen order.
///
/// Rates come from the first record of each station.
pub fn stations_from_catalog(bicycles: &[Bicycle]) -> Vec<Station> {
    let mut stations: Vec<Station> = Vec::new();
    for bike in bicycles {
        let key = bike.station_key();
        match stations.iter_mut().find(|s| s.key == key) {
            Some(station) => station.bicycle_count += 1,
            None => stations.push(Station {
                key,
                name: bike.name.clone(),
                location: bike.location.clone(),
                hourly_rate: bike.hourly_rate,
                daily_rate: bike.daily_rate,
                bicycle_count: 1,
                bike_id: bike.id.clone(),
            }),
        }
    }
    stations
}

pub fn find_station(bicycles: &[Bicycle], key: &str) -> Option<Station> {
    stations_from_catalog(bicycles)
        .into_iter()
        .find(|s| s.key == key)
}
