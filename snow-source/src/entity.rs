use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// An axis-aligned lon/lat rectangle in degrees (EPSG:4326).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

/// Contiguous United States.
pub const CONUS: Region = Region {
    west: -125.0,
    south: 24.0,
    east: -66.0,
    north: 50.0,
};

/// Global extent, poles excluded.
pub const GLOBAL: Region = Region {
    west: -180.0,
    south: -60.0,
    east: 180.0,
    north: 75.0,
};

impl Region {
    /// Check the rectangle is well-formed, returning a description of the
    /// first problem found.
    pub fn validate(&self) -> Result<(), String> {
        let coords = [self.west, self.south, self.east, self.north];
        if coords.iter().any(|c| !c.is_finite()) {
            return Err("region has non-finite coordinates".to_string());
        }
        if self.west < -180.0 || self.east > 180.0 {
            return Err(format!(
                "longitudes {}..{} outside [-180, 180]",
                self.west, self.east
            ));
        }
        if self.south < -90.0 || self.north > 90.0 {
            return Err(format!(
                "latitudes {}..{} outside [-90, 90]",
                self.south, self.north
            ));
        }
        if self.west >= self.east || self.south >= self.north {
            return Err(format!(
                "degenerate rectangle [{}, {}, {}, {}]",
                self.west, self.south, self.east, self.north
            ));
        }
        Ok(())
    }

    /// The four corners as a closed ring, counter-clockwise from south-west.
    pub fn ring(&self) -> [[f64; 2]; 5] {
        [
            [self.west, self.south],
            [self.east, self.south],
            [self.east, self.north],
            [self.west, self.north],
            [self.west, self.south],
        ]
    }

    pub fn to_geojson(&self) -> Value {
        json!({ "type": "Polygon", "coordinates": [self.ring()] })
    }
}

/// Where an entity lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Geometry {
    Point { lon: f64, lat: f64 },
    Region(Region),
    /// A station addressed by its network code (e.g. "335:CO:SNTL").
    Station { code: String },
}

impl Geometry {
    /// GeoJSON geometry for the remote services. Stations have no
    /// coordinates of their own and map to `null`.
    pub fn to_geojson(&self) -> Value {
        match self {
            Geometry::Point { lon, lat } => json!({ "type": "Point", "coordinates": [lon, lat] }),
            Geometry::Region(region) => region.to_geojson(),
            Geometry::Station { .. } => Value::Null,
        }
    }
}

/// A spatial point, pixel, region or station that series are requested for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub geometry: Geometry,
}

impl Entity {
    pub fn point(id: &str, lon: f64, lat: f64) -> Self {
        Entity {
            id: id.to_string(),
            geometry: Geometry::Point { lon, lat },
        }
    }

    pub fn station(id: &str, code: &str) -> Self {
        Entity {
            id: id.to_string(),
            geometry: Geometry::Station {
                code: code.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conus_is_valid() {
        assert!(CONUS.validate().is_ok());
        assert!(GLOBAL.validate().is_ok());
    }

    #[test]
    fn test_degenerate_region_rejected() {
        let flipped = Region {
            west: -66.0,
            south: 24.0,
            east: -125.0,
            north: 50.0,
        };
        assert!(flipped.validate().is_err());
        let outside = Region {
            west: -190.0,
            ..CONUS
        };
        assert!(outside.validate().is_err());
    }

    #[test]
    fn test_ring_is_closed() {
        let ring = CONUS.ring();
        assert_eq!(ring[0], ring[4]);
        assert_eq!(ring[2], [-66.0, 50.0]);
    }

    #[test]
    fn test_point_geojson() {
        let e = Entity::point("Rockies", -106.5, 39.5);
        let gj = e.geometry.to_geojson();
        assert_eq!(gj["type"], "Point");
        assert_eq!(gj["coordinates"][0], -106.5);
        assert_eq!(Entity::station("x", "335:CO:SNTL").geometry.to_geojson(), Value::Null);
    }
}
