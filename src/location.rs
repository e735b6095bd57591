// src/location.rs
use crate::errors::LocationError;
use crate::timings_api::APP_USER_AGENT;
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use url::Url;

pub const IPAPI_URL: &str = "https://ipapi.co/json/";
pub const IPINFO_URL: &str = "https://ipinfo.io/json";
pub const DEFAULT_GEOCODER_BASE_URL: &str = "https://nominatim.openstreetmap.org";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    latitude: f64,
    longitude: f64,
}

impl Coordinates {
    /// Exactly (0, 0) is what failed geolocation reports, so it counts as unavailable.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, LocationError> {
        let in_range: bool =
            (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude);
        if !in_range || (latitude == 0.0 && longitude == 0.0) {
            return Err(LocationError::InvalidCoordinates { latitude, longitude });
        }
        Ok(Self { latitude, longitude })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Located {
    pub coordinates: Coordinates,
    pub label: Option<String>,
}

impl fmt::Display for Located {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{} ({})", label, self.coordinates),
            None => write!(f, "{}", self.coordinates),
        }
    }
}

#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn locate(&self) -> Result<Located, LocationError>;
}

// ===== Manual / configured coordinates
pub struct FixedLocation {
    located: Located,
}

impl FixedLocation {
    pub fn new(coordinates: Coordinates, label: Option<String>) -> Self {
        Self { located: Located { coordinates, label } }
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn locate(&self) -> Result<Located, LocationError> {
        Ok(self.located.clone())
    }
}

// ===== IP geolocation with fallback
#[derive(Debug, Deserialize)]
struct IpapiResponse {
    latitude: Option<f64>,
    longitude: Option<f64>,
    city: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IpinfoResponse {
    loc: Option<String>,
    city: Option<String>,
}

pub struct IpLocator {
    client: Client,
    primary_url: String,
    fallback_url: String,
}

impl IpLocator {
    pub fn new() -> Result<Self, LocationError> {
        Self::with_endpoints(IPAPI_URL, IPINFO_URL)
    }

    pub fn with_endpoints(primary_url: &str, fallback_url: &str) -> Result<Self, LocationError> {
        let client: Client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .map_err(|e| LocationError::Unavailable(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            primary_url: primary_url.to_string(),
            fallback_url: fallback_url.to_string(),
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T, String> {
        let response = self.client.get(url).send().await.map_err(|e| e.to_string())?;
        let response = response.error_for_status().map_err(|e| e.to_string())?;
        response.json::<T>().await.map_err(|e| e.to_string())
    }

    async fn try_primary(&self) -> Result<Located, String> {
        let body: IpapiResponse = self.get_json(&self.primary_url).await?;
        match (body.latitude, body.longitude) {
            (Some(lat), Some(lon)) => Coordinates::new(lat, lon)
                .map(|coordinates| Located { coordinates, label: body.city })
                .map_err(|e| e.to_string()),
            _ => Err("response carried no coordinates".to_string()),
        }
    }

    async fn try_fallback(&self) -> Result<Located, String> {
        let body: IpinfoResponse = self.get_json(&self.fallback_url).await?;
        let loc: String = body.loc.ok_or_else(|| "response carried no loc".to_string())?;
        let coordinates: Coordinates = parse_loc(&loc)?;
        Ok(Located { coordinates, label: body.city })
    }
}

// ipinfo reports "lat,lon"
fn parse_loc(loc: &str) -> Result<Coordinates, String> {
    let (lat, lon) = loc.split_once(',').ok_or_else(|| format!("bad loc {:?}", loc))?;
    let lat: f64 = lat.trim().parse().map_err(|_| format!("bad latitude in {:?}", loc))?;
    let lon: f64 = lon.trim().parse().map_err(|_| format!("bad longitude in {:?}", loc))?;
    Coordinates::new(lat, lon).map_err(|e| e.to_string())
}

#[async_trait]
impl LocationProvider for IpLocator {
    async fn locate(&self) -> Result<Located, LocationError> {
        match self.try_primary().await {
            Ok(located) => {
                info!("IpLocator: located via {}: {}", self.primary_url, located);
                return Ok(located);
            }
            Err(e) => warn!("IpLocator: {} failed: {}. Trying fallback.", self.primary_url, e),
        }
        match self.try_fallback().await {
            Ok(located) => {
                info!("IpLocator: located via {}: {}", self.fallback_url, located);
                Ok(located)
            }
            Err(e) => Err(LocationError::Unavailable(format!(
                "both IP lookups failed, last error from {}: {}",
                self.fallback_url, e
            ))),
        }
    }
}

// ===== City name geocoding (OpenStreetMap Nominatim)
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: Option<String>,
}

pub struct CityGeocoder {
    client: Client,
    base_url: String,
    city: String,
}

impl CityGeocoder {
    pub fn new(city: &str, base_url: &str) -> Result<Self, LocationError> {
        // Nominatim refuses requests without an identifying user agent
        let client: Client = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| LocationError::Unavailable(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            city: city.trim().to_string(),
        })
    }

    fn search_url(&self) -> Result<Url, LocationError> {
        let endpoint: String = format!("{}/search", self.base_url);
        Url::parse_with_params(&endpoint, &[("q", self.city.as_str()), ("format", "json"), ("limit", "1")])
            .map_err(|e| LocationError::Unavailable(format!("{}: {}", endpoint, e)))
    }
}

#[async_trait]
impl LocationProvider for CityGeocoder {
    async fn locate(&self) -> Result<Located, LocationError> {
        let url: Url = self.search_url()?;
        debug!("CityGeocoder: searching {}", url);
        let unavailable = |e: reqwest::Error| LocationError::Unavailable(format!("geocoding {:?}: {}", self.city, e));

        let response = self.client.get(url).send().await.map_err(unavailable)?;
        let places: Vec<NominatimPlace> =
            response.error_for_status().map_err(unavailable)?.json().await.map_err(unavailable)?;

        let place: NominatimPlace =
            places.into_iter().next().ok_or_else(|| LocationError::NotFound(self.city.clone()))?;
        let (Ok(lat), Ok(lon)) = (place.lat.trim().parse::<f64>(), place.lon.trim().parse::<f64>()) else {
            return Err(LocationError::Unavailable(format!(
                "geocoder returned unreadable coordinates {:?}, {:?}",
                place.lat, place.lon
            )));
        };
        let located = Located {
            coordinates: Coordinates::new(lat, lon)?,
            label: Some(place.display_name.unwrap_or_else(|| self.city.clone())),
        };
        info!("CityGeocoder: {:?} resolved to {}", self.city, located);
        Ok(located)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[test]
    fn test_coordinates_validation() {
        assert!(Coordinates::new(21.4225, 39.8262).is_ok());
        assert!(Coordinates::new(-90.0, 180.0).is_ok());
        assert!(Coordinates::new(0.0, 0.0).is_err());
        assert!(Coordinates::new(90.5, 10.0).is_err());
        assert!(Coordinates::new(10.0, -180.5).is_err());
        assert!(Coordinates::new(f64::NAN, 10.0).is_err());
    }

    #[test]
    fn test_parse_loc() {
        let c = parse_loc("40.7128,-74.0060").unwrap();
        assert_eq!(c.latitude(), 40.7128);
        assert_eq!(c.longitude(), -74.006);
        assert!(parse_loc("40.7128").is_err());
        assert!(parse_loc("north,west").is_err());
    }

    #[tokio::test]
    async fn test_fixed_location() {
        let provider = FixedLocation::new(Coordinates::new(24.4539, 54.3773).unwrap(), Some("Manual".into()));
        let located = provider.locate().await.unwrap();
        assert_eq!(located.label.as_deref(), Some("Manual"));
        assert_eq!(located.to_string(), "Manual (24.4539, 54.3773)");
    }

    #[tokio::test]
    async fn test_ip_locator_uses_primary() {
        let mut server = mockito::Server::new_async().await;
        let _primary = server
            .mock("GET", "/primary")
            .with_status(200)
            .with_body(r#"{"latitude": 33.6844, "longitude": 73.0479, "city": "Islamabad"}"#)
            .create_async()
            .await;

        let locator = IpLocator::with_endpoints(
            &format!("{}/primary", server.url()),
            &format!("{}/fallback", server.url()),
        )
        .unwrap();
        let located = locator.locate().await.unwrap();
        assert_eq!(located.label.as_deref(), Some("Islamabad"));
        assert_eq!(located.coordinates.latitude(), 33.6844);
    }

    #[tokio::test]
    async fn test_ip_locator_falls_back() {
        let mut server = mockito::Server::new_async().await;
        let _primary = server.mock("GET", "/primary").with_status(429).create_async().await;
        let _fallback = server
            .mock("GET", "/fallback")
            .with_status(200)
            .with_body(r#"{"loc": "51.5074,-0.1278", "city": "London"}"#)
            .create_async()
            .await;

        let locator = IpLocator::with_endpoints(
            &format!("{}/primary", server.url()),
            &format!("{}/fallback", server.url()),
        )
        .unwrap();
        let located = locator.locate().await.unwrap();
        assert_eq!(located.label.as_deref(), Some("London"));
        assert_eq!(located.coordinates.longitude(), -0.1278);
    }

    // SAD PATHS

    #[tokio::test]
    async fn test_ip_locator_both_failing_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _primary = server
            .mock("GET", "/primary")
            .with_status(200)
            .with_body(r#"{"error": true, "reason": "RateLimited"}"#)
            .create_async()
            .await;
        let _fallback = server.mock("GET", "/fallback").with_status(500).create_async().await;

        let locator = IpLocator::with_endpoints(
            &format!("{}/primary", server.url()),
            &format!("{}/fallback", server.url()),
        )
        .unwrap();
        assert!(matches!(locator.locate().await, Err(LocationError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_city_geocoder_resolves_city() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/search")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "Karachi, Pakistan".into()),
                Matcher::UrlEncoded("format".into(), "json".into()),
                Matcher::UrlEncoded("limit".into(), "1".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"lat": "24.8607", "lon": "67.0011", "display_name": "Karachi, Sindh, Pakistan"}]"#)
            .create_async()
            .await;

        let geocoder = CityGeocoder::new(" Karachi, Pakistan ", &server.url()).unwrap();
        let located = geocoder.locate().await.unwrap();

        mock.assert_async().await;
        assert_eq!(located.label.as_deref(), Some("Karachi, Sindh, Pakistan"));
        assert_eq!(located.coordinates.latitude(), 24.8607);
        assert_eq!(located.coordinates.longitude(), 67.0011);
    }

    #[tokio::test]
    async fn test_city_geocoder_unknown_city_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/search")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;

        let geocoder = CityGeocoder::new("Atlantis", &server.url()).unwrap();
        match geocoder.locate().await {
            Err(LocationError::NotFound(city)) => assert_eq!(city, "Atlantis"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_city_geocoder_server_error_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("GET", "/search").match_query(Matcher::Any).with_status(503).create_async().await;

        let geocoder = CityGeocoder::new("Riyadh", &server.url()).unwrap();
        assert!(matches!(geocoder.locate().await, Err(LocationError::Unavailable(_))));
    }
}
