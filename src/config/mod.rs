use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub geoip: GeoIpConfig,
    pub charts: ChartConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoIpConfig {
    /// Path to the `ip_range_start,ip_range_end,country_code` dataset
    pub dataset: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    /// Directory the per-granularity chart artifacts are written to
    pub output_dir: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./db/stats.sqlite".to_string());
        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()?;

        let dataset = std::env::var("GEOIP_DATASET")
            .unwrap_or_else(|_| "./data/geo-whois-asn-country-ipv4-num.csv".to_string());

        let output_dir =
            std::env::var("CHART_OUTPUT_DIR").unwrap_or_else(|_| "./view/js".to_string());

        Ok(Config {
            database: DatabaseConfig {
                url,
                max_connections,
            },
            geoip: GeoIpConfig { dataset },
            charts: ChartConfig { output_dir },
        })
    }
}
