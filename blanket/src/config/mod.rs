use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub server: ServerSettings,
    pub telemetry: TelemetrySettings,
    pub data: DataSettings,
    #[serde(default)]
    pub form: FormSettings,
    /// Overrides for the constants shipped in the page data.
    #[serde(default)]
    pub konstanter: ConstantOverrides,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct TelemetrySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// OTLP collector, e.g. http://tempo:4317. Spans are not exported when unset.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Deserialize, Clone, Debug)]
pub struct DataSettings {
    /// JSON file with rates, tables, constants and role bindings. A relative
    /// path is taken from the configuration directory.
    pub page_data_path: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct FormSettings {
    #[serde(default = "default_code_width")]
    pub varekode_bredde: usize,
}

impl Default for FormSettings {
    fn default() -> Self {
        Self {
            varekode_bredde: default_code_width(),
        }
    }
}

fn default_code_width() -> usize {
    3
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct ConstantOverrides {
    #[serde(rename = "tillaegsafgift_faktor", default)]
    pub surcharge_factor: Option<Decimal>,
    #[serde(rename = "ekspeditionsgebyr", default)]
    pub handling_fee: Option<Decimal>,
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("Failed to determine the current directory: {}", e)))?;

    // Running from the workspace root or from inside blanket/
    let configuration_directory = if base_path.ends_with("blanket") {
        base_path.join("config")
    } else {
        base_path.join("blanket").join("config")
    };

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")).required(true))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let mut settings = settings.try_deserialize::<Settings>()?;
    settings.data.page_data_path =
        resolve_data_path(&configuration_directory, &settings.data.page_data_path);
    Ok(settings)
}

fn resolve_data_path(configuration_directory: &Path, path: &str) -> String {
    let path = Path::new(path);
    if path.is_absolute() {
        return path.display().to_string();
    }
    configuration_directory.join(path).display().to_string()
}
