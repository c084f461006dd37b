use figment::providers::{Format, Json, Toml, Yaml};
use std::path::Path;

/// Provider for an explicitly named config file, format chosen by extension.
/// Files without a known extension are sniffed; TOML is the fallback.
pub fn auto<P: AsRef<Path>>(path: P) -> impl figment::Provider {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    let format = match extension.as_str() {
        "toml" => ConfigFormat::Toml,
        "json" => ConfigFormat::Json,
        "yaml" | "yml" => ConfigFormat::Yaml,
        _ => {
            let detected = std::fs::read_to_string(path)
                .ok()
                .and_then(|content| detect_format_from_content(&content));
            tracing::debug!(
                "Config {} has no known extension, reading it as {:?}",
                path.display(),
                detected.unwrap_or(ConfigFormat::Toml)
            );
            detected.unwrap_or(ConfigFormat::Toml)
        }
    };

    match format {
        ConfigFormat::Toml => SmartProvider::Toml(Toml::file(path)),
        ConfigFormat::Json => SmartProvider::Json(Json::file(path)),
        ConfigFormat::Yaml => SmartProvider::Yaml(Yaml::file(path)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Toml,
    Json,
    Yaml,
}

enum SmartProvider {
    Toml(figment::providers::Data<Toml>),
    Json(figment::providers::Data<Json>),
    Yaml(figment::providers::Data<Yaml>),
}

impl figment::Provider for SmartProvider {
    fn metadata(&self) -> figment::Metadata {
        match self {
            SmartProvider::Toml(p) => p.metadata(),
            SmartProvider::Json(p) => p.metadata(),
            SmartProvider::Yaml(p) => p.metadata(),
        }
    }

    fn data(
        &self,
    ) -> Result<figment::value::Map<figment::Profile, figment::value::Dict>, figment::Error> {
        match self {
            SmartProvider::Toml(p) => p.data(),
            SmartProvider::Json(p) => p.data(),
            SmartProvider::Yaml(p) => p.data(),
        }
    }
}

fn detect_format_from_content(content: &str) -> Option<ConfigFormat> {
    let trimmed = content.trim();

    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(ConfigFormat::Json);
    }

    let lines = || trimmed.lines().map(str::trim).filter(|l| !l.starts_with('#'));

    if lines().any(|line| (line.starts_with('[') && line.ends_with(']')) || line.contains(" = ")) {
        return Some(ConfigFormat::Toml);
    }

    if trimmed.starts_with("---") || lines().any(|line| line.contains(": ") || line.ends_with(':')) {
        return Some(ConfigFormat::Yaml);
    }

    None
}
