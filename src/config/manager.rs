//! Configuration file wrangling
// (c) 2024 Ross Younger

use super::{structure::redact, Configuration, BASE_CONFIG_FILENAME};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    value::Value,
    Figment, Metadata, Provider,
};
use serde::Deserialize;
use std::{fmt::Display, path::Path, path::PathBuf};
use tabled::{settings::style::Style, Table, Tabled};

use tracing::{trace, warn};

// PATHS /////////////////////////////////////////////////////////////////////////////////////////////////////

fn user_config_path() -> Option<PathBuf> {
    // ~/.<filename> for now
    let Some(mut d) = dirs::home_dir() else {
        warn!("could not determine user home directory");
        return None;
    };
    d.push(format!(".{BASE_CONFIG_FILENAME}"));
    Some(d)
}

fn system_config_path() -> PathBuf {
    // /etc/<filename> for now
    let mut p: PathBuf = PathBuf::new();
    p.push("/etc");
    p.push(BASE_CONFIG_FILENAME);
    p
}

// ENVIRONMENT ////////////////////////////////////////////////////////////////////////////////////////////////

/// Environment variables with established names, mapped onto configuration fields
const LEGACY_ENV: &[(&str, &str)] = &[
    ("SSH_PRIVATE_KEY_PATH", "ssh_key"),
    ("FTP_PASSWORD", "ftp_password"),
];

/// Prefix for environment variables naming any configuration field, e.g. `XFER_RSYNC`
const ENV_PREFIX: &str = "XFER_";

fn legacy_env() -> Env {
    let names: Vec<&str> = LEGACY_ENV.iter().map(|(var, _)| *var).collect();
    Env::raw().only(&names).map(|key| {
        LEGACY_ENV
            .iter()
            .find(|(var, _)| key == *var)
            .map_or_else(|| key.as_str().to_ascii_lowercase(), |(_, field)| (*field).to_string())
            .into()
    })
}

// CONFIG MANAGER /////////////////////////////////////////////////////////////////////////////////////////////

/// Processes and merges all possible configuration sources.
///
/// Sources, lowest priority first: hard-wired defaults, the system file, the user file,
/// the environment, then anything merged in afterwards (typically the command line).
#[derive(Debug, Default)]
pub struct Manager {
    /// Configuration data
    data: Figment,
}

fn add_file(f: Figment, path: Option<PathBuf>, what: &str) -> Figment {
    let Some(path) = path else {
        return f;
    };
    if !path.exists() {
        trace!("{what} configuration file {path:?} not present");
        return f;
    }
    f.merge(Toml::file(path.as_path()))
}

impl Manager {
    /// Initialises this structure, reading the set of config files appropriate to the platform
    /// and the current user, and the environment.
    #[must_use]
    pub fn new() -> Self {
        let mut data = Figment::new().merge(Serialized::defaults(Configuration::default()));
        data = add_file(data, Some(system_config_path()), "system");
        // N.B. This may leave data in a fused-error state, if a data file isn't parseable.
        data = add_file(data, user_config_path(), "user");
        data = data.merge(legacy_env()).merge(Env::prefixed(ENV_PREFIX));
        Self { data }
    }

    /// Returns the list of configuration files we read, highest priority last.
    #[must_use]
    pub fn config_files() -> Vec<String> {
        [Some(system_config_path()), user_config_path()]
            .into_iter()
            .flatten()
            .map(|p| p.into_os_string().to_string_lossy().into())
            .collect()
    }

    /// Testing/internal constructor, does not read files or the environment
    #[must_use]
    pub fn without_files() -> Self {
        let data = Figment::new().merge(Serialized::defaults(Configuration::default()));
        Self { data }
    }

    /// Merges in a data set, which is some sort of [figment::Provider](https://docs.rs/figment/latest/figment/trait.Provider.html).
    pub fn merge_provider<T>(&mut self, provider: T)
    where
        T: Provider,
    {
        let f = std::mem::take(&mut self.data);
        self.data = f.merge(provider); // in the error case, this leaves the provider in a fused state
    }

    /// Merges in a data set from a TOML file
    pub fn merge_toml_file<T>(&mut self, toml: T)
    where
        T: AsRef<Path>,
    {
        self.merge_provider(Toml::file_exact(toml.as_ref()));
    }

    /// Attempts to extract a particular struct from the data.
    ///
    /// Within xfer, `T` is usually [Configuration], but it isn't intrinsically required to be.
    pub fn get<'de, T>(&self) -> anyhow::Result<T, figment::Error>
    where
        T: Deserialize<'de>,
    {
        self.data.extract::<T>()
    }
}

// PRETTY PRINT SUPPORT ///////////////////////////////////////////////////////////////////////////////////////

#[derive(Tabled)]
struct PrettyConfig {
    field: String,
    value: String,
    source: String,
}

impl PrettyConfig {
    fn render_source(meta: Option<&Metadata>) -> String {
        if let Some(m) = meta {
            m.source
                .as_ref()
                .map_or_else(|| m.name.to_string(), figment::Source::to_string)
        } else {
            String::new()
        }
    }

    fn render_value(value: &Value) -> String {
        match value {
            Value::String(_tag, s) => s.to_string(),
            Value::Char(_tag, c) => c.to_string(),
            Value::Bool(_tag, b) => b.to_string(),
            Value::Num(_tag, num) => num
                .to_i128()
                .map(|i| i.to_string())
                .or_else(|| num.to_u128().map(|u| u.to_string()))
                .or_else(|| num.to_f64().map(|f| f.to_string()))
                .unwrap_or_default(),
            Value::Empty(_tag, _) => "<empty>".into(),
            Value::Dict(_tag, dict) => format!("{{{} entries}}", dict.len()),
            Value::Array(_tag, vec) => {
                format!(
                    "[{}]",
                    vec.iter()
                        .map(PrettyConfig::render_value)
                        .collect::<Vec<_>>()
                        .join(",")
                )
            }
        }
    }

    fn new(field: &str, value: &Value, meta: Option<&Metadata>) -> Self {
        let value = if field == "ftp_password" {
            redact(&PrettyConfig::render_value(value)).to_string()
        } else {
            PrettyConfig::render_value(value)
        };
        Self {
            field: field.into(),
            value,
            source: PrettyConfig::render_source(meta),
        }
    }
}

impl Display for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = match self.data.data() {
            Ok(d) => d,
            Err(e) => {
                // This isn't terribly helpful as it doesn't have metadata attached; BUT attempting to get() a struct does.
                return write!(f, "error: {e}");
            }
        };
        let Some(data) = data.get(&figment::Profile::Default) else {
            return write!(f, "no configuration data");
        };

        let mut fields = Vec::<PrettyConfig>::new();

        for field in data.keys() {
            let value = match self.data.find_value(field) {
                Ok(v) => v,
                Err(e) => {
                    writeln!(f, "error on field {field}: {e}")?;
                    continue;
                }
            };
            let meta = self.data.find_metadata(field);
            fields.push(PrettyConfig::new(field, &value, meta));
        }
        write!(f, "{}", Table::new(fields).with(Style::sharp()))
    }
}
