use std::{collections::BTreeMap, fs, ops::RangeInclusive};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use validator::{Validate, ValidationError};

use shib_connect::saml::ShibbolethSpConfig;
use shib_slo::regexp::check_field_name;
use shib_storage::identity::{DEFAULT_UNIQUE_IDENTIFIER_FIELD, EMAIL_FIELD};

/// ReconciliationConfig decides how an authenticated SAML subject is matched
/// onto a local identity. It is loaded once and never changed afterwards.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// Claim to use as the NameID instead of the assertion's own NameID.
    pub name_id_override_attribute: Option<String>,
    /// Local field holding the external identifier, `GUID` when unset.
    #[validate(custom(function = "check_unique_identifier_field"))]
    pub unique_identifier_field: Option<String>,
    /// Treat the NameID as an email address when nothing matches by the
    /// unique identifier field. Unsafe if the IdP ever reuses NameIDs.
    pub allow_unsafe_email_fallback: bool,
    /// Link to an existing identity by the released email claim when
    /// nothing matches by the unique identifier field.
    pub allow_insecure_email_linking: bool,
    /// Claim name to local field name.
    #[validate(custom(function = "check_claims_field_mappings"))]
    pub claims_field_mappings: BTreeMap<String, String>,
}

impl ReconciliationConfig {
    pub fn unique_identifier_field(&self) -> &str {
        self.unique_identifier_field
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_UNIQUE_IDENTIFIER_FIELD)
    }

    pub fn name_id_override_attribute(&self) -> Option<&str> {
        self.name_id_override_attribute
            .as_deref()
            .filter(|v| !v.is_empty())
    }

    /// Claim mapped onto the local `Email` field. When several claims map to
    /// it the last one in mapping order wins.
    pub fn email_claim(&self) -> Option<&str> {
        let field_to_claim = self
            .claims_field_mappings
            .iter()
            .map(|(claim, field)| (field.as_str(), claim.as_str()))
            .collect::<BTreeMap<_, _>>();
        field_to_claim.get(EMAIL_FIELD).copied()
    }
}

fn check_unique_identifier_field(field: &str) -> Result<(), ValidationError> {
    if field.is_empty() {
        return Ok(());
    }
    check_field_name(field)
}

fn check_claims_field_mappings(
    mappings: &BTreeMap<String, String>,
) -> Result<(), ValidationError> {
    for (claim, field) in mappings {
        if claim.is_empty() {
            return Err(ValidationError::new("empty claim name"));
        }
        check_field_name(field)?;
    }
    Ok(())
}

#[derive(Parser, Debug, Clone, Deserialize)]
#[command(name = "server")]
#[command(author, version, about, long_about = None)]
pub struct AppConfig {
    #[clap(long)]
    #[arg(short = 'c')]
    #[serde(default)]
    pub config: Option<String>,
    #[clap(long, env)]
    pub database_url: String,
    #[clap(long, env)]
    #[arg(default_value_t = 20)]
    #[serde(default = "default_max_size")]
    pub max_size: u32,
    #[clap(long, env)]
    #[arg(default_value_t = 5)]
    #[serde(default = "default_min_idle")]
    pub min_idle: u32,
    #[clap(long, env)]
    #[arg(default_value_t = false)]
    #[serde(default)]
    pub run_migrations: bool,
    #[clap(long, env)]
    #[arg(default_value_t = String::from("server=info,shib_server=info"))]
    #[serde(default = "default_rust_log")]
    pub rust_log: String,
    #[clap(long, env)]
    #[arg(value_parser = port_in_range, short = 'p', default_value_t = 30060)]
    #[serde(default = "default_port")]
    pub port: u16,
    #[clap(long, env)]
    #[arg(default_value_t = String::from("0.0.0.0"))]
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Where failed logins are sent back to, with an `error` query parameter.
    #[clap(long, env)]
    #[arg(default_value_t = String::from("/login"))]
    #[serde(default = "default_login_url")]
    pub login_url: String,
    /// Where successful logins go when no usable RelayState was posted.
    #[clap(long, env)]
    #[arg(default_value_t = String::from("/"))]
    #[serde(default = "default_redirect")]
    pub default_redirect: String,
    /// TOML file with `[reconciliation]` and `[sp]` tables.
    #[clap(long, env)]
    #[serde(default)]
    pub reconciliation_config: Option<String>,
    #[arg(skip)]
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    #[arg(skip)]
    #[serde(default)]
    pub sp: ShibbolethSpConfig,
}

#[derive(Debug, Default, Deserialize)]
struct ReconciliationFile {
    #[serde(default)]
    reconciliation: ReconciliationConfig,
    #[serde(default)]
    sp: ShibbolethSpConfig,
}

impl AppConfig {
    /// Merge the tables of `reconciliation_config`, if one is set, and
    /// validate the result. Claims that reconciliation reads are added to
    /// the SP's exported attributes.
    pub fn prepare(mut self) -> Result<Self> {
        if let Some(path) = &self.reconciliation_config {
            let content = fs::read_to_string(path)
                .context("could not read reconciliation config file")?;
            let file: ReconciliationFile = toml::from_str(&content)
                .context("could not parse reconciliation config file")?;
            self.reconciliation = file.reconciliation;
            self.sp = file.sp;
        }
        self.reconciliation
            .validate()
            .context("invalid reconciliation config")?;
        self.export_claims();
        Ok(self)
    }

    fn export_claims(&mut self) {
        let claims = self
            .reconciliation
            .claims_field_mappings
            .keys()
            .map(String::as_str)
            .chain(self.reconciliation.name_id_override_attribute());
        for claim in claims {
            if !self.sp.attributes.iter().any(|v| v == claim) {
                self.sp.attributes.push(claim.to_owned());
            }
        }
    }
}

fn default_rust_log() -> String {
    String::from("server=info,shib_server=info")
}

fn default_endpoint() -> String {
    String::from("0.0.0.0")
}

fn default_port() -> u16 {
    30060
}

fn default_max_size() -> u32 {
    20
}

fn default_min_idle() -> u32 {
    5
}

fn default_login_url() -> String {
    String::from("/login")
}

fn default_redirect() -> String {
    String::from("/")
}

const PORT_RANGE: RangeInclusive<usize> = 1..=65535;

fn port_in_range(s: &str) -> Result<u16, String> {
    let port: usize = s
        .parse()
        .map_err(|_| format!("`{s}` isn't a port number"))?;
    if PORT_RANGE.contains(&port) {
        Ok(port as u16)
    } else {
        Err(format!(
            "port not in range {}-{}",
            PORT_RANGE.start(),
            PORT_RANGE.end()
        ))
    }
}

pub fn load(cfg: &str) -> Result<AppConfig> {
    let content =
        fs::read_to_string(cfg).context("could not read config file")?;
    let config: AppConfig =
        toml::from_str(&content).context("could not parse config file")?;
    config.prepare()
}
