use clap::{Args, ValueEnum};
use serde_json::Value;

use crate::cli::utils::{mask_secret, output_success};
use crate::cli::OutputFormat;
use crate::config;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[arg(long, value_enum, default_value = "yaml", help = "Document format for text output")]
    pub format: ConfigFormat,

    #[arg(long, help = "Print secrets unmasked")]
    pub show_secrets: bool,
}

/// The active configuration. The JWT secret and the database password are
/// masked unless `show_secrets` is set.
pub fn resolved(show_secrets: bool) -> anyhow::Result<Value> {
    let cfg = config::config();
    let mut value = serde_json::to_value(cfg)?;

    let secret = &cfg.security.jwt_secret;
    let shown = if show_secrets { secret.clone() } else { mask_secret(secret) };
    if let Some(Value::Object(security)) = value.get_mut("security") {
        security.insert("jwt_secret".into(), Value::String(shown));
    }

    if !show_secrets {
        if let Some(url) = value.pointer_mut("/database/url") {
            if let Some(mut parsed) = url.as_str().and_then(|raw| url::Url::parse(raw).ok()) {
                if parsed.password().is_some() {
                    let _ = parsed.set_password(Some("****"));
                }
                *url = Value::String(parsed.to_string());
            }
        }
    }
    Ok(value)
}

pub fn handle(args: ConfigArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let value = resolved(args.show_secrets)?;

    match output_format {
        OutputFormat::Json => output_success(&output_format, "Configuration resolved", Some(value)),
        OutputFormat::Text => {
            let rendered = match args.format {
                ConfigFormat::Yaml => serde_yaml::to_string(&value)?,
                ConfigFormat::Json => serde_json::to_string_pretty(&value)?,
            };
            println!("{}", rendered);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_is_masked_unless_requested() {
        let secret = &config::config().security.jwt_secret;
        let masked = resolved(false).unwrap();
        let raw = resolved(true).unwrap();
        assert_eq!(raw["security"]["jwt_secret"], secret.as_str());
        assert_eq!(masked["security"]["jwt_secret"], mask_secret(secret).as_str());
        assert_eq!(masked["server"], raw["server"]);
    }
}
