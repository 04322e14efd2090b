use anyhow::Context;
use clap::Args;
use serde_json::json;

use crate::auth::{generate_jwt, Claims, FrameworkGrant, FrameworkGrants};
use crate::cli::utils::{output_fields, output_success};
use crate::cli::OutputFormat;
use crate::services::ids::{is_object_id, object_id};

const DEFAULT_PERMISSIONS: &str = "read,write";

#[derive(Args, Debug)]
pub struct TokenArgs {
    #[arg(long, help = "User id (24 hex characters, generated when omitted)")]
    pub user_id: Option<String>,

    #[arg(long, default_value = "dev@example.com", help = "Email claim")]
    pub email: String,

    #[arg(long, default_value = "Local Developer", help = "Display name claim")]
    pub name: String,

    #[arg(long, value_name = "ROLE", help = "Grant AI-HRMS access with this role (e.g. hr_manager, super_admin)")]
    pub hrms: Option<String>,

    #[arg(long, value_name = "ROLE", help = "Grant NOSE access with this role (e.g. researcher, admin)")]
    pub nose: Option<String>,

    #[arg(long, value_name = "ROLE", help = "Grant Web-Hunter access with this role (e.g. analyst, admin)")]
    pub webhunter: Option<String>,

    #[arg(long, default_value = DEFAULT_PERMISSIONS, help = "Comma-separated permissions for every granted framework")]
    pub permissions: String,
}

fn grant(role: Option<&str>, permissions: &[&str]) -> FrameworkGrant {
    match role {
        Some(role) => FrameworkGrant::new(role, permissions),
        None => FrameworkGrant::default(),
    }
}

/// Claims for the requested grants.
pub fn build_claims(args: &TokenArgs) -> anyhow::Result<Claims> {
    let user_id = match &args.user_id {
        Some(id) if is_object_id(id) => id.clone(),
        Some(id) => anyhow::bail!("User id must be 24 hexadecimal characters, got '{}'", id),
        None => object_id(),
    };

    let permissions: Vec<&str> = args.permissions.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
    let frameworks = FrameworkGrants {
        ai_hrms: grant(args.hrms.as_deref(), &permissions),
        nose: grant(args.nose.as_deref(), &permissions),
        web_hunter: grant(args.webhunter.as_deref(), &permissions),
    };

    Ok(Claims::new(user_id, args.email.clone(), args.name.clone(), frameworks))
}

pub fn handle(args: TokenArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let claims = build_claims(&args)?;
    let token = generate_jwt(&claims).context("failed to sign token")?;

    match output_format {
        OutputFormat::Json => output_success(
            &output_format,
            "Token generated",
            Some(json!({"token": token, "claims": claims})),
        ),
        OutputFormat::Text => {
            output_fields(&[
                ("user", claims.sub.clone()),
                ("email", claims.email.clone()),
                ("admin", claims.frameworks.is_admin().to_string()),
                ("expires", claims.exp.to_string()),
            ]);
            println!("{}", token);
            Ok(())
        }
    }
}
