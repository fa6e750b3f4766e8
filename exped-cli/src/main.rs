use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

use exped_form::{build_submission, help_text, visible_fields, FormStatus, Toggles};
use exped_store::Fixture;
use exped_types::{group_of, CaseId, FieldGroup, TokenRow};

mod client;
use client::FormClient;

#[derive(Parser)]
#[command(name = "exped")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the fields still pending for a token.
    Pending {
        #[arg(long, default_value = "http://localhost:7000")]
        url: String,
        #[arg(long)]
        token: String,
    },
    /// Fill the visible pending fields and submit them.
    Fill {
        #[arg(long, default_value = "http://localhost:7000")]
        url: String,
        #[arg(long)]
        token: String,
        /// The case has an aid.
        #[arg(long)]
        aid: bool,
        /// The case has a second aid (needs --aid).
        #[arg(long)]
        aid_bis: bool,
        /// Field value as name=value; repeatable.
        #[arg(long = "set", value_parser = parse_assignment)]
        values: Vec<(String, String)>,
    },
    /// Mint a token into a memory-store fixture file.
    Issue {
        #[arg(long)]
        fixture: PathBuf,
        #[arg(long)]
        case_id: String,
        #[arg(long, default_value_t = 72)]
        ttl_hours: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Pending { url, token } => {
            let client = FormClient::new(url);
            let form = match client.fetch(&token).await? {
                Ok(form) => form,
                Err(e) => anyhow::bail!("{} ({})", FormStatus::LoadFailed(e.message).message(), e.status),
            };
            if FormStatus::after_load(Ok(form.fields.as_slice())) == FormStatus::Complete {
                println!("{}", FormStatus::Complete.message());
                return Ok(());
            }
            println!("Expediente {}", form.expediente_id);
            for group in [FieldGroup::Base, FieldGroup::Aid, FieldGroup::AidBis] {
                for f in form.fields.iter().filter(|f| group_of(&f.name) == group) {
                    let kind = serde_json::to_value(f.kind)?;
                    let kind = kind.as_str().unwrap_or_default();
                    println!("  [{group:?}] {} ({kind}) {}  {}", f.name, f.label, help_text(f.kind));
                }
            }
        }
        Command::Fill {
            url,
            token,
            aid,
            aid_bis,
            values,
        } => {
            let client = FormClient::new(url);
            let form = match client.fetch(&token).await? {
                Ok(form) => form,
                Err(e) => anyhow::bail!("{} ({})", FormStatus::LoadFailed(e.message).message(), e.status),
            };
            if form.fields.is_empty() {
                println!("{}", FormStatus::Complete.message());
                return Ok(());
            }

            let mut toggles = Toggles::new();
            toggles.set_aid(aid);
            toggles.set_aid_bis(aid_bis);
            if aid_bis && !toggles.has_aid_bis() {
                warn!("--aid-bis ignored without --aid");
            }

            let visible = visible_fields(&toggles, &form.fields);
            let values: HashMap<String, String> = values.into_iter().collect();
            for name in values.keys() {
                if !visible.iter().any(|f| &f.name == name) {
                    warn!("{name} is not a visible pending field; skipped");
                }
            }

            let data = build_submission(&toggles, &visible, &values);
            println!("{}", FormStatus::Sending.message());
            match client.submit(&token, data).await? {
                Ok(updated) => {
                    println!("{}", FormStatus::Sent.message());
                    for name in updated {
                        println!("  updated {name}");
                    }
                }
                Err(e) => anyhow::bail!("{} ({})", FormStatus::SendFailed(e.message).message(), e.status),
            }
        }
        Command::Issue {
            fixture,
            case_id,
            ttl_hours,
        } => {
            let mut data = if fixture.exists() {
                Fixture::from_path(&fixture)?
            } else {
                Fixture::default()
            };
            let token = Uuid::new_v4().simple().to_string();
            data.tokens.push(TokenRow {
                token: token.clone(),
                expediente_id: parse_case_id(&case_id),
                expires_at: Utc::now() + Duration::hours(ttl_hours),
                used_at: None,
            });
            data.save(&fixture)?;
            println!("{token}");
        }
    }

    Ok(())
}

fn parse_assignment(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got {s:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty field name in {s:?}"));
    }
    Ok((name.to_string(), value.to_string()))
}

// Integer ids stay integers so they match integer key columns.
fn parse_case_id(raw: &str) -> CaseId {
    match raw.parse::<i64>() {
        Ok(n) => CaseId::from(n),
        Err(_) => CaseId(Value::String(raw.to_string())),
    }
}
