#![deny(unused_must_use)]

#[macro_use]
extern crate log;

use std::fmt::Display;
use std::fs;
use std::path::Path;

use clap::{Arg, ArgMatches, Command};
use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use serde_json::{json, Value};

use rusty_handoff::ciphers::decode_legacy;
use rusty_handoff::config::Config;
use rusty_handoff::handoff::{HandoffContext, HandoffOrchestrator, HandoffRequest};
use rusty_handoff::misc::{generate_secret, mask_identifier};
use rusty_handoff::secrets::SecretManager;

const RSA_BITS: u32 = 2048;

fn app() -> Command {
    Command::new("Rusty Handoff").version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(Command::new("process")
            .about("Run one handoff and print the outbound reference")
            .arg(Arg::new("client_id").long("client-id")
                .help("Analytics client id of the requester")
                .required(true))
            .arg(Arg::new("origin_ip").long("origin-ip")
                .help("Requester address, as in X-Forwarded-For"))
            .arg(Arg::new("legacy_identifier").long("legacy-identifier")
                .help("Upstream-encrypted identifier header value"))
            .arg(Arg::new("variant").long("variant")
                .help("Campaign variant"))
            .arg(Arg::new("partner_ref").long("partner-ref")
                .help("Campaign partner reference"))
            .arg(Arg::new("campaign").long("campaign")
                .help("Campaign name (utm_campaign)")))
        .subcommand(Command::new("redeem")
            .about("Open an encrypted payload returned by the consuming application")
            .arg(Arg::new("payload")
                .help(r#"JSON object, e.g. {"msisdn": "...", "originateFromLanding": "..."}"#)
                .required(true)))
        .subcommand(Command::new("resolve")
            .about("Read the identifier bundle behind a sealed staging key")
            .arg(Arg::new("sealed_key").required(true)))
        .subcommand(Command::new("seal")
            .about("Seal a value with the envelope key")
            .arg(Arg::new("plain_text").required(true)))
        .subcommand(Command::new("open")
            .about("Open an envelope sealed with the envelope key")
            .arg(Arg::new("envelope").required(true)))
        .subcommand(Command::new("seal-one-way")
            .about("Seal a value with the RSA public key")
            .arg(Arg::new("plain_text").required(true)))
        .subcommand(Command::new("decode-legacy")
            .about("Decode an upstream-encrypted identifier")
            .arg(Arg::new("cipher_text").required(true))
            .arg(Arg::new("key").long("key")
                .help("Legacy key, defaults to LEGACY_DECRYPTION_KEY")))
        .subcommand(Command::new("generate-secret")
            .about("Print a fresh value for ENCRYPTION_SECRET_KEY"))
        .subcommand(Command::new("generate-keys")
            .about("Write a new RSA key pair as public.pem and private.pem")
            .arg(Arg::new("out").long("out")
                .help("Directory to write the keys into")
                .default_value(".")))
}

fn exit_with<E>(context: &str, e: E) -> ! where E: Display {
    error!("{}: {}", context, e);
    std::process::exit(1);
}

fn load_config() -> Config {
    Config::from_env().unwrap_or_else(|e| exit_with("Cannot load configuration", e))
}

fn load_secrets(config: &Config) -> SecretManager {
    SecretManager::from_config(config).unwrap_or_else(|e| exit_with("Cannot load secrets", e))
}

fn load_orchestrator(config: &Config) -> HandoffOrchestrator {
    let context = HandoffContext::from_config(config)
        .unwrap_or_else(|e| exit_with("Cannot create handoff context", e));
    HandoffOrchestrator::new(context)
}

fn arg(args: &ArgMatches, name: &str) -> Option<String> {
    args.get_one::<String>(name).cloned()
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(value) => println!("{}", value),
        Err(e) => exit_with("Cannot serialise output", e),
    }
}

async fn process(args: &ArgMatches) {
    let config = load_config();
    let orchestrator = load_orchestrator(&config);
    let request = HandoffRequest {
        client_id: arg(args, "client_id"),
        origin: arg(args, "origin_ip"),
        legacy_identifier: arg(args, "legacy_identifier"),
        variant: arg(args, "variant"),
        partner_ref: arg(args, "partner_ref"),
        campaign: arg(args, "campaign"),
    };
    match orchestrator.process(&request).await {
        Ok(reference) => {
            let query: serde_json::Map<String, Value> = reference.query_pairs().into_iter()
                .map(|(name, value)| (name.to_owned(), Value::from(value)))
                .collect();
            print_json(&json!({"success": true, "data": reference, "query": query}));
        },
        Err(e) => {
            print_json(&json!({"success": false, "message": e.public_message()}));
            exit_with("Handoff failed", e);
        },
    }
}

async fn redeem(args: &ArgMatches) {
    let config = load_config();
    let orchestrator = load_orchestrator(&config);
    let payload: Value = arg(args, "payload")
        .and_then(|payload| serde_json::from_str(&payload).ok())
        .unwrap_or(Value::Null);
    match orchestrator.redeem(&payload) {
        Ok(redemption) => {
            info!("Redeemed {:?}", redemption);
            print_json(&json!({
                "success": true,
                "msisdn": redemption.identifier,
                "originateFromLanding": redemption.originated_from_flow,
            }));
        },
        Err(e) => {
            print_json(&json!({"success": false, "message": e.public_message()}));
            exit_with("Redeem failed", e);
        },
    }
}

async fn resolve(args: &ArgMatches) {
    let config = load_config();
    let orchestrator = load_orchestrator(&config);
    let sealed_key = arg(args, "sealed_key").unwrap_or_default();
    match orchestrator.resolve_staged_identifier(&sealed_key).await {
        Ok(Some(bundle)) => match serde_json::to_value(&bundle) {
            Ok(bundle) => print_json(&json!({"success": true, "data": bundle})),
            Err(e) => exit_with("Cannot serialise bundle", e),
        },
        Ok(None) => {
            print_json(&json!({"success": false, "message": "Not found or expired"}));
            std::process::exit(1);
        },
        Err(e) => exit_with("Cannot resolve staged identifier", e),
    }
}

fn seal(args: &ArgMatches) {
    let secrets = load_secrets(&load_config());
    let plain_text = arg(args, "plain_text").unwrap_or_default();
    match secrets.seal(&plain_text) {
        Ok(envelope) => println!("{}", envelope),
        Err(e) => exit_with("Cannot seal", e),
    }
}

fn open(args: &ArgMatches) {
    let secrets = load_secrets(&load_config());
    let envelope = arg(args, "envelope").unwrap_or_default();
    match secrets.open(&envelope) {
        Ok(plain_text) => println!("{}", plain_text),
        Err(e) => exit_with("Cannot open", e),
    }
}

fn seal_one_way(args: &ArgMatches) {
    let secrets = load_secrets(&load_config());
    let plain_text = arg(args, "plain_text").unwrap_or_default();
    match secrets.seal_one_way(&plain_text) {
        Ok(token) => println!("{}", token),
        Err(e) => exit_with("Cannot seal", e),
    }
}

fn decode(args: &ArgMatches) {
    let key = arg(args, "key")
        .or_else(|| load_config().legacy_key)
        .unwrap_or_else(|| exit_with("Cannot decode", "no key given and LEGACY_DECRYPTION_KEY is not set"));
    let cipher_text = arg(args, "cipher_text").unwrap_or_default();
    match decode_legacy(&cipher_text, &key) {
        Some(identifier) => {
            info!("Decoded {}", mask_identifier(&identifier));
            println!("{}", identifier);
        },
        None => exit_with("Cannot decode", "value does not decode to a valid identifier"),
    }
}

fn generate_keys(args: &ArgMatches) {
    let out = arg(args, "out").unwrap_or_else(|| ".".to_owned());
    let out = Path::new(&out);
    let write_keys = || -> Result<(), Box<dyn std::error::Error>> {
        fs::create_dir_all(out)?;
        let key = PKey::from_rsa(Rsa::generate(RSA_BITS)?)?;
        fs::write(out.join("public.pem"), key.public_key_to_pem()?)?;
        fs::write(out.join("private.pem"), key.private_key_to_pem_pkcs8()?)?;
        Ok(())
    };
    write_keys().unwrap_or_else(|e| exit_with("Cannot write keys", e));
    info!("Wrote {}-bit key pair to {}", RSA_BITS, out.display());
    println!("Set RSA_PUBLIC_KEY_PATH={} for this service", out.join("public.pem").display());
    println!("Keep {} with the service that opens one-way tokens", out.join("private.pem").display());
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("rusty_handoff=info")).init();

    let args = app().get_matches();
    match args.subcommand() {
        Some(("process", args)) => process(args).await,
        Some(("redeem", args)) => redeem(args).await,
        Some(("resolve", args)) => resolve(args).await,
        Some(("seal", args)) => seal(args),
        Some(("open", args)) => open(args),
        Some(("seal-one-way", args)) => seal_one_way(args),
        Some(("decode-legacy", args)) => decode(args),
        Some(("generate-secret", _)) => match generate_secret() {
            Ok(secret) => println!("{}", secret),
            Err(_) => exit_with("Cannot generate secret", "random source failed"),
        },
        Some(("generate-keys", args)) => generate_keys(args),
        _ => unreachable!("subcommand is required"),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line() {
        app().debug_assert();
        let args = app().try_get_matches_from(vec!["rusty-handoff", "process", "--client-id", "GA1-12345", "--variant", "b"]).unwrap();
        let (name, args) = args.subcommand().unwrap();
        assert_eq!(name, "process");
        assert_eq!(arg(args, "client_id").as_deref(), Some("GA1-12345"));
        assert_eq!(arg(args, "campaign"), None);
        assert!(app().try_get_matches_from(vec!["rusty-handoff", "process"]).is_err());
        assert!(app().try_get_matches_from(vec!["rusty-handoff"]).is_err());
    }
}
