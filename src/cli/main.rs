// src/cli/main.rs
//
// Interactive issuance tool. Both subcommands are thin adapters over the
// keyforge library; no licensing logic lives here.

use std::io::{self, BufRead, Write};
use std::path::Path;

use keyforge::config::get_config;
use keyforge::engine::Issuer;
use keyforge::errors::{LicenseError, LicenseResult};
use keyforge::key_material::DirectProvider;
use keyforge::keypair;

/// Basic sanity floor for customer machine ids; real ones are much longer.
const MIN_MACHINE_ID_LEN: usize = 10;

fn main() {
    tracing_subscriber::fmt::init();

    let command = std::env::args().nth(1);
    let result = match command.as_deref() {
        Some("generate") => handle_generate(),
        Some("issue") => handle_issue(),
        Some(other) => {
            eprintln!("Error: unknown command '{other}'\n");
            print_usage();
            std::process::exit(2);
        }
        None => {
            print_usage();
            return;
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn print_usage() {
    println!("Usage: keyforge [command]");
    println!("  generate   Generate a new RSA key pair");
    println!("  issue      Issue a new license token");
}

fn handle_generate() -> LicenseResult<()> {
    let config = get_config()?;
    let private_path = &config.keys.private_key_path;
    let public_path = &config.keys.public_key_path;

    if Path::new(private_path).exists()
        && !confirm(&format!(
            "Warning: '{private_path}' already exists. Overwrite? (y/n): "
        ))?
    {
        println!("Aborted.");
        return Ok(());
    }

    println!("Generating a new RSA key pair...");
    let key = keypair::generate_private_key(keypair::DEFAULT_KEY_BITS)?;
    keypair::write_key_pair(&key, private_path, public_path)?;

    println!("\nDone. New key pair written:");
    println!("  private key: {private_path}");
    println!("  public key:  {public_path}");
    Ok(())
}

fn handle_issue() -> LicenseResult<()> {
    let config = get_config()?;

    let machine_id = prompt("Customer machine id: ")?;
    let machine_id = machine_id.trim();
    if machine_id.len() < MIN_MACHINE_ID_LEN {
        return Err(LicenseError::InvalidMachineId(format!(
            "machine id must be at least {MIN_MACHINE_ID_LEN} characters"
        )));
    }

    let expiry_date = prompt("License expiry date (YYYY-MM-DD): ")?;
    let expiry_date = expiry_date.trim();

    let issuer = Issuer::new(DirectProvider::new(config.key_source()))
        .with_calculator(config.expiry_calculator()?)
        .with_policy(config.expiry_policy());
    let token = issuer.issue_now(machine_id, expiry_date)?;

    println!("\n************** License Token **************");
    println!("{token}");
    println!("*******************************************");
    println!("\nLicense details:");
    println!("  machine id:  {machine_id}");
    println!(
        "  expires:     {expiry_date} 23:59:59 (UTC{:+})",
        config.expiry.utc_offset_hours
    );
    println!("  The token is bound to this machine id and works nowhere else.");
    Ok(())
}

fn prompt(text: &str) -> LicenseResult<String> {
    print!("{text}");
    io::stdout()
        .flush()
        .map_err(|e| LicenseError::Io(e.to_string()))?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| LicenseError::Io(e.to_string()))?;
    Ok(line)
}

fn confirm(text: &str) -> LicenseResult<bool> {
    loop {
        let answer = prompt(text)?;
        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => continue,
        }
    }
}
