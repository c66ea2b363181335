//! Prints an Argon2id digest for a password read from stdin, using the cost
//! from `KEYGATE_CONFIG` when set. Useful for seeding accounts by hand.

use std::io::{self, Write};

use anyhow::Context;
use keygate_core::{CredentialHasher, HashCost};
use serde::Deserialize;

#[derive(Deserialize, Default)]
struct CostOnly {
    #[serde(default)]
    auth: AuthCost,
}

#[derive(Deserialize, Default)]
struct AuthCost {
    #[serde(default)]
    hash_cost: HashCost,
}

fn configured_cost() -> anyhow::Result<HashCost> {
    let Ok(path) = std::env::var("KEYGATE_CONFIG") else {
        return Ok(HashCost::default());
    };
    let contents = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let parsed: CostOnly = toml::from_str(&contents).with_context(|| format!("parsing {path}"))?;
    Ok(parsed.auth.hash_cost)
}

fn main() -> anyhow::Result<()> {
    eprint!("Enter password: ");
    io::stderr().flush()?;

    let mut password = String::new();
    io::stdin().read_line(&mut password)?;
    let password = password.trim();

    if password.is_empty() {
        anyhow::bail!("Password cannot be empty");
    }

    let hasher = CredentialHasher::new(configured_cost()?)?;
    let digest = hasher.hash(password)?;

    println!("{digest}");
    Ok(())
}
