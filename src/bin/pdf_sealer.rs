//! PDF Sealer command line
//!
//! Usage:
//!   pdf_sealer generate --cn NAME [--email E] [--org O] [--country CC] --cert C --key K [--password P]
//!   pdf_sealer sign --cert C --key K [--password P] --input IN [--output OUT] [--text T] [--x X --y Y]
//!   pdf_sealer verify FILE [--original ORIG --cert C --key K [--password P]]
//!   pdf_sealer info --cert C --key K [--password P]
//!
//! Every command accepts `--config FILE` (JSON signer settings).
//! Set `RUST_LOG=debug` for detailed logging.

use pdf_sealer::{CertificateRequest, SignOptions, SignerConfig, SigningManager};
use std::collections::HashMap;
use std::path::PathBuf;

const USAGE: &str = "\
Usage:
  pdf_sealer generate --cn NAME [--email E] [--org O] [--country CC] --cert C --key K [--password P]
  pdf_sealer sign --cert C --key K [--password P] --input IN [--output OUT] [--text T] [--x X --y Y]
  pdf_sealer verify FILE [--original ORIG --cert C --key K [--password P]]
  pdf_sealer info --cert C --key K [--password P]

Options:
  --config FILE   JSON signer settings";

/// Parsed command line: the command, positional arguments and `--flag value` pairs.
struct Args {
    command: String,
    positional: Vec<String>,
    flags: HashMap<String, String>,
}

impl Args {
    fn parse(raw: &[String]) -> Result<Self, String> {
        let command = raw.first().cloned().ok_or("missing command")?;
        let mut positional = Vec::new();
        let mut flags = HashMap::new();

        let mut i = 1;
        while i < raw.len() {
            let arg = &raw[i];
            if let Some(name) = arg.strip_prefix("--") {
                i += 1;
                let value = raw.get(i).ok_or_else(|| format!("--{} needs a value", name))?;
                flags.insert(name.to_string(), value.clone());
            } else {
                positional.push(arg.clone());
            }
            i += 1;
        }

        Ok(Self {
            command,
            positional,
            flags,
        })
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.flags.get(name).map(String::as_str)
    }

    fn require(&self, name: &str) -> Result<&str, String> {
        self.get(name).ok_or_else(|| format!("--{} is required", name))
    }

    fn number(&self, name: &str) -> Result<Option<f64>, String> {
        self.get(name)
            .map(|v| v.parse::<f64>().map_err(|_| format!("--{} must be a number, got {:?}", name, v)))
            .transpose()
    }
}

fn main() {
    env_logger::init();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    if raw.is_empty() || raw[0] == "--help" || raw[0] == "-h" {
        println!("{}", USAGE);
        return;
    }

    let args = match Args::parse(&raw) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, USAGE);
            std::process::exit(1);
        },
    };

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), String> {
    let config = match args.get("config") {
        Some(path) => SignerConfig::from_json_file(path).map_err(|e| e.to_string())?,
        None => SignerConfig::default(),
    };
    let mut manager = SigningManager::with_config(config);

    match args.command.as_str() {
        "generate" => generate(&mut manager, args),
        "sign" => sign(&mut manager, args),
        "verify" => verify(&mut manager, args),
        "info" => info(&mut manager, args),
        other => Err(format!("unknown command {:?}\n\n{}", other, USAGE)),
    }
}

fn load(manager: &mut SigningManager, args: &Args) -> Result<(), String> {
    manager
        .load_certificate(args.require("cert")?, args.require("key")?, args.get("password"))
        .map(|_| ())
        .map_err(|e| e.to_string())
}

fn generate(manager: &mut SigningManager, args: &Args) -> Result<(), String> {
    let mut request = CertificateRequest::new(args.require("cn")?);
    if let Some(email) = args.get("email") {
        request = request.with_email(email);
    }
    if let Some(org) = args.get("org") {
        request = request.with_organization(org);
    }
    if let Some(country) = args.get("country") {
        request = request.with_country(country);
    }
    let cert = args.require("cert")?;
    let key = args.require("key")?;

    manager.generate(&request).map_err(|e| e.to_string())?;
    manager
        .save_certificate(cert, key, args.get("password"))
        .map_err(|e| e.to_string())?;

    println!("Certificate written to {}", cert);
    println!("Private key written to {}", key);
    print_info(manager);
    Ok(())
}

fn sign(manager: &mut SigningManager, args: &Args) -> Result<(), String> {
    load(manager, args)?;
    let input = PathBuf::from(args.require("input")?);

    let mut options = SignOptions::new();
    if let Some(output) = args.get("output") {
        options = options.with_output(output);
    }
    if let Some(text) = args.get("text") {
        options = options.with_text(text);
    }
    match (args.number("x")?, args.number("y")?) {
        (Some(x), Some(y)) => options = options.with_position((x, y)),
        (None, None) => {},
        _ => return Err("--x and --y must be given together".to_string()),
    }

    let written = manager.sign(&input, &options).map_err(|e| e.to_string())?;
    println!("Signed PDF written to {}", written.display());
    Ok(())
}

fn verify(manager: &mut SigningManager, args: &Args) -> Result<(), String> {
    let file = args.positional.first().ok_or("verify needs a FILE")?;
    let result = manager.verify(file);

    println!("Signed:    {}", if result.is_signed { "yes" } else { "no" });
    println!("Valid:     {}", if result.is_valid { "yes" } else { "no" });
    println!("Signer:    {}", result.signer);
    println!("Date:      {}", result.signature_date);
    if let Some(error) = &result.error {
        println!("Error:     {}", error);
    }

    if let Some(original) = args.get("original") {
        load(manager, args)?;
        let matches = manager
            .verify_against_original(file, original)
            .map_err(|e| e.to_string())?;
        println!("Original:  {}", if matches { "signature matches" } else { "signature does NOT match" });
        if !matches {
            return Err("signature does not match the original document".to_string());
        }
    }

    if result.is_signed && result.is_valid {
        Ok(())
    } else {
        Err(result.error.unwrap_or_else(|| "signature not valid".to_string()))
    }
}

fn info(manager: &mut SigningManager, args: &Args) -> Result<(), String> {
    load(manager, args)?;
    print_info(manager);
    Ok(())
}

fn print_info(manager: &SigningManager) {
    let Some(info) = manager.certificate_info() else {
        return;
    };
    println!("Common name:  {}", info.common_name);
    println!("Email:        {}", info.email);
    println!("Organization: {}", info.organization);
    println!("Country:      {}", info.country);
    println!("Created:      {}", info.created);
    println!("Valid until:  {}", info.valid_until);
}
