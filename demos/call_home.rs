// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Demo program: register with a registrar, then wait for Ctrl-C.
//!
//! Reads call-home options from a startup JSON file and keeps the
//! registration alive in the background.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example call_home -- <startup.json> [--verbose]
//! ```
//!
//! # Example
//!
//! ```bash
//! cat > startup.json <<EOF
//! {
//!   "deviceId": "car-1",
//!   "address": "http://127.0.0.1:8090",
//!   "endpoint": "/restconf",
//!   "localAddress": "http://127.0.0.1:8080/restconf",
//!   "retryRateMs": 5000
//! }
//! EOF
//! cargo run --example call_home -- startup.json --verbose
//! ```

use std::env;

use restconf_callhome::call_home::{CallHome, RegisterUpdate, RegistrationOptions};
use restconf_callhome::logging::{self, LoggingConfig};
use restconf_callhome::management::Management;
use restconf_callhome::protocol::HttpResolver;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <startup.json> [--verbose]", args[0]);
        eprintln!();
        eprintln!("Example:");
        eprintln!("  cargo run --example call_home -- startup.json --verbose");
        std::process::exit(1);
    }

    let verbose = args.iter().any(|arg| arg == "--verbose");
    let log_level = logging::init(LoggingConfig::default().with_debug(verbose))?;

    let startup = std::fs::read_to_string(&args[1])?;
    let options = RegistrationOptions::from_json(&startup)?;

    let management = Management::new(HttpResolver::new(), log_level);
    let call_home: &CallHome<HttpResolver> = management.init_call_home();

    let _token = call_home.on_register(|registrar, update| match update {
        RegisterUpdate::Register => println!("Registered with {}", registrar.address()),
        RegisterUpdate::Unregister => println!("Left {}", registrar.address()),
    });

    println!("Calling home to {}...", options.url());
    call_home.apply_options(options)?;

    tokio::signal::ctrl_c().await?;

    println!("{}", serde_json::to_string_pretty(&management.read())?);
    Ok(())
}
