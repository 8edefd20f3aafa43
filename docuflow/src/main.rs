// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Binary entry point: parse arguments, run the command, and translate
//! failures into the sysexits surface with a machine-readable error line.

use clap::Parser;

use docuflow::presentation::cli::{self, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    match cli::run(cli).await {
        Ok(()) => {}
        Err(error) => {
            eprintln!("{}", cli::error_json(&error));
            std::process::exit(cli::exit_code_for(&error).as_i32());
        }
    }
}
