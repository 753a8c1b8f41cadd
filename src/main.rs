/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use bullfrog::{Engine, EngineCommand};

fn main() {
    let mut engine = Engine::new();

    // Skip the executable name
    let args = std::env::args().skip(1).collect::<Vec<_>>();

    // A command on the command line is executed once, after which the engine exits
    if !args.is_empty() {
        match args.join(" ").parse::<EngineCommand>() {
            Ok(cmd) => engine.send_command(cmd),
            Err(e) => eprintln!("{e:#}"),
        }
        engine.send_command(EngineCommand::Exit { cleanup: true });
    }

    if let Err(e) = engine.run() {
        eprintln!("{} encountered an error: {e:#}", env!("CARGO_PKG_NAME"));
    }
}
