/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::str::FromStr;

use anyhow::anyhow;
use clap::Parser;
use uci_parser::{UciCommand, UciParseError};

use crate::Square;

/// A command to be sent to the engine.
#[derive(Debug, Clone, Parser)]
#[command(
    multicall = true,
    about,
    rename_all = "lower",
    override_usage("<ENGINE COMMAND> | <UCI COMMAND>")
)]
pub enum EngineCommand {
    /// Run a fixed-depth search over a suite of positions, reporting nodes and nodes per second.
    Bench {
        /// If set, the benchmarking results will be printed in a well-formatted table.
        #[arg(short, long, default_value = "false")]
        pretty: bool,

        /// Override the default benchmark depth.
        #[arg(short, long, required = false)]
        depth: Option<usize>,
    },

    /// Print a visual representation of the current board state.
    #[command(alias = "d")]
    Display,

    /// Print a breakdown of the evaluation of the current position.
    Eval,

    /// Quit the engine.
    Exit {
        /// If set, the engine will await the completion of any search threads before exiting.
        #[arg(short, long, default_value = "false")]
        cleanup: bool,
    },

    /// Generate and print a FEN string for the current position.
    Fen,

    /// Passes the turn to the other side. Equivalent to playing a nullmove.
    Flip,

    /// Display information about the engine's hash tables.
    #[command(aliases = ["tt", "ttable"])]
    HashInfo,

    /// Shows all legal moves in the current position, or those of the piece on a specific square.
    Moves { square: Option<Square> },

    /// Display the current value of the specified option.
    Option {
        name: Vec<String>, // Multi-word options, such as "Clear Hash"
    },

    /// Performs a perft on the current position at the supplied depth, printing total node count.
    Perft {
        depth: usize,

        /// If set, captures, castles, promotions, checks and mates at the final ply are counted too.
        #[arg(short, long, default_value = "false")]
        detailed: bool,
    },

    /// Performs a split perft on the current position at the supplied depth.
    #[command(alias = "sperft")]
    Splitperft { depth: usize },

    /// Wrapper over UCI commands sent to the engine.
    #[command(skip)]
    Uci { cmd: UciCommand },

    /// Await the current search, blocking until it completes.
    ///
    /// This is primarily used when executing searches on startup,
    /// to await their results before doing something else.
    Wait,
}

impl FromStr for EngineCommand {
    type Err = anyhow::Error;

    /// Attempt to parse an [`EngineCommand`] from a string.
    ///
    /// If this fails, it will attempt to parse the string as a [`UciCommand`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::try_parse_from(s.split_ascii_whitespace()) {
            Ok(cmd) => Ok(cmd),
            Err(clap_err) => match UciCommand::new(s) {
                Ok(cmd) => Ok(Self::Uci { cmd }),

                // Neither kind of command, so clap's message (and its help) is the useful one
                Err(UciParseError::UnrecognizedCommand { .. }) => Err(anyhow!("{clap_err}")),

                Err(uci_err) => Err(anyhow!("{uci_err}")),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_commands() {
        assert!(matches!(
            "bench --depth 3".parse::<EngineCommand>().unwrap(),
            EngineCommand::Bench {
                depth: Some(3),
                pretty: false
            }
        ));
        assert!(matches!(
            "d".parse::<EngineCommand>().unwrap(),
            EngineCommand::Display
        ));
        assert!(matches!(
            "perft 4 --detailed".parse::<EngineCommand>().unwrap(),
            EngineCommand::Perft {
                depth: 4,
                detailed: true
            }
        ));
        assert!(matches!(
            "moves e2".parse::<EngineCommand>().unwrap(),
            EngineCommand::Moves {
                square: Some(Square::E2)
            }
        ));

        let cmd = "option Clear Hash".parse::<EngineCommand>().unwrap();
        let EngineCommand::Option { name } = cmd else {
            panic!("expected an `option` command");
        };
        assert_eq!(name.join(" "), "Clear Hash");
    }

    #[test]
    fn test_falls_back_to_uci() {
        assert!(matches!(
            "isready".parse::<EngineCommand>().unwrap(),
            EngineCommand::Uci {
                cmd: UciCommand::IsReady
            }
        ));
        assert!(matches!(
            "position startpos moves e2e4".parse::<EngineCommand>().unwrap(),
            EngineCommand::Uci {
                cmd: UciCommand::Position { .. }
            }
        ));
        assert!(matches!(
            "go depth 5".parse::<EngineCommand>().unwrap(),
            EngineCommand::Uci {
                cmd: UciCommand::Go(_)
            }
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!("flibbertigibbet".parse::<EngineCommand>().is_err());
        assert!("moves z9".parse::<EngineCommand>().is_err());
    }
}
