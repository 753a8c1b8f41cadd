/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    fmt,
    fmt::Display,
    io::{self, Write},
    str::FromStr,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{channel, Receiver, Sender},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    thread::{self, JoinHandle},
    time::Instant,
};

use anyhow::{bail, Context, Result};
use uci_parser::{UciCommand, UciInfo, UciOption, UciResponse, UciSearchOptions};

use crate::{
    init_attack_tables, perft, perft_detailed, splitperft, tune, EngineCommand, Evaluator,
    HistoryTable, KillerTable, LogDebug, LogInfo, LogLevel, LogNone, Move, NoBook, NoTablebase,
    OpeningBook, PawnHashTable, Position, Search, SearchConfig, SearchResult, Square, TTable,
    Tablebase, BENCHMARK_FENS,
};

/// Default depth at which to run the benchmark searches.
const BENCH_DEPTH: usize = 6;

/// Largest value accepted for the `Contempt` option, in centipawns.
const MAX_CONTEMPT: i32 = 200;

/// Locks `mutex`, recovering the table if a search thread panicked while holding it.
#[inline(always)]
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The Bullfrog chess engine.
pub struct Engine {
    /// The current state of the chess board, as known to the engine.
    ///
    /// This is modified whenever moves are played or new positions are given,
    /// and is reset whenever the engine is told to start a new game.
    position: Position,

    /// One half of a channel, responsible for sending commands to the engine to execute.
    sender: Sender<EngineCommand>,

    /// One half of a channel, responsible for receiving commands for the engine to execute.
    receiver: Receiver<EngineCommand>,

    /// Atomic flag to determine whether a search is currently running
    is_searching: Arc<AtomicBool>,

    /// Handle to the currently-running search thread, if one exists.
    search_thread: Option<JoinHandle<SearchResult>>,

    /// Transposition table, shared with the search thread.
    ttable: Arc<Mutex<TTable>>,

    /// Pawn structure cache, shared with the search thread.
    pawns: Arc<Mutex<PawnHashTable>>,

    /// Quiet move history, kept between searches of the same game.
    history: Arc<Mutex<HistoryTable>>,

    /// Killer moves, kept between searches of the same game.
    killers: Arc<Mutex<KillerTable>>,

    /// Consulted before every search when `own_book` is set.
    book: Box<dyn OpeningBook>,

    /// Whether the engine plays moves from its own book.
    own_book: bool,

    /// Probed by the search at the root and at nodes with few enough pieces.
    tablebase: Arc<dyn Tablebase>,

    /// Contempt handed to every search, in centipawns.
    contempt: i32,

    /// Whether to print extra diagnostics.
    debug: bool,
}

impl Engine {
    /// Constructs a new [`Engine`] instance to be executed with [`Engine::run`].
    pub fn new() -> Self {
        init_attack_tables();
        let (sender, receiver) = channel();

        Self {
            position: Position::default(),
            sender,
            receiver,
            is_searching: Arc::default(),
            search_thread: None,
            ttable: Arc::default(),
            pawns: Arc::default(),
            history: Arc::default(),
            killers: Arc::default(),
            book: Box::new(NoBook),
            own_book: false,
            tablebase: Arc::new(NoTablebase),
            contempt: tune::contempt!(),
            debug: false,
        }
    }

    /// Replaces the engine's opening book.
    ///
    /// The book is only consulted once `OwnBook` is enabled.
    pub fn with_book(mut self, book: impl OpeningBook + 'static) -> Self {
        self.book = Box::new(book);
        self
    }

    /// Replaces the engine's endgame tablebase.
    pub fn with_tablebase(mut self, tablebase: impl Tablebase + 'static) -> Self {
        self.tablebase = Arc::new(tablebase);
        self
    }

    /// Returns a string of the engine's name and current version.
    pub fn name(&self) -> String {
        format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
    }

    /// Returns a string of all authors of this engine.
    pub fn authors(&self) -> String {
        let authors = env!("CARGO_PKG_AUTHORS");
        if authors.is_empty() {
            format!("the {} developers", env!("CARGO_PKG_NAME"))
        } else {
            authors.replace(':', ", ")
        }
    }

    /// The position the engine will search next.
    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Sends an [`EngineCommand`] to the engine to be executed.
    pub fn send_command(&self, command: EngineCommand) {
        // The receiver lives as long as the engine, so this cannot fail while `self` exists.
        let _ = self.sender.send(command);
    }

    /// Execute the main event loop for the engine.
    ///
    /// This function spawns a thread to handle input from `stdin` and waits on received commands.
    pub fn run(&mut self) -> Result<()> {
        let sender = self.sender.clone();
        thread::spawn(move || {
            if let Err(err) = input_handler(sender) {
                eprintln!("{err:#}");
            }
        });

        while let Ok(cmd) = self.receiver.recv() {
            match cmd {
                EngineCommand::Bench { depth, pretty } => self.bench(depth, pretty),

                EngineCommand::Display => println!("{}", self.position),

                EngineCommand::Eval => self.eval(),

                EngineCommand::Exit { cleanup } => {
                    if cleanup {
                        self.await_search();
                    } else {
                        self.set_is_searching(false);
                    }
                    break;
                }

                EngineCommand::Fen => println!("{}", self.position.to_fen()),

                EngineCommand::Flip => self.flip(),

                EngineCommand::HashInfo => self.hash_info(),

                EngineCommand::Moves { square } => self.moves(square),

                EngineCommand::Option { name } => {
                    let name = name.join(" ");
                    match self.get_option(&name) {
                        Some(value) => println!("Option {name:?} := {value}"),
                        None => println!("{} has no option {name:?}", self.name()),
                    }
                }

                EngineCommand::Perft { depth, detailed } => self.perft(depth, detailed),

                EngineCommand::Splitperft { depth } => {
                    let mut position = self.position.clone();
                    let nodes = splitperft(&mut position, depth);
                    println!("\n{nodes}");
                }

                EngineCommand::Uci { cmd } => {
                    // Errors are reported, and the engine keeps running
                    if let Err(e) = self.handle_uci_command(cmd) {
                        eprintln!("Error: {e:#}");
                    }
                }

                EngineCommand::Wait => _ = self.await_search(),
            }
        }

        Ok(())
    }

    /// Handle the execution of a single [`UciCommand`].
    fn handle_uci_command(&mut self, uci: UciCommand) -> Result<()> {
        use UciCommand::*;
        match uci {
            Uci => self.uci(),

            Debug(status) => {
                self.debug = status;
                if status {
                    Self::send_string(format!("Debug mode enabled for {}", self.name()));
                }
            }

            IsReady => println!("{}", UciResponse::<&str>::ReadyOk),

            SetOption { name, value } => self.set_option(&name, value)?,

            UciNewGame => self.new_game(),

            UciCommand::Position { fen, moves } => self.set_position(fen, moves)?,

            Go(options) => {
                if let Some(depth) = options.perft {
                    let mut position = self.position.clone();
                    let nodes = splitperft(&mut position, depth as usize);
                    println!("\n{nodes}");
                } else {
                    self.go(options);
                }
            }

            Stop => self.set_is_searching(false),

            Quit => self.send_command(EngineCommand::Exit { cleanup: false }),

            _ => bail!("{} does not support UCI command {uci:?}", self.name()),
        }

        Ok(())
    }

    /// Executes the `go` command: plays a book move if one is known, otherwise starts a search.
    fn go(&mut self, options: UciSearchOptions) {
        if self.own_book {
            if let Some(mv) = self.book.probe(&self.position) {
                if self.debug {
                    Self::send_string(format!("Playing {mv} from the opening book"));
                }

                let bestmove = UciResponse::<String>::BestMove {
                    bestmove: Some(mv.to_uci()),
                    ponder: None,
                };
                println!("{bestmove}");
                return;
            }
        }

        let config = SearchConfig {
            contempt: self.contempt,
            ..SearchConfig::new(options, &self.position)
        };

        if self.debug {
            self.start_search::<LogDebug>(config);
        } else {
            self.start_search::<LogInfo>(config);
        }
    }

    /// Execute the `bench` command, running a benchmark of a fixed search on a series of positions and displaying the results.
    fn bench(&mut self, depth: Option<usize>, pretty: bool) {
        // A running search holds the tables
        self.stop_search();

        let config = SearchConfig {
            max_depth: depth.unwrap_or(BENCH_DEPTH),
            ..Default::default()
        };

        let width = BENCHMARK_FENS.iter().map(|fen| fen.len()).max().unwrap_or(0);

        println!(
            "Running fixed-depth search (d={}) on {} positions",
            config.max_depth,
            BENCHMARK_FENS.len()
        );

        let mut nodes = 0;
        let start = Instant::now();

        for (i, fen) in BENCHMARK_FENS.into_iter().enumerate() {
            print!("{:>2}/{:>2}: {fen:<width$} := ", i + 1, BENCHMARK_FENS.len());
            // Flush so the node count appears on the same line once the search concludes
            let _ = io::stdout().lock().flush();

            let mut position = match Position::from_fen(fen) {
                Ok(position) => position,
                Err(e) => {
                    println!("{e:#}");
                    continue;
                }
            };

            // Each bench is essentially a new game
            self.clear_hash_tables();

            let res = self.search_now::<LogNone>(&mut position, config);
            nodes += res.nodes;
            println!("{}", res.nodes);
        }

        let elapsed = start.elapsed();
        let nps = (nodes as f32 / elapsed.as_secs_f32()) as u64;
        let m_nps = nodes as f32 / elapsed.as_secs_f32() / 1_000_000.0;
        let ms = elapsed.as_millis();

        if pretty {
            println!();
            println!("+-- Benchmark Complete --+");
            println!("| time (ms)  {ms:<12}|");
            println!("|     nodes  {nodes:<12}|");
            println!("|       nps  {nps:<12}|");
            println!("|      Mnps  {m_nps:<12.2}|");
            println!("+------------------------+");
        } else {
            println!("{nodes} nodes {nps} nps");
        }

        self.clear_hash_tables();
    }

    /// Runs a search on the current thread, blocking until it completes.
    fn search_now<Log: LogLevel>(
        &self,
        position: &mut Position,
        config: SearchConfig,
    ) -> SearchResult {
        let mut ttable = lock(&self.ttable);
        let mut pawns = lock(&self.pawns);
        let mut history = lock(&self.history);
        let mut killers = lock(&self.killers);

        Search::<Log>::new(
            Arc::new(AtomicBool::new(true)),
            config,
            &mut ttable,
            &mut pawns,
            &mut history,
            &mut killers,
            self.tablebase.as_ref(),
        )
        .start(position)
    }

    /// Executes the `eval` command, printing a breakdown of the evaluation of the current position.
    fn eval(&self) {
        let evaluator = Evaluator::new(&self.position, &mut lock(&self.pawns));
        println!("{evaluator}");
    }

    /// Executes the `flip` command, passing the turn to the other side.
    fn flip(&mut self) {
        if self.position.is_in_check() {
            println!("Cannot pass the turn while in check");
        } else {
            self.position.make_null_move();
        }
    }

    /// Display info about the internal hash tables.
    fn hash_info(&self) {
        let ttable = lock(&self.ttable);
        let size = ttable.size();
        let num = ttable.num_entries();
        let cap = ttable.capacity();
        let percent = num as f32 / cap as f32 * 100.0;
        println!(
            "TT info: {size}mb @ {num}/{cap} entries ({percent:.2}% full, hashfull {})",
            ttable.hashfull()
        );

        let pawns = lock(&self.pawns);
        let size = pawns.size();
        let num = pawns.num_entries();
        let cap = pawns.capacity();
        let percent = num as f32 / cap as f32 * 100.0;
        println!("Pawn hash info: {size}mb @ {num}/{cap} entries ({percent:.2}% full)");
    }

    /// Executes the `moves` command, displaying all legal moves, or only those of the piece on `square`.
    fn moves(&self, square: Option<Square>) {
        let mut moves = self
            .position
            .legal_moves()
            .into_iter()
            .filter(|mv| square.map_or(true, |sq| mv.from() == sq))
            .map(|mv| mv.to_uci())
            .collect::<Vec<_>>();

        if moves.is_empty() {
            println!("(none)");
        } else {
            moves.sort();
            println!("{}", moves.join(", "));
        }
    }

    /// Executes the `perft` command on a copy of the current position.
    fn perft(&self, depth: usize, detailed: bool) {
        let mut position = self.position.clone();
        let start = Instant::now();

        if detailed {
            println!("{}", perft_detailed(&mut position, depth));
        } else {
            let nodes = perft(&mut position, depth);
            let elapsed = start.elapsed();
            let nps = (nodes as f32 / elapsed.as_secs_f32().max(f32::EPSILON)) as u64;
            println!("{nodes} nodes in {elapsed:?} ({nps} nps)");
        }
    }

    /// Clears all hash tables in the engine.
    ///
    /// Called in between games.
    fn clear_hash_tables(&mut self) {
        lock(&self.ttable).clear();
        lock(&self.pawns).clear();
        lock(&self.history).clear();
        lock(&self.killers).clear();
    }

    /// Resets the engine's internal game state.
    ///
    /// Cancels any ongoing search, ignoring its result, then clears all caches.
    fn new_game(&mut self) {
        self.stop_search();
        self.clear_hash_tables();
        self.position = Position::default();
    }

    /// Set the position to the supplied FEN string (defaults to the standard startpos if not supplied),
    /// and then apply `moves` one-by-one to the position.
    ///
    /// On error, the current position is left untouched.
    fn set_position<T: AsRef<str>>(
        &mut self,
        fen: Option<T>,
        moves: impl IntoIterator<Item = T>,
    ) -> Result<()> {
        let mut position = match fen {
            Some(fen) => Position::from_fen(fen.as_ref())?,
            None => Position::default(),
        };

        for mv_str in moves {
            let mv_str = mv_str.as_ref();
            let mv = Move::from_uci(&position, mv_str)?;

            if !position.legal_moves().contains(&mv) {
                bail!("Illegal move {mv_str:?} in position {:?}", position.to_fen());
            }

            position.play_move(mv);
        }

        self.position = position;
        Ok(())
    }

    /// Sets the search flag to signal that the engine is starting/stopping a search.
    #[inline(always)]
    fn set_is_searching(&self, status: bool) {
        self.is_searching.store(status, Ordering::Relaxed);
    }

    /// Returns `true` if the engine is currently executing a searching.
    #[inline(always)]
    fn is_searching(&self) -> bool {
        self.is_searching.load(Ordering::Relaxed)
    }

    /// Starts a search on the current position, given the parameters in `config`.
    fn start_search<Log: LogLevel>(&mut self, config: SearchConfig) {
        // Cannot start a search if one is already running
        if self.is_searching() {
            Self::send_string("A search is already running");
            return;
        }

        // Reap the previous search, which has already concluded
        self.await_search();
        self.set_is_searching(true);

        let is_searching = Arc::clone(&self.is_searching);
        let mut position = self.position.clone();
        let ttable = Arc::clone(&self.ttable);
        let pawns = Arc::clone(&self.pawns);
        let history = Arc::clone(&self.history);
        let killers = Arc::clone(&self.killers);
        let tablebase = Arc::clone(&self.tablebase);

        let handle = thread::spawn(move || {
            // Only the search thread may modify the tables until it concludes
            let mut ttable = lock(&ttable);
            let mut pawns = lock(&pawns);
            let mut history = lock(&history);
            let mut killers = lock(&killers);

            Search::<Log>::new(
                is_searching,
                config,
                &mut ttable,
                &mut pawns,
                &mut history,
                &mut killers,
                tablebase.as_ref(),
            )
            .start(&mut position)
        });

        self.search_thread = Some(handle);
    }

    /// Awaits the current search thread, blocking until it finishes and returning its result.
    fn await_search(&mut self) -> Option<SearchResult> {
        let handle = self.search_thread.take()?;

        let id = handle.thread().id();
        let res = handle.join();
        self.set_is_searching(false);

        match res {
            Ok(res) => Some(res),
            Err(_) => {
                Self::send_string(format!("Failed to join on thread {id:?}"));
                None
            }
        }
    }

    /// Signals the current search to stop, then awaits its result.
    fn stop_search(&mut self) -> Option<SearchResult> {
        self.set_is_searching(false);
        self.await_search()
    }

    /// Called when the engine receives the `uci` command.
    ///
    /// Prints engine's ID, version, and authors, and lists all UCI options.
    fn uci(&self) {
        println!("id name {}\nid author {}\n", self.name(), self.authors());

        for opt in self.options() {
            println!("{}", UciResponse::Option(opt));
        }

        println!("{}", UciResponse::<&str>::UciOk)
    }

    /// Convenience function to return an iterator over all UCI options this engine supports.
    fn options(&self) -> impl Iterator<Item = UciOption> {
        [
            UciOption::button("Clear Hash"),
            UciOption::spin(
                "Hash",
                TTable::DEFAULT_SIZE as i32,
                TTable::MIN_SIZE as i32,
                TTable::MAX_SIZE as i32,
            ),
            UciOption::spin(
                "PawnHash",
                PawnHashTable::DEFAULT_SIZE as i32,
                PawnHashTable::MIN_SIZE as i32,
                PawnHashTable::MAX_SIZE as i32,
            ),
            UciOption::check("OwnBook", false),
            UciOption::spin("Contempt", tune::contempt!(), 0, MAX_CONTEMPT),
            UciOption::spin("Threads", 1, 1, 1),
        ]
        .into_iter()
    }

    /// Handles the `setoption` command, setting option `name` to `value`, or pressing it if `value` is None.
    ///
    /// Will return an error if `name` isn't a valid option or `value` is not a valid value for that option.
    fn set_option(&mut self, name: &str, value: Option<String>) -> Result<()> {
        match name {
            "Clear Hash" => {
                self.stop_search();
                self.clear_hash_tables();
            }

            "Hash" => {
                let mb = parse_spin(name, value.as_deref(), TTable::MIN_SIZE, TTable::MAX_SIZE)?;
                self.stop_search();
                *lock(&self.ttable) = TTable::new(mb);
            }

            "PawnHash" => {
                let mb = parse_spin(
                    name,
                    value.as_deref(),
                    PawnHashTable::MIN_SIZE,
                    PawnHashTable::MAX_SIZE,
                )?;
                self.stop_search();
                *lock(&self.pawns) = PawnHashTable::new(mb);
            }

            "OwnBook" => {
                let Some(value) = value.as_deref() else {
                    bail!("usage: setoption name {name} value <true / false>");
                };

                self.own_book = value
                    .parse()
                    .with_context(|| format!("expected bool. got {value:?}"))?;
            }

            "Contempt" => {
                self.contempt = parse_spin(name, value.as_deref(), 0, MAX_CONTEMPT)?;
            }

            "Threads" => {
                if parse_spin::<usize>(name, value.as_deref(), 1, usize::MAX)? != 1 {
                    bail!("{} currently supports only 1 thread", self.name());
                }
            }

            _ => match value.as_ref() {
                Some(value) => bail!("Unrecognized option {name:?} with value {value:?}"),
                None => bail!("Unrecognized option {name:?}"),
            },
        }

        if self.debug {
            let info = match value.as_ref() {
                Some(value) => format!("Option {name} set to {value}"),
                None => format!("Option {name} toggled"),
            };
            Self::send_string(info);
        }

        Ok(())
    }

    /// Returns the current value of the option `name`, if it exists on this engine.
    fn get_option(&self, name: &str) -> Option<String> {
        let value = match name {
            "Clear Hash" => String::default(),

            "Hash" => lock(&self.ttable).size().to_string(),

            "PawnHash" => lock(&self.pawns).size().to_string(),

            "OwnBook" => self.own_book.to_string(),

            "Contempt" => self.contempt.to_string(),

            "Threads" => String::from("1"),

            _ => return None,
        };

        Some(value)
    }

    /// Helper to send a [`UciInfo`] containing only a `string` message to `stdout`.
    #[inline(always)]
    fn send_string<T: Display>(info: T) {
        let resp = UciResponse::<String>::Info(Box::new(UciInfo::new().string(info)));
        println!("{resp}");
    }
}

impl Default for Engine {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("position", &self.position.to_fen())
            .field("is_searching", &self.is_searching())
            .field("own_book", &self.own_book)
            .field("contempt", &self.contempt)
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

/// Parses the value of a `spin` option, ensuring it lies within `min..=max`.
fn parse_spin<T>(name: &str, value: Option<&str>, min: T, max: T) -> Result<T>
where
    T: FromStr + PartialOrd + Display,
{
    let Some(value) = value else {
        bail!("usage: setoption name {name} value <value>");
    };

    let Ok(parsed) = value.parse::<T>() else {
        bail!("expected integer. got {value:?}");
    };

    if parsed < min {
        bail!("Minimum value for {name} is {min}");
    }
    if parsed > max {
        bail!("Maximum value for {name} is {max}");
    }

    Ok(parsed)
}

/// Loops endlessly to await input via `stdin`, sending all successfully-parsed commands through the supplied `sender`.
fn input_handler(sender: Sender<EngineCommand>) -> Result<()> {
    let mut buffer = String::with_capacity(2048);

    loop {
        buffer.clear();
        let bytes = io::stdin()
            .read_line(&mut buffer)
            .context("Failed to read line when parsing UCI commands")?;

        // For ctrl + d
        if 0 == bytes {
            sender
                .send(EngineCommand::Exit { cleanup: false })
                .context("Failed to send 'quit' command after receiving empty input")?;

            bail!("Engine received input of 0 bytes and is quitting");
        }

        let buf = buffer.trim();

        if buf.is_empty() {
            continue;
        }

        match buf.parse::<EngineCommand>() {
            Ok(cmd) => sender
                .send(cmd)
                .context("Failed to send command to engine")?,

            // Invalid input is reported, and the engine keeps running
            Err(err) => eprintln!("{err:#}"),
        }
    }
}
