#[macro_use]
extern crate log;

use std::env::consts::{ARCH, FAMILY, OS};
use std::env::current_dir;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::sync::{Arc, Mutex};

use anyhow::Error;
use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, TermLogger, TerminalMode, WriteLogger,
};

use crate::program::Program;

mod download;
mod e621;
mod io;
mod kemono;
mod program;
mod resolver;
mod sender;
mod tui;

/// Diagnostic log written next to the executable's working directory.
const LOG_FILE_NAME: &str = "e621_kemono_downloader.log";

/// Flush the file log after this many lines.
const FLUSH_EVERY_LINES: usize = 50;

struct LogState {
    writer: BufWriter<std::fs::File>,
    lines: usize,
}

/// Buffered, append-mode writer behind the file logger.
struct BufferedFileWriter {
    state: Arc<Mutex<LogState>>,
}

impl BufferedFileWriter {
    fn open(path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            state: Arc::new(Mutex::new(LogState {
                writer: BufWriter::with_capacity(64 * 1024, file),
                lines: 0,
            })),
        })
    }
}

impl Write for BufferedFileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| std::io::Error::other("Log writer lock poisoned"))?;

        let size = state.writer.write(buf)?;
        let new_lines = buf[..size].iter().filter(|&&b| b == b'\n').count();
        if new_lines > 0 {
            let before = state.lines;
            state.lines += new_lines;
            if before / FLUSH_EVERY_LINES != state.lines / FLUSH_EVERY_LINES {
                state.writer.flush()?;
            }
        }

        Ok(size)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| std::io::Error::other("Log writer lock poisoned"))?;
        state.writer.flush()
    }
}

impl Drop for BufferedFileWriter {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            let _ = state.writer.flush();
        }
    }
}

fn main() -> Result<(), Error> {
    initialize_logger();
    log_system_information();

    let program = Program::new(&current_dir()?)?;
    program.run()
}

/// Terminal logging at info, everything from this crate to the log file.
fn initialize_logger() {
    let mut config = ConfigBuilder::new();
    config.add_filter_allow_str(env!("CARGO_PKG_NAME"));

    let file_writer = match BufferedFileWriter::open(LOG_FILE_NAME) {
        Ok(writer) => writer,
        Err(e) => {
            eprintln!("Failed to open {LOG_FILE_NAME}: {e}. Logging will only output to terminal.");
            let _ = TermLogger::init(
                LevelFilter::Info,
                Config::default(),
                TerminalMode::Mixed,
                ColorChoice::Auto,
            );
            return;
        }
    };

    if let Err(e) = CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::max(), config.build(), file_writer),
    ]) {
        eprintln!("Failed to initialize combined logger: {e}. Falling back to terminal-only logging.");
        let _ = TermLogger::init(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        );
    }
}

/// Logs important information about the system being used.
fn log_system_information() {
    trace!("Printing system information out into log for debug purposes...");
    trace!("ARCH:           \"{ARCH}\"");
    trace!("FAMILY:         \"{FAMILY}\"");
    trace!("OS:             \"{OS}\"");
}
