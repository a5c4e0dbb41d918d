pub use self::line::*;

use crate::clock::Clock;
use std::fs::File;
use std::io::Write;
use std::sync::{Arc, Mutex};
use termcolor::{BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

mod line;
mod macros;

/// Logger for the simulator.
///
/// Writes colored lines to stdout and, optionally, plain copies to a file.
/// Every line carries the simulated tick at which it was produced, so the log
/// doubles as a trace of the schedule.
pub struct Logger {
    clock: Arc<Clock>,
    stdout: BufferWriter,
    file: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(clock: Arc<Clock>) -> Self {
        Self {
            clock,
            stdout: BufferWriter::stdout(ColorChoice::Auto),
            file: None,
        }
    }

    pub fn set_file(&mut self, file: File) {
        self.file = Some(Mutex::new(file));
    }

    pub fn info(&self) -> Line {
        self.line('I', Color::Cyan)
    }

    pub fn warn(&self) -> Line {
        self.line('W', Color::Yellow)
    }

    pub fn error(&self) -> Line {
        self.line('E', Color::Red)
    }

    fn line(&self, category: char, color: Color) -> Line {
        let mut l = Line::new(self.stdout.buffer());
        let mut c = ColorSpec::new();

        c.set_fg(Some(color)).set_bold(true);
        l.set_color(Some(&c));

        write!(&mut l, "[{category} {:04}] ", self.clock.now()).unwrap();
        l.set_color(None);

        l
    }

    pub fn write(&self, l: Line) {
        let (mut stdout, mut plain) = l.into_raw();

        stdout.reset().unwrap();
        stdout.write_all(b"\n").unwrap();

        self.stdout.print(&stdout).unwrap();

        if let Some(f) = &self.file {
            plain.push(b'\n');
            f.lock().unwrap().write_all(&plain).unwrap();
        }
    }
}
