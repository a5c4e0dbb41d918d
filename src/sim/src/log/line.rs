use std::error::Error;
use std::io::Write;
use termcolor::{Buffer, ColorSpec, WriteColor};

/// A line being logged: a colored buffer for the terminal and a plain copy
/// for the log file.
pub struct Line {
    stdout: Buffer,
    plain: Vec<u8>,
}

impl Line {
    pub(super) fn new(stdout: Buffer) -> Self {
        Self {
            stdout,
            plain: Vec::new(),
        }
    }

    pub(super) fn into_raw(self) -> (Buffer, Vec<u8>) {
        (self.stdout, self.plain)
    }

    pub fn set_color(&mut self, spec: Option<&ColorSpec>) {
        match spec {
            Some(v) => self.stdout.set_color(v).unwrap(),
            None => self.stdout.reset().unwrap(),
        }
    }

    /// Appends the error and its whole source chain to the line, ending with
    /// a full stop.
    pub fn push_error(&mut self, err: &dyn Error) {
        write!(self, ": {err}").unwrap();

        let mut inner = err.source();

        while let Some(e) = inner {
            write!(self, " -> {e}").unwrap();
            inner = e.source();
        }

        write!(self, ".").unwrap();
    }
}

impl Write for Line {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let len = buf.len();

        assert_eq!(self.stdout.write(buf)?, len);
        assert_eq!(self.plain.write(buf)?, len);

        Ok(len)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.stdout.flush()?;
        self.plain.flush()?;

        Ok(())
    }
}
