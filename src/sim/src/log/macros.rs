/// Logs a line at the information severity.
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)*) => {
        $crate::log_line!($logger, info, $($arg)*)
    }
}

/// Logs a line at the warning severity. An error passed as the second
/// argument is appended to the message together with its source chain.
#[macro_export]
macro_rules! warn {
    ($logger:expr, $err:ident, $($arg:tt)*) => {
        $crate::log_line!($logger, warn, $err, $($arg)*)
    };
    ($logger:expr, $($arg:tt)*) => {
        $crate::log_line!($logger, warn, $($arg)*)
    }
}

/// Logs a line at the error severity. Takes the same forms as [`warn!`].
#[macro_export]
macro_rules! error {
    ($logger:expr, $err:ident, $($arg:tt)*) => {
        $crate::log_line!($logger, error, $err, $($arg)*)
    };
    ($logger:expr, $($arg:tt)*) => {
        $crate::log_line!($logger, error, $($arg)*)
    }
}

/// Shared body of the logging macros: open a tick-stamped line at the given
/// severity, format into it and hand it back to the logger. Not for direct
/// use.
#[doc(hidden)]
#[macro_export]
macro_rules! log_line {
    ($logger:expr, $severity:ident, $err:ident, $($arg:tt)*) => {{
        use std::io::Write;

        let mut line = $logger.$severity();
        write!(&mut line, $($arg)*).unwrap();
        line.push_error(&$err);
        $logger.write(line);
    }};
    ($logger:expr, $severity:ident, $($arg:tt)*) => {{
        use std::io::Write;

        let mut line = $logger.$severity();
        write!(&mut line, $($arg)*).unwrap();
        $logger.write(line);
    }}
}
