// SIGNATURE PASS LOGGING MACROS
#[macro_export]
#[cfg(feature = "show_signatures")]
macro_rules! sig_log {
    ($($arg:tt)*) => {
        eprintln!($($arg)*);
    };
}

#[macro_export]
#[cfg(not(feature = "show_signatures"))]
macro_rules! sig_log {
    ($($arg:tt)*) => {
        // Nothing
    };
}

// LOWERING LOGGING MACROS
#[macro_export]
#[cfg(feature = "show_lowering")]
macro_rules! lower_log {
    ($($arg:tt)*) => {
        eprintln!($($arg)*);
    };
}

#[macro_export]
#[cfg(not(feature = "show_lowering"))]
macro_rules! lower_log {
    ($($arg:tt)*) => {
        // Nothing
    };
}

// Extra timer logging
#[macro_export]
#[cfg(feature = "detailed_timers")]
macro_rules! timer_log {
    ($time:expr, $msg:expr) => {
        eprint!("{}", $msg);
        eprintln!("{:?}", $time.elapsed());
    };
}

#[macro_export]
#[cfg(not(feature = "detailed_timers"))]
macro_rules! timer_log {
    ($time:expr, $msg:expr) => {
        // Nothing
    };
}
