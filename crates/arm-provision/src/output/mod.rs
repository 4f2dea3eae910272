mod console;

pub(crate) use console::{ConsoleSink, print_cleanup};
