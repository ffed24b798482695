//! Command: print version information.

/// Print the build version to stdout.
#[allow(clippy::print_stdout)]
pub fn run() {
    println!("dotmodules {}", crate::version_string());
}
