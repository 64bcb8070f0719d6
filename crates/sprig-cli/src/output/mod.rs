//! Terminal output formatting.
//!
//! Progress and results go to stdout, errors to stderr. Colors follow
//! [`colors::ColorSupport::detect`].

pub mod colors;
pub mod errors;

pub use errors::ErrorFormatter;

/// Output handler for consistent terminal formatting
pub struct OutputHandler {
    colors: colors::ColorSupport,
    quiet: bool,
}

impl OutputHandler {
    pub fn new() -> Self {
        Self {
            colors: colors::ColorSupport::detect(),
            quiet: false,
        }
    }

    /// Handler that prints nothing, for tests
    pub fn quiet() -> Self {
        Self {
            colors: colors::ColorSupport::disabled(),
            quiet: true,
        }
    }

    pub fn info(&self, message: &str) {
        if !self.quiet {
            println!("{}", self.colors.dim(message));
        }
    }

    pub fn success(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", self.colors.green("✓"), message);
        }
    }

    pub fn warn(&self, message: &str) {
        if !self.quiet {
            eprintln!("{}", ErrorFormatter::with_colors(self.colors).format_warning(message));
        }
    }

    /// A phase header, e.g. "Resolving dependencies"
    pub fn step(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", self.colors.bold("=>"), message);
        }
    }

    /// One line of a change list, colored by its leading marker
    pub fn change(&self, line: &str) {
        if self.quiet {
            return;
        }
        let colored = match line.chars().next() {
            Some('+') => self.colors.green(line),
            Some('-') => self.colors.red(line),
            Some('~') => self.colors.yellow(line),
            _ => line.to_string(),
        };
        println!("  {}", colored);
    }
}

impl Default for OutputHandler {
    fn default() -> Self {
        Self::new()
    }
}
