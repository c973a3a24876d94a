mod styling;
mod summary;

pub use styling::{cyan, dim, magenta_bold};
pub use summary::{print_summary, render_summary};

/// Prints the `bumpline` banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("⬆ bumpline"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Dependency update delivery")
    );
}
