/// Presentation layer: the `gitpoller` command line
pub mod cli;
