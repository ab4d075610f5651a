use std::process::ExitCode;

fn main() -> ExitCode {
	tablegraph::init()
}
