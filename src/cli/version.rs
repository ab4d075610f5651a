use crate::cnf::{PKG_NAME, PKG_VERSION};
use crate::err::Error;

pub fn init() -> Result<(), Error> {
	println!(
		"{PKG_NAME} {} for {} on {}",
		*PKG_VERSION,
		std::env::consts::OS,
		std::env::consts::ARCH
	);
	Ok(())
}
