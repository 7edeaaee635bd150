use crate::build_info;
use crate::error::Result;
use crate::output::{self, Format};

pub fn run(format: Format) -> Result<()> {
    let info = build_info::current();
    match format {
        Format::Json => output::print_value(&info, format),
        Format::Pretty | Format::Minimal => {
            match info.git_sha {
                Some(sha) => println!("horizon {} ({sha})", info.version),
                None => println!("horizon {}", info.version),
            }
            Ok(())
        }
    }
}
