use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("shadowstream {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: shadowstream");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "default_endpoint: {}",
        shadowstream_transport::Endpoint::default()
    );
    println!(
        "features: async={}, cli=true",
        cfg!(feature = "async")
    );

    Ok(SUCCESS)
}
