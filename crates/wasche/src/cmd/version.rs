use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    println!("wasche {}", env!("CARGO_PKG_VERSION"));
    if !args.extended {
        return Ok(SUCCESS);
    }

    println!(
        "target: {}",
        option_env!("WASCHE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "profile: {}",
        option_env!("WASCHE_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "features: ingest={}, async={}, cli=true",
        cfg!(feature = "ingest"),
        cfg!(feature = "async")
    );
    println!(
        "serial default: {} @ {} baud",
        wasche_transport::serial::DEFAULT_PORT,
        wasche_transport::serial::DEFAULT_BAUD_RATE
    );

    Ok(SUCCESS)
}
